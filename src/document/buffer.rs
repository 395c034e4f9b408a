use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{CheckboxObserver, DocumentError, Editor, PageStore};

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^|\]]+)\|([^\]]*)\]\]").unwrap());

/// In-memory page store, a stand-in for the host notebook.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotebook {
    name: String,
    pages: HashMap<String, String>,
}

impl MemoryNotebook {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pages: HashMap::new(),
        }
    }

    pub fn set_page(&mut self, page: impl Into<String>, content: impl Into<String>) {
        self.pages.insert(page.into(), content.into());
    }

    pub fn page(&self, page: &str) -> Option<&str> {
        self.pages.get(page).map(String::as_str)
    }
}

impl PageStore for MemoryNotebook {
    fn name(&self) -> &str {
        &self.name
    }

    fn dump(&self, page: &str) -> Result<Vec<String>, DocumentError> {
        let content = self
            .pages
            .get(page)
            .ok_or_else(|| DocumentError::PageNotFound(page.to_string()))?;
        Ok(content.split_inclusive('\n').map(String::from).collect())
    }

    fn store(&mut self, page: &str, content: &str) -> Result<(), DocumentError> {
        self.pages.insert(page.to_string(), content.to_string());
        Ok(())
    }
}

/// In-memory editing session over one page's markup text. Links are
/// recognized straight from the `[[target|label]]` markup, so the buffer can
/// answer link-metadata lookups without a rendered view.
#[derive(Default)]
pub struct BufferEditor {
    page: String,
    text: String,
    caret: usize,
    selection: Option<(usize, usize)>,
    observers: Vec<Box<dyn CheckboxObserver>>,
}

impl BufferEditor {
    pub fn new(page: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            text: text.into(),
            caret: 0,
            selection: None,
            observers: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_caret(&mut self, offset: usize) {
        self.caret = offset.min(self.char_len());
        self.selection = None;
    }

    /// Host-side entry for a user checkbox toggle: consult the observers,
    /// then apply the marker change unless one of them vetoed it.
    pub fn toggle_checkbox(&mut self, line: usize, checked: bool) -> bool {
        let mut observers = std::mem::take(&mut self.observers);
        let allowed = observers
            .iter_mut()
            .all(|o| o.checkbox_toggled(self, line, checked));
        self.observers = observers;
        if allowed {
            self.apply_checkbox(line, checked);
        }
        allowed
    }

    fn apply_checkbox(&mut self, line: usize, checked: bool) {
        let Some(text) = self.line_text(line) else {
            return;
        };
        if text.len() < 3 || !text.starts_with('[') || text.as_bytes()[2] != b']' {
            return;
        }
        let start = match self.line_start_offset(line) {
            Some(o) => self.byte_of_char(o),
            None => return,
        };
        let marker = if checked { "[*]" } else { "[ ]" };
        self.text.replace_range(start..start + 3, marker);
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_of_char(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }
}

impl Editor for BufferEditor {
    fn page_name(&self) -> &str {
        &self.page
    }

    fn caret(&self) -> usize {
        self.caret
    }

    fn caret_line(&self) -> usize {
        let byte = self.byte_of_char(self.caret);
        self.text[..byte].matches('\n').count()
    }

    fn selection(&self) -> Option<(usize, usize)> {
        self.selection
    }

    fn select_range(&mut self, start: usize, end: usize) {
        let len = self.char_len();
        self.selection = Some((start.min(len), end.min(len)));
    }

    fn selected_text(&self) -> Option<String> {
        let (start, end) = self.selection?;
        let (a, b) = (self.byte_of_char(start), self.byte_of_char(end));
        Some(self.text[a..b].to_string())
    }

    fn line_text(&self, line: usize) -> Option<String> {
        self.text.split('\n').nth(line).map(String::from)
    }

    fn line_start_offset(&self, line: usize) -> Option<usize> {
        let mut offset = 0;
        for (i, l) in self.text.split('\n').enumerate() {
            if i == line {
                return Some(offset);
            }
            offset += l.chars().count() + 1;
        }
        None
    }

    fn link_at_offset(&self, offset: usize) -> Option<String> {
        for caps in LINK_RE.captures_iter(&self.text) {
            let m = caps.get(0).unwrap();
            let start = self.text[..m.start()].chars().count();
            let end = start + m.as_str().chars().count();
            if offset >= start && offset < end {
                return Some(caps[1].to_string());
            }
        }
        None
    }

    fn insert_at_caret(&mut self, text: &str) {
        let byte = self.byte_of_char(self.caret);
        self.text.insert_str(byte, text);
        self.caret += text.chars().count();
    }

    fn delete_range(&mut self, start: usize, end: usize) {
        let (a, b) = (self.byte_of_char(start), self.byte_of_char(end));
        self.text.replace_range(a..b, "");
        self.caret = start.min(self.char_len());
        self.selection = None;
    }

    fn register_checkbox_observer(&mut self, observer: Box<dyn CheckboxObserver>) {
        self.observers.push(observer);
    }
}
