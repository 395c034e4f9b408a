pub mod buffer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("page not found: {0}")]
    PageNotFound(String),
    #[error("document I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage side of the document host: whole pages in, whole pages out.
///
/// `dump` returns the page as an ordered sequence of lines in the markup
/// dialect, each line keeping its terminator. `store` replaces the full page
/// content in one step; partial page rewrites are never exposed.
pub trait PageStore {
    /// Name identifying this notebook/document, used to key the import cache.
    fn name(&self) -> &str;

    fn dump(&self, page: &str) -> Result<Vec<String>, DocumentError>;

    fn store(&mut self, page: &str, content: &str) -> Result<(), DocumentError>;
}

/// Editing session for the currently-displayed page.
///
/// All offsets are char offsets into the page text. Line numbers are
/// zero-based.
pub trait Editor {
    fn page_name(&self) -> &str;

    fn caret(&self) -> usize;

    fn caret_line(&self) -> usize;

    /// Selection bounds as a (start, end) offset pair, `None` when nothing
    /// is selected.
    fn selection(&self) -> Option<(usize, usize)>;

    fn select_range(&mut self, start: usize, end: usize);

    fn selected_text(&self) -> Option<String>;

    /// Text of line `line`, without its terminator.
    fn line_text(&self, line: usize) -> Option<String>;

    fn line_start_offset(&self, line: usize) -> Option<usize>;

    /// Link target at the given offset, if the offset falls inside a link.
    fn link_at_offset(&self, offset: usize) -> Option<String>;

    fn insert_at_caret(&mut self, text: &str);

    fn delete_range(&mut self, start: usize, end: usize);

    /// Subscribe to checkbox toggles. The host calls every registered
    /// observer before applying a toggle.
    fn register_checkbox_observer(&mut self, observer: Box<dyn CheckboxObserver>);
}

/// Callback registration point for host checkbox toggles.
pub trait CheckboxObserver {
    /// Called when the user toggles the checkbox on `line` to `checked`.
    /// Returning `false` vetoes the toggle and the host leaves the line
    /// unchanged.
    fn checkbox_toggled(&mut self, editor: &mut dyn Editor, line: usize, checked: bool) -> bool;
}
