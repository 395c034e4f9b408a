use std::sync::LazyLock;

use regex::Regex;

use crate::document::Editor;

/// The one glyph reserved as the task-anchor marker.
pub const ANCHOR_SYMBOL: char = '\u{2691}'; // ⚑

/// Link-scheme prefix carrying the remote task id.
pub const SCHEME_PREFIX: &str = "gtasks://";

/// A task line: checkbox bullet, anchor link, title. The bullet is required
/// here; `parser` reuses [`ANCHORED_LINE_RE`] where it is optional.
static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(?P<bullet>[ *xX])\] \[\[gtasks://(?P<id>[^|\]]+)\|⚑\]\]").unwrap()
});

/// First line of a dumped selection: optional bullet, then the anchor link
/// and the title remainder.
pub(crate) static ANCHORED_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[(?P<bullet>[ *xX])\] )?\[\[gtasks://(?P<id>[^|\]]+)\|⚑\]\]\s?(?P<title>.*)$")
        .unwrap()
});

/// Render the anchor link for a remote task id.
pub fn render_anchor(id: &str) -> String {
    format!("[[{}{}|{}]]", SCHEME_PREFIX, id, ANCHOR_SYMBOL)
}

/// Char offset of the anchor symbol within `line`, if present.
pub fn find_anchor_in_line(line: &str) -> Option<usize> {
    line.chars().position(|c| c == ANCHOR_SYMBOL)
}

/// Checked-ness encoded by a bullet character.
pub fn bullet_is_checked(bullet: char) -> bool {
    matches!(bullet, '*' | 'x' | 'X')
}

/// Extract `(task_id, checked)` from a full task line (bullet + anchor).
/// `None` means the line is not a remote-backed task line.
pub fn parse_task_line(line: &str) -> Option<(String, bool)> {
    let caps = TASK_LINE_RE.captures(line)?;
    let bullet = caps["bullet"].chars().next()?;
    Some((caps["id"].to_string(), bullet_is_checked(bullet)))
}

/// Resolve a task line to its remote id through the editor's link metadata.
///
/// Locates the anchor symbol, asks the editor for the link at that offset
/// and strips the scheme prefix. Any lookup failure means "not a task line",
/// never an error.
pub fn resolve(editor: &dyn Editor, line: usize) -> Option<String> {
    let text = editor.line_text(line)?;
    let pos = find_anchor_in_line(&text)?;
    let offset = editor.line_start_offset(line)? + pos;
    let target = editor.link_at_offset(offset)?;
    target.strip_prefix(SCHEME_PREFIX).map(str::to_string)
}
