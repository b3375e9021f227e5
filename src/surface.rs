/// The editable document as seen by the orchestration core.
///
/// Only two things are asked of it: hand over its text, and accept text at
/// its end. `tui_textarea::TextArea` backs the interactive editor;
/// `PlainDocument` backs headless runs and tests.
use std::cell::RefCell;
use std::rc::Rc;

use tui_textarea::{CursorMove, TextArea};

pub trait DocumentSurface {
    /// Full document as plain text, paragraph breaks kept, outer whitespace trimmed.
    fn text(&self) -> String;
    /// Append at the very end and leave the caret there.
    fn append_text(&mut self, text: &str);
    fn focus(&mut self);
}

/// Shared handle used by the event loop (rendering, key input) and the sync
/// bridge. Everything runs on one task, so a `RefCell` borrow never overlaps.
pub type SharedDocument<D> = Rc<RefCell<D>>;

pub fn shared<D: DocumentSurface>(document: D) -> SharedDocument<D> {
    Rc::new(RefCell::new(document))
}

// ── TextArea ──────────────────────────────────────────────────────────────────

impl DocumentSurface for TextArea<'_> {
    fn text(&self) -> String {
        self.lines().join("\n").trim().to_string()
    }

    fn append_text(&mut self, text: &str) {
        self.move_cursor(CursorMove::Bottom);
        self.move_cursor(CursorMove::End);
        self.insert_str(text);
        self.focus();
    }

    fn focus(&mut self) {
        self.move_cursor(CursorMove::Bottom);
        self.move_cursor(CursorMove::End);
    }
}

// ── Plain string ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainDocument {
    content: String,
    /// Byte offset of the caret.
    caret: usize,
    focused: bool,
}

impl PlainDocument {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        Self { caret: 0, focused: false, content }
    }

    /// Untrimmed content, as stored.
    pub fn raw(&self) -> &str {
        &self.content
    }

    #[cfg(test)]
    pub fn caret(&self) -> usize {
        self.caret
    }

    #[cfg(test)]
    pub fn is_focused(&self) -> bool {
        self.focused
    }
}

impl DocumentSurface for PlainDocument {
    fn text(&self) -> String {
        self.content.trim().to_string()
    }

    fn append_text(&mut self, text: &str) {
        self.content.push_str(text);
        self.focus();
    }

    fn focus(&mut self) {
        self.caret = self.content.len();
        self.focused = true;
    }
}
