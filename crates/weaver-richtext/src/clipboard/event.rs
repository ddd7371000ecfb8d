use std::collections::BTreeMap;

use smol_str::SmolStr;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";

/// A file on the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Clipboard contents keyed by MIME type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTransfer {
    data: BTreeMap<SmolStr, String>,
    pub files: Vec<ClipboardFile>,
}

impl DataTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, mime: &str, value: impl Into<String>) -> Self {
        self.set_data(mime, value);
        self
    }

    pub fn with_file(mut self, file: ClipboardFile) -> Self {
        self.files.push(file);
        self
    }

    /// The data for `mime`, empty when absent.
    pub fn get_data(&self, mime: &str) -> &str {
        self.data.get(mime).map(String::as_str).unwrap_or_default()
    }

    pub fn set_data(&mut self, mime: &str, value: impl Into<String>) {
        self.data.insert(SmolStr::new(mime), value.into());
    }
}

/// The element a copy or cut was fired on, reduced to what copying needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTarget {
    pub classes: Vec<SmolStr>,
    /// Visible text of every code line next to the target, in order.
    pub code_lines: Vec<String>,
}

impl EventTarget {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// An already-captured copy, cut or paste event.
#[derive(Debug, Clone, Default)]
pub struct ClipboardEvent {
    pub target: EventTarget,
    pub clipboard: DataTransfer,
    default_prevented: bool,
}

impl ClipboardEvent {
    pub fn new(clipboard: DataTransfer) -> Self {
        Self {
            clipboard,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: EventTarget) -> Self {
        self.target = target;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}
