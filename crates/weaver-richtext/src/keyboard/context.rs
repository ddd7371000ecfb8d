use weaver_delta::AttributeMap;

use super::key::KeyEvent;
use crate::document::{Document, LineRef, SelectionRange};

/// Selection state a binding is checked against, computed once per key-down.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub collapsed: bool,
    /// Collapsed on a line with nothing but its terminator.
    pub empty: bool,
    /// Formats active over the selection.
    pub format: AttributeMap,
    /// The line holding the selection start.
    pub line: LineRef,
    /// Selection start inside `line`.
    pub offset: usize,
    /// Text of the start leaf before the selection.
    pub prefix: String,
    /// Text of the end leaf after the selection.
    pub suffix: String,
    pub event: KeyEvent,
}

impl DispatchContext {
    /// `None` when the selection start is outside the document.
    pub fn build(doc: &dyn Document, range: SelectionRange, event: &KeyEvent) -> Option<Self> {
        let (line, offset) = doc.line(range.index)?;
        let start = doc.leaf(range.index);
        let end = if range.is_collapsed() {
            start.clone()
        } else {
            doc.leaf(range.end())
        };
        let prefix = start
            .as_ref()
            .and_then(|(leaf, at)| leaf.text().map(|text| text.chars().take(*at).collect()))
            .unwrap_or_default();
        let suffix = end
            .as_ref()
            .and_then(|(leaf, at)| leaf.text().map(|text| text.chars().skip(*at).collect()))
            .unwrap_or_default();
        Some(Self {
            collapsed: range.is_collapsed(),
            empty: range.is_collapsed() && line.length <= 1,
            format: doc.format_at(range.index, range.length),
            line,
            offset,
            prefix,
            suffix,
            event: event.clone(),
        })
    }
}
