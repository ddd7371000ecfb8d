use std::sync::Arc;

use serde_json::Value;
use weaver_delta::{AttributeMap, Delta};

use super::{Document, SelectionRange, Source};
use crate::error::DocumentError;
use crate::format::FormatRegistry;

/// Simple field-based implementation of `Document`.
///
/// Keeps the contents as a single document delta and records every applied
/// change. Use this for headless hosts or as a base for testing.
#[derive(Clone)]
pub struct DeltaDocument {
    contents: Delta,
    registry: Arc<dyn FormatRegistry>,
    selection: Option<SelectionRange>,
    cursor: AttributeMap,
    focused: bool,
    enabled: bool,
    changes: Vec<(Delta, Source)>,
    cutoffs: usize,
    scroll_requests: usize,
}

impl std::fmt::Debug for DeltaDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaDocument")
            .field("contents", &self.contents)
            .field("selection", &self.selection)
            .field("cursor", &self.cursor)
            .field("focused", &self.focused)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn terminated(mut contents: Delta) -> Delta {
    if !contents.ends_with_text("\n") {
        contents = contents.insert("\n", AttributeMap::new());
    }
    contents
}

impl DeltaDocument {
    /// Create a focused, enabled document. A missing trailing newline is
    /// added.
    pub fn new(contents: Delta, registry: Arc<dyn FormatRegistry>) -> Self {
        Self {
            contents: terminated(contents),
            registry,
            selection: None,
            cursor: AttributeMap::new(),
            focused: true,
            enabled: true,
            changes: Vec::new(),
            cutoffs: 0,
            scroll_requests: 0,
        }
    }

    pub fn with_selection(mut self, range: SelectionRange) -> Self {
        self.set_selection(range, Source::Silent);
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Every change applied so far, oldest first.
    pub fn changes(&self) -> &[(Delta, Source)] {
        &self.changes
    }

    /// Number of undo group boundaries requested.
    pub fn cutoffs(&self) -> usize {
        self.cutoffs
    }

    pub fn scroll_requests(&self) -> usize {
        self.scroll_requests
    }

    fn clamp(&self, range: SelectionRange) -> SelectionRange {
        let last = self.contents.length().saturating_sub(1);
        let index = range.index.min(last);
        let length = range.length.min(last - index);
        SelectionRange { index, length }
    }
}

impl Document for DeltaDocument {
    fn registry(&self) -> Arc<dyn FormatRegistry> {
        Arc::clone(&self.registry)
    }

    fn contents(&self) -> &Delta {
        &self.contents
    }

    fn update_contents(&mut self, change: &Delta, source: Source) -> Result<Delta, DocumentError> {
        let actual = self.contents.length();
        let expected = change.base_length();
        if expected > actual {
            return Err(DocumentError::OutOfRange { expected, actual });
        }
        if change.is_empty() {
            return Ok(Delta::new());
        }
        self.contents = terminated(self.contents.compose(change));

        if let Some(range) = self.selection {
            let priority = source != Source::User;
            let start = change.transform_position(range.index, priority);
            let end = change.transform_position(range.end(), priority);
            self.selection = Some(self.clamp(SelectionRange::new(start, end.saturating_sub(start))));
        }
        self.cursor.clear();

        tracing::trace!(
            target: "weaver::document",
            ?source,
            ops = change.ops.len(),
            length = self.contents.length(),
            "applied change"
        );
        self.changes.push((change.clone(), source));
        Ok(change.clone())
    }

    fn selection(&self) -> Option<SelectionRange> {
        self.selection
    }

    fn set_selection(&mut self, range: SelectionRange, _source: Source) {
        let range = self.clamp(range);
        if self.selection != Some(range) {
            self.cursor.clear();
        }
        self.selection = Some(range);
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn scroll_into_view(&mut self) {
        self.scroll_requests += 1;
    }

    fn history_cutoff(&mut self) {
        self.cutoffs += 1;
    }

    fn cursor_formats(&self) -> AttributeMap {
        self.cursor.clone()
    }

    fn set_cursor_format(&mut self, name: &str, value: Value) {
        self.cursor.insert(name.to_string(), value);
    }
}
