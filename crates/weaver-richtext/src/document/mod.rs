//! The live document contract.
//!
//! `Document` is what the clipboard and keyboard modules talk to. A host
//! implements the required primitives (contents, change application,
//! selection, focus, history markers); every query and editing helper the
//! modules need is provided on top of them.

mod html;
pub mod layout;
mod memory;

pub use layout::{Leaf, LineKind, LineRef, TablePosition};
pub use memory::DeltaDocument;

use std::sync::Arc;

use serde_json::Value;
use weaver_delta::{AttributeMap, Delta, Insert, Op};

use crate::error::DocumentError;
use crate::format::{Format, FormatRegistry, Scope};

/// Who caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    #[default]
    Api,
    User,
    /// Applied without notifying listeners.
    Silent,
}

/// A selection over the flattened document. `length == 0` is a caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionRange {
    pub index: usize,
    pub length: usize,
}

impl SelectionRange {
    pub fn new(index: usize, length: usize) -> Self {
        Self { index, length }
    }

    pub fn caret(index: usize) -> Self {
        Self { index, length: 0 }
    }

    pub fn is_collapsed(&self) -> bool {
        self.length == 0
    }

    pub fn end(&self) -> usize {
        self.index + self.length
    }
}

/// The table around a caret, with the document lines it was computed from.
#[derive(Debug, Clone)]
pub struct TableContext {
    pub lines: Vec<LineRef>,
    pub position: TablePosition,
    /// Caret offset inside the cell.
    pub offset: usize,
}

impl TableContext {
    pub fn cell(&self) -> &LineRef {
        &self.lines[self.position.cell]
    }

    pub fn table_index(&self) -> usize {
        self.lines[self.position.table.start].index
    }

    pub fn table_end(&self) -> usize {
        self.lines[self.position.table.end - 1].end()
    }

    pub fn row_count(&self) -> usize {
        self.position.rows.len()
    }

    /// Line before the table, if any.
    pub fn line_before(&self) -> Option<&LineRef> {
        self.position
            .table
            .start
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
    }

    /// Line after the table, if any.
    pub fn line_after(&self) -> Option<&LineRef> {
        self.lines.get(self.position.table.end)
    }
}

/// Combine formats of several lines or leaves: formats missing from any
/// of them drop out, differing values collect into an array.
fn combine_formats<I>(mut blots: I) -> AttributeMap
where
    I: Iterator<Item = AttributeMap>,
{
    let Some(mut combined) = blots.next() else {
        return AttributeMap::new();
    };
    while !combined.is_empty() {
        let Some(formats) = blots.next() else {
            break;
        };
        combined = combined
            .into_iter()
            .filter_map(|(name, value)| {
                let other = formats.get(&name).filter(|v| !v.is_null())?;
                let merged = if &value == other {
                    value
                } else {
                    match value {
                        Value::Array(mut values) => {
                            if !values.contains(other) {
                                values.push(other.clone());
                            }
                            Value::Array(values)
                        }
                        single => Value::Array(vec![single, other.clone()]),
                    }
                };
                Some((name, merged))
            })
            .collect();
    }
    combined
}

pub trait Document {
    // === Required ===

    fn registry(&self) -> Arc<dyn FormatRegistry>;

    /// The whole document as inserts.
    fn contents(&self) -> &Delta;

    /// Compose `change` onto the document and return it.
    ///
    /// Implementations move the selection through the change (user changes
    /// push a caret past text inserted at it) and reject changes whose base
    /// length exceeds the document.
    fn update_contents(&mut self, change: &Delta, source: Source) -> Result<Delta, DocumentError>;

    fn selection(&self) -> Option<SelectionRange>;

    fn set_selection(&mut self, range: SelectionRange, source: Source);

    fn has_focus(&self) -> bool;

    fn focus(&mut self);

    fn is_enabled(&self) -> bool;

    fn scroll_into_view(&mut self);

    /// Close the current undo group.
    fn history_cutoff(&mut self);

    /// Inline formats pending at a collapsed caret.
    fn cursor_formats(&self) -> AttributeMap;

    fn set_cursor_format(&mut self, name: &str, value: Value);

    // === Provided: queries ===

    fn length(&self) -> usize {
        self.contents().length()
    }

    fn all_lines(&self) -> Vec<LineRef> {
        layout::lines(self.contents(), self.registry().as_ref())
    }

    /// The line containing `index` and the offset inside it.
    fn line(&self, index: usize) -> Option<(LineRef, usize)> {
        let lines = self.all_lines();
        let (at, offset) = layout::locate(&lines, index)?;
        lines.into_iter().nth(at).map(|line| (line, offset))
    }

    /// Lines overlapping `[index, index + length)`.
    fn lines(&self, index: usize, length: usize) -> Vec<LineRef> {
        let lines = self.all_lines();
        let range = layout::overlapping(&lines, index, length);
        lines[range].to_vec()
    }

    /// The leaf holding the unit before `index`, or the line's first leaf
    /// when `index` starts a line.
    fn leaf(&self, index: usize) -> Option<(Leaf, usize)> {
        let (line, offset) = self.line(index)?;
        layout::leaf_before(&line, offset)
    }

    /// Plain text of a range. Embeds contribute nothing.
    fn text(&self, index: usize, length: usize) -> String {
        self.contents().slice(index, index + length).to_text()
    }

    /// Formats active over a range, line formats first, leaf formats on top.
    ///
    /// A collapsed range reads the line and the leaf before the caret, plus
    /// any pending cursor formats when the caret is the live selection.
    fn format_at(&self, index: usize, length: usize) -> AttributeMap {
        let lines = self.all_lines();
        let (line_formats, leaf_formats) = if length == 0 {
            let Some((at, offset)) = layout::locate(&lines, index) else {
                return AttributeMap::new();
            };
            let line = &lines[at];
            let line_formats = match line.kind {
                LineKind::Text => line.formats.clone(),
                LineKind::BlockEmbed => AttributeMap::new(),
            };
            let mut leaf_formats = layout::leaf_before(line, offset)
                .map(|(leaf, _)| leaf.attributes())
                .unwrap_or_default();
            if self.selection() == Some(SelectionRange::caret(index)) {
                for (name, value) in self.cursor_formats() {
                    if value.is_null() {
                        leaf_formats.remove(&name);
                    } else {
                        leaf_formats.insert(name, value);
                    }
                }
            }
            (line_formats, leaf_formats)
        } else {
            let range = layout::overlapping(&lines, index, length);
            let selected = &lines[range];
            let end = index + length;
            let line_formats = combine_formats(
                selected
                    .iter()
                    .filter(|line| line.kind == LineKind::Text)
                    .map(|line| line.formats.clone()),
            );
            let mut leaves = Vec::new();
            for line in selected {
                let mut start = line.index;
                for op in &line.content.ops {
                    let op_end = start + op.len();
                    if start < end && index < op_end {
                        leaves.push(op.attributes().cloned().unwrap_or_default());
                    }
                    start = op_end;
                }
            }
            (line_formats, combine_formats(leaves.into_iter()))
        };
        let mut formats = line_formats;
        formats.extend(leaf_formats);
        formats
    }

    /// Lines folded under the line containing `index`.
    fn fold_descendants(&self, index: usize) -> Vec<LineRef> {
        let lines = self.all_lines();
        let Some((at, _)) = layout::locate(&lines, index) else {
            return Vec::new();
        };
        let range = layout::fold_children(&lines, at);
        lines[range].to_vec()
    }

    fn table_at(&self, index: usize) -> Option<TableContext> {
        let lines = self.all_lines();
        let (at, offset) = layout::locate(&lines, index)?;
        let position = layout::table_at(&lines, at)?;
        Some(TableContext {
            lines,
            position,
            offset,
        })
    }

    /// Semantic HTML for a range, for copying out.
    fn semantic_html(&self, index: usize, length: usize) -> String {
        html::semantic_html(self.contents(), self.registry().as_ref(), index, length)
    }

    // === Provided: editing ===

    fn delete_text(&mut self, index: usize, length: usize, source: Source) -> Result<Delta, DocumentError> {
        let change = Delta::new().retain(index, AttributeMap::new()).delete(length);
        self.update_contents(&change, source)
    }

    fn insert_text(
        &mut self,
        index: usize,
        text: &str,
        formats: AttributeMap,
        source: Source,
    ) -> Result<Delta, DocumentError> {
        let change = Delta::new()
            .retain(index, AttributeMap::new())
            .insert(text, formats);
        self.update_contents(&change, source)
    }

    /// Apply line formats to every line touching the range (at least the
    /// line containing `index`). Setting one block format replaces any
    /// other block format the line carries.
    fn format_line(
        &mut self,
        index: usize,
        length: usize,
        formats: &AttributeMap,
        source: Source,
    ) -> Result<Delta, DocumentError> {
        let registry = self.registry();
        let mut change = Delta::new();
        let mut cursor = 0;
        for line in self.lines(index, length.max(1)) {
            if line.kind != LineKind::Text {
                continue;
            }
            let mut attrs = AttributeMap::new();
            for (name, requested) in formats {
                let value = registry.resolve_value(name, line.formats.get(name), requested);
                if value.is_null() && !line.formats.contains_key(name) {
                    continue;
                }
                if !value.is_null() && is_block_blot(registry.as_ref(), name) {
                    for other in line.formats.keys() {
                        if other != name
                            && !formats.contains_key(other)
                            && is_block_blot(registry.as_ref(), other)
                        {
                            attrs.insert(other.clone(), Value::Null);
                        }
                    }
                }
                attrs.insert(name.clone(), value);
            }
            if attrs.is_empty() {
                continue;
            }
            change = change
                .retain(line.terminator() - cursor, AttributeMap::new())
                .retain(1, attrs);
            cursor = line.end();
        }
        if change.is_empty() {
            return Ok(change);
        }
        self.update_contents(&change, source)
    }

    /// Apply inline formats to the text in a range. Line terminators are
    /// left alone.
    fn format_text(
        &mut self,
        index: usize,
        length: usize,
        formats: &AttributeMap,
        source: Source,
    ) -> Result<Delta, DocumentError> {
        let registry = self.registry();
        let slice = self.contents().slice(index, index + length);
        let mut change = Delta::new().retain(index, AttributeMap::new());
        for op in &slice.ops {
            let current = op.attributes().cloned().unwrap_or_default();
            let attrs: AttributeMap = formats
                .iter()
                .map(|(name, requested)| {
                    let value = registry.resolve_value(name, current.get(name), requested);
                    (name.clone(), value)
                })
                .collect();
            match op {
                Op::Insert {
                    insert: Insert::Text(text),
                    ..
                } => {
                    for (i, segment) in text.split('\n').enumerate() {
                        if i > 0 {
                            change = change.retain(1, AttributeMap::new());
                        }
                        change = change.retain(segment.chars().count(), attrs.clone());
                    }
                }
                _ => change = change.retain(op.len(), attrs),
            }
        }
        let change = change.chop();
        if change.is_empty() {
            return Ok(change);
        }
        self.update_contents(&change, source)
    }

    /// Format the current selection: block formats go to its lines, inline
    /// formats to its text, or to the caret when collapsed.
    fn format(&mut self, name: &str, value: Value, source: Source) -> Result<Delta, DocumentError> {
        let Some(range) = self.selection() else {
            return Ok(Delta::new());
        };
        let registry = self.registry();
        let formats = AttributeMap::from([(name.to_string(), value.clone())]);
        let change = if registry.query_name(name, Some(Scope::Block)).is_some() {
            self.format_line(range.index, range.length, &formats, source)?
        } else if range.is_collapsed() {
            self.set_cursor_format(name, registry.resolve_value(name, None, &value));
            return Ok(Delta::new());
        } else {
            self.format_text(range.index, range.length, &formats, source)?
        };
        self.set_selection(range, Source::Silent);
        Ok(change)
    }

    /// Replace the whole document.
    fn set_contents(&mut self, contents: &Delta, source: Source) -> Result<Delta, DocumentError> {
        let change = Delta::new().delete(self.length()).concat(contents.clone());
        self.update_contents(&change, source)
    }
}

fn is_block_blot(registry: &dyn FormatRegistry, name: &str) -> bool {
    matches!(registry.query_name(name, Some(Scope::Block)), Some(Format::Blot(spec)) if spec.is_block())
}
