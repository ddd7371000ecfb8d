//! Line and leaf structure derived from a document delta.
//!
//! A line is everything up to and including a `\n` terminator; its formats
//! are the terminator's attributes. A block embed forms a line of its own
//! with no terminator. A leaf is one insert op inside a line.

use std::ops::Range;

use serde_json::Value;
use weaver_delta::{AttributeMap, Delta, Insert, Op};

use crate::format::FormatRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Text,
    BlockEmbed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineRef {
    /// Document offset of the line's first unit.
    pub index: usize,
    /// Length including the terminator.
    pub length: usize,
    /// Content without the terminator.
    pub content: Delta,
    pub formats: AttributeMap,
    pub kind: LineKind,
}

impl LineRef {
    pub fn end(&self) -> usize {
        self.index + self.length
    }

    /// Offset of the terminator (or of the embed for block embed lines).
    pub fn terminator(&self) -> usize {
        self.end().saturating_sub(1)
    }

    /// A line holding nothing but its terminator.
    pub fn is_empty(&self) -> bool {
        self.kind == LineKind::Text && self.length <= 1
    }

    /// A text line without any line format.
    pub fn is_plain(&self) -> bool {
        self.kind == LineKind::Text && self.formats.is_empty()
    }

    pub fn has_format(&self, name: &str) -> bool {
        weaver_delta::attributes::is_set(&self.formats, name)
    }

    pub fn text(&self) -> String {
        self.content.to_text()
    }

    /// Indent level, 0 when unset.
    pub fn indent(&self) -> i64 {
        self.formats.get("indent").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Header level, if this is a header line.
    pub fn header_level(&self) -> Option<i64> {
        match self.formats.get("header")? {
            Value::Object(map) => map.get("value").and_then(Value::as_i64),
            other => other.as_i64(),
        }
    }

    /// The `fold` marker of the line's list or header format.
    pub fn fold(&self, format: &str) -> Option<&str> {
        self.formats.get(format)?.get("fold")?.as_str()
    }
}

/// One insert inside a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Document offset of the leaf's first unit.
    pub index: usize,
    pub op: Op,
}

impl Leaf {
    pub fn len(&self) -> usize {
        self.op.len()
    }

    pub fn is_empty(&self) -> bool {
        self.op.is_empty()
    }

    pub fn is_embed(&self) -> bool {
        matches!(
            self.op,
            Op::Insert {
                insert: Insert::Embed(_),
                ..
            }
        )
    }

    pub fn text(&self) -> Option<&str> {
        self.op.text()
    }

    pub fn attributes(&self) -> AttributeMap {
        self.op.attributes().cloned().unwrap_or_default()
    }
}

fn flush(
    lines: &mut Vec<LineRef>,
    index: &mut usize,
    content: Delta,
    formats: AttributeMap,
    terminated: bool,
) {
    let length = content.length() + usize::from(terminated);
    lines.push(LineRef {
        index: *index,
        length,
        content,
        formats,
        kind: LineKind::Text,
    });
    *index += length;
}

/// Split a document into lines.
pub fn lines(contents: &Delta, registry: &dyn FormatRegistry) -> Vec<LineRef> {
    let mut lines = Vec::new();
    let mut index = 0;
    let mut pending = Delta::new();

    for op in &contents.ops {
        let Op::Insert { insert, attributes } = op else {
            continue;
        };
        match insert {
            Insert::Embed(embed) if embed.keys().any(|name| registry.is_block_embed(name)) => {
                if !pending.is_empty() {
                    let content = std::mem::take(&mut pending);
                    flush(&mut lines, &mut index, content, AttributeMap::new(), false);
                }
                let content = Delta::from(vec![op.clone()]);
                let length = 1;
                lines.push(LineRef {
                    index,
                    length,
                    content,
                    formats: attributes.clone(),
                    kind: LineKind::BlockEmbed,
                });
                index += length;
            }
            Insert::Embed(_) => {
                pending.push(op.clone());
            }
            Insert::Text(text) => {
                let mut rest = text.as_str();
                while let Some(at) = rest.find('\n') {
                    if at > 0 {
                        pending.push(Op::insert(&rest[..at], attributes.clone()));
                    }
                    let content = std::mem::take(&mut pending);
                    flush(&mut lines, &mut index, content, attributes.clone(), true);
                    rest = &rest[at + 1..];
                }
                if !rest.is_empty() {
                    pending.push(Op::insert(rest, attributes.clone()));
                }
            }
        }
    }
    if !pending.is_empty() {
        flush(&mut lines, &mut index, pending, AttributeMap::new(), false);
    }
    lines
}

/// Position of the line containing `index` and the offset inside it.
///
/// An index at or past the document end resolves to the last line.
pub fn locate(lines: &[LineRef], index: usize) -> Option<(usize, usize)> {
    let last = lines.last()?;
    if index >= last.end() {
        let index = last.end().saturating_sub(1).max(last.index);
        return Some((lines.len() - 1, index - last.index));
    }
    let position = lines.partition_point(|line| line.end() <= index);
    lines
        .get(position)
        .map(|line| (position, index - line.index))
}

/// Lines overlapping `[index, index + length)`. Empty when `length` is zero.
pub fn overlapping(lines: &[LineRef], index: usize, length: usize) -> Range<usize> {
    if length == 0 {
        return 0..0;
    }
    let end = index + length;
    let first = lines.partition_point(|line| line.end() <= index);
    let last = lines.partition_point(|line| line.index < end);
    first..last.max(first)
}

/// Leaf holding the unit before `offset`, or the first leaf at offset 0.
pub fn leaf_before(line: &LineRef, offset: usize) -> Option<(Leaf, usize)> {
    let mut start = line.index;
    for op in &line.content.ops {
        let len = op.len();
        let at = line.index + offset;
        if (offset == 0 && start == line.index) || (start < at && at <= start + len) {
            return Some((
                Leaf {
                    index: start,
                    op: op.clone(),
                },
                at - start,
            ));
        }
        start += len;
    }
    None
}

/// Leaf holding the unit at `offset`, if the line has content there.
pub fn leaf_after(line: &LineRef, offset: usize) -> Option<(Leaf, usize)> {
    let mut start = line.index;
    let at = line.index + offset;
    for op in &line.content.ops {
        let len = op.len();
        if start <= at && at < start + len {
            return Some((
                Leaf {
                    index: start,
                    op: op.clone(),
                },
                at - start,
            ));
        }
        start += len;
    }
    None
}

/// Lines folded under `lines[at]`.
///
/// A list item owns the following list items that are indented deeper. A
/// header owns everything up to the next header of the same or higher rank.
pub fn fold_children(lines: &[LineRef], at: usize) -> Range<usize> {
    let Some(line) = lines.get(at) else {
        return at..at;
    };
    let start = at + 1;
    let mut end = start;
    if line.has_format("list") {
        let indent = line.indent();
        while end < lines.len() && lines[end].has_format("list") && lines[end].indent() > indent {
            end += 1;
        }
    } else if let Some(level) = line.header_level() {
        while end < lines.len() && lines[end].header_level().is_none_or(|l| l > level) {
            end += 1;
        }
    }
    start..end
}

/// Where a caret sits inside a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePosition {
    /// Line indices of the whole table.
    pub table: Range<usize>,
    /// Line index ranges of each row, top to bottom.
    pub rows: Vec<Range<usize>>,
    /// Row number of the caret.
    pub row: usize,
    /// Line index of the caret's cell.
    pub cell: usize,
}

impl TablePosition {
    pub fn row_range(&self) -> Range<usize> {
        self.rows[self.row].clone()
    }

    /// Column of the caret's cell within its row.
    pub fn column(&self) -> usize {
        self.cell - self.rows[self.row].start
    }
}

/// Table structure around `lines[at]`: cells are lines carrying `table`,
/// consecutive cells with the same value share a row, and a contiguous run
/// of cells is one table.
pub fn table_at(lines: &[LineRef], at: usize) -> Option<TablePosition> {
    let in_table = |i: usize| lines.get(i).is_some_and(|line| line.has_format("table"));
    if !in_table(at) {
        return None;
    }
    let mut start = at;
    while start > 0 && in_table(start - 1) {
        start -= 1;
    }
    let mut end = at + 1;
    while in_table(end) {
        end += 1;
    }
    let mut rows: Vec<Range<usize>> = Vec::new();
    for i in start..end {
        match rows.last_mut() {
            Some(row) if lines[row.start].formats.get("table") == lines[i].formats.get("table") => {
                row.end = i + 1;
            }
            _ => rows.push(i..i + 1),
        }
    }
    let row = rows.iter().position(|r| r.contains(&at))?;
    Some(TablePosition {
        table: start..end,
        rows,
        row,
        cell: at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Schema;
    use serde_json::json;
    use weaver_delta::attributes::from_pairs;

    fn doc(ops: serde_json::Value) -> Delta {
        serde_json::from_value(json!({ "ops": ops })).unwrap()
    }

    #[test]
    fn splits_lines_and_block_embeds() {
        let contents = doc(json!([
            { "insert": "ab" },
            { "insert": "c", "attributes": { "bold": true } },
            { "insert": "\n", "attributes": { "header": 1 } },
            { "insert": { "divider": true } },
            { "insert": "\nx\n" }
        ]));
        let lines = lines(&contents, &Schema::standard());
        assert_eq!(lines.len(), 4);
        assert_eq!((lines[0].index, lines[0].length), (0, 4));
        assert_eq!(lines[0].formats, from_pairs([("header", json!(1))]));
        assert_eq!(lines[1].kind, LineKind::BlockEmbed);
        assert_eq!((lines[1].index, lines[1].length), (4, 1));
        assert!(lines[2].is_empty());
        assert_eq!(lines[3].text(), "x");
    }

    #[test]
    fn locate_and_overlap() {
        let contents = doc(json!([{ "insert": "ab\ncd\n" }]));
        let lines = lines(&contents, &Schema::standard());
        assert_eq!(locate(&lines, 0), Some((0, 0)));
        assert_eq!(locate(&lines, 2), Some((0, 2)));
        assert_eq!(locate(&lines, 3), Some((1, 0)));
        assert_eq!(locate(&lines, 6), Some((1, 2)));
        assert_eq!(overlapping(&lines, 1, 3), 0..2);
        assert_eq!(overlapping(&lines, 3, 1), 1..2);
        assert_eq!(overlapping(&lines, 3, 0), 0..0);
    }

    #[test]
    fn leaves_around_caret() {
        let contents = doc(json!([
            { "insert": "ab", "attributes": { "bold": true } },
            { "insert": "cd\n" }
        ]));
        let lines = lines(&contents, &Schema::standard());
        let (before, offset) = leaf_before(&lines[0], 2).unwrap();
        assert_eq!((before.text(), offset), (Some("ab"), 2));
        let (after, offset) = leaf_after(&lines[0], 2).unwrap();
        assert_eq!((after.text(), offset), (Some("cd"), 0));
        let (first, offset) = leaf_before(&lines[0], 0).unwrap();
        assert_eq!((first.text(), offset), (Some("ab"), 0));
        assert!(leaf_after(&lines[0], 4).is_none());
    }

    #[test]
    fn fold_children_for_lists_and_headers() {
        let contents = doc(json!([
            { "insert": "a" }, { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
            { "insert": "b" }, { "insert": "\n", "attributes": { "list": { "value": "bullet" }, "indent": 1 } },
            { "insert": "c" }, { "insert": "\n", "attributes": { "list": { "value": "bullet" } } },
            { "insert": "H" }, { "insert": "\n", "attributes": { "header": { "value": 1 } } },
            { "insert": "p\n" },
            { "insert": "h" }, { "insert": "\n", "attributes": { "header": { "value": 2 } } },
            { "insert": "H" }, { "insert": "\n", "attributes": { "header": { "value": 1 } } }
        ]));
        let lines = lines(&contents, &Schema::standard());
        assert_eq!(fold_children(&lines, 0), 1..2);
        assert_eq!(fold_children(&lines, 2), 3..3);
        assert_eq!(fold_children(&lines, 3), 4..6);
    }

    #[test]
    fn table_rows_group_by_value() {
        let contents = doc(json!([
            { "insert": "before\n" },
            { "insert": "a" }, { "insert": "\n", "attributes": { "table": "r1" } },
            { "insert": "b" }, { "insert": "\n", "attributes": { "table": "r1" } },
            { "insert": "c" }, { "insert": "\n", "attributes": { "table": "r2" } },
            { "insert": "d" }, { "insert": "\n", "attributes": { "table": "r2" } },
            { "insert": "after\n" }
        ]));
        let lines = lines(&contents, &Schema::standard());
        let position = table_at(&lines, 4).unwrap();
        assert_eq!(position.table, 1..5);
        assert_eq!(position.rows, vec![1..3, 3..5]);
        assert_eq!(position.row, 1);
        assert_eq!(position.column(), 1);
        assert!(table_at(&lines, 0).is_none());
    }
}
