use serde::{Deserialize, Serialize};

use crate::attributes::{self, AttributeMap};
use crate::iter::OpIterator;
use crate::op::{Embed, Insert, Op, OpKind};

/// An ordered list of operations describing a document or a change to one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub ops: Vec<Op>,
}

/// One line of a document delta, as produced by [`Delta::lines`].
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// The line's content without its terminator.
    pub content: Delta,
    /// Attributes of the terminating newline (line formats).
    pub attributes: AttributeMap,
    /// False for trailing content that has no terminator.
    pub terminated: bool,
}

impl From<Vec<Op>> for Delta {
    /// Wrap raw ops without normalizing them.
    fn from(ops: Vec<Op>) -> Self {
        Self { ops }
    }
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Insert text. Empty text is a no-op.
    pub fn insert(mut self, text: impl Into<String>, attributes: AttributeMap) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        self.push(Op::insert(Insert::Text(text), attributes));
        self
    }

    /// Insert a single embed.
    pub fn insert_embed(mut self, embed: Embed, attributes: AttributeMap) -> Self {
        self.push(Op::insert(Insert::Embed(embed), attributes));
        self
    }

    pub fn retain(mut self, count: usize, attributes: AttributeMap) -> Self {
        if count == 0 {
            return self;
        }
        self.push(Op::retain(count, attributes));
        self
    }

    pub fn delete(mut self, count: usize) -> Self {
        if count == 0 {
            return self;
        }
        self.push(Op::delete(count));
        self
    }

    /// Append an op, merging it into the previous one where possible.
    ///
    /// Inserts are always placed before a trailing delete; adjacent deletes,
    /// retains with equal attributes, and text inserts with equal attributes
    /// are merged. Zero-length text inserts are dropped.
    pub fn push(&mut self, op: Op) -> &mut Self {
        if matches!(&op, Op::Insert { insert: Insert::Text(t), .. } if t.is_empty()) {
            return self;
        }
        let mut index = self.ops.len();
        if let Some(last) = self.ops.last_mut() {
            if let (Op::Delete { delete: total }, Op::Delete { delete }) = (&mut *last, &op) {
                *total += *delete;
                return self;
            }
        }
        if matches!(self.ops.last(), Some(Op::Delete { .. })) && op.is_insert() {
            index -= 1;
            if index == 0 {
                self.ops.insert(0, op);
                return self;
            }
        }
        if index > 0 {
            let prev = &mut self.ops[index - 1];
            match (prev, &op) {
                (
                    Op::Insert {
                        insert: Insert::Text(prev_text),
                        attributes: prev_attrs,
                    },
                    Op::Insert {
                        insert: Insert::Text(text),
                        attributes,
                    },
                ) if prev_attrs == attributes => {
                    prev_text.push_str(text);
                    return self;
                }
                (
                    Op::Retain {
                        retain: prev_count,
                        attributes: prev_attrs,
                    },
                    Op::Retain { retain, attributes },
                ) if prev_attrs == attributes => {
                    *prev_count += *retain;
                    return self;
                }
                _ => {}
            }
        }
        if index == self.ops.len() {
            self.ops.push(op);
        } else {
            self.ops.insert(index, op);
        }
        self
    }

    /// Drop a trailing attribute-less retain.
    pub fn chop(mut self) -> Self {
        if let Some(Op::Retain { attributes, .. }) = self.ops.last() {
            if attributes.is_empty() {
                self.ops.pop();
            }
        }
        self
    }

    /// Sum of all op lengths.
    pub fn length(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    /// Net change in document length when this delta is applied.
    pub fn change_length(&self) -> isize {
        self.ops.iter().fold(0isize, |acc, op| match op {
            Op::Insert { .. } => acc + op.len() as isize,
            Op::Delete { delete } => acc - *delete as isize,
            Op::Retain { .. } => acc,
        })
    }

    /// Length of the document this change expects to be applied to.
    pub fn base_length(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                Op::Retain { retain, .. } => *retain,
                Op::Delete { delete } => *delete,
                Op::Insert { .. } => 0,
            })
            .sum()
    }

    /// Whether this delta only contains inserts (a document, not a change).
    pub fn is_document(&self) -> bool {
        self.ops.iter().all(Op::is_insert)
    }

    /// Concatenate two deltas, merging at the seam.
    pub fn concat(mut self, other: Delta) -> Self {
        let mut ops = other.ops.into_iter();
        if let Some(first) = ops.next() {
            self.push(first);
            self.ops.extend(ops);
        }
        self
    }

    /// Whether the text at the end of this delta ends with `text`.
    ///
    /// Only trailing text inserts are considered; an embed stops the scan.
    pub fn ends_with_text(&self, text: &str) -> bool {
        let wanted = text.chars().count();
        let mut tail = String::new();
        for op in self.ops.iter().rev() {
            if tail.chars().count() >= wanted {
                break;
            }
            match op.text() {
                Some(t) => tail.insert_str(0, t),
                None => break,
            }
        }
        tail.ends_with(text)
    }

    /// Ops covering `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Delta {
        let mut ops = Vec::new();
        let mut iter = OpIterator::new(&self.ops);
        let mut index = 0;
        while index < end && iter.has_next() {
            let next = if index < start {
                iter.next_len(start - index)
            } else {
                let next = iter.next_len(end - index);
                ops.push(next.clone());
                next
            };
            index += next.len();
        }
        Delta::from(ops)
    }

    /// Apply `other` on top of this delta.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = OpIterator::new(&self.ops);
        let mut other_iter = OpIterator::new(&other.ops);
        let mut delta = Delta::new();

        // A leading plain retain in `other` can skip straight past our inserts.
        if let Some(Op::Retain { retain, attributes }) = other_iter.peek() {
            if attributes.is_empty() {
                let mut first_left = *retain;
                while this_iter.peek_kind() == OpKind::Insert && this_iter.peek_len() <= first_left
                {
                    first_left -= this_iter.peek_len();
                    delta.ops.push(this_iter.next_op());
                }
                if *retain - first_left > 0 {
                    other_iter.next_len(*retain - first_left);
                }
            }
        }

        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                delta.push(other_iter.next_op());
            } else if this_iter.peek_kind() == OpKind::Delete {
                delta.push(this_iter.next_op());
            } else {
                let length = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.next_len(length);
                let other_op = other_iter.next_len(length);
                if let Op::Retain {
                    attributes: other_attrs,
                    ..
                } = &other_op
                {
                    let keep_null = this_op.is_retain();
                    let empty = AttributeMap::new();
                    let this_attrs = this_op.attributes().unwrap_or(&empty);
                    let attributes = attributes::compose(this_attrs, other_attrs, keep_null);
                    let new_op = match this_op {
                        Op::Insert { insert, .. } => Op::insert(insert, attributes),
                        _ => Op::retain(length, attributes),
                    };
                    delta.push(new_op.clone());
                    // Nothing left in `other`: copy the rest through.
                    if !other_iter.has_next() && delta.ops.last() == Some(&new_op) {
                        let rest = Delta::from(this_iter.rest());
                        return delta.concat(rest).chop();
                    }
                } else if this_op.is_retain() && other_op.is_delete() {
                    delta.push(other_op);
                }
            }
        }
        delta.chop()
    }

    /// Where `index` ends up once this change is applied.
    ///
    /// With `priority`, an insert exactly at `index` does not push it forward.
    pub fn transform_position(&self, index: usize, priority: bool) -> usize {
        let mut iter = OpIterator::new(&self.ops);
        let mut index = index;
        let mut offset = 0;
        while iter.has_next() && offset <= index {
            let length = iter.peek_len();
            let kind = iter.peek_kind();
            iter.next_op();
            match kind {
                OpKind::Delete => {
                    index -= length.min(index - offset);
                    continue;
                }
                OpKind::Insert if offset < index || !priority => index += length,
                _ => {}
            }
            offset += length;
        }
        index
    }

    /// Split a document delta into lines.
    pub fn lines(&self) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut iter = OpIterator::new(&self.ops);
        let mut line = Delta::new();
        while iter.has_next() {
            if iter.peek_kind() != OpKind::Insert {
                break;
            }
            let Some(op) = iter.peek() else { break };
            let start = op.len() - iter.peek_len();
            let newline_at = op
                .text()
                .and_then(|text| text.chars().skip(start).position(|c| c == '\n'));
            match newline_at {
                None => {
                    line.push(iter.next_op());
                }
                Some(0) => {
                    let terminator = iter.next_len(1);
                    lines.push(Line {
                        content: std::mem::take(&mut line),
                        attributes: terminator.attributes().cloned().unwrap_or_default(),
                        terminated: true,
                    });
                }
                Some(offset) => {
                    line.push(iter.next_len(offset));
                }
            }
        }
        if line.length() > 0 {
            lines.push(Line {
                content: line,
                attributes: AttributeMap::new(),
                terminated: false,
            });
        }
        lines
    }

    /// Concatenated text of all text inserts; embeds are skipped.
    pub fn to_text(&self) -> String {
        self.ops.iter().filter_map(Op::text).collect()
    }
}
