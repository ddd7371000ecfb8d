use crate::op::{Insert, Op, OpKind, char_slice};

/// Cursor over a list of ops that can hand out partial operations.
///
/// Once the ops are exhausted the iterator behaves like an infinite retain,
/// which is what composition expects.
pub struct OpIterator<'a> {
    ops: &'a [Op],
    index: usize,
    offset: usize,
}

impl<'a> OpIterator<'a> {
    pub fn new(ops: &'a [Op]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.peek_len() < usize::MAX
    }

    pub fn peek(&self) -> Option<&'a Op> {
        self.ops.get(self.index)
    }

    pub fn peek_kind(&self) -> OpKind {
        self.peek().map(Op::kind).unwrap_or(OpKind::Retain)
    }

    /// Remaining length of the current op, `usize::MAX` when exhausted.
    pub fn peek_len(&self) -> usize {
        match self.peek() {
            Some(op) => op.len() - self.offset,
            None => usize::MAX,
        }
    }

    /// Take the whole remainder of the current op.
    pub fn next_op(&mut self) -> Op {
        self.next_len(usize::MAX)
    }

    /// Take at most `length` units from the current op.
    pub fn next_len(&mut self, length: usize) -> Op {
        let Some(op) = self.ops.get(self.index) else {
            return Op::retain(usize::MAX, Default::default());
        };
        let offset = self.offset;
        let op_len = op.len();
        let length = if length >= op_len - offset {
            self.index += 1;
            self.offset = 0;
            op_len - offset
        } else {
            self.offset += length;
            length
        };
        match op {
            Op::Delete { .. } => Op::delete(length),
            Op::Retain { attributes, .. } => Op::retain(length, attributes.clone()),
            Op::Insert {
                insert: Insert::Text(text),
                attributes,
            } => Op::insert(char_slice(text, offset, length), attributes.clone()),
            Op::Insert {
                insert: Insert::Embed(embed),
                attributes,
            } => Op::insert(Insert::Embed(embed.clone()), attributes.clone()),
        }
    }

    /// Everything not yet consumed, with the current op trimmed to its remainder.
    pub fn rest(&mut self) -> Vec<Op> {
        if !self.has_next() {
            return Vec::new();
        }
        if self.offset == 0 {
            return self.ops[self.index..].to_vec();
        }
        let mut rest = vec![self.next_op()];
        rest.extend_from_slice(&self.ops[self.index..]);
        rest
    }
}
