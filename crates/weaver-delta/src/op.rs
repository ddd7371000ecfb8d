use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::AttributeMap;

/// An embedded object: a single `type name -> payload` entry.
pub type Embed = BTreeMap<String, Value>;

/// Content carried by an insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    Embed(Embed),
}

impl Insert {
    /// Length in document units: chars for text, one for an embed.
    pub fn len(&self) -> usize {
        match self {
            Insert::Text(text) => text.chars().count(),
            Insert::Embed(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Insert::Text(text) => Some(text),
            Insert::Embed(_) => None,
        }
    }

    pub fn as_embed(&self) -> Option<&Embed> {
        match self {
            Insert::Embed(embed) => Some(embed),
            Insert::Text(_) => None,
        }
    }
}

impl From<&str> for Insert {
    fn from(text: &str) -> Self {
        Insert::Text(text.to_string())
    }
}

impl From<String> for Insert {
    fn from(text: String) -> Self {
        Insert::Text(text)
    }
}

impl From<Embed> for Insert {
    fn from(embed: Embed) -> Self {
        Insert::Embed(embed)
    }
}

/// A single operation.
///
/// Serializes to the usual wire shape: `{"insert": "..", "attributes": {..}}`,
/// `{"retain": 3}`, `{"delete": 1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Op {
    Insert {
        insert: Insert,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: AttributeMap,
    },
    Retain {
        retain: usize,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attributes: AttributeMap,
    },
    Delete {
        delete: usize,
    },
}

/// Discriminant of an `Op`, used by iterators to peek without borrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Retain,
    Delete,
}

impl Op {
    pub fn insert(content: impl Into<Insert>, attributes: AttributeMap) -> Self {
        Op::Insert {
            insert: content.into(),
            attributes,
        }
    }

    pub fn retain(count: usize, attributes: AttributeMap) -> Self {
        Op::Retain {
            retain: count,
            attributes,
        }
    }

    pub fn delete(count: usize) -> Self {
        Op::Delete { delete: count }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Insert { .. } => OpKind::Insert,
            Op::Retain { .. } => OpKind::Retain,
            Op::Delete { .. } => OpKind::Delete,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Op::Insert { insert, .. } => insert.len(),
            Op::Retain { retain, .. } => *retain,
            Op::Delete { delete } => *delete,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attributes of an insert or retain. Deletes carry none.
    pub fn attributes(&self) -> Option<&AttributeMap> {
        match self {
            Op::Insert { attributes, .. } | Op::Retain { attributes, .. } => Some(attributes),
            Op::Delete { .. } => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert { .. })
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Op::Retain { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete { .. })
    }

    /// Text of a text insert.
    pub fn text(&self) -> Option<&str> {
        match self {
            Op::Insert { insert, .. } => insert.as_text(),
            _ => None,
        }
    }

    /// The same operation with a replaced attribute map.
    pub fn with_attributes(self, attributes: AttributeMap) -> Self {
        match self {
            Op::Insert { insert, .. } => Op::Insert { insert, attributes },
            Op::Retain { retain, .. } => Op::Retain { retain, attributes },
            delete => delete,
        }
    }
}

/// Slice a string by char offsets.
pub(crate) fn char_slice(text: &str, start: usize, len: usize) -> String {
    text.chars().skip(start).take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_round_trips() {
        let ops: Vec<Op> = serde_json::from_value(json!([
            { "insert": "Hello", "attributes": { "bold": true } },
            { "insert": { "image": "a.png" } },
            { "retain": 3, "attributes": { "header": null } },
            { "delete": 2 }
        ]))
        .unwrap();

        assert_eq!(ops[0].text(), Some("Hello"));
        assert_eq!(ops[1].len(), 1);
        assert_eq!(ops[2].kind(), OpKind::Retain);
        assert_eq!(ops[2].attributes().unwrap()["header"], Value::Null);
        assert_eq!(ops[3], Op::delete(2));

        let back = serde_json::to_value(&ops).unwrap();
        assert_eq!(back[1], json!({ "insert": { "image": "a.png" } }));
    }

    #[test]
    fn text_length_counts_chars() {
        let op = Op::insert("héllo 😀", AttributeMap::new());
        assert_eq!(op.len(), 7);
    }
}
