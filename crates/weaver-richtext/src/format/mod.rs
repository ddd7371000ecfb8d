//! Format registry: which formats exist and how markup maps onto them.
//!
//! Formats come in two families. Blot formats (`FormatSpec`) are recognized
//! from an element's tag or class and describe inline marks, line formats, and
//! embeds. Attribute formats (`Attributor`) are read from one named HTML
//! attribute, class prefix, or inline style property.

mod attributor;
mod schema;

pub use attributor::{Attributor, AttributorKind, ValueTransform, resolve_attributes};
pub use schema::Schema;

use serde_json::Value;
use smol_str::SmolStr;
use weaver_delta::AttributeMap;

use crate::markup::MarkupNode;

/// Where a format applies: to whole lines or to runs inside a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Mark on a text run (bold, link).
    Inline,
    /// Line format carried by the line terminator (header, list).
    Block,
    /// Atomic inline object (image).
    Embed,
    /// Atomic object occupying a whole line (video, divider).
    BlockEmbed,
}

/// Reads a value from a markup node. `None` means "no value".
pub type NodeValueFn = fn(MarkupNode<'_>) -> Option<Value>;

fn no_value(_: MarkupNode<'_>) -> Option<Value> {
    None
}

fn present(_: MarkupNode<'_>) -> Option<Value> {
    Some(Value::Bool(true))
}

/// A tag- or class-recognized format.
#[derive(Debug, Clone)]
pub struct FormatSpec {
    pub name: SmolStr,
    pub kind: FormatKind,
    pub tags: Vec<SmolStr>,
    pub class_name: Option<SmolStr>,
    value: NodeValueFn,
    formats: NodeValueFn,
}

impl FormatSpec {
    fn new(name: &str, kind: FormatKind, tags: &[&str]) -> Self {
        Self {
            name: SmolStr::new(name),
            kind,
            tags: tags.iter().map(|t| SmolStr::new(t)).collect(),
            class_name: None,
            value: no_value,
            formats: present,
        }
    }

    /// Inline mark whose value is `true` on recognized nodes.
    pub fn inline(name: &str, tags: &[&str]) -> Self {
        Self::new(name, FormatKind::Inline, tags)
    }

    /// Line format. Carries no value unless `with_formats` says otherwise.
    pub fn block(name: &str, tags: &[&str]) -> Self {
        Self::new(name, FormatKind::Block, tags).with_formats(no_value)
    }

    pub fn embed(name: &str, tags: &[&str]) -> Self {
        Self::new(name, FormatKind::Embed, tags).with_formats(no_value)
    }

    pub fn block_embed(name: &str, tags: &[&str]) -> Self {
        Self::new(name, FormatKind::BlockEmbed, tags).with_formats(no_value)
    }

    /// Only nodes carrying this class are recognized.
    pub fn with_class(mut self, class: &str) -> Self {
        self.class_name = Some(SmolStr::new(class));
        self
    }

    /// Embed payload extractor.
    pub fn with_value(mut self, value: NodeValueFn) -> Self {
        self.value = value;
        self
    }

    /// Format value extractor. For embeds this yields the attribute object.
    pub fn with_formats(mut self, formats: NodeValueFn) -> Self {
        self.formats = formats;
        self
    }

    pub fn scope(&self) -> Scope {
        match self.kind {
            FormatKind::Inline | FormatKind::Embed => Scope::Inline,
            FormatKind::Block | FormatKind::BlockEmbed => Scope::Block,
        }
    }

    pub fn is_embed(&self) -> bool {
        matches!(self.kind, FormatKind::Embed | FormatKind::BlockEmbed)
    }

    pub fn is_block(&self) -> bool {
        self.kind == FormatKind::Block
    }

    pub fn is_block_embed(&self) -> bool {
        self.kind == FormatKind::BlockEmbed
    }

    pub fn value(&self, node: MarkupNode<'_>) -> Option<Value> {
        (self.value)(node)
    }

    pub fn formats(&self, node: MarkupNode<'_>) -> Option<Value> {
        (self.formats)(node)
    }

    /// Embed attributes as a map.
    pub fn embed_attributes(&self, node: MarkupNode<'_>) -> AttributeMap {
        match self.formats(node) {
            Some(Value::Object(map)) => map.into_iter().collect(),
            _ => AttributeMap::new(),
        }
    }

    fn recognizes(&self, node: MarkupNode<'_>) -> bool {
        let Some(tag) = node.tag() else {
            return false;
        };
        let tag_ok = self.tags.is_empty() || self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag));
        match &self.class_name {
            Some(class) => tag_ok && node.has_class(class),
            None => tag_ok,
        }
    }
}

/// Result of a name lookup.
#[derive(Debug, Clone, Copy)]
pub enum Format<'r> {
    Blot(&'r FormatSpec),
    Attribute(&'r Attributor),
}

impl Format<'_> {
    pub fn name(&self) -> &str {
        match self {
            Format::Blot(spec) => &spec.name,
            Format::Attribute(attr) => &attr.attr_name,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Format::Blot(spec) => spec.scope(),
            Format::Attribute(attr) => attr.scope,
        }
    }
}

/// The document model's view of formats.
pub trait FormatRegistry: Send + Sync {
    /// Look a format up by name, optionally restricted to one scope.
    fn query_name(&self, name: &str, scope: Option<Scope>) -> Option<Format<'_>>;

    /// The blot format a markup element represents, if any.
    fn query_node(&self, node: MarkupNode<'_>) -> Option<&FormatSpec>;

    /// The attributor reading `key` as the given kind of markup property.
    fn attributor(&self, kind: AttributorKind, key: &str) -> Option<&Attributor>;

    /// Whether an embed payload key names a block embed.
    fn is_block_embed(&self, name: &str) -> bool {
        matches!(self.query_name(name, None), Some(Format::Blot(spec)) if spec.is_block_embed())
    }

    /// Resolve a requested format value against the current one.
    ///
    /// Only attribute formats rewrite values (relative indent); everything
    /// else passes through, with `false` normalized to a clear.
    fn resolve_value(&self, name: &str, current: Option<&Value>, requested: &Value) -> Value {
        match self.query_name(name, None) {
            Some(Format::Attribute(attr)) => attr.apply(current, requested),
            _ if requested == &Value::Bool(false) => Value::Null,
            _ => requested.clone(),
        }
    }
}
