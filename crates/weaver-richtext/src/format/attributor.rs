use serde_json::Value;
use smol_str::SmolStr;
use weaver_delta::AttributeMap;

use super::{FormatRegistry, Scope};
use crate::markup::MarkupNode;

/// Which markup property an attributor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributorKind {
    /// A plain HTML attribute, e.g. `align="center"`.
    Attribute,
    /// A class with a prefix, e.g. `ql-indent-2`.
    Class,
    /// An inline style property, e.g. `text-align: center`.
    Style,
}

/// Post-processing applied to raw markup values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueTransform {
    #[default]
    None,
    /// Positive integer levels; `+1` / `-1` are relative when applied.
    Indent,
    /// `rgb(r, g, b)` becomes `#rrggbb`.
    RgbToHex,
    /// Strip surrounding quotes (font families).
    Unquote,
}

/// Maps one markup property onto a named format.
#[derive(Debug, Clone)]
pub struct Attributor {
    /// The format name written into attribute maps.
    pub attr_name: SmolStr,
    /// Attribute name, class prefix, or style property.
    pub key_name: SmolStr,
    pub kind: AttributorKind,
    pub scope: Scope,
    pub whitelist: Option<Vec<SmolStr>>,
    pub transform: ValueTransform,
}

/// Deepest indent level reachable through relative changes.
pub const MAX_INDENT: i64 = 8;

impl Attributor {
    fn new(kind: AttributorKind, attr_name: &str, key_name: &str, scope: Scope) -> Self {
        Self {
            attr_name: SmolStr::new(attr_name),
            key_name: SmolStr::new(key_name),
            kind,
            scope,
            whitelist: None,
            transform: ValueTransform::None,
        }
    }

    pub fn attribute(attr_name: &str, key_name: &str, scope: Scope) -> Self {
        Self::new(AttributorKind::Attribute, attr_name, key_name, scope)
    }

    pub fn class(attr_name: &str, key_name: &str, scope: Scope) -> Self {
        Self::new(AttributorKind::Class, attr_name, key_name, scope)
    }

    pub fn style(attr_name: &str, key_name: &str, scope: Scope) -> Self {
        Self::new(AttributorKind::Style, attr_name, key_name, scope)
    }

    pub fn with_whitelist(mut self, values: &[&str]) -> Self {
        self.whitelist = Some(values.iter().map(|v| SmolStr::new(v)).collect());
        self
    }

    pub fn with_transform(mut self, transform: ValueTransform) -> Self {
        self.transform = transform;
        self
    }

    fn raw_value<'a>(&self, node: MarkupNode<'a>) -> Option<String> {
        match self.kind {
            AttributorKind::Attribute => node.attr(&self.key_name).map(str::to_string),
            AttributorKind::Class => node.classes().find_map(|class| {
                class
                    .strip_prefix(self.key_name.as_str())
                    .and_then(|rest| rest.strip_prefix('-'))
                    .map(str::to_string)
            }),
            AttributorKind::Style => node.style(&self.key_name),
        }
    }

    /// The canonical format value this node carries, if any.
    pub fn value(&self, node: MarkupNode<'_>) -> Option<Value> {
        let raw = self.raw_value(node)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let value = match self.transform {
            ValueTransform::Indent => {
                let level = parse_int_prefix(raw)?.max(0);
                if level == 0 {
                    return None;
                }
                return Some(Value::from(level));
            }
            ValueTransform::RgbToHex => rgb_to_hex(raw).unwrap_or_else(|| raw.to_string()),
            ValueTransform::Unquote => raw.trim_matches(|c| c == '"' || c == '\'').to_string(),
            ValueTransform::None => raw.to_string(),
        };
        if let Some(whitelist) = &self.whitelist {
            if !whitelist.iter().any(|allowed| allowed == value.as_str()) {
                return None;
            }
        }
        Some(Value::String(value))
    }

    /// The value stored after requesting `requested` on top of `current`.
    ///
    /// `Value::Null` means the format is removed.
    pub fn apply(&self, current: Option<&Value>, requested: &Value) -> Value {
        if self.transform == ValueTransform::Indent {
            let level = current.and_then(Value::as_i64).unwrap_or(0);
            let next = match requested.as_str() {
                Some("+1") if level >= MAX_INDENT => return Value::from(level),
                Some("+1") => level + 1,
                Some("-1") => level - 1,
                _ => match requested {
                    Value::Number(n) => n.as_i64().unwrap_or(0),
                    Value::String(s) => parse_int_prefix(s).unwrap_or(0),
                    _ => 0,
                },
            };
            return if next <= 0 {
                Value::Null
            } else {
                Value::from(next)
            };
        }
        match requested {
            Value::Bool(false) => Value::Null,
            other => other.clone(),
        }
    }
}

/// `parseInt`-style: optional sign and leading digits, rest ignored.
fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn rgb_to_hex(value: &str) -> Option<String> {
    if !value.starts_with("rgb(") {
        return None;
    }
    let inner = value.trim_start_matches(|c: char| !c.is_ascii_digit());
    let inner = inner.trim_end_matches(|c: char| !c.is_ascii_digit());
    let mut hex = String::from("#");
    for component in inner.split(',') {
        let n = parse_int_prefix(component)?.clamp(0, 255);
        hex.push_str(&format!("{:02x}", n));
    }
    Some(hex)
}

/// Collect attribute formats from every attribute, class, and inline style
/// on the node. Later sources win over earlier ones for the same format.
pub fn resolve_attributes(node: MarkupNode<'_>, registry: &dyn FormatRegistry) -> AttributeMap {
    let mut formats = AttributeMap::new();
    let mut record = |attributor: Option<&Attributor>| {
        if let Some(attributor) = attributor {
            if let Some(value) = attributor.value(node) {
                formats.insert(attributor.attr_name.to_string(), value);
            }
        }
    };
    for (name, _) in node.attrs() {
        record(registry.attributor(AttributorKind::Attribute, name));
    }
    for class in node.classes() {
        if let Some((prefix, _)) = class.rsplit_once('-') {
            record(registry.attributor(AttributorKind::Class, prefix));
        }
    }
    for (property, _) in node.styles() {
        record(registry.attributor(AttributorKind::Style, &property));
    }
    formats
}
