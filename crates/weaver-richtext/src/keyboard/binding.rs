//! Binding descriptors and their normalized form.
//!
//! A [`BindingDescriptor`] is what callers write: one or more keys, modifier
//! expectations, an optional primary-modifier alias and context predicates
//! with regex sources. [`normalize`] checks it and expands it into one
//! [`Binding`] per key, with the alias resolved for the platform and the
//! patterns compiled.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use weaver_delta::AttributeMap;

use super::context::DispatchContext;
use super::key::{KeyId, ModifierExpect, ModifierSet};
use crate::config::Platform;
use crate::document::{Document, SelectionRange};
use crate::error::BindingError;

/// What a handler asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    /// Stop and prevent the platform default.
    Handled,
    /// Not applicable here; try the next matching binding.
    Continue,
    /// Stop, but let the platform default happen.
    HandledAllowDefault,
}

pub type Handler = Arc<
    dyn Fn(&mut dyn Document, SelectionRange, &DispatchContext, &Binding) -> HandlerResult
        + Send
        + Sync,
>;

/// Required formats at the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatPredicate {
    /// At least one of these formats is active.
    AnyOf(Vec<SmolStr>),
    /// Every entry matches: `true` requires presence, `false` absence, any
    /// other value equality.
    Exact(AttributeMap),
}

impl FormatPredicate {
    pub fn any_of(names: &[&str]) -> Self {
        Self::AnyOf(names.iter().map(|n| SmolStr::new(n)).collect())
    }

    pub fn matches(&self, formats: &AttributeMap) -> bool {
        let active = |name: &str| formats.get(name).is_some_and(|v| !v.is_null());
        match self {
            Self::AnyOf(names) => names.iter().any(|name| active(name)),
            Self::Exact(expected) => expected.iter().all(|(name, value)| match value {
                Value::Bool(true) => active(name),
                Value::Bool(false) => !active(name),
                other => formats.get(name) == Some(other),
            }),
        }
    }
}

/// Selection-context predicates. Unset fields always pass.
#[derive(Debug, Clone, Default)]
pub struct BindingContext {
    pub collapsed: Option<bool>,
    pub empty: Option<bool>,
    pub offset: Option<usize>,
    pub format: Option<FormatPredicate>,
    pub prefix: Option<Regex>,
    pub suffix: Option<Regex>,
}

impl BindingContext {
    pub fn matches(&self, cx: &DispatchContext) -> bool {
        self.collapsed.is_none_or(|c| c == cx.collapsed)
            && self.empty.is_none_or(|e| e == cx.empty)
            && self.offset.is_none_or(|o| o == cx.offset)
            && self.format.as_ref().is_none_or(|f| f.matches(&cx.format))
            && self.prefix.as_ref().is_none_or(|re| re.is_match(&cx.prefix))
            && self.suffix.as_ref().is_none_or(|re| re.is_match(&cx.suffix))
    }
}

/// A normalized, single-key binding.
#[derive(Clone)]
pub struct Binding {
    pub name: Option<SmolStr>,
    pub key: KeyId,
    pub modifiers: ModifierSet,
    pub context: BindingContext,
    pub handler: Handler,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("modifiers", &self.modifiers)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// A binding as written by its author.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingDescriptor {
    pub name: Option<SmolStr>,
    pub keys: Vec<KeyId>,
    pub modifiers: ModifierSet,
    /// The platform's primary shortcut modifier (Cmd on macOS, Ctrl elsewhere).
    pub short_key: Option<ModifierExpect>,
    pub collapsed: Option<bool>,
    pub empty: Option<bool>,
    pub offset: Option<usize>,
    pub format: Option<FormatPredicate>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl BindingDescriptor {
    pub fn key(key: impl Into<KeyId>) -> Self {
        Self {
            keys: vec![key.into()],
            ..Self::default()
        }
    }

    pub fn keys<K: Into<KeyId>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(SmolStr::new(name));
        self
    }

    pub fn alt(mut self, expect: ModifierExpect) -> Self {
        self.modifiers.alt = expect;
        self
    }

    pub fn ctrl(mut self, expect: ModifierExpect) -> Self {
        self.modifiers.ctrl = expect;
        self
    }

    pub fn meta(mut self, expect: ModifierExpect) -> Self {
        self.modifiers.meta = expect;
        self
    }

    pub fn shift(mut self, expect: ModifierExpect) -> Self {
        self.modifiers.shift = expect;
        self
    }

    pub fn short_key(mut self) -> Self {
        self.short_key = Some(ModifierExpect::Pressed);
        self
    }

    pub fn any_modifiers(mut self) -> Self {
        self.modifiers = ModifierSet::ANY;
        self
    }

    pub fn collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = Some(collapsed);
        self
    }

    pub fn empty(mut self, empty: bool) -> Self {
        self.empty = Some(empty);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn format(mut self, predicate: FormatPredicate) -> Self {
        self.format = Some(predicate);
        self
    }

    pub fn prefix(mut self, pattern: &str) -> Self {
        self.prefix = Some(pattern.to_string());
        self
    }

    pub fn suffix(mut self, pattern: &str) -> Self {
        self.suffix = Some(pattern.to_string());
        self
    }

    /// Parse the JSON shorthand: a key name, a key code, or an object with
    /// `key` plus optional modifier and context fields.
    pub fn from_json(value: &Value) -> Result<Self, BindingError> {
        match value {
            Value::String(_) | Value::Number(_) => Ok(Self {
                keys: vec![key_from_json(value)?],
                ..Self::default()
            }),
            Value::Object(fields) => descriptor_from_object(fields),
            other => Err(BindingError::InvalidDescriptor(format!(
                "expected a key or an object, found {other}"
            ))),
        }
    }
}

fn key_from_json(value: &Value) -> Result<KeyId, BindingError> {
    match value {
        Value::String(key) => Ok(KeyId::from(key.as_str())),
        Value::Number(code) => code
            .as_u64()
            .and_then(|code| u32::try_from(code).ok())
            .map(KeyId::Code)
            .ok_or_else(|| BindingError::InvalidDescriptor(format!("invalid key code {code}"))),
        other => Err(BindingError::InvalidDescriptor(format!("invalid key {other}"))),
    }
}

fn modifier_field(fields: &Map<String, Value>, name: &str) -> Result<Option<ModifierExpect>, BindingError> {
    fields
        .get(name)
        .map(|value| {
            ModifierExpect::from_json(value).ok_or_else(|| {
                BindingError::InvalidDescriptor(format!("`{name}` must be true, false or null"))
            })
        })
        .transpose()
}

fn bool_field(fields: &Map<String, Value>, name: &str) -> Result<Option<bool>, BindingError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(BindingError::InvalidDescriptor(format!(
            "`{name}` must be a boolean, found {other}"
        ))),
    }
}

fn string_field(fields: &Map<String, Value>, name: &str) -> Result<Option<String>, BindingError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(BindingError::InvalidDescriptor(format!(
            "`{name}` must be a pattern string, found {other}"
        ))),
    }
}

fn descriptor_from_object(fields: &Map<String, Value>) -> Result<BindingDescriptor, BindingError> {
    let keys = match fields.get("key") {
        Some(Value::Array(keys)) => keys.iter().map(key_from_json).collect::<Result<Vec<_>, _>>()?,
        Some(key) => vec![key_from_json(key)?],
        None => return Err(BindingError::InvalidDescriptor("missing `key`".into())),
    };

    let mut modifiers = ModifierSet::default();
    for (name, slot) in [
        ("altKey", &mut modifiers.alt),
        ("ctrlKey", &mut modifiers.ctrl),
        ("metaKey", &mut modifiers.meta),
        ("shiftKey", &mut modifiers.shift),
    ] {
        if let Some(expect) = modifier_field(fields, name)? {
            *slot = expect;
        }
    }

    let offset = match fields.get("offset") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_u64().map(|n| n as usize).ok_or_else(|| {
            BindingError::InvalidDescriptor(format!("invalid offset {n}"))
        })?),
        Some(other) => {
            return Err(BindingError::InvalidDescriptor(format!("invalid offset {other}")));
        }
    };

    let format = match fields.get("format") {
        None | Some(Value::Null) => None,
        Some(Value::Array(names)) => Some(FormatPredicate::AnyOf(
            names
                .iter()
                .map(|name| {
                    name.as_str().map(SmolStr::new).ok_or_else(|| {
                        BindingError::InvalidDescriptor(format!("invalid format name {name}"))
                    })
                })
                .collect::<Result<_, _>>()?,
        )),
        Some(Value::Object(expected)) => Some(FormatPredicate::Exact(
            expected.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(other) => {
            return Err(BindingError::InvalidDescriptor(format!("invalid format {other}")));
        }
    };

    Ok(BindingDescriptor {
        name: fields.get("name").and_then(Value::as_str).map(SmolStr::new),
        keys,
        modifiers,
        short_key: modifier_field(fields, "shortKey")?,
        collapsed: bool_field(fields, "collapsed")?,
        empty: bool_field(fields, "empty")?,
        offset,
        format,
        prefix: string_field(fields, "prefix")?,
        suffix: string_field(fields, "suffix")?,
    })
}

fn compile(field: &'static str, pattern: Option<&str>) -> Result<Option<Regex>, BindingError> {
    pattern
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| BindingError::InvalidPattern {
                field,
                pattern: pattern.to_string(),
                source,
            })
        })
        .transpose()
}

/// Turn a descriptor into one binding per key.
pub fn normalize(
    descriptor: &BindingDescriptor,
    platform: Platform,
    handler: Handler,
) -> Result<Vec<Binding>, BindingError> {
    if descriptor.keys.is_empty() {
        return Err(BindingError::InvalidDescriptor("no key".into()));
    }
    let mut modifiers = descriptor.modifiers;
    if let Some(expect) = descriptor.short_key {
        if platform.mac {
            modifiers.meta = expect;
        } else {
            modifiers.ctrl = expect;
        }
    }
    let context = BindingContext {
        collapsed: descriptor.collapsed,
        empty: descriptor.empty,
        offset: descriptor.offset,
        format: descriptor.format.clone(),
        prefix: compile("prefix", descriptor.prefix.as_deref())?,
        suffix: compile("suffix", descriptor.suffix.as_deref())?,
    };
    Ok(descriptor
        .keys
        .iter()
        .map(|key| Binding {
            name: descriptor.name.clone(),
            key: key.clone(),
            modifiers,
            context: context.clone(),
            handler: Arc::clone(&handler),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop() -> Handler {
        Arc::new(
            |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                HandlerResult::Handled
            },
        )
    }

    #[test]
    fn shorthand_descriptors() {
        let named = BindingDescriptor::from_json(&json!("Enter")).unwrap();
        assert_eq!(named.keys, vec![KeyId::from("Enter")]);
        let code = BindingDescriptor::from_json(&json!(13)).unwrap();
        assert_eq!(code.keys, vec![KeyId::Code(13)]);
        assert!(matches!(
            BindingDescriptor::from_json(&json!(true)),
            Err(BindingError::InvalidDescriptor(_))
        ));
        assert!(BindingDescriptor::from_json(&json!({ "key": [true] })).is_err());
        assert!(BindingDescriptor::from_json(&json!({ "shiftKey": true })).is_err());
    }

    #[test]
    fn object_descriptor_fields() {
        let descriptor = BindingDescriptor::from_json(&json!({
            "key": ["Backspace", 46],
            "shiftKey": null,
            "altKey": true,
            "collapsed": true,
            "offset": 0,
            "format": { "list": false, "header": true },
            "prefix": "^$",
        }))
        .unwrap();
        assert_eq!(descriptor.keys, vec![KeyId::from("Backspace"), KeyId::Code(46)]);
        assert_eq!(descriptor.modifiers.shift, ModifierExpect::Any);
        assert_eq!(descriptor.modifiers.alt, ModifierExpect::Pressed);
        assert_eq!(descriptor.modifiers.ctrl, ModifierExpect::Released);
        assert_eq!(descriptor.collapsed, Some(true));
        assert_eq!(descriptor.offset, Some(0));
        assert!(matches!(descriptor.format, Some(FormatPredicate::Exact(_))));
        assert_eq!(descriptor.prefix.as_deref(), Some("^$"));
    }

    #[test]
    fn normalize_expands_keys_and_short_key() {
        let descriptor = BindingDescriptor::keys(["a", "b"]).short_key();
        let mac = normalize(&descriptor, Platform { mac: true, firefox: false }, noop()).unwrap();
        assert_eq!(mac.len(), 2);
        assert_eq!(mac[1].key, KeyId::from("b"));
        assert_eq!(mac[0].modifiers.meta, ModifierExpect::Pressed);
        assert_eq!(mac[0].modifiers.ctrl, ModifierExpect::Released);

        let other = normalize(&descriptor, Platform::default(), noop()).unwrap();
        assert_eq!(other[0].modifiers.ctrl, ModifierExpect::Pressed);
        assert_eq!(other[0].modifiers.meta, ModifierExpect::Released);
    }

    #[test]
    fn normalize_rejects_bad_patterns() {
        let descriptor = BindingDescriptor::key("x").prefix("(");
        let error = normalize(&descriptor, Platform::default(), noop()).unwrap_err();
        assert!(matches!(error, BindingError::InvalidPattern { field: "prefix", .. }));
        assert!(normalize(&BindingDescriptor::default(), Platform::default(), noop()).is_err());
    }

    #[test]
    fn format_predicates() {
        let formats: AttributeMap =
            serde_json::from_value(json!({ "list": { "value": "bullet" }, "indent": 2, "code": null }))
                .unwrap();
        assert!(FormatPredicate::any_of(&["header", "list"]).matches(&formats));
        assert!(!FormatPredicate::any_of(&["header", "code"]).matches(&formats));
        let exact: AttributeMap =
            serde_json::from_value(json!({ "list": true, "header": false, "indent": 2 })).unwrap();
        assert!(FormatPredicate::Exact(exact).matches(&formats));
        let wrong: AttributeMap = serde_json::from_value(json!({ "indent": 3 })).unwrap();
        assert!(!FormatPredicate::Exact(wrong).matches(&formats));
    }
}
