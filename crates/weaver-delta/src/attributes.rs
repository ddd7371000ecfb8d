//! Attribute maps: the format bag carried by inserts and retains.
//!
//! A missing key means "unspecified". A key mapped to `Value::Null` means
//! "explicitly cleared" and only survives composition when the receiving
//! operation is itself a retain.

use std::collections::BTreeMap;

use serde_json::Value;

/// Format name to format value.
pub type AttributeMap = BTreeMap<String, Value>;

/// Compose `b` on top of `a`.
///
/// Keys from `b` win. Keys only present in `a` are carried over. Null values
/// are dropped unless `keep_null` is set (used when composing two retains).
pub fn compose(a: &AttributeMap, b: &AttributeMap, keep_null: bool) -> AttributeMap {
    let mut attributes: AttributeMap = if keep_null {
        b.clone()
    } else {
        b.iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    };
    for (key, value) in a {
        if !b.contains_key(key) {
            attributes.insert(key.clone(), value.clone());
        }
    }
    attributes
}

/// The change that turns `a` into `b`.
///
/// Every key whose value differs between the two maps is reported with the
/// value from `b`, or `Null` when `b` lacks it.
pub fn diff(a: &AttributeMap, b: &AttributeMap) -> AttributeMap {
    let mut attributes = AttributeMap::new();
    for key in a.keys().chain(b.keys()) {
        if attributes.contains_key(key) {
            continue;
        }
        if a.get(key) != b.get(key) {
            attributes.insert(key.clone(), b.get(key).cloned().unwrap_or(Value::Null));
        }
    }
    attributes
}

/// Inverse of applying `attr` over `base`: restores the values `base` had.
pub fn invert(attr: &AttributeMap, base: &AttributeMap) -> AttributeMap {
    let mut inverted = AttributeMap::new();
    for (key, value) in base {
        if attr.contains_key(key) && attr.get(key) != Some(value) {
            inverted.insert(key.clone(), value.clone());
        }
    }
    for key in attr.keys() {
        if !base.contains_key(key) {
            inverted.insert(key.clone(), Value::Null);
        }
    }
    inverted
}

/// Whether a format is present with a meaningful value.
///
/// Missing keys, `null`, and `false` all count as absent.
pub fn is_set(attributes: &AttributeMap, name: &str) -> bool {
    match attributes.get(name) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(_) => true,
    }
}

/// Build an attribute map from `(name, value)` pairs.
pub fn from_pairs<I, K>(pairs: I) -> AttributeMap
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
