use std::collections::HashMap;

use super::binding::Binding;
use super::key::{KeyEvent, KeyId};

/// Bindings grouped by key. Within a key, registration order is priority
/// order.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bindings: HashMap<KeyId, Vec<Binding>>,
    len: usize,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, binding: Binding) {
        self.bindings.entry(binding.key.clone()).or_default().push(binding);
        self.len += 1;
    }

    pub fn get(&self, key: &KeyId) -> &[Binding] {
        self.bindings.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Bindings registered for the event's key, then for its legacy code.
    pub fn candidates<'a>(&'a self, event: &KeyEvent) -> impl Iterator<Item = &'a Binding> + use<'a> {
        let named = self.get(&KeyId::Named(event.key.clone()));
        let code = self.get(&KeyId::Code(event.which));
        named.iter().chain(code)
    }

    /// Names of the registered bindings for a key, in priority order.
    pub fn names(&self, key: &KeyId) -> Vec<&str> {
        self.get(key)
            .iter()
            .filter_map(|binding| binding.name.as_deref())
            .collect()
    }
}
