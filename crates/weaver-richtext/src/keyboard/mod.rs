//! Key-down dispatch.
//!
//! A [`Keyboard`] holds bindings grouped by key. On each key-down the
//! bindings whose modifiers match are checked in registration order against
//! a [`DispatchContext`] of the current selection; the first handler that
//! does not ask to continue ends dispatch.

mod binding;
mod context;
mod handlers;
mod key;
mod registry;

pub use binding::{
    Binding, BindingContext, BindingDescriptor, FormatPredicate, Handler, HandlerResult, normalize,
};
pub use context::DispatchContext;
pub use handlers::CODE_TAB;
pub use key::{IME_PROCESS_CODE, KeyEvent, KeyId, ModifierExpect, ModifierSet};
pub use registry::BindingRegistry;

use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::config::KeyboardConfig;
use crate::document::Document;
use crate::error::BindingError;

/// What dispatching one key-down did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// The event's default action was cancelled.
    pub prevented: bool,
    /// Name of the binding that ended dispatch, if it had one.
    pub handled_by: Option<SmolStr>,
}

#[derive(Debug, Clone)]
pub struct Keyboard {
    config: KeyboardConfig,
    registry: BindingRegistry,
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new(KeyboardConfig::default())
    }
}

impl Keyboard {
    /// A keyboard with the built-in bindings, minus the ones the
    /// configuration disables.
    pub fn new(config: KeyboardConfig) -> Self {
        let mut keyboard = Self {
            config,
            registry: BindingRegistry::new(),
        };
        for (descriptor, handler) in handlers::defaults() {
            if descriptor
                .name
                .as_deref()
                .is_some_and(|name| keyboard.config.is_disabled(name))
            {
                tracing::debug!(target: "weaver::keyboard", name = ?descriptor.name, "binding disabled");
                continue;
            }
            let registered = keyboard.add_handler(&descriptor, handler);
            debug_assert!(registered.is_ok(), "built-in binding {:?} rejected", descriptor.name);
        }
        for (descriptor, handler) in handlers::always_on(keyboard.config.platform) {
            let registered = keyboard.add_handler(&descriptor, handler);
            debug_assert!(registered.is_ok(), "built-in binding {:?} rejected", descriptor.name);
        }
        keyboard
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub fn bindings(&self) -> &BindingRegistry {
        &self.registry
    }

    /// Register a binding after every existing one for its keys.
    pub fn add_binding<F>(&mut self, descriptor: &BindingDescriptor, handler: F) -> Result<(), BindingError>
    where
        F: Fn(&mut dyn Document, crate::document::SelectionRange, &DispatchContext, &Binding) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        self.add_handler(descriptor, Arc::new(handler))
    }

    pub fn add_handler(&mut self, descriptor: &BindingDescriptor, handler: Handler) -> Result<(), BindingError> {
        match normalize(descriptor, self.config.platform, handler) {
            Ok(bindings) => {
                for binding in bindings {
                    self.registry.insert(binding);
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(target: "weaver::keyboard", %error, name = ?descriptor.name, "binding not registered");
                Err(error)
            }
        }
    }

    /// Register a binding from its JSON form: a key name, a key code, or an
    /// object with `key` and context fields.
    pub fn add_binding_json<F>(&mut self, descriptor: &Value, handler: F) -> Result<(), BindingError>
    where
        F: Fn(&mut dyn Document, crate::document::SelectionRange, &DispatchContext, &Binding) -> HandlerResult
            + Send
            + Sync
            + 'static,
    {
        let descriptor = BindingDescriptor::from_json(descriptor).inspect_err(|error| {
            tracing::warn!(target: "weaver::keyboard", %error, "binding not registered");
        })?;
        self.add_binding(&descriptor, handler)
    }

    /// Run the bindings for a key-down against the document.
    pub fn dispatch(&self, doc: &mut dyn Document, event: &mut KeyEvent) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        if event.default_prevented() || event.is_composing || event.is_ime_artifact() {
            return outcome;
        }
        let matches: Vec<&Binding> = self
            .registry
            .candidates(event)
            .filter(|binding| binding.modifiers.matches(event))
            .collect();
        if matches.is_empty() {
            return outcome;
        }
        let Some(range) = doc.selection() else {
            return outcome;
        };
        if !doc.has_focus() {
            return outcome;
        }
        let Some(cx) = DispatchContext::build(doc, range, event) else {
            return outcome;
        };

        for binding in matches {
            if !binding.context.matches(&cx) {
                continue;
            }
            let result = (binding.handler)(doc, range, &cx, binding);
            tracing::trace!(target: "weaver::keyboard", key = %binding.key, name = ?binding.name, ?result, "binding ran");
            match result {
                HandlerResult::Continue => continue,
                HandlerResult::Handled => {
                    outcome.prevented = true;
                    outcome.handled_by = binding.name.clone();
                    break;
                }
                HandlerResult::HandledAllowDefault => {
                    outcome.handled_by = binding.name.clone();
                    break;
                }
            }
        }
        if outcome.prevented {
            event.prevent_default();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::Platform;
    use crate::document::{DeltaDocument, SelectionRange, Source};
    use crate::format::Schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use weaver_delta::Delta;

    fn document(ops: Value, selection: SelectionRange) -> DeltaDocument {
        let contents: Delta = serde_json::from_value(json!({ "ops": ops })).unwrap();
        let mut doc = DeltaDocument::new(contents, Arc::new(Schema::standard()));
        doc.focus();
        doc.set_selection(selection, Source::Silent);
        doc
    }

    fn ops(doc: &DeltaDocument) -> Value {
        serde_json::to_value(doc.contents()).unwrap()["ops"].clone()
    }

    #[test]
    fn disabled_defaults_are_skipped() {
        let keyboard = Keyboard::new(KeyboardConfig {
            disabled_bindings: vec!["bold".into(), "tab".into()],
            ..KeyboardConfig::default()
        });
        assert!(!keyboard.bindings().names(&KeyId::from("b")).contains(&"bold"));
        let tabs = keyboard.bindings().names(&KeyId::from("Tab"));
        assert!(!tabs.contains(&"tab"));
        assert!(tabs.contains(&"indent"));
    }

    #[test]
    fn continue_falls_through_in_order() {
        let mut keyboard = Keyboard::new(KeyboardConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for (name, result) in [
            ("first", HandlerResult::Continue),
            ("second", HandlerResult::Handled),
            ("third", HandlerResult::Handled),
        ] {
            let seen = seen.clone();
            keyboard
                .add_binding(&BindingDescriptor::key("F2").named(name), move |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                    seen.lock().unwrap().push(name);
                    result
                })
                .unwrap();
        }
        let mut doc = document(json!([{ "insert": "x\n" }]), SelectionRange::caret(0));
        let mut event = KeyEvent::new("F2");
        let outcome = keyboard.dispatch(&mut doc, &mut event);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(outcome.handled_by.as_deref(), Some("second"));
        assert!(outcome.prevented && event.default_prevented());
    }

    #[test]
    fn failed_predicates_do_not_prevent() {
        let mut keyboard = Keyboard::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        keyboard
            .add_binding(&BindingDescriptor::key("F5").named("first"), move |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                first.lock().unwrap().push("first");
                HandlerResult::Continue
            })
            .unwrap();
        let ranged = seen.clone();
        keyboard
            .add_binding(&BindingDescriptor::key("F5").named("ranged").collapsed(false), move |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                ranged.lock().unwrap().push("ranged");
                HandlerResult::Handled
            })
            .unwrap();

        let mut doc = document(json!([{ "insert": "x\n" }]), SelectionRange::caret(0));
        let mut event = KeyEvent::new("F5");
        assert_eq!(keyboard.dispatch(&mut doc, &mut event), DispatchOutcome::default());
        assert!(!event.default_prevented());
        assert_eq!(*seen.lock().unwrap(), vec!["first"]);

        doc.set_selection(SelectionRange::new(0, 1), Source::Silent);
        let outcome = keyboard.dispatch(&mut doc, &mut KeyEvent::new("F5"));
        assert_eq!(outcome.handled_by.as_deref(), Some("ranged"));
        assert!(outcome.prevented);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "first", "ranged"]);
    }

    #[test]
    fn shift_any_matches_with_and_without_shift() {
        let mut keyboard = Keyboard::default();
        keyboard
            .add_binding(&BindingDescriptor::key("F6").named("either").shift(ModifierExpect::Any), |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                HandlerResult::Handled
            })
            .unwrap();
        let mut doc = document(json!([{ "insert": "x\n" }]), SelectionRange::caret(0));
        for mut event in [KeyEvent::new("F6"), KeyEvent::new("F6").shift()] {
            assert_eq!(keyboard.dispatch(&mut doc, &mut event).handled_by.as_deref(), Some("either"));
        }
        assert_eq!(keyboard.dispatch(&mut doc, &mut KeyEvent::new("F6").ctrl()).handled_by, None);
    }

    #[test]
    fn every_built_in_registers() {
        for platform in [
            Platform::default(),
            Platform { mac: true, firefox: false },
            Platform { mac: false, firefox: true },
        ] {
            let keyboard = Keyboard::new(KeyboardConfig {
                platform,
                ..KeyboardConfig::default()
            });
            let expected: usize = handlers::defaults()
                .into_iter()
                .chain(handlers::always_on(platform))
                .map(|(descriptor, _)| descriptor.keys.len())
                .sum();
            assert_eq!(keyboard.bindings().len(), expected);
        }
    }

    #[test]
    fn allow_default_stops_without_preventing() {
        let mut keyboard = Keyboard::default();
        keyboard
            .add_binding(&BindingDescriptor::key("F3").named("soft"), |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                HandlerResult::HandledAllowDefault
            })
            .unwrap();
        let mut doc = document(json!([{ "insert": "x\n" }]), SelectionRange::caret(0));
        let mut event = KeyEvent::new("F3");
        let outcome = keyboard.dispatch(&mut doc, &mut event);
        assert_eq!(outcome.handled_by.as_deref(), Some("soft"));
        assert!(!outcome.prevented && !event.default_prevented());
    }

    #[test]
    fn skipped_events() {
        let keyboard = Keyboard::default();
        let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::caret(1));
        for mut event in [
            KeyEvent::new("Enter").composing(),
            KeyEvent::new("Enter").with_which(IME_PROCESS_CODE),
            KeyEvent::new("Q"),
        ] {
            assert_eq!(keyboard.dispatch(&mut doc, &mut event), DispatchOutcome::default());
        }
        let mut prevented = KeyEvent::new("Enter");
        prevented.prevent_default();
        assert_eq!(keyboard.dispatch(&mut doc, &mut prevented).handled_by, None);
        assert_eq!(ops(&doc), json!([{ "insert": "ab\n" }]));
    }

    #[test]
    fn short_key_follows_platform() {
        let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::new(0, 2));
        let mac = Keyboard::new(KeyboardConfig {
            platform: Platform { mac: true, firefox: false },
            ..KeyboardConfig::default()
        });
        assert_eq!(mac.dispatch(&mut doc, &mut KeyEvent::new("b").ctrl()).handled_by, None);
        assert_eq!(mac.dispatch(&mut doc, &mut KeyEvent::new("b").meta()).handled_by.as_deref(), Some("bold"));
        assert_eq!(ops(&doc), json!([{ "insert": "ab", "attributes": { "bold": true } }, { "insert": "\n" }]));

        let other = Keyboard::default();
        assert_eq!(other.dispatch(&mut doc, &mut KeyEvent::new("b").ctrl()).handled_by.as_deref(), Some("bold"));
        assert_eq!(ops(&doc), json!([{ "insert": "ab\n" }]));
    }

    #[test]
    fn unfocused_document_is_left_alone() {
        let keyboard = Keyboard::default();
        let mut doc = document(json!([{ "insert": "ab\n" }]), SelectionRange::caret(1));
        doc.blur();
        let outcome = keyboard.dispatch(&mut doc, &mut KeyEvent::new("Enter"));
        assert!(!outcome.prevented);
    }

    #[test]
    fn json_descriptors() {
        let mut keyboard = Keyboard::default();
        keyboard
            .add_binding_json(&json!({ "key": "k", "shortKey": true, "name": "link" }), |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                HandlerResult::Handled
            })
            .unwrap();
        assert!(keyboard.bindings().names(&KeyId::from("k")).contains(&"link"));
        assert!(
            keyboard
                .add_binding_json(&json!({ "key": "k", "prefix": "(" }), |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
                    HandlerResult::Handled
                })
                .is_err()
        );
        assert!(keyboard.add_binding_json(&json!({ "shiftKey": true }), |_: &mut dyn Document, _: SelectionRange, _: &DispatchContext, _: &Binding| {
            HandlerResult::Handled
        }).is_err());
    }
}
