//! Key identities, modifier expectations and key-down events.

use serde_json::Value;
use smol_str::SmolStr;

/// How a binding is looked up: by `KeyboardEvent.key` or by legacy key code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    Named(SmolStr),
    Code(u32),
}

impl From<&str> for KeyId {
    fn from(key: &str) -> Self {
        Self::Named(SmolStr::new(key))
    }
}

impl From<SmolStr> for KeyId {
    fn from(key: SmolStr) -> Self {
        Self::Named(key)
    }
}

impl From<u32> for KeyId {
    fn from(code: u32) -> Self {
        Self::Code(code)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(key) => write!(f, "{key:?}"),
            Self::Code(code) => write!(f, "#{code}"),
        }
    }
}

/// What a binding requires of one modifier key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModifierExpect {
    Pressed,
    /// Unspecified modifiers must be released.
    #[default]
    Released,
    /// Don't care.
    Any,
}

impl ModifierExpect {
    pub fn matches(self, pressed: bool) -> bool {
        match self {
            Self::Pressed => pressed,
            Self::Released => !pressed,
            Self::Any => true,
        }
    }

    /// `true`, `false` or `null`.
    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Self::Pressed),
            Value::Bool(false) => Some(Self::Released),
            Value::Null => Some(Self::Any),
            _ => None,
        }
    }
}

/// Modifier expectations of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModifierSet {
    pub alt: ModifierExpect,
    pub ctrl: ModifierExpect,
    pub meta: ModifierExpect,
    pub shift: ModifierExpect,
}

impl ModifierSet {
    pub const ANY: Self = Self {
        alt: ModifierExpect::Any,
        ctrl: ModifierExpect::Any,
        meta: ModifierExpect::Any,
        shift: ModifierExpect::Any,
    };

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.alt.matches(event.alt)
            && self.ctrl.matches(event.ctrl)
            && self.meta.matches(event.meta)
            && self.shift.matches(event.shift)
    }
}

/// The key code browsers report while an IME composition swallows a key.
pub const IME_PROCESS_CODE: u32 = 229;

/// An already-captured key-down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: SmolStr,
    pub which: u32,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub is_composing: bool,
    default_prevented: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        Self {
            key: SmolStr::new(key),
            which: legacy_code(key),
            ..Self::default()
        }
    }

    pub fn with_which(mut self, which: u32) -> Self {
        self.which = which;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn composing(mut self) -> Self {
        self.is_composing = true;
        self
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Backspace, Enter or Space delivered with the IME process code.
    pub fn is_ime_artifact(&self) -> bool {
        self.which == IME_PROCESS_CODE && matches!(self.key.as_str(), "Backspace" | "Enter" | " ")
    }
}

/// Legacy `which` codes for the keys the built-in bindings use.
fn legacy_code(key: &str) -> u32 {
    match key {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" => 13,
        "Escape" => 27,
        " " => 32,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        "Delete" => 46,
        _ => {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphanumeric() => c.to_ascii_uppercase() as u32,
                _ => 0,
            }
        }
    }
}
