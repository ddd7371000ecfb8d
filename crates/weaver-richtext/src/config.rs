//! Editor module configuration.
//!
//! Everything here deserializes from the host's settings (JSON or any other
//! serde format) and has a usable `Default`.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichTextConfig {
    pub keyboard: KeyboardConfig,
    pub clipboard: ClipboardConfig,
}

/// Host platform traits that change keyboard behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    /// The primary shortcut modifier is Cmd (meta) instead of Ctrl.
    pub mac: bool,
    /// Backspace and Delete are always handled by the editor, not just next
    /// to single characters.
    pub firefox: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub platform: Platform,
    /// Names of built-in bindings that should not be registered.
    pub disabled_bindings: Vec<SmolStr>,
}

impl KeyboardConfig {
    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled_bindings.iter().any(|n| n == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Strip `id` attributes from the top-level pasted elements.
    pub strip_identifiers: bool,
    /// Queue a `ClipboardNotice::PasteApplied` after each paste.
    pub notify_after_paste: bool,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            strip_identifiers: true,
            notify_after_paste: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: RichTextConfig = serde_json::from_str(
            r#"{ "keyboard": { "platform": { "mac": true }, "disabled_bindings": ["tab"] } }"#,
        )
        .unwrap();
        assert!(config.keyboard.platform.mac);
        assert!(!config.keyboard.platform.firefox);
        assert!(config.keyboard.is_disabled("tab"));
        assert!(config.clipboard.strip_identifiers);
        assert!(config.clipboard.notify_after_paste);
    }
}
