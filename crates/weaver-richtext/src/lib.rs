//! weaver-richtext: clipboard conversion and keyboard commands for weaver
//! rich-text documents.
//!
//! - `clipboard`: pasted HTML or plain text to a `Delta` through a matcher
//!   pipeline, and selections back out to HTML and text
//! - `keyboard`: key-down dispatch over prioritized, context-aware bindings
//! - `document`: the `Document` contract both modules edit through, with an
//!   in-memory `DeltaDocument`
//! - `format`: the format registry that maps markup onto document formats
//!
//! Documents and changes are `weaver_delta::Delta`s.

pub mod clipboard;
pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod keyboard;
pub mod markup;

pub use clipboard::{Clipboard, ClipboardNotice, ClipboardPayload, CopyPayload, MatcherPipeline, PasteTarget};
pub use config::{ClipboardConfig, KeyboardConfig, Platform, RichTextConfig};
pub use document::{DeltaDocument, Document, SelectionRange, Source};
pub use error::{BindingError, DocumentError, SelectorError};
pub use format::{FormatRegistry, Schema, Scope};
pub use keyboard::{BindingDescriptor, DispatchOutcome, HandlerResult, KeyEvent, Keyboard};
pub use weaver_delta::{AttributeMap, Delta};
