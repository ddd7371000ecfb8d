//! Copy, cut and paste.
//!
//! `Clipboard` turns clipboard payloads into document changes through a
//! [`MatcherPipeline`], and serializes selections back out for copying. It
//! never talks to a platform clipboard: hosts hand it captured events and
//! payloads.

mod classify;
mod event;
mod matchers;
mod pipeline;
mod text;

pub use classify::NodeClassifier;
pub use event::{ClipboardEvent, ClipboardFile, DataTransfer, EventTarget, TEXT_HTML, TEXT_PLAIN};
pub use matchers::apply_format;
pub use pipeline::{MatchContext, MatchSelector, MatcherPipeline, Rule};
pub use text::{MarkdownSerializer, PlainText, PlainTextConverter, TextSerializer};

use std::sync::Arc;

use weaver_delta::{AttributeMap, Delta, Op};

use crate::config::ClipboardConfig;
use crate::document::{Document, SelectionRange, Source};
use crate::error::{DocumentError, SelectorError};
use crate::format::FormatRegistry;
use crate::markup::{MarkupNode, MarkupTree};

const TABLE_CELL_LINE: &str = "table-cell-line";
const CODE_BLOCK: &str = "code-block";

/// Incoming clipboard content. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub html: String,
    pub text: String,
}

impl ClipboardPayload {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            text: String::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            html: String::new(),
            text: text.into(),
        }
    }
}

/// Both flavours of a copied selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyPayload {
    pub html: String,
    pub text: String,
}

/// Follow-up work a paste leaves for the host, such as re-highlighting
/// code. Drained with [`Clipboard::take_notices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardNotice {
    PasteApplied { range: SelectionRange },
}

/// Where `dangerously_paste_html` puts its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteTarget<'a> {
    /// Replace the whole document.
    Replace(&'a str),
    /// Splice in at an index.
    At(usize, &'a str),
}

/// Receives pasted files that came without markup.
pub trait Uploader: Send + Sync {
    fn upload(&self, range: SelectionRange, files: &[ClipboardFile]);
}

pub struct Clipboard {
    pipeline: MatcherPipeline,
    config: ClipboardConfig,
    serializer: Arc<dyn TextSerializer>,
    plain_text: Arc<dyn PlainTextConverter>,
    uploader: Option<Arc<dyn Uploader>>,
    notices: Vec<ClipboardNotice>,
}

impl std::fmt::Debug for Clipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clipboard")
            .field("pipeline", &self.pipeline)
            .field("config", &self.config)
            .field("uploader", &self.uploader.is_some())
            .field("notices", &self.notices)
            .finish_non_exhaustive()
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new(ClipboardConfig::default())
    }
}

impl Clipboard {
    /// A clipboard with the built-in matchers, markdown copy and verbatim
    /// plain-text paste.
    pub fn new(config: ClipboardConfig) -> Self {
        Self {
            pipeline: MatcherPipeline::with_defaults(),
            config,
            serializer: Arc::new(MarkdownSerializer::default()),
            plain_text: Arc::new(PlainText),
            uploader: None,
            notices: Vec::new(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: MatcherPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn TextSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_plain_text(mut self, converter: Arc<dyn PlainTextConverter>) -> Self {
        self.plain_text = converter;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn pipeline(&self) -> &MatcherPipeline {
        &self.pipeline
    }

    /// Append a rule after the built-in ones.
    pub fn add_matcher<F>(&mut self, selector: &str, rule: F) -> Result<(), SelectorError>
    where
        F: Fn(MarkupNode<'_>, Delta, &MatchContext<'_>) -> Delta + Send + Sync + 'static,
    {
        self.pipeline.add_matcher(selector, rule)
    }

    /// Notices queued since the last call.
    pub fn take_notices(&mut self) -> Vec<ClipboardNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Convert a payload into content for a place carrying `formats`.
    ///
    /// Inside a table cell the plain text is split into cell lines, and the
    /// last terminator is left empty so the text merges into the cell's own
    /// line. Inside a code block the plain text is taken verbatim.
    pub fn convert(
        &self,
        registry: &dyn FormatRegistry,
        payload: &ClipboardPayload,
        formats: &AttributeMap,
    ) -> Delta {
        if weaver_delta::attributes::is_set(formats, TABLE_CELL_LINE) {
            return cell_lines(&payload.text, formats);
        }
        if let Some(language) = formats.get(CODE_BLOCK).filter(|value| !value.is_null()) {
            let attributes = AttributeMap::from([(CODE_BLOCK.to_string(), language.clone())]);
            return Delta::new().insert(payload.text.as_str(), attributes);
        }
        if payload.html.is_empty() {
            return self.plain_text.convert(&payload.text);
        }
        let mut tree = MarkupTree::parse(&payload.html);
        if self.config.strip_identifiers {
            tree.strip_identifiers();
        }
        self.pipeline.convert_tree(&tree, registry, formats)
    }

    /// Both clipboard flavours for a range.
    pub fn on_copy<D: Document + ?Sized>(&self, doc: &D, range: SelectionRange) -> CopyPayload {
        let html = doc.semantic_html(range.index, range.length);
        let text = self.serializer.serialize(&html);
        tracing::debug!(target: "weaver::clipboard", index = range.index, length = range.length, "copy");
        CopyPayload { html, text }
    }

    /// Handle a captured copy or cut event.
    pub fn on_capture_copy<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        event: &mut ClipboardEvent,
        is_cut: bool,
    ) -> Result<(), DocumentError> {
        if event.target.has_class("code-copy") || event.target.has_class("ql-code-block") {
            event.prevent_default();
            let text: String = event
                .target
                .code_lines
                .iter()
                .map(|line| format!("{line}\n"))
                .collect();
            event.clipboard.set_data(TEXT_PLAIN, text);
            return Ok(());
        }

        let Some(range) = doc.selection() else {
            return Ok(());
        };
        let formats = doc.format_at(range.index, range.length);
        if weaver_delta::attributes::is_set(&formats, TABLE_CELL_LINE) {
            event.prevent_default();
            let text = doc.text(range.index, range.length);
            if is_cut {
                doc.delete_text(range.index, text.trim().chars().count(), Source::User)?;
            }
            event.clipboard.set_data(TEXT_PLAIN, text);
            return Ok(());
        }

        if event.default_prevented() {
            return Ok(());
        }
        event.prevent_default();
        let CopyPayload { html, text } = self.on_copy(doc, range);
        event.clipboard.set_data(TEXT_PLAIN, text);
        event.clipboard.set_data(TEXT_HTML, html);
        if is_cut {
            doc.delete_text(range.index, range.length, Source::User)?;
        }
        Ok(())
    }

    /// Handle a captured paste event.
    pub fn on_capture_paste<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        event: &mut ClipboardEvent,
    ) -> Result<(), DocumentError> {
        if event.default_prevented() || !doc.is_enabled() {
            return Ok(());
        }
        event.prevent_default();
        doc.focus();
        let Some(range) = doc.selection() else {
            return Ok(());
        };

        let mut html = event.clipboard.get_data(TEXT_HTML).to_string();
        if !html.is_empty() {
            let mut tree = MarkupTree::parse(&html);
            let removed = tree.remove_tags("noscript");
            if removed > 0 {
                tracing::trace!(target: "weaver::clipboard", removed, "dropped noscript elements");
            }
            html = tree.to_html();
        }
        let text = event.clipboard.get_data(TEXT_PLAIN).to_string();

        if html.is_empty() && !event.clipboard.files.is_empty() {
            match &self.uploader {
                Some(uploader) => uploader.upload(range, &event.clipboard.files),
                None => tracing::debug!(
                    target: "weaver::clipboard",
                    files = event.clipboard.files.len(),
                    "no uploader for pasted files"
                ),
            }
            return Ok(());
        }
        self.on_paste(doc, range, &ClipboardPayload { html, text })
    }

    /// Replace `range` with the converted payload and put the caret after it.
    pub fn on_paste<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        range: SelectionRange,
        payload: &ClipboardPayload,
    ) -> Result<(), DocumentError> {
        let formats = doc.format_at(range.index, 0);
        let registry = doc.registry();
        let pasted = self.convert(registry.as_ref(), payload, &formats);
        let pasted_length = pasted.length();

        let in_row = weaver_delta::attributes::is_set(&formats, "row");
        let removed = if in_row && range.length == 1 { 0 } else { range.length };
        let change = Delta::new()
            .retain(range.index, AttributeMap::new())
            .delete(removed)
            .concat(pasted);
        doc.update_contents(&change, Source::User)?;

        // The delete counts towards the change length.
        let caret = change.length() - range.length;
        doc.set_selection(SelectionRange::caret(caret), Source::Silent);
        doc.scroll_into_view();
        tracing::debug!(target: "weaver::clipboard", index = range.index, pasted = pasted_length, "paste");

        if self.config.notify_after_paste {
            self.notices.push(ClipboardNotice::PasteApplied {
                range: SelectionRange::new(range.index, pasted_length),
            });
        }
        Ok(())
    }

    /// Convert markup and apply it without a clipboard event.
    pub fn dangerously_paste_html<D: Document + ?Sized>(
        &self,
        doc: &mut D,
        target: PasteTarget<'_>,
        source: Source,
    ) -> Result<(), DocumentError> {
        let registry = doc.registry();
        let formats = AttributeMap::new();
        match target {
            PasteTarget::Replace(html) => {
                let delta = self.convert(registry.as_ref(), &ClipboardPayload::html(html), &formats);
                doc.set_contents(&delta, source)?;
                doc.set_selection(SelectionRange::caret(0), Source::Silent);
            }
            PasteTarget::At(index, html) => {
                let paste = self.convert(registry.as_ref(), &ClipboardPayload::html(html), &formats);
                let length = paste.length();
                let change = Delta::new().retain(index, AttributeMap::new()).concat(paste);
                doc.update_contents(&change, source)?;
                doc.set_selection(SelectionRange::caret(index + length), Source::Silent);
            }
        }
        Ok(())
    }
}

/// One insert per non-empty line, each followed by a terminator carrying
/// the cell formats. The final terminator is emptied.
fn cell_lines(text: &str, formats: &AttributeMap) -> Delta {
    let mut ops = Vec::new();
    for line in text.split('\n') {
        if !line.is_empty() {
            ops.push(Op::insert(line, AttributeMap::new()));
        }
        ops.push(Op::insert("\n", formats.clone()));
    }
    if let Some(Op::Insert { insert, .. }) = ops.last_mut() {
        *insert = String::new().into();
    }
    Delta::from(ops)
}
