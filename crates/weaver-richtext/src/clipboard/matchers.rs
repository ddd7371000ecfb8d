//! Built-in conversion rules.
//!
//! Rules never fail. A rule that finds nothing to do hands its input back
//! unchanged.

use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde_json::{Value, json};
use weaver_delta::{AttributeMap, Delta, Embed, Op};

use super::pipeline::{MatchContext, MatchSelector, MatcherPipeline, Rule};
use crate::format::{Format, resolve_attributes};
use crate::markup::MarkupNode;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("whitespace run pattern"));
static LEADING_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+").expect("leading whitespace pattern"));
static TRAILING_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+$").expect("trailing whitespace pattern"));

const NBSP: char = '\u{a0}';

pub(crate) fn register_defaults(pipeline: &mut MatcherPipeline) {
    pipeline.add(MatchSelector::Text, match_text);
    pipeline.add(MatchSelector::Text, match_newline);
    pipeline.add(MatchSelector::Element, match_newline);
    pipeline.add(MatchSelector::Element, match_blot);
    pipeline.add(MatchSelector::Element, match_attributor);
    pipeline.add(MatchSelector::Element, match_styles);

    let selected: [(&str, Rule); 9] = [
        ("br", Arc::new(match_break)),
        ("li", Arc::new(match_indent)),
        ("ol, ul", Arc::new(match_list)),
        ("pre", Arc::new(match_code_block)),
        ("tr", Arc::new(match_table)),
        ("b", Arc::new(alias("bold"))),
        ("i", Arc::new(alias("italic"))),
        ("strike", Arc::new(alias("strike"))),
        ("style", Arc::new(match_ignore)),
    ];
    for (selector, rule) in selected {
        match MatchSelector::css(selector) {
            Ok(selector) => pipeline.add_rule(selector, rule),
            Err(error) => {
                tracing::warn!(target: "weaver::clipboard", %selector, %error, "skipping built-in matcher")
            }
        }
    }
}

/// JavaScript-style truthiness of a format value.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Stamp `name: value` onto every insert that does not already carry a
/// truthy value for it. A falsy `value` stamps nothing. Existing attributes
/// always win.
pub fn apply_format(delta: Delta, name: &str, value: &Value) -> Delta {
    let mut out = Delta::new();
    for op in delta.ops {
        let Op::Insert { insert, attributes } = op else {
            out.push(op);
            continue;
        };
        if attributes.get(name).is_some_and(truthy) {
            out.push(Op::Insert { insert, attributes });
            continue;
        }
        let mut formats = AttributeMap::new();
        if truthy(value) {
            formats.insert(name.to_string(), value.clone());
        }
        formats.extend(attributes);
        out.push(Op::insert(insert, formats));
    }
    out
}

pub fn apply_formats(delta: Delta, formats: &AttributeMap) -> Delta {
    formats
        .iter()
        .fold(delta, |delta, (name, value)| apply_format(delta, name, value))
}

fn keep_nbsp(matched: &str, collapse: bool) -> String {
    let kept: String = matched.chars().filter(|&c| c == NBSP).collect();
    if kept.is_empty() && collapse {
        " ".to_string()
    } else {
        kept
    }
}

/// Text nodes: collapse whitespace outside `<pre>`, trim at line edges.
pub fn match_text(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    let Some(raw) = node.text() else {
        return delta;
    };
    // Word marks empty paragraphs with <o:p>&nbsp;</o:p>
    if node.parent().is_some_and(|parent| parent.tag_is("o:p")) {
        return delta.insert(raw.trim(), AttributeMap::new());
    }
    if raw.trim().is_empty() && raw.contains('\n') {
        return delta;
    }
    if cx.classifier.is_pre(node) {
        return delta.insert(raw, AttributeMap::new());
    }

    let text = raw.replace("\r\n", " ").replace('\n', " ");
    let mut text = WHITESPACE_RUN
        .replace_all(&text, |caps: &Captures<'_>| keep_nbsp(&caps[0], true))
        .into_owned();
    let is_line = |other: Option<MarkupNode<'_>>| other.is_some_and(|n| cx.classifier.is_line(n));
    let after_line = match node.prev_sibling() {
        Some(prev) => is_line(Some(prev)),
        None => is_line(node.parent()),
    };
    if after_line {
        text = LEADING_WHITESPACE
            .replace(&text, |caps: &Captures<'_>| keep_nbsp(&caps[0], false))
            .into_owned();
    }
    let before_line = match node.next_sibling() {
        Some(next) => is_line(Some(next)),
        None => is_line(node.parent()),
    };
    if before_line {
        text = TRAILING_WHITESPACE
            .replace(&text, |caps: &Captures<'_>| keep_nbsp(&caps[0], false))
            .into_owned();
    }
    delta.insert(text, AttributeMap::new())
}

/// Terminate the contribution of a block-level node, or of an inline node
/// followed by one.
pub fn match_newline(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    if delta.ends_with_text("\n") {
        return delta;
    }
    if cx.classifier.is_line(node) {
        return delta.insert("\n", AttributeMap::new());
    }
    if delta.length() > 0 {
        let mut next = node.next_sibling();
        while let Some(candidate) = next {
            if cx.classifier.is_line(candidate) || cx.classifier.is_block_embed(candidate) {
                return delta.insert("\n", AttributeMap::new());
            }
            next = candidate.first_child();
        }
    }
    delta
}

pub fn match_break(_: MarkupNode<'_>, delta: Delta, _: &MatchContext<'_>) -> Delta {
    if delta.ends_with_text("\n") {
        delta
    } else {
        delta.insert("\n", AttributeMap::new())
    }
}

/// Embeds replace the contribution; blocks terminate it and stamp their
/// line format; inline marks stamp their value.
pub fn match_blot(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    let Some(spec) = cx.registry.query_node(node) else {
        return delta;
    };
    if spec.is_embed() {
        return match spec.value(node) {
            Some(value) => Delta::new().insert_embed(
                Embed::from([(spec.name.to_string(), value)]),
                spec.embed_attributes(node),
            ),
            None => delta,
        };
    }
    let mut delta = delta;
    if spec.is_block() && !delta.ends_with_text("\n") {
        delta = delta.insert("\n", AttributeMap::new());
    }
    match spec.formats(node) {
        Some(value) => apply_format(delta, &spec.name, &value),
        None => delta,
    }
}

pub fn match_attributor(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    let formats = resolve_attributes(node, cx.registry);
    if formats.is_empty() {
        return delta;
    }
    apply_formats(delta, &formats)
}

/// `parseFloat`-style leading number.
fn leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().ok()
}

/// Inline styles that mean bold, italic, underline or strike.
pub fn match_styles(node: MarkupNode<'_>, delta: Delta, _: &MatchContext<'_>) -> Delta {
    let mut formats = AttributeMap::new();
    if node.style("font-style").as_deref() == Some("italic") {
        formats.insert("italic".into(), Value::Bool(true));
    }
    match node.style("text-decoration").as_deref() {
        Some("underline") => {
            formats.insert("underline".into(), Value::Bool(true));
        }
        Some("line-through") => {
            formats.insert("strike".into(), Value::Bool(true));
        }
        _ => {}
    }
    if let Some(weight) = node.style("font-weight") {
        if weight.starts_with("bold") || leading_float(&weight).is_some_and(|w| w >= 700.0) {
            formats.insert("bold".into(), Value::Bool(true));
        }
    }
    let delta = if formats.is_empty() {
        delta
    } else {
        apply_formats(delta, &formats)
    };
    let indented = node
        .style("text-indent")
        .and_then(|indent| leading_float(&indent))
        .is_some_and(|indent| indent > 0.0);
    if indented {
        return Delta::new().insert("\t", AttributeMap::new()).concat(delta);
    }
    delta
}

/// Nested list items get an indent of their list depth minus one.
pub fn match_indent(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    let is_list = cx
        .registry
        .query_node(node)
        .is_some_and(|spec| spec.name == "list");
    if !is_list || !delta.ends_with_text("\n") {
        return delta;
    }
    let lists = node
        .ancestors()
        .filter(|ancestor| ancestor.tag_is("ol") || ancestor.tag_is("ul"))
        .count();
    let indent = lists.saturating_sub(1);
    if indent == 0 {
        return delta;
    }
    let mut out = Delta::new();
    for op in delta.ops {
        let Op::Insert { insert, attributes } = op else {
            out.push(op);
            continue;
        };
        let mut formats = AttributeMap::from([("indent".to_string(), json!(indent))]);
        formats.extend(attributes);
        out.push(Op::insert(insert, formats));
    }
    out
}

pub fn match_list(node: MarkupNode<'_>, delta: Delta, _: &MatchContext<'_>) -> Delta {
    let value = if node.tag_is("ol") { "ordered" } else { "bullet" };
    apply_format(delta, "list", &json!({ "value": value, "fold": "unfold" }))
}

pub fn match_code_block(node: MarkupNode<'_>, delta: Delta, cx: &MatchContext<'_>) -> Delta {
    let language = match cx.registry.query_name("code-block", None) {
        Some(Format::Blot(spec)) => spec.formats(node).unwrap_or(Value::Bool(true)),
        _ => Value::Bool(true),
    };
    let language = match language.as_str() {
        Some("plain") => json!("javascript"),
        _ => language,
    };
    apply_format(delta, "code-block", &language)
}

/// Stamp the 1-based row number within the enclosing table.
pub fn match_table(node: MarkupNode<'_>, delta: Delta, _: &MatchContext<'_>) -> Delta {
    let Some(parent) = node.parent() else {
        return delta;
    };
    let table = if parent.tag_is("table") {
        Some(parent)
    } else {
        parent.parent()
    };
    let row = table.and_then(|table| {
        table
            .descendants()
            .filter(|candidate| candidate.tag_is("tr"))
            .position(|candidate| candidate == node)
    });
    match row {
        Some(row) => apply_format(delta, "table", &json!(row + 1)),
        None => delta,
    }
}

fn alias(
    format: &'static str,
) -> impl Fn(MarkupNode<'_>, Delta, &MatchContext<'_>) -> Delta + Send + Sync + 'static {
    move |_, delta, _| apply_format(delta, format, &Value::Bool(true))
}

pub fn match_ignore(_: MarkupNode<'_>, _: Delta, _: &MatchContext<'_>) -> Delta {
    Delta::new()
}
