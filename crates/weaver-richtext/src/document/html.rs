//! Semantic HTML for a document range.
//!
//! Output is plain structural markup: paragraphs, headers, lists nested by
//! indent, `<pre>` for code blocks and `<table>` for table cells. Alignment
//! and direction are written as `ql-` classes so the same markup pastes back
//! losslessly.

use std::fmt::Write;

use serde_json::Value;
use weaver_delta::{AttributeMap, Delta, Insert, Op};

use super::layout::{self, LineKind, LineRef};
use crate::format::FormatRegistry;

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn string_format<'a>(formats: &'a AttributeMap, name: &str) -> Option<&'a str> {
    match formats.get(name)? {
        Value::Object(map) => map.get("value").and_then(Value::as_str),
        other => other.as_str(),
    }
}

fn render_op(op: &Op, out: &mut String) {
    let Op::Insert { insert, attributes } = op else {
        return;
    };
    let mut inner = match insert {
        Insert::Text(text) => escape(text),
        Insert::Embed(embed) => match embed.iter().next() {
            Some((name, value)) if name == "image" => {
                let src = value.as_str().unwrap_or_default();
                let mut tag = format!("<img src=\"{}\"", escape(src));
                for (key, value) in attributes {
                    if let Some(value) = value.as_str() {
                        let _ = write!(tag, " {key}=\"{}\"", escape(value));
                    }
                }
                tag.push('>');
                out.push_str(&tag);
                return;
            }
            _ => return,
        },
    };

    let mut styles = Vec::new();
    for (name, property) in [("color", "color"), ("background", "background-color")] {
        if let Some(value) = attributes.get(name).and_then(Value::as_str) {
            styles.push(format!("{property}: {value}"));
        }
    }
    let mut classes = Vec::new();
    for (name, prefix) in [("font", "ql-font"), ("size", "ql-size")] {
        if let Some(value) = attributes.get(name).and_then(Value::as_str) {
            classes.push(format!("{prefix}-{value}"));
        }
    }
    if !styles.is_empty() || !classes.is_empty() {
        let mut open = String::from("<span");
        if !classes.is_empty() {
            let _ = write!(open, " class=\"{}\"", classes.join(" "));
        }
        if !styles.is_empty() {
            let _ = write!(open, " style=\"{}\"", styles.join("; "));
        }
        inner = format!("{open}>{inner}</span>");
    }

    let wrappers = [
        ("code", "code"),
        ("strike", "s"),
        ("underline", "u"),
        ("italic", "em"),
        ("bold", "strong"),
    ];
    for (name, tag) in wrappers {
        if weaver_delta::attributes::is_set(attributes, name) {
            inner = format!("<{tag}>{inner}</{tag}>");
        }
    }
    match attributes.get("script").and_then(Value::as_str) {
        Some("sub") => inner = format!("<sub>{inner}</sub>"),
        Some("super") => inner = format!("<sup>{inner}</sup>"),
        _ => {}
    }
    if let Some(href) = attributes.get("link").and_then(Value::as_str) {
        inner = format!("<a href=\"{}\">{inner}</a>", escape(href));
    }
    out.push_str(&inner);
}

fn render_inline(content: &Delta) -> String {
    let mut out = String::new();
    for op in &content.ops {
        render_op(op, &mut out);
    }
    if out.is_empty() {
        out.push_str("<br>");
    }
    out
}

fn line_classes(formats: &AttributeMap, with_indent: bool) -> String {
    let mut classes = Vec::new();
    if let Some(align) = formats.get("align").and_then(Value::as_str) {
        classes.push(format!("ql-align-{align}"));
    }
    if let Some(direction) = formats.get("direction").and_then(Value::as_str) {
        classes.push(format!("ql-direction-{direction}"));
    }
    if with_indent {
        if let Some(indent) = formats.get("indent").and_then(Value::as_i64) {
            classes.push(format!("ql-indent-{indent}"));
        }
    }
    if classes.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", classes.join(" "))
    }
}

fn list_tag(line: &LineRef) -> &'static str {
    if string_format(&line.formats, "list") == Some("ordered") {
        "ol"
    } else {
        "ul"
    }
}

/// Clip a line's content to the selected document range.
fn clipped(line: &LineRef, start: usize, end: usize) -> Delta {
    let from = start.saturating_sub(line.index);
    let to = end.saturating_sub(line.index).min(line.content.length());
    line.content.slice(from, to)
}

fn render_block_embed(line: &LineRef, out: &mut String) {
    let Some(Op::Insert {
        insert: Insert::Embed(embed),
        ..
    }) = line.content.ops.first()
    else {
        return;
    };
    for (name, value) in embed {
        match name.as_str() {
            "divider" => out.push_str("<hr>"),
            "video" => {
                let src = value.as_str().unwrap_or_default();
                let _ = write!(out, "<iframe src=\"{}\"></iframe>", escape(src));
            }
            _ => {}
        }
    }
}

pub(crate) fn semantic_html(
    contents: &Delta,
    registry: &dyn FormatRegistry,
    index: usize,
    length: usize,
) -> String {
    let lines = layout::lines(contents, registry);
    let range = layout::overlapping(&lines, index, length);
    let selected = &lines[range];
    let end = index + length;

    let mut out = String::new();
    let mut at = 0;
    while at < selected.len() {
        let line = &selected[at];
        if line.kind == LineKind::BlockEmbed {
            render_block_embed(line, &mut out);
            at += 1;
            continue;
        }
        if line.has_format("code-block") {
            let mut text = Vec::new();
            while at < selected.len() && selected[at].has_format("code-block") {
                text.push(clipped(&selected[at], index, end).to_text());
                at += 1;
            }
            let _ = write!(out, "<pre>{}</pre>", escape(&text.join("\n")));
            continue;
        }
        if line.has_format("table") {
            out.push_str("<table><tbody>");
            let mut row: Option<&Value> = None;
            while at < selected.len() && selected[at].has_format("table") {
                let cell = &selected[at];
                let value = cell.formats.get("table");
                if row != value {
                    if row.is_some() {
                        out.push_str("</tr>");
                    }
                    out.push_str("<tr>");
                    row = value;
                }
                let _ = write!(out, "<td>{}</td>", render_inline(&clipped(cell, index, end)));
                at += 1;
            }
            out.push_str("</tr></tbody></table>");
            continue;
        }
        if line.has_format("list") {
            // (tag, indent) of each open list
            let mut open: Vec<(&str, i64)> = Vec::new();
            while at < selected.len() && selected[at].has_format("list") {
                let item = &selected[at];
                let indent = item.indent();
                let tag = list_tag(item);
                while let Some(&(open_tag, open_indent)) = open.last() {
                    if open_indent > indent || (open_indent == indent && open_tag != tag) {
                        let _ = write!(out, "</{open_tag}>");
                        open.pop();
                    } else {
                        break;
                    }
                }
                if open.last().is_none_or(|&(_, open_indent)| open_indent < indent) {
                    let _ = write!(out, "<{tag}>");
                    open.push((tag, indent));
                }
                let value = string_format(&item.formats, "list").unwrap_or("bullet");
                let _ = write!(
                    out,
                    "<li data-list=\"{}\"{}>{}</li>",
                    escape(value),
                    line_classes(&item.formats, false),
                    render_inline(&clipped(item, index, end))
                );
                at += 1;
            }
            while let Some((tag, _)) = open.pop() {
                let _ = write!(out, "</{tag}>");
            }
            continue;
        }

        let inner = render_inline(&clipped(line, index, end));
        let classes = line_classes(&line.formats, true);
        if let Some(level) = line.header_level() {
            let _ = write!(out, "<h{level}{classes}>{inner}</h{level}>");
        } else if line.has_format("blockquote") {
            let _ = write!(out, "<blockquote{classes}>{inner}</blockquote>");
        } else {
            let _ = write!(out, "<p{classes}>{inner}</p>");
        }
        at += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Schema;
    use serde_json::json;

    fn render(ops: serde_json::Value, index: usize, length: usize) -> String {
        let contents: Delta = serde_json::from_value(json!({ "ops": ops })).unwrap();
        semantic_html(&contents, &Schema::standard(), index, length)
    }

    #[test]
    fn paragraphs_and_marks() {
        let html = render(
            json!([
                { "insert": "Hi " },
                { "insert": "there", "attributes": { "bold": true, "link": "https://x.y" } },
                { "insert": "\n\n" }
            ]),
            0,
            10,
        );
        assert_eq!(
            html,
            r#"<p>Hi <a href="https://x.y"><strong>there</strong></a></p><p><br></p>"#
        );
    }

    #[test]
    fn clips_to_range() {
        let html = render(
            json!([
                { "insert": "hello" },
                { "insert": "\n", "attributes": { "header": { "value": 2, "fold": "unfold" } } }
            ]),
            1,
            3,
        );
        assert_eq!(html, "<h2>ell</h2>");
    }

    #[test]
    fn nested_lists() {
        let html = render(
            json!([
                { "insert": "a" },
                { "insert": "\n", "attributes": { "list": { "value": "ordered" } } },
                { "insert": "b" },
                { "insert": "\n", "attributes": { "list": { "value": "bullet" }, "indent": 1 } },
                { "insert": "c" },
                { "insert": "\n", "attributes": { "list": { "value": "ordered" } } }
            ]),
            0,
            6,
        );
        assert_eq!(
            html,
            r#"<ol><li data-list="ordered">a</li><ul><li data-list="bullet">b</li></ul><li data-list="ordered">c</li></ol>"#
        );
    }

    #[test]
    fn code_and_tables() {
        let html = render(
            json!([
                { "insert": "x<y" },
                { "insert": "\n", "attributes": { "code-block": "plain" } },
                { "insert": "z" },
                { "insert": "\n", "attributes": { "code-block": "plain" } },
                { "insert": "a" },
                { "insert": "\n", "attributes": { "table": "1" } },
                { "insert": "b" },
                { "insert": "\n", "attributes": { "table": "2" } }
            ]),
            0,
            10,
        );
        assert_eq!(
            html,
            "<pre>x&lt;y\nz</pre><table><tbody><tr><td>a</td></tr><tr><td>b</td></tr></tbody></table>"
        );
    }
}
