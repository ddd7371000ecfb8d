//! Plain text on both sides of the clipboard.
//!
//! Copy turns semantic HTML into markdown-flavoured text; paste without
//! markup turns plain text into a delta. Both are seams: hosts plug in a
//! full markdown converter when they have one.

use std::sync::LazyLock;

use regex::Regex;
use weaver_delta::{AttributeMap, Delta};

use crate::markup::{MarkupNode, MarkupTree};

static EXTRA_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("newline run pattern"));

/// Serializes copied HTML to the `text/plain` flavour.
pub trait TextSerializer: Send + Sync {
    fn serialize(&self, html: &str) -> String;
}

/// Converts pasted plain text into document content.
pub trait PlainTextConverter: Send + Sync {
    fn convert(&self, text: &str) -> Delta;
}

/// Inserts pasted text as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl PlainTextConverter for PlainText {
    fn convert(&self, text: &str) -> Delta {
        Delta::new().insert(text, AttributeMap::new())
    }
}

/// Markdown text with ATX headings and checklist items.
#[derive(Debug, Clone)]
pub struct MarkdownSerializer {
    pub bullet_marker: char,
}

impl Default for MarkdownSerializer {
    fn default() -> Self {
        Self { bullet_marker: '*' }
    }
}

impl MarkdownSerializer {
    fn children(&self, node: MarkupNode<'_>) -> String {
        node.children().map(|child| self.node(child)).collect()
    }

    fn list_item(&self, node: MarkupNode<'_>, content: String) -> String {
        match node.attr("data-list") {
            Some("unchecked") => return format!("[ ] {content}\n"),
            Some("checked") => return format!("[x] {content}\n"),
            _ => {}
        }
        let body = content
            .trim_start_matches('\n')
            .trim_end_matches('\n')
            .replace('\n', "\n    ");
        let prefix = match node.parent() {
            Some(parent) if parent.tag_is("ol") => {
                let position = parent
                    .children()
                    .filter(|sibling| sibling.is_element())
                    .position(|sibling| sibling == node)
                    .unwrap_or(0);
                let start = parent
                    .attr("start")
                    .and_then(|start| start.trim().parse::<usize>().ok());
                let number = start.map_or(position + 1, |start| start + position);
                format!("{number}.  ")
            }
            _ => format!("{}   ", self.bullet_marker),
        };
        let mut item = format!("{prefix}{body}");
        if node.next_sibling().is_some() {
            item.push('\n');
        }
        item
    }

    fn node(&self, node: MarkupNode<'_>) -> String {
        if let Some(text) = node.text() {
            return text.to_string();
        }
        let content = self.children(node);
        let Some(tag) = node.tag() else {
            return content;
        };
        match tag {
            "p" => format!("{content}\n"),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                format!("\n\n{} {content}\n\n", "#".repeat(level))
            }
            "li" => self.list_item(node, content),
            "ul" | "ol" => format!("\n\n{content}\n\n"),
            "strong" | "b" => wrap(&content, "**"),
            "em" | "i" => wrap(&content, "_"),
            "s" | "strike" | "del" => wrap(&content, "~~"),
            "code" => wrap(&content, "`"),
            "a" => match node.attr("href") {
                Some(href) => format!("[{content}]({href})"),
                None => content,
            },
            "br" => "  \n".to_string(),
            "hr" => "\n\n* * *\n\n".to_string(),
            "img" => {
                let src = node.attr("src").unwrap_or_default();
                let alt = node.attr("alt").unwrap_or_default();
                format!("![{alt}]({src})")
            }
            "pre" => {
                let code = node.inner_text();
                let indented: Vec<String> = code.lines().map(|line| format!("    {line}")).collect();
                format!("\n\n{}\n\n", indented.join("\n"))
            }
            "blockquote" => {
                let quoted: Vec<String> = content
                    .trim_matches('\n')
                    .lines()
                    .map(|line| format!("> {line}"))
                    .collect();
                format!("\n\n{}\n\n", quoted.join("\n"))
            }
            "tr" => format!("|{content}\n"),
            "td" | "th" => format!(" {} |", content.trim()),
            "table" => format!("\n\n{content}\n\n"),
            _ => content,
        }
    }
}

fn wrap(content: &str, marker: &str) -> String {
    if content.trim().is_empty() {
        return content.to_string();
    }
    format!("{marker}{content}{marker}")
}

impl TextSerializer for MarkdownSerializer {
    fn serialize(&self, html: &str) -> String {
        let tree = MarkupTree::parse(html);
        let text = self.children(tree.root());
        let text = EXTRA_NEWLINES.replace_all(&text, "\n\n");
        text.trim_matches('\n').to_string()
    }
}
