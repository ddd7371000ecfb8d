//! Parsed markup trees.
//!
//! Pasted HTML is parsed with `scraper` (html5ever) and copied into a flat
//! arena so the conversion pipeline can address nodes by index, keep
//! per-call side tables keyed by `NodeId`, and walk the tree without
//! recursion. Only the `<body>` subtree is kept; its element becomes the root.
//!
//! The parsed `Html` is kept next to the arena for CSS selection. Edits made
//! through the tree are applied to both.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use smol_str::SmolStr;

use crate::error::SelectorError;

/// Index of a node inside its `MarkupTree`.
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
enum NodeData {
    Text(String),
    Element {
        tag: SmolStr,
        attrs: Vec<(SmolStr, String)>,
    },
}

#[derive(Debug, Clone)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// The node this entry was copied from in `MarkupTree::source`.
    origin: Option<ego_tree::NodeId>,
}

/// Flat, index-addressed copy of a parsed document body.
#[derive(Debug, Clone)]
pub struct MarkupTree {
    nodes: Vec<NodeEntry>,
    source: Html,
    by_origin: HashMap<ego_tree::NodeId, NodeId>,
}

const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

impl MarkupTree {
    /// Parse an HTML document or fragment.
    pub fn parse(html: &str) -> Self {
        let source = Html::parse_document(html);
        let mut nodes = vec![NodeEntry {
            data: NodeData::Element {
                tag: SmolStr::new_static("body"),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            origin: None,
        }];
        let mut by_origin = HashMap::new();

        let body = source
            .root_element()
            .children()
            .filter_map(ElementRef::wrap)
            .find(|element| element.value().name() == "body");
        if let Some(body) = body {
            nodes[ROOT].origin = Some(body.id());
            by_origin.insert(body.id(), ROOT);
            if let NodeData::Element { attrs, .. } = &mut nodes[ROOT].data {
                *attrs = body
                    .value()
                    .attrs()
                    .map(|(name, value)| (SmolStr::new(name), value.to_string()))
                    .collect();
            }
            copy_body(&mut nodes, &mut by_origin, body);
        }
        Self {
            nodes,
            source,
            by_origin,
        }
    }

    /// The body element.
    pub fn root(&self) -> MarkupNode<'_> {
        self.node(ROOT)
    }

    pub fn node(&self, id: NodeId) -> MarkupNode<'_> {
        MarkupNode { tree: self, id }
    }

    /// Number of nodes ever allocated, detached ones included.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Elements below the root matching the selector, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<MarkupNode<'_>> {
        let Some(body) = self.nodes[ROOT]
            .origin
            .and_then(|origin| self.source.tree.get(origin))
            .and_then(ElementRef::wrap)
        else {
            return Vec::new();
        };
        body.select(selector)
            .filter_map(|element| self.by_origin.get(&element.id()))
            .map(|&id| self.node(id))
            .collect()
    }

    /// Remove `id` attributes from the root's direct children.
    pub fn strip_identifiers(&mut self) {
        let children = self.nodes[ROOT].children.clone();
        for child in children {
            let entry = &mut self.nodes[child];
            if let NodeData::Element { attrs, .. } = &mut entry.data {
                attrs.retain(|(name, _)| name != "id");
            }
            let source = entry.origin.and_then(|origin| self.source.tree.get_mut(origin));
            if let Some(mut source) = source {
                if let scraper::Node::Element(element) = source.value() {
                    element.attrs.retain(|name, _| &*name.local != "id");
                }
            }
        }
    }

    /// Detach every element with the given tag, along with its subtree.
    pub fn remove_tags(&mut self, tag: &str) -> usize {
        let doomed: Vec<NodeId> = self
            .root()
            .descendants()
            .filter(|node| node.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .map(|node| node.id)
            .collect();
        let mut removed = 0;
        for id in doomed {
            let Some(parent) = self.nodes[id].parent.take() else {
                continue;
            };
            self.nodes[parent].children.retain(|child| *child != id);
            if let Some(mut source) = self.nodes[id].origin.and_then(|origin| self.source.tree.get_mut(origin)) {
                source.detach();
            }
            removed += 1;
        }
        removed
    }

    /// Serialize the root element and everything below it.
    pub fn to_html(&self) -> String {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }
        let mut out = String::new();
        let mut stack = vec![Step::Open(ROOT)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Open(id) => match &self.nodes[id].data {
                    NodeData::Text(text) => escape_into(&mut out, text, false),
                    NodeData::Element { tag, attrs } => {
                        out.push('<');
                        out.push_str(tag);
                        for (name, value) in attrs {
                            out.push(' ');
                            out.push_str(name);
                            out.push_str("=\"");
                            escape_into(&mut out, value, true);
                            out.push('"');
                        }
                        out.push('>');
                        if VOID_ELEMENTS.contains(&tag.as_str()) {
                            continue;
                        }
                        stack.push(Step::Close(id));
                        stack.extend(self.nodes[id].children.iter().rev().map(|c| Step::Open(*c)));
                    }
                },
                Step::Close(id) => {
                    if let NodeData::Element { tag, .. } = &self.nodes[id].data {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                }
            }
        }
        out
    }
}

/// Copy the body's text and element nodes into the arena, pre-order.
fn copy_body(nodes: &mut Vec<NodeEntry>, by_origin: &mut HashMap<ego_tree::NodeId, NodeId>, body: ElementRef<'_>) {
    let mut stack: Vec<_> = body.children().rev().map(|child| (child, ROOT)).collect();
    while let Some((node, parent)) = stack.pop() {
        let data = match node.value() {
            scraper::Node::Text(text) => NodeData::Text(String::from(&*text.text)),
            scraper::Node::Element(element) => NodeData::Element {
                tag: SmolStr::new(element.name()),
                attrs: element
                    .attrs()
                    .map(|(name, value)| (SmolStr::new(name), value.to_string()))
                    .collect(),
            },
            _ => continue,
        };
        let is_element = matches!(data, NodeData::Element { .. });
        let id = nodes.len();
        nodes.push(NodeEntry {
            data,
            parent: Some(parent),
            children: Vec::new(),
            origin: Some(node.id()),
        });
        nodes[parent].children.push(id);
        by_origin.insert(node.id(), id);
        if is_element {
            stack.extend(node.children().rev().map(|child| (child, id)));
        }
    }
}

/// Parse a CSS selector group for matching against a `MarkupTree`.
pub fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|error| SelectorError {
        selector: selector.to_string(),
        reason: error.to_string(),
    })
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

/// A borrowed view of one node.
#[derive(Clone, Copy)]
pub struct MarkupNode<'a> {
    tree: &'a MarkupTree,
    id: NodeId,
}

impl std::fmt::Debug for MarkupNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.entry().data {
            NodeData::Text(text) => write!(f, "#text({:?})", text),
            NodeData::Element { tag, .. } => write!(f, "<{}>#{}", tag, self.id),
        }
    }
}

impl PartialEq for MarkupNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl<'a> MarkupNode<'a> {
    fn entry(&self) -> &'a NodeEntry {
        &self.tree.nodes[self.id]
    }

    fn view(&self, id: NodeId) -> MarkupNode<'a> {
        MarkupNode {
            tree: self.tree,
            id,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a MarkupTree {
        self.tree
    }

    pub fn is_text(&self) -> bool {
        matches!(self.entry().data, NodeData::Text(_))
    }

    pub fn is_element(&self) -> bool {
        !self.is_text()
    }

    /// Lowercase tag name of an element.
    pub fn tag(&self) -> Option<&'a str> {
        match &self.entry().data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn tag_is(&self, tag: &str) -> bool {
        self.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Character data of a text node.
    pub fn text(&self) -> Option<&'a str> {
        match &self.entry().data {
            NodeData::Text(text) => Some(text),
            NodeData::Element { .. } => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.attrs()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + use<'a> {
        let attrs: &'a [(SmolStr, String)] = match &self.entry().data {
            NodeData::Element { attrs, .. } => attrs,
            NodeData::Text(_) => &[],
        };
        attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Declarations of the inline `style` attribute, property names lowercased.
    pub fn styles(&self) -> Vec<(String, String)> {
        let Some(style) = self.attr("style") else {
            return Vec::new();
        };
        style
            .split(';')
            .filter_map(|declaration| {
                let (name, value) = declaration.split_once(':')?;
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim();
                let value = value
                    .strip_suffix("!important")
                    .map(str::trim_end)
                    .unwrap_or(value);
                (!name.is_empty()).then(|| (name, value.to_string()))
            })
            .collect()
    }

    /// Value of one inline style property. Later declarations win.
    pub fn style(&self, property: &str) -> Option<String> {
        self.styles()
            .into_iter()
            .rev()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value)
    }

    pub fn parent(&self) -> Option<MarkupNode<'a>> {
        self.entry().parent.map(|id| self.view(id))
    }

    fn position(&self) -> Option<(&'a [NodeId], usize)> {
        let parent = self.entry().parent?;
        let siblings = self.tree.nodes[parent].children.as_slice();
        let index = siblings.iter().position(|id| *id == self.id)?;
        Some((siblings, index))
    }

    pub fn prev_sibling(&self) -> Option<MarkupNode<'a>> {
        let (siblings, index) = self.position()?;
        index.checked_sub(1).map(|i| self.view(siblings[i]))
    }

    pub fn next_sibling(&self) -> Option<MarkupNode<'a>> {
        let (siblings, index) = self.position()?;
        siblings.get(index + 1).map(|id| self.view(*id))
    }

    pub fn first_child(&self) -> Option<MarkupNode<'a>> {
        self.entry().children.first().map(|id| self.view(*id))
    }

    pub fn has_children(&self) -> bool {
        !self.entry().children.is_empty()
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = MarkupNode<'a>> + use<'a> {
        let tree = self.tree;
        self.entry()
            .children
            .iter()
            .map(move |id| MarkupNode { tree, id: *id })
    }

    /// Ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = MarkupNode<'a>> + use<'a> {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// All nodes below this one in document order, excluding itself.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            tree: self.tree,
            stack: self.entry().children.iter().rev().copied().collect(),
        }
    }

    /// Concatenated text of every descendant text node.
    pub fn inner_text(&self) -> String {
        if let Some(text) = self.text() {
            return text.to_string();
        }
        self.descendants().filter_map(|node| node.text()).collect()
    }
}

pub struct Descendants<'a> {
    tree: &'a MarkupTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = MarkupNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.nodes[id].children.iter().rev().copied());
        Some(MarkupNode {
            tree: self.tree,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_body_children_in_order() {
        let tree = MarkupTree::parse("<p>Hello <b>World</b></p><p>two</p>");
        let root = tree.root();
        let tags: Vec<_> = root.children().filter_map(|n| n.tag()).collect();
        assert_eq!(tags, vec!["p", "p"]);
        let first = root.first_child().unwrap();
        assert_eq!(first.inner_text(), "Hello World");
        let bold = first.children().nth(1).unwrap();
        assert!(bold.tag_is("B"));
        assert_eq!(bold.prev_sibling().unwrap().text(), Some("Hello "));
        assert!(bold.next_sibling().is_none());
        assert_eq!(bold.ancestors().count(), 2);
    }

    #[test]
    fn inline_styles_and_classes() {
        let tree = MarkupTree::parse(
            r#"<span class="ql-align-center  extra" style="font-weight: 700; color: rgb(1, 2, 3) !important">x</span>"#,
        );
        let span = tree.root().first_child().unwrap();
        assert!(span.has_class("extra"));
        assert_eq!(span.classes().count(), 2);
        assert_eq!(span.style("FONT-WEIGHT").as_deref(), Some("700"));
        assert_eq!(span.style("color").as_deref(), Some("rgb(1, 2, 3)"));
        assert_eq!(span.style("text-indent"), None);
    }

    #[test]
    fn strip_identifiers_only_touches_top_level() {
        let mut tree = MarkupTree::parse(r#"<p id="a"><span id="b">x</span></p>"#);
        tree.strip_identifiers();
        let p = tree.root().first_child().unwrap();
        assert_eq!(p.attr("id"), None);
        assert_eq!(p.first_child().unwrap().attr("id"), Some("b"));
    }

    #[test]
    fn remove_tags_and_serialize() {
        let mut tree =
            MarkupTree::parse("<p>a &amp; b<noscript><img src=x></noscript></p><br>");
        assert_eq!(tree.remove_tags("noscript"), 1);
        assert_eq!(tree.to_html(), "<body><p>a &amp; b</p><br></body>");
    }

    fn matching_tags(tree: &MarkupTree, selector: &str) -> Vec<String> {
        let selector = parse_selector(selector).unwrap();
        tree.select(&selector)
            .into_iter()
            .filter_map(|node| node.tag().map(str::to_string))
            .collect()
    }

    #[test]
    fn selects_with_css() {
        let tree = MarkupTree::parse(
            r#"<ol><li>a</li><li class="x">b</li></ol><p><a href="https://x.org">c</a><a href="/d">d</a></p><p>e</p>"#,
        );
        assert_eq!(matching_tags(&tree, "ol, p"), vec!["ol", "p", "p"]);
        assert_eq!(matching_tags(&tree, "li:first-child").len(), 1);
        assert_eq!(matching_tags(&tree, "ol li:not(.x)").len(), 1);
        assert_eq!(matching_tags(&tree, r#"a[href^="https"]"#).len(), 1);
        assert_eq!(matching_tags(&tree, "p + p"), vec!["p"]);
        assert!(matching_tags(&tree, "body").is_empty());
    }

    #[test]
    fn selection_follows_tree_edits() {
        let html = r#"<p id="a">x<span><b>y</b></span></p>"#;
        let untouched = MarkupTree::parse(html);
        assert_eq!(matching_tags(&untouched, "#a").len(), 1);
        assert_eq!(matching_tags(&untouched, "b").len(), 1);

        let mut tree = MarkupTree::parse(html);
        tree.strip_identifiers();
        tree.remove_tags("span");
        assert!(matching_tags(&tree, "#a").is_empty());
        assert!(matching_tags(&tree, "b").is_empty());
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for selector in ["", "p,", "span[", "p::", "a >"] {
            let error = parse_selector(selector).unwrap_err();
            assert_eq!(error.selector, selector);
        }
    }
}
