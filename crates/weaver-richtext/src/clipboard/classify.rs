use crate::format::FormatRegistry;
use crate::markup::{MarkupNode, MarkupTree};

/// Tags that start a new line in the document when they have content.
const LINE_TAGS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "canvas",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "iframe",
    "li",
    "main",
    "nav",
    "ol",
    "output",
    "p",
    "pre",
    "section",
    "table",
    "td",
    "tr",
    "ul",
    "video",
];

/// Structural questions the conversion rules ask about markup nodes.
///
/// Built once per conversion; preformatted state is computed for the whole
/// tree up front.
pub struct NodeClassifier<'r> {
    registry: &'r dyn FormatRegistry,
    pre: Vec<bool>,
}

impl<'r> NodeClassifier<'r> {
    pub fn new(registry: &'r dyn FormatRegistry, tree: &MarkupTree) -> Self {
        let mut pre = vec![false; tree.capacity()];
        // Arena ids are assigned parents first.
        for id in 0..tree.capacity() {
            let node = tree.node(id);
            let inherited = node.parent().is_some_and(|parent| pre[parent.id()]);
            pre[id] = inherited || node.tag_is("pre");
        }
        Self { registry, pre }
    }

    pub fn registry(&self) -> &'r dyn FormatRegistry {
        self.registry
    }

    /// A non-empty element whose tag is block-level.
    pub fn is_line(&self, node: MarkupNode<'_>) -> bool {
        if !node.has_children() {
            return false;
        }
        node.tag()
            .is_some_and(|tag| LINE_TAGS.iter().any(|line| line.eq_ignore_ascii_case(tag)))
    }

    /// Inside (or is) a `<pre>` element.
    pub fn is_pre(&self, node: MarkupNode<'_>) -> bool {
        self.pre.get(node.id()).copied().unwrap_or(false)
    }

    /// Recognized by the registry as a block embed.
    pub fn is_block_embed(&self, node: MarkupNode<'_>) -> bool {
        self.registry
            .query_node(node)
            .is_some_and(|spec| spec.is_block_embed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Schema;

    #[test]
    fn lines_need_content() {
        let schema = Schema::standard();
        let tree = MarkupTree::parse("<p>a</p><p></p><span>b</span><hr>");
        let classifier = NodeClassifier::new(&schema, &tree);
        let nodes: Vec<_> = tree.root().children().collect();
        assert!(classifier.is_line(nodes[0]));
        assert!(!classifier.is_line(nodes[1]));
        assert!(!classifier.is_line(nodes[2]));
        assert!(classifier.is_block_embed(nodes[3]));
    }

    #[test]
    fn pre_is_inherited() {
        let schema = Schema::standard();
        let tree = MarkupTree::parse("<pre><span>x  y</span></pre><p>z</p>");
        let classifier = NodeClassifier::new(&schema, &tree);
        let pre = tree.root().first_child().unwrap();
        let text = pre.descendants().find(|n| n.is_text()).unwrap();
        assert!(classifier.is_pre(text));
        let p = tree.root().children().nth(1).unwrap();
        assert!(!classifier.is_pre(p));
    }
}
