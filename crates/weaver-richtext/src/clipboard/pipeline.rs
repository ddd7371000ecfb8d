//! The matcher pipeline: markup tree in, document delta out.

use std::collections::HashMap;
use std::sync::Arc;

use scraper::Selector;
use weaver_delta::{AttributeMap, Delta};

use super::classify::NodeClassifier;
use crate::error::SelectorError;
use crate::format::FormatRegistry;
use crate::markup::{self, MarkupNode, MarkupTree, NodeId};

/// What the rules can see besides the node and the delta so far.
pub struct MatchContext<'a> {
    pub registry: &'a dyn FormatRegistry,
    pub classifier: &'a NodeClassifier<'a>,
    /// Formats active where the result will be inserted.
    pub formats: &'a AttributeMap,
}

/// A conversion rule. Receives the node's contribution so far and returns
/// the rewritten contribution.
pub type Rule = Arc<dyn Fn(MarkupNode<'_>, Delta, &MatchContext<'_>) -> Delta + Send + Sync>;

/// Which nodes a rule applies to.
#[derive(Debug, Clone)]
pub enum MatchSelector {
    /// Every text node.
    Text,
    /// Every element below the root.
    Element,
    /// Elements matching a CSS selector, resolved once per conversion.
    Css(Selector),
}

impl MatchSelector {
    pub fn css(selector: &str) -> Result<Self, SelectorError> {
        markup::parse_selector(selector).map(MatchSelector::Css)
    }
}

struct Frame<'t> {
    node: MarkupNode<'t>,
    next_child: usize,
    children: Vec<MarkupNode<'t>>,
    delta: Delta,
}

impl<'t> Frame<'t> {
    fn new(node: MarkupNode<'t>) -> Self {
        Self {
            node,
            next_child: 0,
            children: node.children().collect(),
            delta: Delta::new(),
        }
    }
}

/// Ordered `(selector, rule)` registrations.
#[derive(Clone, Default)]
pub struct MatcherPipeline {
    rules: Vec<(MatchSelector, Rule)>,
}

impl std::fmt::Debug for MatcherPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(selector, _)| selector))
            .finish()
    }
}

impl MatcherPipeline {
    /// A pipeline without any rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// A pipeline with the built-in rules registered.
    pub fn with_defaults() -> Self {
        let mut pipeline = Self::new();
        super::matchers::register_defaults(&mut pipeline);
        pipeline
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn add<F>(&mut self, selector: MatchSelector, rule: F)
    where
        F: Fn(MarkupNode<'_>, Delta, &MatchContext<'_>) -> Delta + Send + Sync + 'static,
    {
        self.rules.push((selector, Arc::new(rule)));
    }

    pub fn add_rule(&mut self, selector: MatchSelector, rule: Rule) {
        self.rules.push((selector, rule));
    }

    /// Register a rule under a CSS selector. An invalid selector is logged
    /// and the rule is dropped.
    pub fn add_matcher<F>(&mut self, selector: &str, rule: F) -> Result<(), SelectorError>
    where
        F: Fn(MarkupNode<'_>, Delta, &MatchContext<'_>) -> Delta + Send + Sync + 'static,
    {
        match MatchSelector::css(selector) {
            Ok(selector) => {
                self.add(selector, rule);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(target: "weaver::clipboard", %error, "matcher not registered");
                Err(error)
            }
        }
    }

    /// Selector rules by node, in registration order. Lives for one call.
    fn index_selectors(&self, tree: &MarkupTree) -> HashMap<NodeId, Vec<usize>> {
        let mut index: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (position, (selector, _)) in self.rules.iter().enumerate() {
            if let MatchSelector::Css(selector) = selector {
                for node in tree.select(selector) {
                    index.entry(node.id()).or_default().push(position);
                }
            }
        }
        index
    }

    fn fold<'r>(
        &self,
        rules: impl Iterator<Item = &'r Rule>,
        node: MarkupNode<'_>,
        delta: Delta,
        cx: &MatchContext<'_>,
    ) -> Delta {
        rules.fold(delta, |delta, rule| rule(node, delta, cx))
    }

    /// Convert a whole tree, post-order, without recursion.
    ///
    /// Text nodes fold the text rules over an empty delta. Elements
    /// concatenate their children, then fold the element rules, then the
    /// selector rules indexed for that node. The root only concatenates.
    pub fn traverse(&self, tree: &MarkupTree, cx: &MatchContext<'_>) -> Delta {
        let root = tree.root();
        let index = self.index_selectors(tree);
        let text_rules = || {
            self.rules
                .iter()
                .filter(|(selector, _)| matches!(selector, MatchSelector::Text))
                .map(|(_, rule)| rule)
        };
        let element_rules = || {
            self.rules
                .iter()
                .filter(|(selector, _)| matches!(selector, MatchSelector::Element))
                .map(|(_, rule)| rule)
        };

        let mut stack = vec![Frame::new(root)];
        loop {
            let Some(frame) = stack.last_mut() else {
                return Delta::new();
            };
            if let Some(&child) = frame.children.get(frame.next_child) {
                frame.next_child += 1;
                if child.is_text() {
                    let contribution = self.fold(text_rules(), child, Delta::new(), cx);
                    let delta = std::mem::take(&mut frame.delta);
                    frame.delta = delta.concat(contribution);
                } else {
                    stack.push(Frame::new(child));
                }
                continue;
            }

            let Some(Frame { node, delta, .. }) = stack.pop() else {
                return Delta::new();
            };
            let Some(parent) = stack.last_mut() else {
                return delta;
            };
            let delta = self.fold(element_rules(), node, delta, cx);
            let selected = index
                .get(&node.id())
                .into_iter()
                .flatten()
                .map(|&position| &self.rules[position].1);
            let delta = self.fold(selected, node, delta, cx);
            let acc = std::mem::take(&mut parent.delta);
            parent.delta = acc.concat(delta);
        }
    }

    /// Parse markup, strip top-level ids and convert it.
    pub fn convert_markup(
        &self,
        html: &str,
        registry: &dyn FormatRegistry,
        formats: &AttributeMap,
    ) -> Delta {
        let mut tree = MarkupTree::parse(html);
        tree.strip_identifiers();
        self.convert_tree(&tree, registry, formats)
    }

    /// Convert an already parsed tree. A trailing terminator is dropped when
    /// it carries no formats, or always when pasting into a table.
    pub fn convert_tree(
        &self,
        tree: &MarkupTree,
        registry: &dyn FormatRegistry,
        formats: &AttributeMap,
    ) -> Delta {
        let classifier = NodeClassifier::new(registry, tree);
        let cx = MatchContext {
            registry,
            classifier: &classifier,
            formats,
        };
        let delta = self.traverse(tree, &cx);
        tracing::trace!(target: "weaver::clipboard", ops = delta.ops.len(), "converted markup");

        let unformatted = delta
            .ops
            .last()
            .and_then(|op| op.attributes())
            .is_none_or(AttributeMap::is_empty);
        let in_table = weaver_delta::attributes::is_set(formats, "table");
        if delta.ends_with_text("\n") && (unformatted || in_table) {
            let trim = Delta::new()
                .retain(delta.length() - 1, AttributeMap::new())
                .delete(1);
            return delta.compose(&trim);
        }
        delta
    }
}
