use serde_json::{Map, Value, json};

use super::{
    Attributor, AttributorKind, Format, FormatRegistry, FormatSpec, Scope, ValueTransform,
};
use crate::markup::MarkupNode;

/// The default document schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    formats: Vec<FormatSpec>,
    attributors: Vec<Attributor>,
}

fn data_attr(node: MarkupNode<'_>, name: &str) -> Option<Value> {
    node.attr(name)
        .filter(|v| !v.is_empty())
        .map(|v| Value::String(v.to_string()))
}

fn fold_of(node: MarkupNode<'_>) -> Value {
    data_attr(node, "data-fold").unwrap_or_else(|| json!("unfold"))
}

fn header_formats(node: MarkupNode<'_>) -> Option<Value> {
    let level: u64 = node.tag()?.strip_prefix('h')?.parse().ok()?;
    Some(json!({ "value": level, "fold": fold_of(node) }))
}

fn list_formats(node: MarkupNode<'_>) -> Option<Value> {
    let value = data_attr(node, "data-list")?;
    Some(json!({ "value": value, "fold": fold_of(node) }))
}

fn code_block_formats(node: MarkupNode<'_>) -> Option<Value> {
    Some(data_attr(node, "data-language").unwrap_or_else(|| json!("plain")))
}

fn table_formats(node: MarkupNode<'_>) -> Option<Value> {
    data_attr(node, "data-row")
}

fn link_formats(node: MarkupNode<'_>) -> Option<Value> {
    data_attr(node, "href")
}

fn script_formats(node: MarkupNode<'_>) -> Option<Value> {
    match node.tag()? {
        "sub" => Some(json!("sub")),
        "sup" => Some(json!("super")),
        _ => None,
    }
}

fn image_value(node: MarkupNode<'_>) -> Option<Value> {
    data_attr(node, "data-id").or_else(|| data_attr(node, "src"))
}

fn image_formats(node: MarkupNode<'_>) -> Option<Value> {
    let formats: Map<String, Value> = ["alt", "width", "height", "data-id", "scale"]
        .into_iter()
        .filter_map(|name| node.attr(name).map(|v| (name.to_string(), json!(v))))
        .collect();
    Some(Value::Object(formats))
}

fn video_value(node: MarkupNode<'_>) -> Option<Value> {
    data_attr(node, "src")
}

fn video_formats(node: MarkupNode<'_>) -> Option<Value> {
    let formats: Map<String, Value> = ["width", "height"]
        .into_iter()
        .filter_map(|name| node.attr(name).map(|v| (name.to_string(), json!(v))))
        .collect();
    Some(Value::Object(formats))
}

fn divider_value(_: MarkupNode<'_>) -> Option<Value> {
    Some(Value::Bool(true))
}

impl Schema {
    /// An empty schema; nothing is recognized.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The formats a weaver document understands out of the box.
    pub fn standard() -> Self {
        let mut schema = Self::empty();

        schema.register_format(FormatSpec::inline("bold", &["strong", "b"]));
        schema.register_format(FormatSpec::inline("italic", &["em", "i"]));
        schema.register_format(FormatSpec::inline("underline", &["u"]));
        schema.register_format(FormatSpec::inline("strike", &["s", "strike", "del"]));
        schema.register_format(FormatSpec::inline("code", &["code"]));
        schema.register_format(FormatSpec::inline("link", &["a"]).with_formats(link_formats));
        schema.register_format(
            FormatSpec::inline("script", &["sub", "sup"]).with_formats(script_formats),
        );

        schema.register_format(FormatSpec::block("block", &["p"]));
        schema.register_format(
            FormatSpec::block("header", &["h1", "h2", "h3", "h4", "h5", "h6"])
                .with_formats(header_formats),
        );
        schema.register_format(FormatSpec::block("blockquote", &["blockquote"]).with_formats(
            |_| Some(Value::Bool(true)),
        ));
        schema.register_format(FormatSpec::block("list", &["li"]).with_formats(list_formats));
        schema.register_format(
            FormatSpec::block("code-block", &["div"])
                .with_class("ql-code-block")
                .with_formats(code_block_formats),
        );
        schema.register_format(FormatSpec::block("table", &["td"]).with_formats(table_formats));

        schema.register_format(
            FormatSpec::embed("image", &["img"])
                .with_value(image_value)
                .with_formats(image_formats),
        );
        schema.register_format(
            FormatSpec::block_embed("video", &["iframe"])
                .with_value(video_value)
                .with_formats(video_formats),
        );
        schema.register_format(FormatSpec::block_embed("divider", &["hr"]).with_value(divider_value));

        let align = ["right", "center", "justify"];
        schema.register_attributor(
            Attributor::attribute("align", "align", Scope::Block).with_whitelist(&align),
        );
        schema.register_attributor(
            Attributor::class("align", "ql-align", Scope::Block).with_whitelist(&align),
        );
        schema.register_attributor(
            Attributor::style("align", "text-align", Scope::Block).with_whitelist(&align),
        );

        schema.register_attributor(
            Attributor::attribute("direction", "dir", Scope::Block).with_whitelist(&["rtl"]),
        );
        schema.register_attributor(
            Attributor::class("direction", "ql-direction", Scope::Block).with_whitelist(&["rtl"]),
        );
        schema.register_attributor(
            Attributor::style("direction", "direction", Scope::Block).with_whitelist(&["rtl"]),
        );

        schema.register_attributor(
            Attributor::class("indent", "ql-indent", Scope::Block)
                .with_transform(ValueTransform::Indent),
        );

        schema.register_attributor(
            Attributor::style("color", "color", Scope::Inline)
                .with_transform(ValueTransform::RgbToHex),
        );
        schema.register_attributor(Attributor::class("color", "ql-color", Scope::Inline));
        schema.register_attributor(
            Attributor::style("background", "background-color", Scope::Inline)
                .with_transform(ValueTransform::RgbToHex),
        );
        schema.register_attributor(Attributor::class("background", "ql-bg", Scope::Inline));

        let fonts = ["serif", "monospace"];
        schema.register_attributor(
            Attributor::class("font", "ql-font", Scope::Inline).with_whitelist(&fonts),
        );
        schema.register_attributor(
            Attributor::style("font", "font-family", Scope::Inline)
                .with_transform(ValueTransform::Unquote)
                .with_whitelist(&fonts),
        );

        schema.register_attributor(
            Attributor::class("size", "ql-size", Scope::Inline)
                .with_whitelist(&["small", "large", "huge"]),
        );
        schema.register_attributor(
            Attributor::style("size", "font-size", Scope::Inline)
                .with_whitelist(&["10px", "18px", "32px"]),
        );

        schema
    }

    pub fn register_format(&mut self, spec: FormatSpec) {
        tracing::trace!(target: "weaver::format", name = %spec.name, "register format");
        self.formats.retain(|existing| existing.name != spec.name);
        self.formats.push(spec);
    }

    pub fn register_attributor(&mut self, attributor: Attributor) {
        self.attributors.retain(|existing| {
            !(existing.kind == attributor.kind && existing.key_name == attributor.key_name)
        });
        self.attributors.push(attributor);
    }
}

impl FormatRegistry for Schema {
    fn query_name(&self, name: &str, scope: Option<Scope>) -> Option<Format<'_>> {
        let scope_ok = |s: Scope| scope.is_none_or(|want| want == s);
        if let Some(spec) = self
            .formats
            .iter()
            .find(|spec| spec.name == name && scope_ok(spec.scope()))
        {
            return Some(Format::Blot(spec));
        }
        self.attributors
            .iter()
            .find(|attr| attr.attr_name == name && scope_ok(attr.scope))
            .map(Format::Attribute)
    }

    fn query_node(&self, node: MarkupNode<'_>) -> Option<&FormatSpec> {
        let by_class = self
            .formats
            .iter()
            .filter(|spec| spec.class_name.is_some())
            .find(|spec| spec.recognizes(node));
        by_class.or_else(|| {
            self.formats
                .iter()
                .filter(|spec| spec.class_name.is_none())
                .find(|spec| spec.recognizes(node))
        })
    }

    fn attributor(&self, kind: AttributorKind, key: &str) -> Option<&Attributor> {
        self.attributors
            .iter()
            .find(|attr| attr.kind == kind && attr.key_name.eq_ignore_ascii_case(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatKind;
    use crate::markup::MarkupTree;

    #[test]
    fn class_beats_tag() {
        let schema = Schema::standard();
        let tree = MarkupTree::parse(
            r#"<div class="ql-code-block" data-language="rust">x</div><div>y</div><p>z</p>"#,
        );
        let mut nodes = tree.root().children();
        let code = schema.query_node(nodes.next().unwrap()).unwrap();
        assert_eq!(code.name, "code-block");
        assert_eq!(code.formats(tree.root().first_child().unwrap()), Some(json!("rust")));
        assert!(schema.query_node(nodes.next().unwrap()).is_none());
        assert_eq!(schema.query_node(nodes.next().unwrap()).unwrap().name, "block");
    }

    #[test]
    fn headers_and_lists() {
        let schema = Schema::standard();
        let tree = MarkupTree::parse(r#"<h2>t</h2><ul><li data-list="checked">a</li><li>b</li></ul>"#);
        let h2 = tree.root().first_child().unwrap();
        let header = schema.query_node(h2).unwrap();
        assert_eq!(header.kind, FormatKind::Block);
        assert_eq!(header.formats(h2), Some(json!({ "value": 2, "fold": "unfold" })));

        let ul = tree.root().children().nth(1).unwrap();
        let items: Vec<_> = ul.children().collect();
        let list = schema.query_node(items[0]).unwrap();
        assert_eq!(list.name, "list");
        assert_eq!(
            list.formats(items[0]),
            Some(json!({ "value": "checked", "fold": "unfold" }))
        );
        assert_eq!(list.formats(items[1]), None);
    }

    #[test]
    fn embeds() {
        let schema = Schema::standard();
        let tree = MarkupTree::parse(r#"<img src="a.png" alt="pic"><hr>"#);
        let img = tree.root().first_child().unwrap();
        let image = schema.query_node(img).unwrap();
        assert!(image.is_embed() && !image.is_block_embed());
        assert_eq!(image.value(img), Some(json!("a.png")));
        assert_eq!(image.embed_attributes(img).get("alt"), Some(&json!("pic")));
        assert!(schema.is_block_embed("divider"));
        assert!(!schema.is_block_embed("image"));
    }

    #[test]
    fn name_queries_respect_scope() {
        let schema = Schema::standard();
        assert!(schema.query_name("indent", Some(Scope::Block)).is_some());
        assert!(schema.query_name("bold", Some(Scope::Block)).is_none());
        assert!(schema.query_name("list", Some(Scope::Block)).is_some());
        assert!(schema.query_name("color", Some(Scope::Inline)).is_some());
        assert!(schema.query_name("nope", None).is_none());
    }
}
