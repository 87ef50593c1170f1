//! Chapter content trees and the markup renderer.
//!
//! The API returns chapter bodies as a nested document (`{"type": "doc", "content": [...]}`)
//! plus a list of attachments that image nodes point at. [render] walks the tree once,
//! depth-first, and concatenates markup in document order.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Container node kinds. Each wraps its rendered children in one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Paragraph,
    OrderedList,
    ListItem,
    Blockquote,
    Italic,
    Bold,
    Underline,
    Heading,
}

impl Container {
    fn from_type(node_type: &str) -> Option<Self> {
        match node_type {
            "paragraph" => Some(Container::Paragraph),
            "orderedList" => Some(Container::OrderedList),
            "listItem" => Some(Container::ListItem),
            "blockquote" => Some(Container::Blockquote),
            "italic" => Some(Container::Italic),
            "bold" => Some(Container::Bold),
            "underline" => Some(Container::Underline),
            "heading" => Some(Container::Heading),
            _ => None,
        }
    }

    /// Tag name used for the wrapping element.
    pub fn tag(self) -> &'static str {
        match self {
            Container::Paragraph => "p",
            Container::OrderedList => "ol",
            Container::ListItem => "li",
            Container::Blockquote => "blockquote",
            Container::Italic => "i",
            Container::Bold => "b",
            Container::Underline => "u",
            Container::Heading => "h2",
        }
    }
}

/// One node of a content tree.
///
/// Unrecognized `type` values are kept whole in [ContentNode::Unknown] so they can be
/// dumped instead of failing the render.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentNode {
    Text(String),
    HardBreak,
    HorizontalRule,
    /// `attrs` of the image node, if it had an attrs object.
    Image(Option<Map<String, Value>>),
    Container {
        kind: Container,
        content: Option<Vec<ContentNode>>,
    },
    Unknown(Value),
}

impl ContentNode {
    /// Classify a raw JSON node. Never fails: anything unexpected becomes `Unknown`.
    pub fn from_value(value: &Value) -> ContentNode {
        let node_type = value.get("type").and_then(Value::as_str).unwrap_or_default();
        match node_type {
            "text" => ContentNode::Text(
                value
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            "hardBreak" => ContentNode::HardBreak,
            "horizontalRule" => ContentNode::HorizontalRule,
            "image" => ContentNode::Image(value.get("attrs").and_then(Value::as_object).cloned()),
            other => match Container::from_type(other) {
                Some(kind) => ContentNode::Container {
                    kind,
                    content: value
                        .get("content")
                        .and_then(Value::as_array)
                        .map(|nodes| nodes.iter().map(ContentNode::from_value).collect()),
                },
                None => ContentNode::Unknown(value.clone()),
            },
        }
    }

    /// Parse a JSON array of nodes. A non-array value yields no nodes.
    pub fn list_from_value(value: &Value) -> Vec<ContentNode> {
        value
            .as_array()
            .map(|nodes| nodes.iter().map(ContentNode::from_value).collect())
            .unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for ContentNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ContentNode::from_value(&value))
    }
}

/// File attached to a chapter; image nodes reference it by `name` or `id`.
///
/// Fields that are null or not scalars decode as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attachment {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub url: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_key))
}

/// String form of a scalar used as a lookup key (strings as-is, numbers in decimal).
fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A content tree together with the attachments it may reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub nodes: Vec<ContentNode>,
    pub attachments: Vec<Attachment>,
}

impl Document {
    pub fn render(&self) -> String {
        render(&self.nodes, &self.attachments)
    }
}

/// Render a node sequence to markup.
pub fn render(nodes: &[ContentNode], attachments: &[Attachment]) -> String {
    let mut out = String::new();
    render_into(nodes, attachments, &mut out);
    out
}

fn render_into(nodes: &[ContentNode], attachments: &[Attachment], out: &mut String) {
    for node in nodes {
        match node {
            ContentNode::HardBreak => out.push_str("<br>"),
            ContentNode::HorizontalRule => out.push_str("<hr>"),
            ContentNode::Image(attrs) => render_image(attrs.as_ref(), attachments, out),
            ContentNode::Container { kind, content } => {
                let tag = kind.tag();
                out.push('<');
                out.push_str(tag);
                out.push('>');
                match content.as_deref() {
                    Some(children) if !children.is_empty() => {
                        render_into(children, attachments, out)
                    }
                    _ => out.push_str("<br>"),
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            ContentNode::Text(text) => out.push_str(text),
            ContentNode::Unknown(raw) => out.push_str(&dump_node(raw)),
        }
    }
}

fn render_image(attrs: Option<&Map<String, Value>>, attachments: &[Attachment], out: &mut String) {
    let Some(attrs) = attrs else {
        return;
    };
    let images = attrs
        .get("images")
        .and_then(Value::as_array)
        .filter(|images| !images.is_empty());
    match images {
        Some(images) => {
            for entry in images {
                let Some(key) = entry.get("image").and_then(scalar_key) else {
                    continue;
                };
                if let Some(url) = find_attachment(attachments, &key).and_then(|a| a.url.as_deref()) {
                    out.push_str("<img src='");
                    out.push_str(url);
                    out.push_str("'>");
                }
            }
        }
        None => {
            // Legacy shape: pairs are joined with "; ", which is not valid markup but is kept as-is.
            let pairs: Vec<String> = attrs
                .iter()
                .filter(|(_, value)| is_present(value))
                .map(|(key, value)| format!("{}=\"{}\"", key, attr_text(value)))
                .collect();
            out.push_str("<img ");
            out.push_str(&pairs.join("; "));
            out.push('>');
        }
    }
}

/// Attachments without a url never match.
fn find_attachment<'a>(attachments: &'a [Attachment], key: &str) -> Option<&'a Attachment> {
    let usable = || attachments.iter().filter(|a| a.url.as_deref().is_some_and(|u| !u.is_empty()));
    usable()
        .find(|a| a.name.as_deref() == Some(key))
        .or_else(|| usable().find(|a| a.id.as_deref() == Some(key)))
}

/// Null and empty strings/arrays/objects are absent; `0` and `false` are kept.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn attr_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Tab-indented JSON dump of a node, keys in their original order.
fn dump_node(raw: &Value) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match serde::Serialize::serialize(raw, &mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nodes(value: Value) -> Vec<ContentNode> {
        ContentNode::list_from_value(&value)
    }

    fn attachment(id: &str, name: &str, url: &str) -> Attachment {
        Attachment {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn paragraph_with_text() {
        let tree = nodes(json!([{"type": "paragraph", "content": [{"type": "text", "text": "Hi"}]}]));
        assert_eq!(render(&tree, &[]), "<p>Hi</p>");
    }

    #[test]
    fn containers_map_to_tags() {
        let tree = nodes(json!([
            {"type": "heading", "content": [{"type": "text", "text": "T"}]},
            {"type": "orderedList", "content": [
                {"type": "listItem", "content": [{"type": "text", "text": "a"}]}
            ]},
            {"type": "blockquote", "content": [
                {"type": "bold", "content": [{"type": "text", "text": "b"}]},
                {"type": "italic", "content": [{"type": "text", "text": "i"}]},
                {"type": "underline", "content": [{"type": "text", "text": "u"}]}
            ]}
        ]));
        assert_eq!(
            render(&tree, &[]),
            "<h2>T</h2><ol><li>a</li></ol><blockquote><b>b</b><i>i</i><u>u</u></blockquote>"
        );
    }

    #[test]
    fn breaks_and_rules() {
        let tree = nodes(json!([
            {"type": "text", "text": "a"},
            {"type": "hardBreak"},
            {"type": "text", "text": "b"},
            {"type": "horizontalRule"}
        ]));
        assert_eq!(render(&tree, &[]), "a<br>b<hr>");
    }

    #[test]
    fn missing_or_empty_content_renders_line_break() {
        let tree = nodes(json!([
            {"type": "paragraph"},
            {"type": "paragraph", "content": []},
            {"type": "listItem", "content": null}
        ]));
        assert_eq!(render(&tree, &[]), "<p><br></p><p><br></p><li><br></li>");
    }

    #[test]
    fn text_is_not_escaped() {
        let tree = nodes(json!([{"type": "text", "text": "<b>&amp;</b>"}]));
        assert_eq!(render(&tree, &[]), "<b>&amp;</b>");
    }

    #[test]
    fn image_list_resolves_attachments_in_entry_order() {
        let attachments = vec![
            attachment("1", "first.png", "https://cdn/1.png"),
            attachment("2", "second.png", "https://cdn/2.png"),
        ];
        let tree = nodes(json!([{"type": "image", "attrs": {"images": [
            {"image": "second.png"},
            {"image": "missing.png"},
            {"image": "1"}
        ]}}]));
        assert_eq!(
            render(&tree, &attachments),
            "<img src='https://cdn/2.png'><img src='https://cdn/1.png'>"
        );
    }

    #[test]
    fn image_lookup_prefers_name_over_id() {
        let attachments = vec![
            attachment("7", "other.png", "https://cdn/by-id.png"),
            attachment("8", "7", "https://cdn/by-name.png"),
        ];
        let tree = nodes(json!([{"type": "image", "attrs": {"images": [{"image": "7"}]}}]));
        assert_eq!(render(&tree, &attachments), "<img src='https://cdn/by-name.png'>");
    }

    #[test]
    fn attachment_without_url_falls_through_to_id_match() -> Result<(), serde_json::Error> {
        let attachments: Vec<Attachment> = serde_json::from_value(json!([
            {"id": 1, "name": "5", "url": null},
            {"id": 5, "name": 9, "url": "https://cdn/5.png"}
        ]))?;
        assert_eq!(attachments[1].name.as_deref(), Some("9"));
        let tree = nodes(json!([{"type": "image", "attrs": {"images": [{"image": "5"}, {"image": 1}]}}]));
        assert_eq!(render(&tree, &attachments), "<img src='https://cdn/5.png'>");
        Ok(())
    }

    #[test]
    fn numeric_attachment_id_matches() -> Result<(), serde_json::Error> {
        let attachments: Vec<Attachment> =
            serde_json::from_value(json!([{"id": 42, "name": "x.jpg", "url": "https://cdn/42.jpg"}]))?;
        let tree = nodes(json!([{"type": "image", "attrs": {"images": [{"image": 42}]}}]));
        assert_eq!(render(&tree, &attachments), "<img src='https://cdn/42.jpg'>");
        Ok(())
    }

    #[test]
    fn image_without_list_dumps_present_attrs() {
        let tree = nodes(json!([{"type": "image", "attrs": {
            "src": "https://cdn/a.png",
            "alt": "",
            "title": null,
            "width": 0,
            "lazy": false
        }}]));
        assert_eq!(
            render(&tree, &[]),
            "<img src=\"https://cdn/a.png\"; width=\"0\"; lazy=\"false\">"
        );
    }

    #[test]
    fn image_with_empty_list_falls_through_to_attr_dump() {
        let tree = nodes(json!([{"type": "image", "attrs": {"images": [], "src": "a.png"}}]));
        assert_eq!(render(&tree, &[]), "<img src=\"a.png\">");
    }

    #[test]
    fn image_without_attrs_renders_nothing() {
        let tree = nodes(json!([{"type": "image"}]));
        assert_eq!(render(&tree, &[]), "");
    }

    #[test]
    fn unknown_node_is_dumped_with_tabs() -> Result<(), serde_json::Error> {
        let raw = json!({"type": "codeBlock", "attrs": {"language": "rust"}});
        let tree = nodes(json!([raw.clone()]));
        let out = render(&tree, &[]);
        assert!(out.contains("\n\t\"type\": \"codeBlock\""));
        assert!(out.starts_with("{\n\t\"type\""));
        let parsed: Value = serde_json::from_str(&out)?;
        assert_eq!(parsed, raw);
        Ok(())
    }

    #[test]
    fn unknown_node_nested_in_container() {
        let tree = nodes(json!([{"type": "paragraph", "content": [
            {"type": "text", "text": "x"},
            {"type": "mention"}
        ]}]));
        assert_eq!(render(&tree, &[]), "<p>x{\n\t\"type\": \"mention\"\n}</p>");
    }

    #[test]
    fn render_preserves_sibling_order() {
        let a = json!({"type": "paragraph", "content": [{"type": "text", "text": "A"}]});
        let b = json!({"type": "hardBreak"});
        let c = json!({"type": "heading", "content": [{"type": "text", "text": "C"}]});
        let forward = render(&nodes(json!([a, b, c])), &[]);
        let reversed = render(&nodes(json!([c, b, a])), &[]);
        assert_eq!(forward, "<p>A</p><br><h2>C</h2>");
        assert_eq!(reversed, "<h2>C</h2><br><p>A</p>");
    }

    #[test]
    fn document_deserializes_nodes() -> Result<(), serde_json::Error> {
        let tree: Vec<ContentNode> = serde_json::from_value(json!([
            {"type": "text", "text": "t"},
            {"type": "whatever", "x": 1}
        ]))?;
        assert_eq!(tree[0], ContentNode::Text("t".to_string()));
        assert!(matches!(tree[1], ContentNode::Unknown(_)));
        let doc = Document {
            nodes: tree,
            attachments: Vec::new(),
        };
        assert!(doc.render().starts_with("t{"));
        Ok(())
    }
}
