//! Builds a [`Document`] from a roxmltree parse.
use crate::error::WeftError;
use weft_delivery::{Document, NodeKind};
use weft_types::{Attribute, NodeId, QName};

/// Parses `xml` with roxmltree and copies the element tree into a new
/// [`Document`]. DTDs are allowed, so entities they declare are expanded.
pub fn parse_document(xml: &str) -> Result<Document, WeftError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let source = roxmltree::Document::parse_with_options(xml, options)?;
    Ok(from_roxmltree(&source))
}

/// Processing instructions are not copied.
pub fn from_roxmltree(source: &roxmltree::Document<'_>) -> Document {
    let mut document = Document::new();
    let root = copy_element(&mut document, source.root_element());
    document.set_root(root);

    let mut pending = vec![(source.root_element(), root)];
    while let Some((node, target)) = pending.pop() {
        for child in node.children() {
            let copied = if child.is_element() {
                let copied = copy_element(&mut document, child);
                pending.push((child, copied));
                copied
            } else if child.is_text() {
                document.create(NodeKind::Text(child.text().unwrap_or_default().to_string()))
            } else if child.is_comment() {
                document.create(NodeKind::Comment(child.text().unwrap_or_default().to_string()))
            } else {
                continue;
            };
            document.append_child(target, copied);
        }
    }
    document
}

fn copy_element(document: &mut Document, node: roxmltree::Node<'_, '_>) -> NodeId {
    let tag = node.tag_name();
    let name = QName::with_namespace(
        prefix_for(node, tag.namespace()),
        tag.name(),
        tag.namespace().map(str::to_string),
    );
    let attributes = node
        .attributes()
        .map(|a| Attribute {
            name: QName::with_namespace(
                prefix_for(node, a.namespace()),
                a.name(),
                a.namespace().map(str::to_string),
            ),
            value: a.value().to_string(),
        })
        .collect();
    document.create_element(name, attributes)
}

fn prefix_for(node: roxmltree::Node<'_, '_>, namespace: Option<&str>) -> Option<String> {
    namespace
        .and_then(|ns| node.lookup_prefix(ns))
        .filter(|prefix| !prefix.is_empty())
        .map(str::to_string)
}
