//! Drives a [`StreamEventHandler`] from XML text with quick-xml.
use crate::error::WeftError;
use quick_xml::NsReader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use weft_types::{Attribute, QName, StreamEventHandler};

/// Reads `xml` to the end, or until the handler reports it has terminated,
/// and returns the handler's output.
///
/// Namespace prefixes are resolved as the reader goes. Named entity
/// references are reported between `start_entity` and `end_entity`;
/// character references are plain text.
pub fn run_event_loop<H>(xml: &str, handler: &mut H) -> Result<H::Output, WeftError>
where
    H: StreamEventHandler,
    WeftError: From<H::Error>,
{
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    handler.start_document()?;
    loop {
        if handler.is_terminated() {
            break;
        }
        let position = reader.buffer_position();
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|e| parse_error(position, e))?;
        let namespace = namespace_uri(&namespace);
        match event {
            Event::Start(e) => {
                let (name, attributes) = element(&reader, namespace, &e, position)?;
                handler.start_element(&name, &attributes)?;
            }
            Event::Empty(e) => {
                let (name, attributes) = element(&reader, namespace, &e, position)?;
                handler.start_element(&name, &attributes)?;
                if !handler.is_terminated() {
                    handler.end_element(&name)?;
                }
            }
            Event::End(e) => {
                let name = qualified(namespace, e.name());
                handler.end_element(&name)?;
            }
            Event::Text(e) => {
                let text = e.decode().map_err(|e| parse_error(position, e))?;
                if !text.is_empty() {
                    handler.text(&text)?;
                }
            }
            Event::CData(e) => {
                let text = e.decode().map_err(|e| parse_error(position, e))?;
                handler.start_cdata()?;
                handler.text(&text)?;
                handler.end_cdata()?;
            }
            Event::GeneralRef(e) => {
                if let Some(c) = e.resolve_char_ref().map_err(|e| parse_error(position, e))? {
                    handler.text(c.encode_utf8(&mut [0; 4]))?;
                    continue;
                }
                let entity = e.decode().map_err(|e| parse_error(position, e))?;
                let Some(replacement) = resolve_predefined_entity(&entity) else {
                    return Err(WeftError::xml(format!(
                        "Unresolved entity reference '&{};' at position {}",
                        entity, position
                    )));
                };
                handler.start_entity(&entity)?;
                handler.text(replacement)?;
                handler.end_entity(&entity)?;
            }
            Event::Comment(e) => {
                let text = e.decode().map_err(|e| parse_error(position, e))?;
                handler.comment(&text)?;
            }
            Event::PI(e) => {
                let target = String::from_utf8_lossy(e.target()).into_owned();
                let data = String::from_utf8_lossy(e.content()).trim().to_string();
                handler.processing_instruction(&target, &data)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(handler.end_document()?)
}

fn parse_error(position: u64, err: impl std::fmt::Display) -> WeftError {
    WeftError::xml(format!("Error parsing XML at position {}: {}", position, err))
}

fn namespace_uri(result: &ResolveResult<'_>) -> Option<String> {
    match result {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

fn qualified(namespace: Option<String>, name: quick_xml::name::QName<'_>) -> QName {
    let prefix = name
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let local = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();
    QName::with_namespace(prefix, local, namespace)
}

fn element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<(QName, Vec<Attribute>), WeftError> {
    let name = qualified(namespace, start.name());
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(position, e))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        // Unprefixed attributes are in no namespace.
        let namespace = match attr.key.prefix() {
            Some(_) => namespace_uri(&reader.resolve_attribute(attr.key).0),
            None => None,
        };
        let value = attr
            .unescape_value()
            .map_err(|e| parse_error(position, e))?
            .into_owned();
        attributes.push(Attribute {
            name: qualified(namespace, attr.key),
            value,
        });
    }
    Ok((name, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_delivery::{Document, DomBuilder, NodeKind};

    fn build(xml: &str) -> Document {
        run_event_loop(xml, &mut DomBuilder::new(true)).unwrap()
    }

    #[test]
    fn resolves_namespaces_on_elements_and_attributes() {
        let doc = build(r#"<o:order xmlns:o="urn:orders" o:id="7" plain="x"><o:item/></o:order>"#);
        let root = doc.root().unwrap();
        let name = doc.name(root).unwrap();
        assert_eq!(name.local_name, "order");
        assert_eq!(name.prefix.as_deref(), Some("o"));
        assert_eq!(name.namespace(), Some("urn:orders"));
        assert_eq!(doc.attribute(root, Some("urn:orders"), "id"), Some("7"));
        assert_eq!(doc.attribute(root, None, "plain"), Some("x"));
        // The xmlns binding itself is not an attribute.
        assert_eq!(doc.element(root).unwrap().attributes.len(), 2);
        let item = doc.children(root)[0];
        assert_eq!(doc.name(item).unwrap().namespace(), Some("urn:orders"));
    }

    #[test]
    fn entity_and_character_references_become_text() {
        let doc = build("<a>x &amp; y &#65;<![CDATA[<raw>]]></a>");
        let root = doc.root().unwrap();
        assert_eq!(doc.text(root), "x & y A<raw>");
        let last = *doc.children(root).last().unwrap();
        assert_eq!(doc.kind(last), Some(&NodeKind::CData("<raw>".into())));
    }

    #[test]
    fn entities_can_be_kept_encoded() {
        let doc = run_event_loop("<a>&lt;b&gt;</a>", &mut DomBuilder::new(false)).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.text(root), "&#60;b&#62;");
    }

    #[test]
    fn malformed_input_is_an_xml_error() {
        let err = run_event_loop("<a><b></a>", &mut DomBuilder::new(true)).unwrap_err();
        assert!(matches!(err, WeftError::Xml(_)));
    }
}
