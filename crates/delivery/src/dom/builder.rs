use super::{Document, NodeKind};
use crate::error::DeliveryError;
use crate::text::{TextType, encode_character_references};
use weft_types::{Attribute, NodeId, QName, StreamEventHandler};

/// Builds a complete [`Document`] from a stream of events.
#[derive(Debug, Default)]
pub struct DomBuilder {
    document: Document,
    stack: Vec<NodeId>,
    text_type: TextType,
    cdata: String,
    rewrite_entities: bool,
}

impl DomBuilder {
    pub fn new(rewrite_entities: bool) -> Self {
        Self {
            rewrite_entities,
            ..Self::default()
        }
    }

    fn append(&mut self, kind: NodeKind) {
        let Some(&parent) = self.stack.last() else {
            // Character data outside the root element is dropped.
            return;
        };
        let node = self.document.create(kind);
        self.document.append_child(parent, node);
    }
}

impl StreamEventHandler for DomBuilder {
    type Output = Document;
    type Error = DeliveryError;

    fn start_document(&mut self) -> Result<(), DeliveryError> {
        self.document = Document::new();
        self.stack.clear();
        Ok(())
    }

    fn end_document(&mut self) -> Result<Document, DeliveryError> {
        if !self.stack.is_empty() {
            return Err(DeliveryError::source(format!(
                "document ended with {} unclosed element(s)",
                self.stack.len()
            )));
        }
        Ok(std::mem::take(&mut self.document))
    }

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), DeliveryError> {
        let node = self.document.create_element(name.clone(), attributes.to_vec());
        match self.stack.last() {
            Some(&parent) => self.document.append_child(parent, node),
            None if self.document.root().is_none() => self.document.set_root(node),
            None => {
                return Err(DeliveryError::source(format!(
                    "second root element <{}>",
                    name
                )));
            }
        }
        self.stack.push(node);
        Ok(())
    }

    fn end_element(&mut self, name: &QName) -> Result<(), DeliveryError> {
        match self.stack.pop() {
            Some(_) => Ok(()),
            None => Err(DeliveryError::source(format!("unexpected </{}>", name))),
        }
    }

    fn text(&mut self, content: &str) -> Result<(), DeliveryError> {
        match self.text_type {
            TextType::CData => self.cdata.push_str(content),
            TextType::Entity if !self.rewrite_entities => {
                self.append(NodeKind::Text(encode_character_references(content)))
            }
            _ => self.append(NodeKind::Text(content.to_string())),
        }
        Ok(())
    }

    fn comment(&mut self, content: &str) -> Result<(), DeliveryError> {
        self.append(NodeKind::Comment(content.to_string()));
        Ok(())
    }

    fn start_cdata(&mut self) -> Result<(), DeliveryError> {
        self.text_type = TextType::CData;
        self.cdata.clear();
        Ok(())
    }

    fn end_cdata(&mut self) -> Result<(), DeliveryError> {
        self.text_type = TextType::Text;
        let content = std::mem::take(&mut self.cdata);
        self.append(NodeKind::CData(content));
        Ok(())
    }

    fn start_entity(&mut self, _name: &str) -> Result<(), DeliveryError> {
        self.text_type = TextType::Entity;
        Ok(())
    }

    fn end_entity(&mut self, _name: &str) -> Result<(), DeliveryError> {
        self.text_type = TextType::Text;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::StreamEvent;

    fn build(events: &[StreamEvent], rewrite_entities: bool) -> Result<Document, DeliveryError> {
        let mut builder = DomBuilder::new(rewrite_entities);
        builder.start_document()?;
        for event in events {
            event.feed(&mut builder)?;
        }
        builder.end_document()
    }

    #[test]
    fn builds_nested_elements_and_text() {
        let doc = build(
            &[
                StreamEvent::start("a"),
                StreamEvent::start("b"),
                StreamEvent::text("hello"),
                StreamEvent::end("b"),
                StreamEvent::Comment("note".into()),
                StreamEvent::end("a"),
            ],
            true,
        )
        .unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.name(root).unwrap().local_name, "a");
        assert_eq!(doc.children(root).len(), 2);
        assert_eq!(doc.text_content(root), "hello");
    }

    #[test]
    fn cdata_is_one_node_and_entities_may_be_encoded() {
        let doc = build(
            &[
                StreamEvent::start("a"),
                StreamEvent::StartCData,
                StreamEvent::text("x<"),
                StreamEvent::text("y"),
                StreamEvent::EndCData,
                StreamEvent::StartEntity("amp".into()),
                StreamEvent::text("&"),
                StreamEvent::EndEntity("amp".into()),
                StreamEvent::end("a"),
            ],
            false,
        )
        .unwrap();
        let root = doc.root().unwrap();
        let children = doc.children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.kind(children[0]), Some(&NodeKind::CData("x<y".into())));
        assert_eq!(doc.character_data(children[1]), Some("&#38;"));
    }

    #[test]
    fn unbalanced_input_is_an_error() {
        assert!(build(&[StreamEvent::start("a")], true).is_err());
        assert!(build(&[StreamEvent::end("a")], true).is_err());
    }
}
