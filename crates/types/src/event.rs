//! The push-based event model shared by event sources and dispatchers.

use crate::name::{Attribute, QName};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    StartDocument,
    EndDocument,
    StartElement {
        name: QName,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: QName,
    },
    Text(String),
    Comment(String),
    StartCData,
    EndCData,
    StartEntity(String),
    EndEntity(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
}

impl StreamEvent {
    pub fn start(name: impl Into<String>) -> Self {
        StreamEvent::StartElement {
            name: QName::new(name),
            attributes: vec![],
        }
    }

    pub fn end(name: impl Into<String>) -> Self {
        StreamEvent::EndElement {
            name: QName::new(name),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text(content.into())
    }

    pub fn is_start_element(&self) -> bool {
        matches!(self, StreamEvent::StartElement { .. })
    }

    pub fn is_end_element(&self) -> bool {
        matches!(self, StreamEvent::EndElement { .. })
    }

    pub fn element_name(&self) -> Option<&QName> {
        match self {
            StreamEvent::StartElement { name, .. } => Some(name),
            StreamEvent::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Replays this event into `handler`. `EndDocument` is not replayed here
    /// because it produces the handler's output; call `end_document` directly.
    pub fn feed<H: StreamEventHandler + ?Sized>(&self, handler: &mut H) -> Result<(), H::Error> {
        match self {
            StreamEvent::StartDocument => handler.start_document(),
            StreamEvent::EndDocument => Ok(()),
            StreamEvent::StartElement { name, attributes } => handler.start_element(name, attributes),
            StreamEvent::EndElement { name } => handler.end_element(name),
            StreamEvent::Text(content) => handler.text(content),
            StreamEvent::Comment(content) => handler.comment(content),
            StreamEvent::StartCData => handler.start_cdata(),
            StreamEvent::EndCData => handler.end_cdata(),
            StreamEvent::StartEntity(name) => handler.start_entity(name),
            StreamEvent::EndEntity(name) => handler.end_entity(name),
            StreamEvent::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data)
            }
        }
    }
}

/// Receives a well-nested stream of document events.
///
/// Sources assume, but do not verify, that start and end events are balanced.
pub trait StreamEventHandler {
    type Output;
    type Error;

    fn start_document(&mut self) -> Result<(), Self::Error>;
    fn end_document(&mut self) -> Result<Self::Output, Self::Error>;

    fn start_element(&mut self, name: &QName, attributes: &[Attribute]) -> Result<(), Self::Error>;
    fn end_element(&mut self, name: &QName) -> Result<(), Self::Error>;

    fn text(&mut self, content: &str) -> Result<(), Self::Error>;
    fn comment(&mut self, content: &str) -> Result<(), Self::Error>;

    fn start_cdata(&mut self) -> Result<(), Self::Error>;
    fn end_cdata(&mut self) -> Result<(), Self::Error>;

    /// Text delivered between `start_entity` and `end_entity` is the
    /// replacement text of the named entity reference.
    fn start_entity(&mut self, name: &str) -> Result<(), Self::Error>;
    fn end_entity(&mut self, name: &str) -> Result<(), Self::Error>;

    fn processing_instruction(&mut self, _target: &str, _data: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Sources stop pushing events once this returns true.
    fn is_terminated(&self) -> bool {
        false
    }
}
