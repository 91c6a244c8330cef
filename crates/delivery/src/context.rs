//! Per-run state shared by the dispatcher and the visitors.
use crate::dom::{Document, NodeRef};
use crate::event::{ExecutionEvent, ExecutionEventListener, VisitSequence};
use crate::interceptor::writer::FragmentWriter;
use crate::memento::MementoCaretaker;
use crate::position::PositionTable;
use crate::settings::FilterSettings;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use weft_selector::{CounterId, MatchContext};
use weft_types::NodeId;

/// The first visitor failure of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationError {
    pub visitor: String,
    pub resource: String,
    pub location: String,
    pub sequence: VisitSequence,
    pub message: String,
}

impl fmt::Display for TerminationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' failed in {} for resource '{}' at '{}': {}",
            self.visitor, self.sequence, self.resource, self.location, self.message
        )
    }
}

pub struct ExecutionContext {
    source_id: String,
    settings: FilterSettings,
    document: Document,
    attributes: HashMap<TypeId, Box<dyn Any + Send>>,
    parameters: HashMap<String, String>,
    termination_error: Option<TerminationError>,
    listeners: Vec<Box<dyn ExecutionEventListener>>,
    mementos: MementoCaretaker,
    positions: PositionTable,
    output: String,
    terminated: bool,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("source_id", &self.source_id)
            .field("settings", &self.settings)
            .field("nodes", &self.document.len())
            .field("attributes", &self.attributes.len())
            .field("parameters", &self.parameters)
            .field("termination_error", &self.termination_error)
            .field("listeners", &self.listeners.len())
            .field("mementos", &self.mementos)
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(source_id: impl Into<String>, settings: FilterSettings) -> Self {
        Self {
            source_id: source_id.into(),
            settings,
            document: Document::new(),
            attributes: HashMap::new(),
            parameters: HashMap::new(),
            termination_error: None,
            listeners: Vec::new(),
            mementos: MementoCaretaker::new(),
            positions: PositionTable::new(),
            output: String::new(),
            terminated: false,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn set_document(&mut self, document: Document) {
        self.document = document;
    }

    pub fn take_document(&mut self) -> Document {
        std::mem::take(&mut self.document)
    }

    pub fn node_ref(&self, node: NodeId) -> NodeRef<'_> {
        self.document.node_ref(node)
    }

    /// Stores a typed attribute, returning the previous value of that type.
    pub fn put<T: Any + Send>(&mut self, value: T) -> Option<T> {
        self.attributes
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send>(&self) -> Option<&T> {
        self.attributes.get(&TypeId::of::<T>())?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.attributes.get_mut(&TypeId::of::<T>())?.downcast_mut::<T>()
    }

    pub fn get_or_default<T: Any + Send + Default>(&mut self) -> &mut T {
        let slot = self
            .attributes
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::default()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("attributes are keyed by their TypeId"),
        }
    }

    pub fn remove<T: Any + Send>(&mut self) -> Option<T> {
        self.attributes
            .remove(&TypeId::of::<T>())?
            .downcast::<T>()
            .ok()
            .map(|value| *value)
    }

    /// Sets a string attribute that selector conditions can read.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn termination_error(&self) -> Option<&TerminationError> {
        self.termination_error.as_ref()
    }

    /// Records a failure. Only the first one of a run is kept.
    pub fn set_termination_error(&mut self, error: TerminationError) {
        if self.termination_error.is_none() {
            self.termination_error = Some(error);
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn ExecutionEventListener>) {
        self.listeners.push(listener);
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    pub fn fire(&mut self, event: ExecutionEvent) {
        for listener in &mut self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn mementos(&self) -> &MementoCaretaker {
        &self.mementos
    }

    pub fn mementos_mut(&mut self) -> &mut MementoCaretaker {
        &mut self.mementos
    }

    pub fn positions(&self) -> &PositionTable {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut PositionTable {
        &mut self.positions
    }

    /// The writer visitors emit output to. Inside a fragment owned by a
    /// stream-writing visitor this is the fragment's own buffer.
    pub fn writer_mut(&mut self) -> &mut String {
        &mut self.output
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub(crate) fn mark_terminated(&mut self) {
        self.terminated = true;
    }

    /// Releases everything held for `node`. Fragment writers that are still
    /// open are flushed into the writer they replaced.
    pub fn forget(&mut self, node: NodeId) {
        for memento in self.mementos.forget(node) {
            if let Ok(writer) = memento.downcast::<FragmentWriter>() {
                writer.close(&mut self.output);
            }
        }
        self.positions.forget(node);
    }
}

impl MatchContext for ExecutionContext {
    fn element_position(&self, counter: CounterId, node: NodeId) -> Option<usize> {
        self.positions.position(counter, node)
    }

    fn attribute_value(&self, name: &str) -> Option<String> {
        self.parameters.get(name).cloned()
    }
}
