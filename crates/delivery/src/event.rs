//! Execution events delivered to listeners attached to an execution context.
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use weft_types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VisitSequence {
    Before,
    Children,
    After,
    PostFragment,
}

impl fmt::Display for VisitSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VisitSequence::Before => "before",
            VisitSequence::Children => "children",
            VisitSequence::After => "after",
            VisitSequence::PostFragment => "post-fragment",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionEvent {
    /// An element was opened. `node` is `None` for elements that were not materialized.
    StartFragment { node: Option<NodeId>, name: String },
    EndFragment { node: Option<NodeId>, name: String },
    CharacterData { node: NodeId, parent: NodeId },
    ResourceTargeted {
        node: NodeId,
        resource: String,
        visitor: String,
        sequence: VisitSequence,
    },
    VisitFailure {
        node: NodeId,
        location: String,
        visitor: String,
        resource: String,
        sequence: VisitSequence,
        message: String,
    },
}

pub trait ExecutionEventListener: Send {
    fn on_event(&mut self, event: &ExecutionEvent);
}

/// Writes every event to the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl ExecutionEventListener for LoggingListener {
    fn on_event(&mut self, event: &ExecutionEvent) {
        log::debug!("execution event: {:?}", event);
    }
}

/// Collects events for later inspection, e.g. to build a report after a
/// best-effort run. Clones share the same event list.
#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<ExecutionEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ExecutionEvent::VisitFailure { .. }))
            .collect()
    }

    /// Serializes the collected events as a JSON array.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.events())
    }
}

impl ExecutionEventListener for EventCollector {
    fn on_event(&mut self, event: &ExecutionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_clones_share_events() {
        let collector = EventCollector::new();
        let mut handle = collector.clone();
        handle.on_event(&ExecutionEvent::StartFragment {
            node: Some(NodeId::new(0)),
            name: "order".into(),
        });
        handle.on_event(&ExecutionEvent::VisitFailure {
            node: NodeId::new(0),
            location: "/order".into(),
            visitor: "V".into(),
            resource: "order".into(),
            sequence: VisitSequence::After,
            message: "boom".into(),
        });
        assert_eq!(collector.events().len(), 2);
        assert_eq!(collector.failures().len(), 1);
        assert!(collector.to_json().unwrap().contains("VisitFailure"));
    }
}
