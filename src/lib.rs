//! Selector-driven visitor dispatch over XML.
//!
//! Bind [`Visitor`]s to selectors with a [`FilterBuilder`], then run the
//! resulting [`Filter`] over XML text, either streaming (only the window the
//! visitors need stays in memory) or over a fully parsed document.
pub mod cache;
pub mod dom_source;
pub mod error;
pub mod filter;
pub mod reader;

pub use cache::FilterCache;
pub use error::WeftError;
pub use filter::{Filter, FilterBuilder};

pub use weft_delivery::{
    Capabilities, DeliveryError, Document, EventCollector, ExecutionContext, ExecutionEvent,
    ExecutionEventListener, FilterSettings, FnVisitor, LoggingListener, NodeKind, TerminateVisitor,
    VisitError, VisitPhase, VisitResult, VisitSequence, Visitor,
};
pub use weft_selector::{AttributeCondition, FnCondition, NamespaceTable, SelectorError, SelectorPath};
pub use weft_types::{Attribute, NodeId, QName, StreamEvent};
