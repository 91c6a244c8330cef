//! Visitor dispatch for streamed and in-memory documents.
//!
//! Visitors are bound to selectors, indexed by element name and driven
//! either from a stream of events ([`StreamingDispatcher`]) or over a
//! complete [`Document`] ([`DomDispatcher`]).
pub mod binding;
pub mod context;
mod dispatch;
pub mod dom;
pub mod error;
pub mod event;
pub mod index;
pub mod interceptor;
pub mod memento;
pub mod position;
pub mod settings;
pub mod sorter;
pub mod stream;
pub mod text;
pub mod visitor;
pub mod visitors;

pub use binding::{ResourceConfig, VisitorBinding};
pub use context::{ExecutionContext, TerminationError};
pub use dom::{Document, DomBuilder, DomDispatcher, Element, NodeKind, NodeRef};
pub use error::{DeliveryError, VisitError, VisitResult};
pub use event::{EventCollector, ExecutionEvent, ExecutionEventListener, LoggingListener, VisitSequence};
pub use index::{ElementBindings, VisitorBindingIndex};
pub use interceptor::{
    ExceptionInterceptor, Interceptor, InterceptorChain, InterceptorVisitor, Link,
    StreamWriterInterceptor, TextAccumulatingInterceptor, VisitCall,
};
pub use memento::MementoCaretaker;
pub use position::{PositionCounter, PositionTable};
pub use settings::FilterSettings;
pub use stream::{DispatchState, StreamingDispatcher};
pub use visitor::{Capabilities, FnVisitor, VisitPhase, Visitor};
pub use visitors::TerminateVisitor;
