//! Wrappers that run around a visitor's callbacks.
//!
//! An [`InterceptorVisitor`] is itself a [`Visitor`], so interceptors nest:
//! the chain for a binding is built once and every link knows the next link
//! and which callbacks that link actually supports.
mod exception;
mod text;
pub(crate) mod writer;

pub use exception::{ExceptionInterceptor, report_visit_failure};
pub use text::TextAccumulatingInterceptor;
pub use writer::StreamWriterInterceptor;

use crate::binding::ResourceConfig;
use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::event::VisitSequence;
use crate::visitor::{Capabilities, VisitPhase, Visitor};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use weft_types::NodeId;

/// One pending visitor callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitCall {
    Before { element: NodeId },
    ChildText { element: NodeId, text: NodeId },
    ChildElement { element: NodeId, child: NodeId },
    After { element: NodeId },
    PostFragment { element: NodeId },
}

impl VisitCall {
    /// The element the callback is about; for child calls, the parent.
    pub fn element(&self) -> NodeId {
        match *self {
            VisitCall::Before { element }
            | VisitCall::ChildText { element, .. }
            | VisitCall::ChildElement { element, .. }
            | VisitCall::After { element }
            | VisitCall::PostFragment { element } => element,
        }
    }

    pub fn sequence(&self) -> VisitSequence {
        match self {
            VisitCall::Before { .. } => VisitSequence::Before,
            VisitCall::ChildText { .. } | VisitCall::ChildElement { .. } => VisitSequence::Children,
            VisitCall::After { .. } => VisitSequence::After,
            VisitCall::PostFragment { .. } => VisitSequence::PostFragment,
        }
    }

    pub fn invoke(self, visitor: &dyn Visitor, ctx: &mut ExecutionContext) -> VisitResult {
        match self {
            VisitCall::Before { element } => visitor.visit_before(element, ctx),
            VisitCall::ChildText { element, text } => visitor.visit_child_text(element, text, ctx),
            VisitCall::ChildElement { element, child } => {
                visitor.visit_child_element(element, child, ctx)
            }
            VisitCall::After { element } => visitor.visit_after(element, ctx),
            VisitCall::PostFragment { element } => visitor.on_post_fragment(element, ctx),
        }
    }
}

/// The next visitor in a chain, with its capabilities resolved.
#[derive(Debug, Clone)]
pub struct Link {
    visitor: Arc<dyn Visitor>,
    capabilities: Capabilities,
}

impl Link {
    pub fn new(visitor: Arc<dyn Visitor>) -> Self {
        let capabilities = visitor.capabilities();
        Self {
            visitor,
            capabilities,
        }
    }

    pub fn visitor(&self) -> &Arc<dyn Visitor> {
        &self.visitor
    }

    pub fn supports(&self, sequence: VisitSequence) -> bool {
        self.capabilities.supports(sequence)
    }

    /// Passes the call on, skipping it if the next visitor does not handle it.
    pub fn proceed(&self, call: VisitCall, ctx: &mut ExecutionContext) -> VisitResult {
        if self.supports(call.sequence()) {
            call.invoke(self.visitor.as_ref(), ctx)
        } else {
            Ok(())
        }
    }
}

pub trait Interceptor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Callbacks the interceptor needs routed to it in addition to the
    /// wrapped visitor's own.
    fn required_capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn around(&self, call: VisitCall, ctx: &mut ExecutionContext, next: &Link) -> VisitResult;
}

/// Presents an interceptor and the link it wraps as a single visitor.
#[derive(Debug)]
pub struct InterceptorVisitor {
    interceptor: Box<dyn Interceptor>,
    next: Link,
    capabilities: Capabilities,
    target: OnceLock<Arc<dyn Visitor>>,
}

impl InterceptorVisitor {
    pub fn new(interceptor: impl Interceptor + 'static, next: Arc<dyn Visitor>) -> Self {
        let next = Link::new(next);
        let capabilities = next.capabilities | interceptor.required_capabilities();
        Self {
            interceptor: Box::new(interceptor),
            next,
            capabilities,
            target: OnceLock::new(),
        }
    }

    pub fn interceptor(&self) -> &dyn Interceptor {
        self.interceptor.as_ref()
    }

    pub fn next(&self) -> &Arc<dyn Visitor> {
        self.next.visitor()
    }

    /// The innermost, non-interceptor visitor of the chain.
    pub fn target(&self) -> &Arc<dyn Visitor> {
        self.target.get_or_init(|| {
            let mut current = self.next.visitor.clone();
            while let Some(inner) = current.as_interceptor().map(|i| i.next().clone()) {
                current = inner;
            }
            current
        })
    }

    fn intercept(&self, call: VisitCall, ctx: &mut ExecutionContext) -> VisitResult {
        self.interceptor.around(call, ctx, &self.next)
    }
}

impl Visitor for InterceptorVisitor {
    fn name(&self) -> &str {
        self.target().name()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn visit_before(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        self.intercept(VisitCall::Before { element }, ctx)
    }

    fn visit_child_text(&self, element: NodeId, text: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        self.intercept(VisitCall::ChildText { element, text }, ctx)
    }

    fn visit_child_element(
        &self,
        element: NodeId,
        child: NodeId,
        ctx: &mut ExecutionContext,
    ) -> VisitResult {
        self.intercept(VisitCall::ChildElement { element, child }, ctx)
    }

    fn visit_after(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        self.intercept(VisitCall::After { element }, ctx)
    }

    fn on_post_fragment(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        self.intercept(VisitCall::PostFragment { element }, ctx)
    }

    fn max_node_depth(&self) -> usize {
        self.next.visitor.max_node_depth()
    }

    fn accumulates_text(&self) -> bool {
        self.next.visitor.accumulates_text()
    }

    fn writes_stream(&self) -> bool {
        self.next.visitor.writes_stream()
    }

    fn phase(&self) -> VisitPhase {
        self.next.visitor.phase()
    }

    fn products(&self) -> Vec<String> {
        self.next.visitor.products()
    }

    fn consumes(&self, product: &str) -> bool {
        self.next.visitor.consumes(product)
    }

    fn is_consumer(&self) -> bool {
        self.next.visitor.is_consumer()
    }

    fn as_interceptor(&self) -> Option<&InterceptorVisitor> {
        Some(self)
    }
}

/// Builds the default interceptor chain for a binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterceptorChain;

impl InterceptorChain {
    /// Innermost first: text accumulation, then stream writing when the
    /// visitor asks for them, with failure handling outermost.
    pub fn wrap(visitor: Arc<dyn Visitor>, resource: &ResourceConfig) -> Arc<dyn Visitor> {
        let mut current = visitor;
        if current.accumulates_text() {
            current = Arc::new(InterceptorVisitor::new(
                TextAccumulatingInterceptor::new(),
                current,
            ));
        }
        if current.writes_stream() {
            current = Arc::new(InterceptorVisitor::new(StreamWriterInterceptor::new(), current));
        }
        Arc::new(InterceptorVisitor::new(
            ExceptionInterceptor::new(resource.id()),
            current,
        ))
    }
}

/// Distinct memento owner ids for interceptor instances.
pub(crate) fn next_owner_id() -> usize {
    static NEXT: AtomicUsize = AtomicUsize::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FilterSettings;
    use crate::visitor::FnVisitor;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Tagging {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Tagging {
        fn name(&self) -> &str {
            self.tag
        }

        fn around(&self, call: VisitCall, ctx: &mut ExecutionContext, next: &Link) -> VisitResult {
            self.log.lock().unwrap().push(format!("{}>{}", self.tag, call.sequence()));
            let result = next.proceed(call, ctx);
            self.log.lock().unwrap().push(format!("{}<", self.tag));
            result
        }
    }

    #[test]
    fn interceptors_nest_and_resolve_their_target() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = log.clone();
        let visitor: Arc<dyn Visitor> = Arc::new(FnVisitor::new("target").on_before(move |_, _| {
            inner_log.lock().unwrap().push("visit".into());
            Ok(())
        }));
        let inner: Arc<dyn Visitor> = Arc::new(InterceptorVisitor::new(
            Tagging {
                tag: "inner",
                log: log.clone(),
            },
            visitor,
        ));
        let outer = InterceptorVisitor::new(
            Tagging {
                tag: "outer",
                log: log.clone(),
            },
            inner,
        );

        assert_eq!(outer.name(), "target");
        assert_eq!(outer.target().name(), "target");

        let mut ctx = ExecutionContext::new("test", FilterSettings::default());
        outer.visit_before(NodeId::new(0), &mut ctx).unwrap();
        // The target has no after callback, so the call stops at the links.
        outer.visit_after(NodeId::new(0), &mut ctx).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["outer>before", "inner>before", "visit", "inner<", "outer<"]
        );
    }

    #[test]
    fn default_chain_adds_interceptors_on_demand() {
        let resource = ResourceConfig::compile("item").unwrap();
        let plain: Arc<dyn Visitor> = Arc::new(FnVisitor::new("plain").on_before(|_, _| Ok(())));
        let wrapped = InterceptorChain::wrap(plain, &resource);
        let outer = wrapped.as_interceptor().unwrap();
        assert_eq!(outer.interceptor().name(), "ExceptionInterceptor");
        assert!(outer.next().as_interceptor().is_none());

        let text: Arc<dyn Visitor> = Arc::new(
            FnVisitor::new("text")
                .on_after(|_, _| Ok(()))
                .accumulating_text()
                .writing_stream(),
        );
        let wrapped = InterceptorChain::wrap(text, &resource);
        let caps = wrapped.capabilities();
        assert!(caps.children && caps.after && caps.before);
        let writer = wrapped.as_interceptor().unwrap().next().clone();
        let writer = writer.as_interceptor().unwrap();
        assert_eq!(writer.interceptor().name(), "StreamWriterInterceptor");
        assert_eq!(
            writer.next().as_interceptor().unwrap().interceptor().name(),
            "TextAccumulatingInterceptor"
        );
        assert_eq!(wrapped.name(), "text");
    }
}
