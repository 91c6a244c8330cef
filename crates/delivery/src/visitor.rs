//! The visitor contract and its capability flags.
use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::event::VisitSequence;
use crate::interceptor::InterceptorVisitor;
use std::fmt;
use std::ops::BitOr;
use weft_types::NodeId;

/// Which callbacks a visitor wants. Resolved once per binding when the index
/// is built, so dispatch never asks the visitor again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub before: bool,
    pub children: bool,
    pub after: bool,
    pub post_fragment: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        before: false,
        children: false,
        after: false,
        post_fragment: false,
    };
    pub const BEFORE: Self = Self {
        before: true,
        ..Self::NONE
    };
    pub const CHILDREN: Self = Self {
        children: true,
        ..Self::NONE
    };
    pub const AFTER: Self = Self {
        after: true,
        ..Self::NONE
    };
    pub const POST_FRAGMENT: Self = Self {
        post_fragment: true,
        ..Self::NONE
    };

    pub const fn union(self, other: Self) -> Self {
        Self {
            before: self.before || other.before,
            children: self.children || other.children,
            after: self.after || other.after,
            post_fragment: self.post_fragment || other.post_fragment,
        }
    }

    pub fn supports(self, sequence: VisitSequence) -> bool {
        match sequence {
            VisitSequence::Before => self.before,
            VisitSequence::Children => self.children,
            VisitSequence::After => self.after,
            VisitSequence::PostFragment => self.post_fragment,
        }
    }

    pub fn is_empty(self) -> bool {
        self == Self::NONE
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Which pass of a DOM-mode run a visitor belongs to. Streaming runs have a
/// single pass and ignore the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitPhase {
    Assembly,
    #[default]
    Processing,
    Any,
}

impl VisitPhase {
    pub fn runs_in(self, pass: VisitPhase) -> bool {
        self == VisitPhase::Any || self == pass
    }
}

/// User logic attached to selected elements.
///
/// Every callback has a no-op default; [`Visitor::capabilities`] decides which
/// of them are actually dispatched. Visitors are shared across runs and
/// threads, so per-run state belongs in the [`ExecutionContext`].
pub trait Visitor: Send + Sync + fmt::Debug {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn capabilities(&self) -> Capabilities;

    fn visit_before(&self, _element: NodeId, _ctx: &mut ExecutionContext) -> VisitResult {
        Ok(())
    }

    /// Called on the parent for each direct text, CDATA or comment child.
    fn visit_child_text(
        &self,
        _element: NodeId,
        _text: NodeId,
        _ctx: &mut ExecutionContext,
    ) -> VisitResult {
        Ok(())
    }

    /// Called on the parent for each direct child element, before the
    /// child's own before-visitors.
    fn visit_child_element(
        &self,
        _element: NodeId,
        _child: NodeId,
        _ctx: &mut ExecutionContext,
    ) -> VisitResult {
        Ok(())
    }

    fn visit_after(&self, _element: NodeId, _ctx: &mut ExecutionContext) -> VisitResult {
        Ok(())
    }

    /// Cleanup once the element's fragment has closed. Runs even when an
    /// after-visitor failed.
    fn on_post_fragment(&self, _element: NodeId, _ctx: &mut ExecutionContext) -> VisitResult {
        Ok(())
    }

    /// How many levels of the targeted subtree must stay materialized until
    /// the element closes: 1 keeps the element itself, 0 keeps everything.
    fn max_node_depth(&self) -> usize {
        1
    }

    /// Whether the element's full direct text must be in place at after time.
    fn accumulates_text(&self) -> bool {
        false
    }

    /// Whether output written inside the fragment is isolated from the
    /// surrounding output until the fragment closes.
    fn writes_stream(&self) -> bool {
        false
    }

    fn phase(&self) -> VisitPhase {
        VisitPhase::Processing
    }

    /// Names of what this visitor makes available to others.
    fn products(&self) -> Vec<String> {
        Vec::new()
    }

    fn consumes(&self, _product: &str) -> bool {
        false
    }

    fn is_consumer(&self) -> bool {
        false
    }

    fn as_interceptor(&self) -> Option<&InterceptorVisitor> {
        None
    }
}

type ElementFn = dyn Fn(NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync;
type ChildFn = dyn Fn(NodeId, NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync;

/// A visitor assembled from closures.
///
/// ```ignore
/// let visitor = FnVisitor::new("count-items")
///     .on_before(|_, ctx| { *ctx.get_or_default::<usize>() += 1; Ok(()) });
/// ```
pub struct FnVisitor {
    name: String,
    before: Option<Box<ElementFn>>,
    child_text: Option<Box<ChildFn>>,
    child_element: Option<Box<ChildFn>>,
    after: Option<Box<ElementFn>>,
    post_fragment: Option<Box<ElementFn>>,
    max_node_depth: usize,
    accumulates_text: bool,
    writes_stream: bool,
    phase: VisitPhase,
    products: Vec<String>,
    consumes: Vec<String>,
}

impl fmt::Debug for FnVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnVisitor")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities())
            .field("phase", &self.phase)
            .finish()
    }
}

impl FnVisitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            child_text: None,
            child_element: None,
            after: None,
            post_fragment: None,
            max_node_depth: 1,
            accumulates_text: false,
            writes_stream: false,
            phase: VisitPhase::Processing,
            products: Vec::new(),
            consumes: Vec::new(),
        }
    }

    pub fn on_before<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    pub fn on_child_text<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId, NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync + 'static,
    {
        self.child_text = Some(Box::new(f));
        self
    }

    pub fn on_child_element<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId, NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync + 'static,
    {
        self.child_element = Some(Box::new(f));
        self
    }

    pub fn on_after<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }

    pub fn on_post_fragment<F>(mut self, f: F) -> Self
    where
        F: Fn(NodeId, &mut ExecutionContext) -> VisitResult + Send + Sync + 'static,
    {
        self.post_fragment = Some(Box::new(f));
        self
    }

    pub fn with_max_node_depth(mut self, depth: usize) -> Self {
        self.max_node_depth = depth;
        self
    }

    pub fn accumulating_text(mut self) -> Self {
        self.accumulates_text = true;
        self
    }

    pub fn writing_stream(mut self) -> Self {
        self.writes_stream = true;
        self
    }

    pub fn in_phase(mut self, phase: VisitPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn producing(mut self, product: impl Into<String>) -> Self {
        self.products.push(product.into());
        self
    }

    pub fn consuming(mut self, product: impl Into<String>) -> Self {
        self.consumes.push(product.into());
        self
    }
}

impl Visitor for FnVisitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            before: self.before.is_some(),
            children: self.child_text.is_some() || self.child_element.is_some(),
            after: self.after.is_some(),
            post_fragment: self.post_fragment.is_some(),
        }
    }

    fn visit_before(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        match &self.before {
            Some(f) => f(element, ctx),
            None => Ok(()),
        }
    }

    fn visit_child_text(&self, element: NodeId, text: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        match &self.child_text {
            Some(f) => f(element, text, ctx),
            None => Ok(()),
        }
    }

    fn visit_child_element(
        &self,
        element: NodeId,
        child: NodeId,
        ctx: &mut ExecutionContext,
    ) -> VisitResult {
        match &self.child_element {
            Some(f) => f(element, child, ctx),
            None => Ok(()),
        }
    }

    fn visit_after(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        match &self.after {
            Some(f) => f(element, ctx),
            None => Ok(()),
        }
    }

    fn on_post_fragment(&self, element: NodeId, ctx: &mut ExecutionContext) -> VisitResult {
        match &self.post_fragment {
            Some(f) => f(element, ctx),
            None => Ok(()),
        }
    }

    fn max_node_depth(&self) -> usize {
        self.max_node_depth
    }

    fn accumulates_text(&self) -> bool {
        self.accumulates_text
    }

    fn writes_stream(&self) -> bool {
        self.writes_stream
    }

    fn phase(&self) -> VisitPhase {
        self.phase
    }

    fn products(&self) -> Vec<String> {
        self.products.clone()
    }

    fn consumes(&self, product: &str) -> bool {
        self.consumes.iter().any(|p| p == product)
    }

    fn is_consumer(&self) -> bool {
        !self.consumes.is_empty()
    }
}
