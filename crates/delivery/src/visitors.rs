use crate::context::ExecutionContext;
use crate::error::{VisitError, VisitResult};
use crate::visitor::{Capabilities, Visitor};
use weft_types::NodeId;

/// Ends the traversal as soon as its selector matches, either when the
/// element opens or when it closes.
#[derive(Debug, Clone, Copy)]
pub struct TerminateVisitor {
    on_before: bool,
}

impl TerminateVisitor {
    pub fn before() -> Self {
        Self { on_before: true }
    }

    pub fn after() -> Self {
        Self { on_before: false }
    }
}

impl Default for TerminateVisitor {
    fn default() -> Self {
        Self::before()
    }
}

impl Visitor for TerminateVisitor {
    fn name(&self) -> &str {
        "TerminateVisitor"
    }

    fn capabilities(&self) -> Capabilities {
        if self.on_before {
            Capabilities::BEFORE
        } else {
            Capabilities::AFTER
        }
    }

    fn visit_before(&self, _element: NodeId, _ctx: &mut ExecutionContext) -> VisitResult {
        Err(VisitError::Terminate)
    }

    fn visit_after(&self, _element: NodeId, _ctx: &mut ExecutionContext) -> VisitResult {
        Err(VisitError::Terminate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_follows_the_trigger() {
        assert_eq!(TerminateVisitor::before().capabilities(), Capabilities::BEFORE);
        assert_eq!(TerminateVisitor::after().capabilities(), Capabilities::AFTER);
    }
}
