use crate::context::ExecutionContext;
use crate::dispatch::{Flow, Interrupt, close_element, dispatch};
use crate::error::DeliveryError;
use crate::event::ExecutionEvent;
use crate::index::VisitorBindingIndex;
use crate::interceptor::VisitCall;
use crate::visitor::VisitPhase;
use weft_types::NodeId;

/// Visits a fully built document in two passes: assembly visitors first,
/// then processing visitors. Visitors of phase `Any` run in both.
pub struct DomDispatcher<'c> {
    index: &'c VisitorBindingIndex,
    ctx: &'c mut ExecutionContext,
}

impl<'c> DomDispatcher<'c> {
    pub fn new(index: &'c VisitorBindingIndex, ctx: &'c mut ExecutionContext) -> Self {
        Self { index, ctx }
    }

    /// Runs both passes over the document held by the context.
    pub fn run(&mut self) -> Result<(), DeliveryError> {
        let Some(root) = self.ctx.document().root() else {
            return Ok(());
        };
        for pass in [VisitPhase::Assembly, VisitPhase::Processing] {
            // Positions are recounted from scratch in each pass.
            self.ctx.positions_mut().clear();
            log::debug!("{:?} pass over '{}'", pass, self.ctx.source_id());
            match self.visit(root, true, pass) {
                Ok(()) => {}
                Err(Interrupt::Terminate) => {
                    log::debug!("Traversal of '{}' terminated by a visitor", self.ctx.source_id());
                    self.ctx.mark_terminated();
                    return Ok(());
                }
                Err(Interrupt::Abort(err)) => return Err(err),
            }
        }
        Ok(())
    }

    fn visit(&mut self, element: NodeId, is_root: bool, pass: VisitPhase) -> Flow {
        let flow = self.visit_fragment(element, is_root, pass);
        self.ctx.forget(element);
        flow
    }

    fn visit_fragment(&mut self, element: NodeId, is_root: bool, pass: VisitPhase) -> Flow {
        let Some(name) = self.ctx.document().name(element).cloned() else {
            return Ok(());
        };
        let bindings = if is_root {
            self.index.lookup_root(&name.local_name)
        } else {
            self.index.lookup(&name.local_name)
        }
        .cloned();
        if self.ctx.has_listeners() {
            self.ctx.fire(ExecutionEvent::StartFragment {
                node: Some(element),
                name: name.to_string(),
            });
        }

        if let Some(bindings) = &bindings {
            let call = VisitCall::Before { element };
            for binding in bindings.before() {
                dispatch(binding, call, self.ctx, Some(pass))?;
            }
        }

        let children = self.ctx.document().children(element).to_vec();
        for child in children {
            // Skip children that earlier visitors removed or moved.
            if self.ctx.document().parent(child) != Some(element) {
                continue;
            }
            let is_element = self.ctx.document().is_element(child);
            if let Some(bindings) = &bindings {
                let call = if is_element {
                    VisitCall::ChildElement { element, child }
                } else {
                    VisitCall::ChildText {
                        element,
                        text: child,
                    }
                };
                for binding in bindings.children() {
                    dispatch(binding, call, self.ctx, Some(pass))?;
                }
            }
            if is_element {
                self.visit(child, false, pass)?;
            }
        }

        if let Some(bindings) = &bindings {
            let reverse = self.ctx.settings().reverse_visit_order_on_visit_after;
            close_element(bindings, element, self.ctx, reverse, Some(pass))?;
        }
        if self.ctx.has_listeners() {
            self.ctx.fire(ExecutionEvent::EndFragment {
                node: Some(element),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}
