//! Invocation and failure policy shared by the streaming and DOM dispatchers.
use crate::binding::VisitorBinding;
use crate::context::ExecutionContext;
use crate::error::{DeliveryError, VisitError};
use crate::event::ExecutionEvent;
use crate::index::ElementBindings;
use crate::interceptor::{VisitCall, report_visit_failure};
use crate::visitor::VisitPhase;
use weft_types::NodeId;

/// Why a traversal stops early.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// A visitor asked to stop. The run still succeeds.
    Terminate,
    Abort(DeliveryError),
}

pub(crate) type Flow = Result<(), Interrupt>;

pub(crate) fn targets(binding: &VisitorBinding, element: NodeId, ctx: &ExecutionContext) -> bool {
    binding.is_targeted_at(ctx.node_ref(element), ctx)
}

/// Invokes `binding` for `call` if it runs in `pass` and its selector
/// targets the call's element. Returns whether it was invoked.
pub(crate) fn dispatch(
    binding: &VisitorBinding,
    call: VisitCall,
    ctx: &mut ExecutionContext,
    pass: Option<VisitPhase>,
) -> Result<bool, Interrupt> {
    if let Some(pass) = pass {
        if !binding.visitor().phase().runs_in(pass) {
            return Ok(false);
        }
    }
    let element = call.element();
    if !targets(binding, element, ctx) {
        return Ok(false);
    }
    if ctx.has_listeners() {
        ctx.fire(ExecutionEvent::ResourceTargeted {
            node: element,
            resource: binding.resource().id().to_string(),
            visitor: binding.visitor().name().to_string(),
            sequence: call.sequence(),
        });
    }

    match call.invoke(binding.visitor().as_ref(), ctx) {
        Ok(()) => Ok(true),
        Err(VisitError::Terminate) => Err(Interrupt::Terminate),
        Err(VisitError::Aborted(err)) => Err(Interrupt::Abort(*err)),
        // Only reached for visitors running without the exception interceptor.
        Err(VisitError::Failed { message, .. }) => {
            let visitor = binding.visitor().name().to_string();
            report_visit_failure(ctx, call, &visitor, binding.resource().id(), &message)
                .map(|()| true)
                .map_err(|err| Interrupt::Abort(*err))
        }
    }
}

/// Runs the after-visitors and then the post-fragment visitors of an
/// element. Post-fragment cleanup runs even when an after-visitor stopped
/// the traversal; the first interruption wins.
pub(crate) fn close_element(
    bindings: &ElementBindings,
    element: NodeId,
    ctx: &mut ExecutionContext,
    reverse: bool,
    pass: Option<VisitPhase>,
) -> Flow {
    let after = run_after(bindings, element, ctx, reverse, pass);
    let post = run_post_fragment(bindings, element, ctx, pass);
    after.and(post)
}

fn run_after(
    bindings: &ElementBindings,
    element: NodeId,
    ctx: &mut ExecutionContext,
    reverse: bool,
    pass: Option<VisitPhase>,
) -> Flow {
    let call = VisitCall::After { element };
    if reverse {
        for binding in bindings.after().iter().rev() {
            dispatch(binding, call, ctx, pass)?;
        }
    } else {
        for binding in bindings.after() {
            dispatch(binding, call, ctx, pass)?;
        }
    }
    Ok(())
}

fn run_post_fragment(
    bindings: &ElementBindings,
    element: NodeId,
    ctx: &mut ExecutionContext,
    pass: Option<VisitPhase>,
) -> Flow {
    let call = VisitCall::PostFragment { element };
    for binding in bindings.post_fragment() {
        dispatch(binding, call, ctx, pass)?;
    }
    Ok(())
}
