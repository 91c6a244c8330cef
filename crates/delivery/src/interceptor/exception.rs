use super::{Interceptor, Link, VisitCall};
use crate::context::{ExecutionContext, TerminationError};
use crate::error::{DeliveryError, VisitError, VisitResult};
use crate::event::ExecutionEvent;

/// Turns visitor failures into reported, located errors and applies the
/// fail-fast or best-effort policy.
#[derive(Debug, Clone)]
pub struct ExceptionInterceptor {
    resource: String,
}

impl ExceptionInterceptor {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl Interceptor for ExceptionInterceptor {
    fn name(&self) -> &str {
        "ExceptionInterceptor"
    }

    fn around(&self, call: VisitCall, ctx: &mut ExecutionContext, next: &Link) -> VisitResult {
        match next.proceed(call, ctx) {
            Err(VisitError::Failed { message, .. }) => {
                let visitor = next.visitor().name().to_string();
                report_visit_failure(ctx, call, &visitor, &self.resource, &message)
                    .map_err(VisitError::Aborted)
            }
            other => other,
        }
    }
}

/// Reports a failed callback to listeners and records it on the context.
///
/// With `terminate_on_visitor_exception` the failure comes back as an error
/// naming the visitor, resource, location and source. Otherwise it is logged
/// and the traversal continues.
pub fn report_visit_failure(
    ctx: &mut ExecutionContext,
    call: VisitCall,
    visitor: &str,
    resource: &str,
    message: &str,
) -> Result<(), Box<DeliveryError>> {
    let node = call.element();
    let sequence = call.sequence();
    let location = ctx.document().location(node);

    if ctx.has_listeners() {
        ctx.fire(ExecutionEvent::VisitFailure {
            node,
            location: location.clone(),
            visitor: visitor.to_string(),
            resource: resource.to_string(),
            sequence,
            message: message.to_string(),
        });
    }
    ctx.set_termination_error(TerminationError {
        visitor: visitor.to_string(),
        resource: resource.to_string(),
        location: location.clone(),
        sequence,
        message: message.to_string(),
    });

    let error = DeliveryError::Visitor {
        visitor: visitor.to_string(),
        resource: resource.to_string(),
        source_id: ctx.source_id().to_string(),
        location,
        sequence,
        message: message.to_string(),
    };
    if ctx.settings().terminate_on_visitor_exception {
        Err(Box::new(error))
    } else {
        log::error!("{}", error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventCollector, VisitSequence};
    use crate::settings::FilterSettings;
    use crate::visitor::{FnVisitor, Visitor};
    use std::sync::Arc;
    use weft_types::QName;

    fn setup(fail_fast: bool) -> (ExecutionContext, EventCollector, weft_types::NodeId) {
        let settings = FilterSettings::default().with_terminate_on_visitor_exception(fail_fast);
        let mut ctx = ExecutionContext::new("orders.xml", settings);
        let collector = EventCollector::new();
        ctx.add_listener(Box::new(collector.clone()));
        let node = ctx.document_mut().create_element(QName::new("order"), vec![]);
        ctx.document_mut().set_root(node);
        (ctx, collector, node)
    }

    fn failing() -> Link {
        let visitor: Arc<dyn Visitor> =
            Arc::new(FnVisitor::new("Failing").on_before(|_, _| Err(VisitError::failed("bad data"))));
        Link::new(visitor)
    }

    #[test]
    fn fail_fast_aborts_with_located_error() {
        let (mut ctx, collector, node) = setup(true);
        let interceptor = ExceptionInterceptor::new("order");
        let err = interceptor
            .around(VisitCall::Before { element: node }, &mut ctx, &failing())
            .unwrap_err();
        match err {
            VisitError::Aborted(inner) => match *inner {
                DeliveryError::Visitor {
                    visitor,
                    resource,
                    source_id,
                    location,
                    sequence,
                    message,
                } => {
                    assert_eq!(visitor, "Failing");
                    assert_eq!(resource, "order");
                    assert_eq!(source_id, "orders.xml");
                    assert_eq!(location, "/order");
                    assert_eq!(sequence, VisitSequence::Before);
                    assert_eq!(message, "bad data");
                }
                other => panic!("unexpected error {other:?}"),
            },
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(collector.failures().len(), 1);
        assert!(ctx.termination_error().is_some());
    }

    #[test]
    fn best_effort_records_and_continues() {
        let (mut ctx, collector, node) = setup(false);
        let interceptor = ExceptionInterceptor::new("order");
        interceptor
            .around(VisitCall::Before { element: node }, &mut ctx, &failing())
            .unwrap();
        assert_eq!(collector.failures().len(), 1);
        assert_eq!(ctx.termination_error().unwrap().message, "bad data");
    }

    #[test]
    fn terminate_passes_through_unreported() {
        let (mut ctx, collector, node) = setup(true);
        let visitor: Arc<dyn Visitor> =
            Arc::new(FnVisitor::new("Stop").on_before(|_, _| Err(VisitError::Terminate)));
        let err = ExceptionInterceptor::new("order")
            .around(VisitCall::Before { element: node }, &mut ctx, &Link::new(visitor))
            .unwrap_err();
        assert!(err.is_terminate());
        assert!(collector.failures().is_empty());
        assert!(ctx.termination_error().is_none());
    }
}
