use super::{Interceptor, Link, VisitCall, next_owner_id};
use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::visitor::Capabilities;

/// The writer a fragment replaced, held until the fragment closes.
#[derive(Debug)]
pub(crate) struct FragmentWriter {
    delegate: String,
}

impl FragmentWriter {
    /// Restores the delegate into `writer`, appending the fragment's output.
    pub(crate) fn close(self, writer: &mut String) {
        let fragment = std::mem::replace(writer, self.delegate);
        writer.push_str(&fragment);
    }
}

/// Gives a stream-writing visitor its own writer for the span of its
/// fragment. Output written inside the fragment, by the visitor or by
/// visitors of descendant elements, lands in the delegate when the fragment
/// closes.
#[derive(Debug)]
pub struct StreamWriterInterceptor {
    owner: usize,
}

impl StreamWriterInterceptor {
    pub fn new() -> Self {
        Self {
            owner: next_owner_id(),
        }
    }

    fn open(&self, ctx: &mut ExecutionContext, element: weft_types::NodeId) {
        let delegate = std::mem::take(ctx.writer_mut());
        ctx.mementos_mut()
            .save(element, self.owner, FragmentWriter { delegate });
    }

    fn close(&self, ctx: &mut ExecutionContext, element: weft_types::NodeId) {
        if let Some(writer) = ctx
            .mementos_mut()
            .restore::<FragmentWriter>(element, self.owner)
        {
            writer.close(ctx.writer_mut());
        }
    }
}

impl Default for StreamWriterInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for StreamWriterInterceptor {
    fn name(&self) -> &str {
        "StreamWriterInterceptor"
    }

    fn required_capabilities(&self) -> Capabilities {
        Capabilities::BEFORE | Capabilities::AFTER
    }

    fn around(&self, call: VisitCall, ctx: &mut ExecutionContext, next: &Link) -> VisitResult {
        match call {
            VisitCall::Before { element } => {
                self.open(ctx, element);
                let result = next.proceed(call, ctx);
                if result.is_err() {
                    self.close(ctx, element);
                }
                result
            }
            VisitCall::After { element } => {
                let result = next.proceed(call, ctx);
                self.close(ctx, element);
                result
            }
            _ => next.proceed(call, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisitError;
    use crate::settings::FilterSettings;
    use crate::visitor::{FnVisitor, Visitor};
    use std::sync::Arc;
    use weft_types::QName;

    fn writer(tag: &'static str) -> Link {
        let visitor: Arc<dyn Visitor> = Arc::new(
            FnVisitor::new(tag)
                .on_before(move |_, ctx| {
                    // Nothing from outside the fragment is visible here.
                    assert_eq!(ctx.output(), "");
                    ctx.writer_mut().push_str(&format!("<{tag}>"));
                    Ok(())
                })
                .on_after(move |_, ctx| {
                    ctx.writer_mut().push_str(&format!("</{tag}>"));
                    Ok(())
                }),
        );
        Link::new(visitor)
    }

    #[test]
    fn nested_fragments_keep_document_order() {
        let mut ctx = ExecutionContext::new("test", FilterSettings::default());
        ctx.writer_mut().push_str("start;");
        let outer = ctx.document_mut().create_element(QName::new("o"), vec![]);
        let inner = ctx.document_mut().create_element(QName::new("i"), vec![]);

        let (outer_link, inner_link) = (writer("o"), writer("i"));
        let (outer_writer, inner_writer) = (StreamWriterInterceptor::new(), StreamWriterInterceptor::new());

        outer_writer
            .around(VisitCall::Before { element: outer }, &mut ctx, &outer_link)
            .unwrap();
        inner_writer
            .around(VisitCall::Before { element: inner }, &mut ctx, &inner_link)
            .unwrap();
        inner_writer
            .around(VisitCall::After { element: inner }, &mut ctx, &inner_link)
            .unwrap();
        assert_eq!(ctx.output(), "<o><i></i>");
        outer_writer
            .around(VisitCall::After { element: outer }, &mut ctx, &outer_link)
            .unwrap();
        assert_eq!(ctx.output(), "start;<o><i></i></o>");
    }

    #[test]
    fn forgetting_an_open_fragment_flushes_it() {
        let mut ctx = ExecutionContext::new("test", FilterSettings::default());
        ctx.writer_mut().push_str("a;");
        let node = ctx.document_mut().create_element(QName::new("o"), vec![]);
        let link = writer("o");
        StreamWriterInterceptor::new()
            .around(VisitCall::Before { element: node }, &mut ctx, &link)
            .unwrap();
        ctx.forget(node);
        assert_eq!(ctx.output(), "a;<o>");
    }

    #[test]
    fn failed_before_restores_the_writer() {
        let mut ctx = ExecutionContext::new("test", FilterSettings::default());
        ctx.writer_mut().push_str("a;");
        let node = ctx.document_mut().create_element(QName::new("o"), vec![]);
        let visitor: Arc<dyn Visitor> = Arc::new(FnVisitor::new("bad").on_before(|_, ctx| {
            ctx.writer_mut().push_str("partial");
            Err(VisitError::failed("no"))
        }));
        let result = StreamWriterInterceptor::new().around(
            VisitCall::Before { element: node },
            &mut ctx,
            &Link::new(visitor),
        );
        assert!(result.is_err());
        assert_eq!(ctx.output(), "a;partial");
        assert!(ctx.mementos().is_empty());
    }
}
