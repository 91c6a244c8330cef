use super::{Interceptor, Link, VisitCall, next_owner_id};
use crate::context::ExecutionContext;
use crate::error::VisitResult;
use crate::visitor::Capabilities;

#[derive(Debug, Default)]
struct AccumulatedText(String);

/// Collects an element's direct character data as it streams past and puts
/// the full text back on the element before its after-visitors run.
#[derive(Debug)]
pub struct TextAccumulatingInterceptor {
    owner: usize,
}

impl TextAccumulatingInterceptor {
    pub fn new() -> Self {
        Self {
            owner: next_owner_id(),
        }
    }
}

impl Default for TextAccumulatingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for TextAccumulatingInterceptor {
    fn name(&self) -> &str {
        "TextAccumulatingInterceptor"
    }

    fn required_capabilities(&self) -> Capabilities {
        Capabilities::CHILDREN | Capabilities::AFTER
    }

    fn around(&self, call: VisitCall, ctx: &mut ExecutionContext, next: &Link) -> VisitResult {
        match call {
            VisitCall::ChildText { element, text } => {
                if let Some(content) = ctx.document().character_data(text).map(str::to_owned) {
                    ctx.mementos_mut()
                        .stash::<AccumulatedText, _>(element, self.owner, |acc| {
                            acc.0.push_str(&content)
                        });
                }
            }
            VisitCall::After { element } => {
                if let Some(acc) = ctx
                    .mementos_mut()
                    .restore::<AccumulatedText>(element, self.owner)
                {
                    ctx.document_mut().set_text_content(element, &acc.0);
                }
            }
            _ => {}
        }
        next.proceed(call, ctx)
    }
}
