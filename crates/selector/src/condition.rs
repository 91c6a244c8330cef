//! Side conditions that gate a whole selector on execution state.
use crate::node::MatchContext;
use std::fmt;

pub trait ConditionEvaluator: Send + Sync + fmt::Debug {
    fn evaluate(&self, ctx: &dyn MatchContext) -> bool;
}

/// True when the named execution attribute is present, and equal to
/// `expected` if one is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCondition {
    name: String,
    expected: Option<String>,
}

impl AttributeCondition {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: None,
        }
    }

    pub fn equals(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected: Some(expected.into()),
        }
    }
}

impl ConditionEvaluator for AttributeCondition {
    fn evaluate(&self, ctx: &dyn MatchContext) -> bool {
        match (ctx.attribute_value(&self.name), &self.expected) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == *expected,
        }
    }
}

/// Wraps a closure as a condition.
pub struct FnCondition<F>(pub F);

impl<F> fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCondition")
    }
}

impl<F> ConditionEvaluator for FnCondition<F>
where
    F: Fn(&dyn MatchContext) -> bool + Send + Sync,
{
    fn evaluate(&self, ctx: &dyn MatchContext) -> bool {
        (self.0)(ctx)
    }
}
