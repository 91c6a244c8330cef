//! Contextual selectors for fragment-oriented XML processing.
//!
//! A selector such as `order/order-items/order-item[@id='2']` is compiled into a
//! [`SelectorPath`], bound to a namespace table, and then matched against
//! elements by walking up their ancestor chain.

pub mod ast;
pub mod condition;
pub mod error;
pub mod evaluator;
pub mod namespace;
pub mod node;
pub mod parser;
pub mod path;
pub mod step;

pub use condition::{AttributeCondition, ConditionEvaluator, FnCondition};
pub use error::SelectorError;
pub use evaluator::{CounterId, PredicateEvaluator};
pub use namespace::NamespaceTable;
pub use node::{EmptyMatchContext, MatchContext, SelectorNode};
pub use path::SelectorPath;
pub use step::{DOCUMENT_TOKEN, STAR, STAR_STAR, SelectorStep};
