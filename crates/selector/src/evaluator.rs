//! Compiled, namespace-resolved predicate evaluators.
use crate::ast::{CompareOp, Expr};
use crate::error::SelectorError;
use crate::namespace::NamespaceTable;
use crate::node::{MatchContext, SelectorNode};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use weft_types::QName;

/// Identifies one positional predicate and the counter that feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterId(usize);

impl CounterId {
    /// Allocates a fresh id, unique for the lifetime of the process.
    pub fn next() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Attribute(QName),
    Text,
    Literal(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateEvaluator {
    /// Always true. Used by legacy steps and steps without predicates.
    PassThru,
    /// Every bracketed predicate of a step, in order.
    All(Vec<PredicateEvaluator>),
    And(Box<PredicateEvaluator>, Box<PredicateEvaluator>),
    Or(Box<PredicateEvaluator>, Box<PredicateEvaluator>),
    Not(Box<PredicateEvaluator>),
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    /// A bare operand in boolean position: `[@id]`, `[text()]`.
    Truthy(Operand),
    Position {
        counter: CounterId,
        op: CompareOp,
        index: f64,
    },
    SelfName(QName),
    AttributeExists(QName),
}

enum Value<'v> {
    Str(Cow<'v, str>),
    Num(f64),
}

impl Value<'_> {
    fn as_number(&self) -> f64 {
        match self {
            Value::Str(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::Num(n) => *n,
        }
    }
}

impl Operand {
    fn value<'a, N: SelectorNode<'a>>(&self, node: N) -> Option<Value<'a>> {
        match self {
            Operand::Attribute(name) => node
                .attribute(name.namespace(), &name.local_name)
                .map(|v| Value::Str(Cow::Borrowed(v))),
            Operand::Text => Some(Value::Str(Cow::Owned(node.text()))),
            Operand::Literal(s) => Some(Value::Str(Cow::Owned(s.clone()))),
            Operand::Number(n) => Some(Value::Num(*n)),
        }
    }
}

fn compare(lhs: Option<Value<'_>>, op: CompareOp, rhs: Option<Value<'_>>) -> bool {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        // An absent attribute compares false under every operator.
        return false;
    };
    match (op, &lhs, &rhs) {
        (CompareOp::Equals, Value::Str(a), Value::Str(b)) => a == b,
        (CompareOp::NotEquals, Value::Str(a), Value::Str(b)) => a != b,
        _ => op.compare_numbers(lhs.as_number(), rhs.as_number()),
    }
}

impl PredicateEvaluator {
    pub fn evaluate<'a, N: SelectorNode<'a>>(&self, node: N, ctx: &dyn MatchContext) -> bool {
        match self {
            PredicateEvaluator::PassThru => true,
            PredicateEvaluator::All(list) => list.iter().all(|e| e.evaluate(node, ctx)),
            PredicateEvaluator::And(lhs, rhs) => lhs.evaluate(node, ctx) && rhs.evaluate(node, ctx),
            PredicateEvaluator::Or(lhs, rhs) => lhs.evaluate(node, ctx) || rhs.evaluate(node, ctx),
            PredicateEvaluator::Not(inner) => !inner.evaluate(node, ctx),
            PredicateEvaluator::Compare { lhs, op, rhs } => {
                compare(lhs.value(node), *op, rhs.value(node))
            }
            PredicateEvaluator::Truthy(operand) => match operand.value(node) {
                None => false,
                Some(Value::Str(s)) => !s.is_empty(),
                Some(Value::Num(n)) => n != 0.0 && !n.is_nan(),
            },
            PredicateEvaluator::Position { counter, op, index } => ctx
                .element_position(*counter, node.id())
                .is_some_and(|position| op.compare_numbers(position as f64, *index)),
            PredicateEvaluator::SelfName(name) => {
                node.local_name() == name.local_name
                    && name
                        .namespace()
                        .is_none_or(|ns| node.namespace_uri() == Some(ns))
            }
            PredicateEvaluator::AttributeExists(name) => node
                .attribute(name.namespace(), &name.local_name)
                .is_some(),
        }
    }

    pub fn accesses_text(&self) -> bool {
        match self {
            PredicateEvaluator::All(list) => list.iter().any(PredicateEvaluator::accesses_text),
            PredicateEvaluator::And(lhs, rhs) | PredicateEvaluator::Or(lhs, rhs) => {
                lhs.accesses_text() || rhs.accesses_text()
            }
            PredicateEvaluator::Not(inner) => inner.accesses_text(),
            PredicateEvaluator::Compare { lhs, rhs, .. } => {
                *lhs == Operand::Text || *rhs == Operand::Text
            }
            PredicateEvaluator::Truthy(operand) => *operand == Operand::Text,
            _ => false,
        }
    }

    /// Counters this evaluator reads, in evaluation order.
    pub fn position_counters(&self) -> Vec<CounterId> {
        let mut counters = Vec::new();
        self.collect_counters(&mut counters);
        counters
    }

    fn collect_counters(&self, out: &mut Vec<CounterId>) {
        match self {
            PredicateEvaluator::All(list) => list.iter().for_each(|e| e.collect_counters(out)),
            PredicateEvaluator::And(lhs, rhs) | PredicateEvaluator::Or(lhs, rhs) => {
                lhs.collect_counters(out);
                rhs.collect_counters(out);
            }
            PredicateEvaluator::Not(inner) => inner.collect_counters(out),
            PredicateEvaluator::Position { counter, .. } => out.push(*counter),
            _ => {}
        }
    }
}

/// Compiles parsed predicates into evaluators, resolving prefixes as it goes.
pub struct EvaluatorCompiler<'c> {
    selector: &'c str,
    namespaces: &'c NamespaceTable,
}

impl<'c> EvaluatorCompiler<'c> {
    pub fn new(selector: &'c str, namespaces: &'c NamespaceTable) -> Self {
        Self {
            selector,
            namespaces,
        }
    }

    /// Resolves a possibly prefixed name. Unprefixed names stay in no namespace.
    pub fn resolve_name(&self, name: &str) -> Result<QName, SelectorError> {
        let mut qname = QName::parse_prefixed(name);
        if let Some(prefix) = &qname.prefix {
            let uri = self
                .namespaces
                .get(prefix)
                .ok_or_else(|| SelectorError::UnknownPrefix {
                    selector: self.selector.to_string(),
                    prefix: prefix.clone(),
                })?;
            qname.namespace_uri = Some(uri.to_string());
        }
        Ok(qname)
    }

    /// Compiles one bracketed predicate. A bare number is a position test.
    pub fn compile_predicate(&self, expr: &Expr) -> Result<PredicateEvaluator, SelectorError> {
        match expr {
            Expr::Number(index) => Ok(PredicateEvaluator::Position {
                counter: CounterId::next(),
                op: CompareOp::Equals,
                index: *index,
            }),
            other => self.compile(other),
        }
    }

    fn compile(&self, expr: &Expr) -> Result<PredicateEvaluator, SelectorError> {
        Ok(match expr {
            Expr::Or(lhs, rhs) => PredicateEvaluator::Or(
                Box::new(self.compile(lhs)?),
                Box::new(self.compile(rhs)?),
            ),
            Expr::And(lhs, rhs) => PredicateEvaluator::And(
                Box::new(self.compile(lhs)?),
                Box::new(self.compile(rhs)?),
            ),
            Expr::Not(inner) => PredicateEvaluator::Not(Box::new(self.compile(inner)?)),
            Expr::Compare { lhs, op, rhs } => match (lhs.as_ref(), rhs.as_ref()) {
                (Expr::Position, other) => PredicateEvaluator::Position {
                    counter: CounterId::next(),
                    op: *op,
                    index: self.number(other)?,
                },
                (other, Expr::Position) => PredicateEvaluator::Position {
                    counter: CounterId::next(),
                    op: op.flipped(),
                    index: self.number(other)?,
                },
                (lhs, rhs) => PredicateEvaluator::Compare {
                    lhs: self.operand(lhs)?,
                    op: *op,
                    rhs: self.operand(rhs)?,
                },
            },
            Expr::Position => PredicateEvaluator::PassThru,
            Expr::SelfName(name) => PredicateEvaluator::SelfName(self.resolve_name(name)?),
            operand => PredicateEvaluator::Truthy(self.operand(operand)?),
        })
    }

    fn operand(&self, expr: &Expr) -> Result<Operand, SelectorError> {
        match expr {
            Expr::Attribute(name) => Ok(Operand::Attribute(self.resolve_name(name)?)),
            Expr::Text => Ok(Operand::Text),
            Expr::Literal(s) => Ok(Operand::Literal(s.clone())),
            Expr::Number(n) => Ok(Operand::Number(*n)),
            other => Err(SelectorError::parse(
                self.selector,
                format!("unsupported comparison operand {:?}", other),
            )),
        }
    }

    fn number(&self, expr: &Expr) -> Result<f64, SelectorError> {
        match expr {
            Expr::Number(n) => Ok(*n),
            other => Err(SelectorError::parse(
                self.selector,
                format!("position() must be compared with a number, found {:?}", other),
            )),
        }
    }
}
