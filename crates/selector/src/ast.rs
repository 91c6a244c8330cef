//! Syntax tree for selector steps and their bracketed predicates.

/// A predicate expression as written, before namespace prefixes are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        lhs: Box<Expr>,
        op: CompareOp,
        rhs: Box<Expr>,
    },
    /// `@name` or `@prefix:name`.
    Attribute(String),
    /// `text()`
    Text,
    /// `position()`
    Position,
    /// `self::name`
    SelfName(String),
    Literal(String),
    Number(f64),
}

impl Expr {
    /// True when evaluating this expression reads the text content of the node.
    pub fn accesses_text(&self) -> bool {
        match self {
            Expr::Or(lhs, rhs) | Expr::And(lhs, rhs) => lhs.accesses_text() || rhs.accesses_text(),
            Expr::Not(inner) => inner.accesses_text(),
            Expr::Compare { lhs, rhs, .. } => lhs.accesses_text() || rhs.accesses_text(),
            Expr::Text => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CompareOp {
    /// The operator that gives the same result with its operands swapped.
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::LessThan => CompareOp::GreaterThan,
            CompareOp::LessThanOrEqual => CompareOp::GreaterThanOrEqual,
            CompareOp::GreaterThan => CompareOp::LessThan,
            CompareOp::GreaterThanOrEqual => CompareOp::LessThanOrEqual,
            other => other,
        }
    }

    pub fn compare_numbers(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Equals => lhs == rhs,
            CompareOp::NotEquals => lhs != rhs,
            CompareOp::LessThan => lhs < rhs,
            CompareOp::LessThanOrEqual => lhs <= rhs,
            CompareOp::GreaterThan => lhs > rhs,
            CompareOp::GreaterThanOrEqual => lhs >= rhs,
        }
    }
}

/// The axis a parsed step was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Axis {
    Child,
    Attribute,
    DescendantOrSelf,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Any,
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStep {
    pub axis: Axis,
    pub test: NameTest,
    pub predicates: Vec<Expr>,
}

impl ParsedStep {
    pub fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NameTest::Any,
            predicates: vec![],
        }
    }
}

/// A location path in the supported subset, e.g. `/order/items//item[@id='3']`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedPath {
    pub rooted: bool,
    pub steps: Vec<ParsedStep>,
    /// The path ended in `//`, i.e. it targets everything below its last step.
    pub ends_star_star: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_access_is_found_through_nesting() {
        let expr = Expr::And(
            Box::new(Expr::Attribute("a".into())),
            Box::new(Expr::Not(Box::new(Expr::Compare {
                lhs: Box::new(Expr::Text),
                op: CompareOp::Equals,
                rhs: Box::new(Expr::Literal("x".into())),
            }))),
        );
        assert!(expr.accesses_text());
        assert!(!Expr::Attribute("a".into()).accesses_text());
    }

    #[test]
    fn flipped_operators() {
        assert_eq!(CompareOp::LessThan.flipped(), CompareOp::GreaterThan);
        assert_eq!(CompareOp::Equals.flipped(), CompareOp::Equals);
        assert!(CompareOp::GreaterThanOrEqual.compare_numbers(2.0, 2.0));
    }
}
