use crate::ast::Expr;
use crate::error::SelectorError;
use crate::evaluator::{CounterId, EvaluatorCompiler, PredicateEvaluator};
use crate::namespace::NamespaceTable;
use crate::node::{MatchContext, SelectorNode};
use std::fmt;
use std::sync::Arc;
use weft_types::QName;

pub const DOCUMENT_TOKEN: &str = "#document";
pub const STAR: &str = "*";
pub const STAR_STAR: &str = "**";

/// One segment of a compiled selector path.
///
/// Steps are built at compile time and bound to namespaces once; after that
/// they are read-only and can be shared between concurrent matches. Cloning
/// shares the compiled evaluator.
#[derive(Debug, Clone)]
pub struct SelectorStep {
    expression: Arc<str>,
    element: QName,
    attribute: Option<QName>,
    predicates: Vec<Expr>,
    evaluator: Option<Arc<PredicateEvaluator>>,
    rooted: bool,
    legacy: bool,
}

impl SelectorStep {
    pub fn new(expression: impl Into<Arc<str>>, element: QName) -> Self {
        let rooted = element.local_name == DOCUMENT_TOKEN;
        Self {
            expression: expression.into(),
            element,
            attribute: None,
            predicates: Vec::new(),
            evaluator: None,
            rooted,
            legacy: false,
        }
    }

    /// The document-root anchor step.
    pub fn document(expression: impl Into<Arc<str>>) -> Self {
        Self::new(expression, QName::new(DOCUMENT_TOKEN))
    }

    /// A step taken literally from a legacy selector token. Legacy steps never
    /// carry predicates and always evaluate as pass-through.
    pub fn legacy(expression: impl Into<Arc<str>>, token: &str) -> Self {
        let mut step = Self::new(expression, QName::new(token));
        step.legacy = true;
        step.evaluator = Some(Arc::new(PredicateEvaluator::PassThru));
        step
    }

    /// A plain element step with no predicates, bound as it is built.
    /// `element` must already carry its namespace URI rather than a prefix.
    pub fn bound(expression: impl Into<Arc<str>>, element: QName) -> Self {
        let mut step = Self::new(expression, element);
        step.evaluator = Some(Arc::new(PredicateEvaluator::PassThru));
        step
    }

    pub fn with_attribute(mut self, attribute: QName) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn with_predicates(mut self, predicates: Vec<Expr>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn element(&self) -> &QName {
        &self.element
    }

    pub fn attribute(&self) -> Option<&QName> {
        self.attribute.as_ref()
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn evaluator(&self) -> Option<&PredicateEvaluator> {
        self.evaluator.as_deref()
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    /// Marks the step as anchored at the document root. Ignored for `**`.
    pub fn set_rooted(&mut self, rooted: bool) {
        if !self.is_star_star() {
            self.rooted = rooted;
        }
    }

    pub fn is_star(&self) -> bool {
        self.element.local_name == STAR
    }

    pub fn is_star_star(&self) -> bool {
        self.element.local_name == STAR_STAR
    }

    pub fn is_document(&self) -> bool {
        self.element.local_name == DOCUMENT_TOKEN
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    pub fn is_bound(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn accesses_text(&self) -> bool {
        match &self.evaluator {
            Some(evaluator) => evaluator.accesses_text(),
            None => self.predicates.iter().any(Expr::accesses_text),
        }
    }

    pub fn position_counters(&self) -> Vec<CounterId> {
        self.evaluator
            .as_ref()
            .map(|e| e.position_counters())
            .unwrap_or_default()
    }

    /// A step with no namespace matches elements in any namespace.
    pub fn is_targeted_at_namespace(&self, namespace: Option<&str>) -> bool {
        match self.element.namespace() {
            None => true,
            Some(ns) => namespace == Some(ns),
        }
    }

    /// Resolves prefixes and compiles the predicate evaluator. A step that is
    /// already bound is left untouched.
    pub fn bind_namespaces(
        &mut self,
        selector: &str,
        namespaces: &NamespaceTable,
    ) -> Result<(), SelectorError> {
        if self.evaluator.is_some() {
            return Ok(());
        }
        let compiler = EvaluatorCompiler::new(selector, namespaces);
        if self.element.prefix.is_some() {
            self.element = compiler.resolve_name(&self.element.to_string())?;
        }
        if let Some(attribute) = &self.attribute {
            self.attribute = Some(compiler.resolve_name(&attribute.to_string())?);
        }

        let mut evaluators = self
            .predicates
            .iter()
            .map(|p| compiler.compile_predicate(p))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(attribute) = &self.attribute {
            evaluators.push(PredicateEvaluator::AttributeExists(attribute.clone()));
        }
        let evaluator = match evaluators.len() {
            0 => PredicateEvaluator::PassThru,
            1 => evaluators.remove(0),
            _ => PredicateEvaluator::All(evaluators),
        };
        self.evaluator = Some(Arc::new(evaluator));
        Ok(())
    }

    /// Name, namespace and predicate test against one element. Rootedness,
    /// `**` and the document anchor are handled by the path matcher.
    pub fn matches_element<'a, N: SelectorNode<'a>>(&self, node: N, ctx: &dyn MatchContext) -> bool {
        if !self.is_star() && self.element.local_name != node.local_name() {
            return false;
        }
        if !self.is_targeted_at_namespace(node.namespace_uri()) {
            return false;
        }
        match &self.evaluator {
            Some(evaluator) => evaluator.evaluate(node, ctx),
            // Not bound yet: only predicate-free steps can be decided.
            None => self.predicates.is_empty() && self.attribute.is_none(),
        }
    }
}

impl PartialEq for SelectorStep {
    /// Structural equality; compiled evaluators are not compared.
    fn eq(&self, other: &Self) -> bool {
        self.element == other.element
            && self.attribute == other.attribute
            && self.predicates == other.predicates
            && self.rooted == other.rooted
            && self.legacy == other.legacy
    }
}

impl fmt::Display for SelectorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooted && !self.is_document() {
            f.write_str("/")?;
        }
        write!(f, "{}", self.element)?;
        if !self.predicates.is_empty() {
            write!(f, "[{} predicate(s)]", self.predicates.len())?;
        }
        if let Some(attribute) = &self.attribute {
            write!(f, "/@{}", attribute)?;
        }
        Ok(())
    }
}
