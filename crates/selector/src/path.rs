//! Compiled selector paths and the contextual matcher.
use crate::ast::{Axis, NameTest, ParsedPath};
use crate::condition::ConditionEvaluator;
use crate::error::SelectorError;
use crate::evaluator::CounterId;
use crate::namespace::NamespaceTable;
use crate::node::{MatchContext, SelectorNode};
use crate::parser;
use crate::step::{DOCUMENT_TOKEN, STAR, STAR_STAR, SelectorStep};
use std::fmt;
use std::sync::Arc;
use weft_types::QName;

/// An ordered chain of steps compiled from one selector string.
///
/// Matching walks from the last (target) step back toward the first while
/// following the node's ancestor chain. After [`SelectorPath::set_namespaces`]
/// the path is read-only and may be matched from many threads at once.
#[derive(Debug, Clone)]
pub struct SelectorPath {
    selector: String,
    steps: Vec<SelectorStep>,
    namespaces: NamespaceTable,
    condition: Option<Arc<dyn ConditionEvaluator>>,
    legacy: bool,
}

impl SelectorPath {
    /// Compiles `selector`, trying the XPath subset first and the legacy
    /// contextual form second.
    pub fn compile(selector: &str) -> Result<Self, SelectorError> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::parse(selector, "empty selector"));
        }
        check_document_token(trimmed)?;

        if is_encoded_token(trimmed) {
            let steps = legacy_steps(trimmed).ok_or_else(|| {
                SelectorError::parse(trimmed, "invalid encoded selector token")
            })?;
            return Ok(Self::from_steps(trimmed, steps, true));
        }

        let normalized = parser::normalize(trimmed);
        match parser::parse_path(&normalized).and_then(|parsed| build_steps(trimmed, parsed)) {
            Ok(steps) => Ok(Self::from_steps(trimmed, steps, false)),
            Err(err) => match legacy_steps(trimmed) {
                Some(steps) => {
                    log::debug!(
                        "Selector '{}' is outside the XPath subset ({}); compiled as a legacy selector",
                        trimmed,
                        err
                    );
                    Ok(Self::from_steps(trimmed, steps, true))
                }
                None => Err(err),
            },
        }
    }

    /// A single-step path targeting `element`, already bound.
    /// The element's namespace URI is matched directly; its prefix is dropped.
    pub fn for_element(element: QName) -> Self {
        let element = QName::with_namespace(None, element.local_name, element.namespace_uri);
        let selector = element.to_string();
        let step = SelectorStep::bound(selector.as_str(), element);
        Self::from_steps(&selector, vec![step], false)
    }

    fn from_steps(selector: &str, steps: Vec<SelectorStep>, legacy: bool) -> Self {
        Self {
            selector: selector.to_string(),
            steps,
            namespaces: NamespaceTable::new(),
            condition: None,
            legacy,
        }
    }

    pub fn with_condition(mut self, condition: Arc<dyn ConditionEvaluator>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn set_condition(&mut self, condition: Option<Arc<dyn ConditionEvaluator>>) {
        self.condition = condition;
    }

    /// Binds namespace prefixes and compiles every step's predicate
    /// evaluator. Steps bound by an earlier call are left as they are.
    pub fn set_namespaces(&mut self, namespaces: &NamespaceTable) -> Result<(), SelectorError> {
        self.namespaces.merge(namespaces);
        let last = self.steps.len().saturating_sub(1);
        for (i, step) in self.steps.iter_mut().enumerate() {
            step.bind_namespaces(&self.selector, &self.namespaces)?;
            if i < last && step.accesses_text() {
                return Err(SelectorError::TextPredicatePosition {
                    selector: self.selector.clone(),
                    step: step.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn steps(&self) -> &[SelectorStep] {
        &self.steps
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    pub fn condition(&self) -> Option<&Arc<dyn ConditionEvaluator>> {
        self.condition.as_ref()
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    pub fn target_step(&self) -> &SelectorStep {
        // Compilation never produces an empty path.
        &self.steps[self.steps.len() - 1]
    }

    pub fn target_element(&self) -> &QName {
        self.target_step().element()
    }

    pub fn target_attribute(&self) -> Option<&QName> {
        self.target_step().attribute()
    }

    pub fn accesses_text(&self) -> bool {
        self.steps.iter().any(SelectorStep::accesses_text)
    }

    /// Positional counters read by this path, with the element each counts.
    pub fn position_counters(&self) -> Vec<(CounterId, QName)> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.position_counters()
                    .into_iter()
                    .map(move |counter| (counter, step.element().clone()))
            })
            .collect()
    }

    /// Decides whether this path selects `node` given its ancestor chain.
    pub fn is_targeted_at<'a, N: SelectorNode<'a>>(&self, node: N, ctx: &dyn MatchContext) -> bool {
        if let Some(condition) = &self.condition {
            if !condition.evaluate(ctx) {
                return false;
            }
        }
        let Some((target, _)) = self.steps.split_last() else {
            return false;
        };
        if !matches_target(target, node, ctx) {
            return false;
        }
        if self.steps.len() == 1 {
            return true;
        }

        let last = self.steps.len() - 1;
        if target.is_star_star() {
            // `**` may stand for zero levels, so the walk starts at the node itself.
            self.match_ancestors(last + 1, Some(node), ctx)
        } else {
            self.match_ancestors(last, node.parent(), ctx)
        }
    }

    /// Matches `steps[..pending]` against `current` and its ancestors.
    fn match_ancestors<'a, N: SelectorNode<'a>>(
        &self,
        mut pending: usize,
        mut current: Option<N>,
        ctx: &dyn MatchContext,
    ) -> bool {
        while pending > 0 {
            let step = &self.steps[pending - 1];
            let Some(element) = current else {
                return self.steps[..pending]
                    .iter()
                    .all(|s| s.is_star_star() || s.is_document());
            };
            if step.is_document() {
                return false;
            }

            if step.is_star_star() {
                if pending == 1 {
                    return true;
                }
                let parent_step = &self.steps[pending - 2];
                if matches_in_context(parent_step, element, ctx)
                    && self.match_ancestors(pending - 2, element.parent(), ctx)
                {
                    return true;
                }
                current = element.parent();
                continue;
            }

            if !matches_in_context(step, element, ctx) {
                return false;
            }
            pending -= 1;
            current = element.parent();
        }
        true
    }
}

fn matches_target<'a, N: SelectorNode<'a>>(step: &SelectorStep, node: N, ctx: &dyn MatchContext) -> bool {
    if step.is_document() {
        return node.parent().is_none();
    }
    if step.is_star_star() {
        return true;
    }
    matches_in_context(step, node, ctx)
}

fn matches_in_context<'a, N: SelectorNode<'a>>(
    step: &SelectorStep,
    element: N,
    ctx: &dyn MatchContext,
) -> bool {
    if step.is_document() {
        return false;
    }
    if step.is_star_star() {
        return true;
    }
    if step.is_rooted() && element.parent().is_some() {
        return false;
    }
    step.matches_element(element, ctx)
}

impl PartialEq for SelectorPath {
    fn eq(&self, other: &Self) -> bool {
        self.steps == other.steps && self.legacy == other.legacy
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector)
    }
}

// --- Compilation helpers ---

fn check_document_token(selector: &str) -> Result<(), SelectorError> {
    let misplaced = step_tokens(selector)
        .iter()
        .skip(1)
        .any(|token| token_name(token) == DOCUMENT_TOKEN);
    if misplaced {
        return Err(SelectorError::DocumentTokenPosition {
            selector: selector.to_string(),
        });
    }
    Ok(())
}

/// Splits a selector into its steps on `/` and whitespace, leaving bracketed
/// predicates and quoted literals intact.
fn step_tokens(selector: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '\'' | '"' if depth > 0 => quote = Some(c),
            '/' if depth == 0 => {
                tokens.push(&selector[start..i]);
                start = i + c.len_utf8();
            }
            c if depth == 0 && c.is_whitespace() => {
                tokens.push(&selector[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    tokens.push(&selector[start..]);
    tokens.retain(|t| !t.is_empty());
    tokens
}

/// The name part of a step token, without predicates.
fn token_name(token: &str) -> &str {
    token.split_once('[').map_or(token, |(name, _)| name)
}

/// Tokens such as `#text` or `$document` are taken literally.
fn is_encoded_token(selector: &str) -> bool {
    selector.starts_with('$')
        || (selector.starts_with('#') && !selector.starts_with(DOCUMENT_TOKEN))
}

fn build_steps(selector: &str, parsed: ParsedPath) -> Result<Vec<SelectorStep>, SelectorError> {
    let expression: Arc<str> = Arc::from(selector);
    let last = parsed.steps.len().saturating_sub(1);
    let mut steps: Vec<SelectorStep> = Vec::with_capacity(parsed.steps.len() + 2);

    for (i, parsed_step) in parsed.steps.into_iter().enumerate() {
        match parsed_step.axis {
            Axis::Child => {
                let element = match parsed_step.test {
                    NameTest::Any => QName::new(STAR),
                    NameTest::Name(name) => QName::parse_prefixed(&name),
                };
                steps.push(
                    SelectorStep::new(expression.clone(), element)
                        .with_predicates(parsed_step.predicates),
                );
            }
            Axis::DescendantOrSelf => {
                steps.push(SelectorStep::new(expression.clone(), QName::new(STAR_STAR)));
            }
            Axis::Attribute => {
                if i != last {
                    return Err(SelectorError::AttributeStepPosition {
                        selector: selector.to_string(),
                    });
                }
                let NameTest::Name(name) = parsed_step.test else {
                    return Err(SelectorError::parse(selector, "attribute wildcards are not supported"));
                };
                if !parsed_step.predicates.is_empty() {
                    return Err(SelectorError::parse(
                        selector,
                        "predicates on attribute steps are not supported",
                    ));
                }
                let attribute = QName::parse_prefixed(&name);
                match steps.pop() {
                    Some(previous) if !previous.is_star_star() => {
                        steps.push(previous.with_attribute(attribute));
                    }
                    previous => {
                        steps.extend(previous);
                        steps.push(
                            SelectorStep::new(expression.clone(), QName::new(STAR))
                                .with_attribute(attribute),
                        );
                    }
                }
            }
            Axis::Other(axis) => {
                return Err(SelectorError::UnsupportedAxis {
                    selector: selector.to_string(),
                    axis,
                });
            }
        }
    }

    if parsed.rooted {
        match steps.first_mut() {
            Some(first) => first.set_rooted(true),
            None => steps.push(SelectorStep::document(expression.clone())),
        }
    }
    if parsed.ends_star_star {
        steps.push(SelectorStep::new(expression, QName::new(STAR_STAR)));
    }
    if steps.is_empty() {
        return Err(SelectorError::parse(selector, "selector has no steps"));
    }
    Ok(steps)
}

fn is_legacy_token(token: &str) -> bool {
    !token.contains("::")
        && token.char_indices().all(|(i, c)| {
            c.is_alphanumeric()
                || matches!(c, '_' | '-' | '.' | ':' | '*' | '#' | '$')
                || (c == '@' && i == 0)
        })
}

/// Splits a legacy selector into pass-through steps, or `None` if a token is
/// not a plain name.
fn legacy_steps(selector: &str) -> Option<Vec<SelectorStep>> {
    let expression: Arc<str> = Arc::from(selector);
    let mut tokens: Vec<&str> = Vec::new();
    let mut rest = selector;
    if let Some(stripped) = selector.strip_prefix('/') {
        tokens.push(DOCUMENT_TOKEN);
        rest = stripped;
    }
    if rest.contains('/') {
        tokens.extend(rest.split('/').filter(|t| !t.is_empty()));
    } else {
        tokens.extend(rest.split_whitespace());
    }
    if !tokens.iter().all(|t| is_legacy_token(t)) {
        return None;
    }

    let attribute = match tokens.last() {
        Some(token) if token.len() > 1 && token.starts_with('@') => {
            let name = QName::new(&token[1..]);
            tokens.pop();
            Some(name)
        }
        _ => None,
    };
    if tokens.is_empty() {
        if attribute.is_none() {
            return None;
        }
        tokens.push(STAR);
    }
    if tokens.iter().any(|t| t.starts_with('@')) {
        return None;
    }

    let mut steps: Vec<SelectorStep> = tokens
        .into_iter()
        .map(|token| SelectorStep::legacy(expression.clone(), token))
        .collect();
    if let (Some(attribute), Some(target)) = (attribute, steps.pop()) {
        steps.push(target.with_attribute(attribute));
    }
    Some(steps)
}
