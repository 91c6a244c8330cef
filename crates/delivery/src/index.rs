//! Per-element-name visitor lists, resolved once before any traversal.
use crate::binding::{ResourceConfig, VisitorBinding};
use crate::error::DeliveryError;
use crate::interceptor::InterceptorChain;
use crate::position::PositionCounter;
use crate::settings::FilterSettings;
use crate::sorter::{self, SortOrder};
use crate::visitor::Visitor;
use std::collections::HashMap;
use std::sync::Arc;
use weft_selector::{CounterId, NamespaceTable, STAR, SelectorPath};
use weft_types::QName;

/// The visitors to consider for one element, split by callback.
#[derive(Debug, Default)]
pub struct ElementBindings {
    before: Vec<VisitorBinding>,
    children: Vec<VisitorBinding>,
    after: Vec<VisitorBinding>,
    post_fragment: Vec<VisitorBinding>,
    needs_text: bool,
}

impl ElementBindings {
    pub fn before(&self) -> &[VisitorBinding] {
        &self.before
    }

    pub fn children(&self) -> &[VisitorBinding] {
        &self.children
    }

    pub fn after(&self) -> &[VisitorBinding] {
        &self.after
    }

    pub fn post_fragment(&self) -> &[VisitorBinding] {
        &self.post_fragment
    }

    /// Whether some selector reads the element's text, which then has to
    /// stay materialized until the element closes.
    pub fn needs_text(&self) -> bool {
        self.needs_text
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.children.is_empty()
            && self.after.is_empty()
            && self.post_fragment.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
struct Buckets {
    before: Vec<VisitorBinding>,
    children: Vec<VisitorBinding>,
    after: Vec<VisitorBinding>,
    post_fragment: Vec<VisitorBinding>,
}

impl Buckets {
    fn push(&mut self, binding: VisitorBinding) {
        let caps = binding.capabilities();
        if caps.before {
            self.before.push(binding.clone());
        }
        if caps.children {
            self.children.push(binding.clone());
        }
        if caps.after {
            self.after.push(binding.clone());
        }
        if caps.post_fragment {
            self.post_fragment.push(binding);
        }
    }

    fn merged(mut self, other: &Buckets) -> Self {
        self.before.extend_from_slice(&other.before);
        self.children.extend_from_slice(&other.children);
        self.after.extend_from_slice(&other.after);
        self.post_fragment.extend_from_slice(&other.post_fragment);
        self
    }

    fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.children.is_empty()
            && self.after.is_empty()
            && self.post_fragment.is_empty()
    }
}

/// Maps element names to the visitors that may target them.
///
/// Bindings whose selector ends in `*` or `**` are global: they are merged
/// into every named list here, so a lookup returns one list and each visitor
/// fires at most once per callback for an element.
#[derive(Debug)]
pub struct VisitorBindingIndex {
    by_name: HashMap<String, Arc<ElementBindings>>,
    by_root_name: HashMap<String, Arc<ElementBindings>>,
    global: Option<Arc<ElementBindings>>,
    root_default: Option<Arc<ElementBindings>>,
    binding_count: usize,
}

struct Counter {
    element: QName,
    binding: VisitorBinding,
}

impl VisitorBindingIndex {
    /// Binds every selector to `namespaces`, wraps visitors in the default
    /// interceptors and builds the merged, sorted lists.
    pub fn build(
        bindings: Vec<VisitorBinding>,
        namespaces: &NamespaceTable,
        settings: &FilterSettings,
    ) -> Result<Self, DeliveryError> {
        let binding_count = bindings.len();
        let mut named: HashMap<String, Buckets> = HashMap::new();
        let mut document = Buckets::default();
        let mut global = Buckets::default();
        let mut counter_ids: Vec<(CounterId, QName)> = Vec::new();

        for binding in bindings {
            let binding = prepare(binding, namespaces, settings)?;
            let selector = binding.resource().selector();
            for (counter, element) in selector.position_counters() {
                if !counter_ids.iter().any(|(c, _)| *c == counter) {
                    counter_ids.push((counter, element));
                }
            }
            let target = selector.target_step();
            if target.is_star() || target.is_star_star() {
                global.push(binding);
            } else if target.is_document() {
                document.push(binding);
            } else {
                let name = target.element().local_name.clone();
                named.entry(name).or_default().push(binding);
            }
        }

        let counters: Vec<Counter> = counter_ids
            .into_iter()
            .map(|(counter, element)| counter_binding(counter, element))
            .collect();
        for counter in &counters {
            if counter.element.local_name != STAR {
                named.entry(counter.element.local_name.clone()).or_default();
            }
        }
        let has_star_counter = counters.iter().any(|c| c.element.local_name == STAR);

        let mut by_name = HashMap::with_capacity(named.len());
        let mut by_root_name = HashMap::with_capacity(named.len());
        for (name, own) in &named {
            let merged = own.clone().merged(&global);
            let rooted = document.clone().merged(own).merged(&global);
            by_name.insert(name.clone(), finish(merged, Some(name), &counters, settings)?);
            by_root_name.insert(name.clone(), finish(rooted, Some(name), &counters, settings)?);
        }
        let global_bindings = if global.is_empty() && !has_star_counter {
            None
        } else {
            Some(finish(global.clone(), None, &counters, settings)?)
        };
        let root_default = document.merged(&global);
        let root_default = if root_default.is_empty() && !has_star_counter {
            None
        } else {
            Some(finish(root_default, None, &counters, settings)?)
        };

        log::debug!(
            "Built visitor index: {} binding(s), {} element name(s), {} position counter(s)",
            binding_count,
            by_name.len(),
            counters.len()
        );

        Ok(Self {
            by_name,
            by_root_name,
            global: global_bindings,
            root_default,
            binding_count,
        })
    }

    /// Bindings for an element below the root. `None` means no visitor can
    /// target an element of that name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<ElementBindings>> {
        self.by_name.get(name).or(self.global.as_ref())
    }

    /// Bindings for the root element, which also receives `#document` visitors.
    pub fn lookup_root(&self, name: &str) -> Option<&Arc<ElementBindings>> {
        self.by_root_name.get(name).or(self.root_default.as_ref())
    }

    /// Number of user bindings the index was built from.
    pub fn len(&self) -> usize {
        self.binding_count
    }

    pub fn is_empty(&self) -> bool {
        self.binding_count == 0
    }
}

fn prepare(
    binding: VisitorBinding,
    namespaces: &NamespaceTable,
    settings: &FilterSettings,
) -> Result<VisitorBinding, DeliveryError> {
    let mut resource = ResourceConfig::clone(binding.resource());
    resource.selector_mut().set_namespaces(namespaces)?;
    let visitor = if settings.default_interceptors {
        InterceptorChain::wrap(binding.visitor().clone(), &resource)
    } else {
        binding.visitor().clone()
    };
    Ok(VisitorBinding::new(visitor, Arc::new(resource)))
}

fn counter_binding(counter: CounterId, element: QName) -> Counter {
    let visitor: Arc<dyn Visitor> = Arc::new(PositionCounter::new(counter, element.clone()));
    let resource = ResourceConfig::new(SelectorPath::for_element(element.clone()))
        .with_id(format!("position-counter:{}", element));
    Counter {
        element,
        binding: VisitorBinding::new(visitor, Arc::new(resource)),
    }
}

fn finish(
    buckets: Buckets,
    name: Option<&str>,
    counters: &[Counter],
    settings: &FilterSettings,
) -> Result<Arc<ElementBindings>, DeliveryError> {
    let Buckets {
        mut before,
        mut children,
        mut after,
        post_fragment,
    } = buckets;
    if settings.sort_visitors {
        before = sorter::sort(before, SortOrder::ProducersFirst)?;
        children = sorter::sort(children, SortOrder::ProducersFirst)?;
        after = sorter::sort(after, SortOrder::ConsumersFirst)?;
    }

    let needs_text = before
        .iter()
        .chain(&children)
        .chain(&after)
        .any(|b| b.resource().selector().accesses_text());

    // Counters always run first so predicates see the element's position.
    for counter in counters {
        let applies = counter.element.local_name == STAR
            || name.is_some_and(|n| n == counter.element.local_name);
        if applies {
            before.insert(0, counter.binding.clone());
        }
    }

    Ok(Arc::new(ElementBindings {
        before,
        children,
        after,
        post_fragment,
        needs_text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::FnVisitor;

    fn bind(selector: &str, visitor: FnVisitor) -> VisitorBinding {
        let visitor: Arc<dyn Visitor> = Arc::new(visitor);
        VisitorBinding::new(visitor, Arc::new(ResourceConfig::compile(selector).unwrap()))
    }

    fn before(name: &str) -> FnVisitor {
        FnVisitor::new(name).on_before(|_, _| Ok(()))
    }

    fn names(bindings: &[VisitorBinding]) -> Vec<&str> {
        bindings.iter().map(|b| b.visitor().name()).collect()
    }

    fn build(bindings: Vec<VisitorBinding>) -> VisitorBindingIndex {
        VisitorBindingIndex::build(bindings, &NamespaceTable::new(), &FilterSettings::default())
            .unwrap()
    }

    #[test]
    fn global_bindings_are_merged_once_into_named_lists() {
        let index = build(vec![
            bind("*", before("star")),
            bind("item", before("item")),
            bind("order/**", before("deep")),
        ]);
        assert_eq!(names(index.lookup("item").unwrap().before()), ["item", "star", "deep"]);
        // Names nobody targets directly fall back to the global list.
        assert_eq!(names(index.lookup("other").unwrap().before()), ["star", "deep"]);
    }

    #[test]
    fn no_bindings_means_no_list() {
        let index = build(vec![bind("item", before("item"))]);
        assert!(index.lookup("other").is_none());
        assert!(index.lookup_root("other").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn root_lists_include_document_bindings() {
        let index = build(vec![
            bind("#document", before("doc")),
            bind("order", before("order")),
            bind("*", before("star")),
        ]);
        assert_eq!(names(index.lookup_root("order").unwrap().before()), ["doc", "order", "star"]);
        assert_eq!(names(index.lookup_root("other").unwrap().before()), ["doc", "star"]);
        assert_eq!(names(index.lookup("order").unwrap().before()), ["order", "star"]);
    }

    #[test]
    fn bindings_are_split_by_capability() {
        let index = build(vec![
            bind("item", FnVisitor::new("a").on_after(|_, _| Ok(()))),
            bind("item", FnVisitor::new("c").on_child_text(|_, _, _| Ok(()))),
            bind("item", FnVisitor::new("p").on_post_fragment(|_, _| Ok(()))),
        ]);
        let item = index.lookup("item").unwrap();
        assert!(item.before().is_empty());
        assert_eq!(names(item.after()), ["a"]);
        assert_eq!(names(item.children()), ["c"]);
        assert_eq!(names(item.post_fragment()), ["p"]);
    }

    #[test]
    fn position_counters_are_injected_first() {
        let index = build(vec![bind("x/y[2]", before("second"))]);
        let y = index.lookup("y").unwrap();
        assert_eq!(names(y.before()), ["PositionCounter", "second"]);
        assert!(index.lookup("x").is_none());

        let index = build(vec![bind("x/*[2]/z", before("z"))]);
        assert_eq!(names(index.lookup("z").unwrap().before()), ["PositionCounter", "z"]);
        assert_eq!(names(index.lookup("anything").unwrap().before()), ["PositionCounter"]);
    }

    #[test]
    fn text_predicates_mark_lists() {
        let index = build(vec![
            bind("item[text() = 'a']", before("t")),
            bind("other", before("o")),
        ]);
        assert!(index.lookup("item").unwrap().needs_text());
        assert!(!index.lookup("other").unwrap().needs_text());
    }

    #[test]
    fn visitors_are_wrapped_only_when_enabled() {
        let index = build(vec![bind("item", before("v"))]);
        assert!(index.lookup("item").unwrap().before()[0].visitor().as_interceptor().is_some());

        let index = VisitorBindingIndex::build(
            vec![bind("item", before("v"))],
            &NamespaceTable::new(),
            &FilterSettings::default().with_default_interceptors(false),
        )
        .unwrap();
        assert!(index.lookup("item").unwrap().before()[0].visitor().as_interceptor().is_none());
    }

    #[test]
    fn unknown_prefixes_fail_the_build() {
        let result = VisitorBindingIndex::build(
            vec![bind("o:item", before("v"))],
            &NamespaceTable::new(),
            &FilterSettings::default(),
        );
        assert!(matches!(result, Err(DeliveryError::Selector(_))));
    }

    #[test]
    fn after_lists_are_sorted_consumers_first() {
        let index = build(vec![
            bind("item", FnVisitor::new("producer").producing("p").on_after(|_, _| Ok(()))),
            bind("item", FnVisitor::new("consumer").consuming("p").on_after(|_, _| Ok(()))),
        ]);
        assert_eq!(names(index.lookup("item").unwrap().after()), ["consumer", "producer"]);
    }

    #[test]
    fn dependency_cycles_fail_the_build() {
        let result = VisitorBindingIndex::build(
            vec![
                bind("item", before("a").producing("a").consuming("b")),
                bind("item", before("b").producing("b").consuming("a")),
            ],
            &NamespaceTable::new(),
            &FilterSettings::default(),
        );
        assert!(matches!(result, Err(DeliveryError::Configuration(_))));
    }
}
