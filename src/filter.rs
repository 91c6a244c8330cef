use crate::dom_source;
use crate::error::WeftError;
use crate::reader;
use std::fmt;
use std::sync::Arc;
use weft_delivery::{
    DomBuilder, DomDispatcher, ExecutionContext, ExecutionEventListener, FilterSettings, ResourceConfig,
    StreamingDispatcher, Visitor, VisitorBinding, VisitorBindingIndex,
};
use weft_selector::{ConditionEvaluator, NamespaceTable, SelectorPath};
use weft_types::{StreamEvent, StreamEventHandler};

type ListenerFactory = dyn Fn() -> Box<dyn ExecutionEventListener> + Send + Sync;

/// Collects visitor bindings and settings for a [`Filter`].
#[derive(Default)]
pub struct FilterBuilder {
    bindings: Vec<VisitorBinding>,
    namespaces: NamespaceTable,
    settings: FilterSettings,
    listener_factories: Vec<Arc<ListenerFactory>>,
}

impl fmt::Debug for FilterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterBuilder")
            .field("bindings", &self.bindings.len())
            .field("namespaces", &self.namespaces)
            .field("settings", &self.settings)
            .finish()
    }
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: FilterSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Loads settings from JSON, e.g. `{"max-node-depth": 0}`.
    pub fn with_settings_json(mut self, json: &str) -> Result<Self, WeftError> {
        self.settings = FilterSettings::from_json(json)?;
        Ok(self)
    }

    /// Declares a namespace prefix for use in selectors.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix, uri);
        self
    }

    /// Binds `visitor` to the elements `selector` targets.
    pub fn bind(self, selector: &str, visitor: impl Visitor + 'static) -> Result<Self, WeftError> {
        let resource = ResourceConfig::compile(selector)?;
        Ok(self.bind_resource(resource, Arc::new(visitor)))
    }

    /// Like [`FilterBuilder::bind`], with a side condition checked before the
    /// selector is matched.
    pub fn bind_with_condition(
        self,
        selector: &str,
        condition: Arc<dyn ConditionEvaluator>,
        visitor: impl Visitor + 'static,
    ) -> Result<Self, WeftError> {
        let path = SelectorPath::compile(selector)?.with_condition(condition);
        Ok(self.bind_resource(ResourceConfig::new(path), Arc::new(visitor)))
    }

    pub fn bind_resource(mut self, resource: ResourceConfig, visitor: Arc<dyn Visitor>) -> Self {
        self.bindings
            .push(VisitorBinding::new(visitor, Arc::new(resource)));
        self
    }

    /// Every context created by the filter gets a fresh listener from `factory`.
    pub fn with_listener_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExecutionEventListener> + Send + Sync + 'static,
    {
        self.listener_factories.push(Arc::new(factory));
        self
    }

    pub fn build(self) -> Result<Filter, WeftError> {
        let index = VisitorBindingIndex::build(self.bindings, &self.namespaces, &self.settings)?;
        Ok(Filter {
            index: Arc::new(index),
            settings: self.settings,
            listener_factories: self.listener_factories,
        })
    }
}

/// A compiled set of visitor bindings. Cheap to clone and safe to share
/// between threads; each run gets its own [`ExecutionContext`].
#[derive(Clone)]
pub struct Filter {
    index: Arc<VisitorBindingIndex>,
    settings: FilterSettings,
    listener_factories: Vec<Arc<ListenerFactory>>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("bindings", &self.index.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::new()
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn index(&self) -> &VisitorBindingIndex {
        &self.index
    }

    pub fn new_context(&self, source_id: impl Into<String>) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(source_id, self.settings.clone());
        for factory in &self.listener_factories {
            ctx.add_listener(factory());
        }
        ctx
    }

    /// Streams `xml` through the visitors.
    pub fn filter_str(&self, xml: &str, ctx: &mut ExecutionContext) -> Result<(), WeftError> {
        log::debug!("Streaming filter over '{}'", ctx.source_id());
        let mut dispatcher = StreamingDispatcher::new(&self.index, ctx);
        reader::run_event_loop(xml, &mut dispatcher)
    }

    /// Streams already-produced events through the visitors. `StartDocument`
    /// and `EndDocument` are implied.
    pub fn filter_events<I>(&self, events: I, ctx: &mut ExecutionContext) -> Result<(), WeftError>
    where
        I: IntoIterator<Item = StreamEvent>,
    {
        let mut dispatcher = StreamingDispatcher::new(&self.index, ctx);
        dispatcher.start_document()?;
        for event in events {
            if dispatcher.is_terminated() {
                break;
            }
            event.feed(&mut dispatcher)?;
        }
        dispatcher.end_document()?;
        Ok(())
    }

    /// Parses `xml` completely and visits it in two passes.
    pub fn filter_dom_str(&self, xml: &str, ctx: &mut ExecutionContext) -> Result<(), WeftError> {
        log::debug!("DOM filter over '{}'", ctx.source_id());
        let mut builder = DomBuilder::new(self.settings.rewrite_entities);
        let document = reader::run_event_loop(xml, &mut builder)?;
        ctx.set_document(document);
        self.filter_document(ctx)
    }

    /// Visits a tree already parsed by roxmltree in two passes.
    pub fn filter_tree(
        &self,
        tree: &roxmltree::Document<'_>,
        ctx: &mut ExecutionContext,
    ) -> Result<(), WeftError> {
        ctx.set_document(dom_source::from_roxmltree(tree));
        self.filter_document(ctx)
    }

    /// Visits the document already held by `ctx` in two passes.
    pub fn filter_document(&self, ctx: &mut ExecutionContext) -> Result<(), WeftError> {
        DomDispatcher::new(&self.index, ctx).run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_delivery::{EventCollector, FnVisitor};

    #[test]
    fn builder_rejects_bad_selectors_and_settings() {
        let bad_selector = FilterBuilder::new().bind("a/following::b", FnVisitor::new("v"));
        assert!(matches!(bad_selector, Err(WeftError::Selector(_))));

        let bad_settings = FilterBuilder::new().with_settings_json("{ nope");
        assert!(matches!(bad_settings, Err(WeftError::Settings(_))));
    }

    #[test]
    fn contexts_get_listeners_from_factories() {
        let collector = EventCollector::new();
        let shared = collector.clone();
        let filter = FilterBuilder::new()
            .bind("a", FnVisitor::new("v").on_before(|_, _| Ok(())))
            .unwrap()
            .with_listener_factory(move || Box::new(shared.clone()))
            .build()
            .unwrap();
        let mut ctx = filter.new_context("doc");
        assert!(ctx.has_listeners());
        filter.filter_str("<a/>", &mut ctx).unwrap();
        assert!(!collector.events().is_empty());
    }
}
