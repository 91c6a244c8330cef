use crate::visitor::{Capabilities, Visitor};
use std::collections::HashMap;
use std::sync::Arc;
use weft_selector::{MatchContext, SelectorError, SelectorNode, SelectorPath};

/// A selector plus the parameters a visitor was configured with.
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    id: String,
    selector: SelectorPath,
    params: HashMap<String, String>,
}

impl ResourceConfig {
    pub fn new(selector: SelectorPath) -> Self {
        Self {
            id: selector.selector().to_string(),
            selector,
            params: HashMap::new(),
        }
    }

    pub fn compile(selector: &str) -> Result<Self, SelectorError> {
        Ok(Self::new(SelectorPath::compile(selector)?))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn selector(&self) -> &SelectorPath {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut SelectorPath {
        &mut self.selector
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// A visitor paired with the resource that selects its elements.
#[derive(Debug, Clone)]
pub struct VisitorBinding {
    visitor: Arc<dyn Visitor>,
    resource: Arc<ResourceConfig>,
    capabilities: Capabilities,
}

impl VisitorBinding {
    pub fn new(visitor: Arc<dyn Visitor>, resource: Arc<ResourceConfig>) -> Self {
        let capabilities = visitor.capabilities();
        Self {
            visitor,
            resource,
            capabilities,
        }
    }

    pub fn visitor(&self) -> &Arc<dyn Visitor> {
        &self.visitor
    }

    pub fn resource(&self) -> &Arc<ResourceConfig> {
        &self.resource
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// The user visitor behind any interceptors.
    pub fn target_visitor(&self) -> &Arc<dyn Visitor> {
        match self.visitor.as_interceptor() {
            Some(interceptor) => interceptor.target(),
            None => &self.visitor,
        }
    }

    pub fn is_targeted_at<'a, N: SelectorNode<'a>>(&self, node: N, ctx: &dyn MatchContext) -> bool {
        self.resource.selector().is_targeted_at(node, ctx)
    }

    /// Whether both bindings dispatch to the same visitor instance.
    pub fn same_visitor(&self, other: &VisitorBinding) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.visitor), Arc::as_ptr(&other.visitor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::FnVisitor;

    #[test]
    fn resource_defaults_id_to_selector() {
        let resource = ResourceConfig::compile("order/item").unwrap().with_param("k", "v");
        assert_eq!(resource.id(), "order/item");
        assert_eq!(resource.param("k"), Some("v"));
        assert_eq!(resource.with_id("items").id(), "items");
    }

    #[test]
    fn binding_resolves_capabilities_once() {
        let visitor: Arc<dyn Visitor> = Arc::new(FnVisitor::new("v").on_before(|_, _| Ok(())));
        let resource = Arc::new(ResourceConfig::compile("item").unwrap());
        let binding = VisitorBinding::new(visitor.clone(), resource.clone());
        assert!(binding.capabilities().before);
        assert!(!binding.capabilities().after);
        assert!(binding.same_visitor(&VisitorBinding::new(visitor, resource.clone())));
        let other: Arc<dyn Visitor> = Arc::new(FnVisitor::new("v"));
        assert!(!binding.same_visitor(&VisitorBinding::new(other, resource)));
        assert_eq!(binding.target_visitor().name(), "v");
    }
}
