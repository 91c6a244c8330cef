//! The node and context abstractions selectors are matched against.
use crate::evaluator::CounterId;
use std::fmt::Debug;
use weft_types::NodeId;

/// A read-only view of an element and its ancestor chain.
///
/// Matching only ever walks upward, so implementations need to expose the
/// element itself and its parent, nothing below it except direct text.
/// `'a` is the lifetime of the underlying document.
pub trait SelectorNode<'a>: Debug + Clone + Copy {
    /// Stable identity of the element within its document.
    fn id(&self) -> NodeId;

    fn local_name(&self) -> &'a str;

    fn namespace_uri(&self) -> Option<&'a str>;

    /// The parent element, or `None` for the document root element.
    fn parent(&self) -> Option<Self>;

    /// Looks up an attribute. A `namespace` of `None` matches attributes in no namespace.
    fn attribute(&self, namespace: Option<&str>, local_name: &str) -> Option<&'a str>;

    /// Concatenated content of the element's direct text children.
    fn text(&self) -> String;
}

/// Per-traversal state that predicates and side conditions may consult.
pub trait MatchContext {
    /// The 1-based position recorded for `node` by the counter `counter`.
    fn element_position(&self, counter: CounterId, node: NodeId) -> Option<usize>;

    /// A string-valued execution attribute, for side conditions.
    fn attribute_value(&self, _name: &str) -> Option<String> {
        None
    }
}

/// A context with no recorded state. Positional predicates never match against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMatchContext;

impl MatchContext for EmptyMatchContext {
    fn element_position(&self, _counter: CounterId, _node: NodeId) -> Option<usize> {
        None
    }
}

// Test utilities - publicly available for integration testing in downstream crates
pub mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default)]
    struct MockElement {
        name: String,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
        text: String,
        parent: Option<usize>,
    }

    /// An in-memory element tree. Element ids are assigned in insertion order.
    #[derive(Debug, Default)]
    pub struct MockTree {
        elements: Vec<MockElement>,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockNode<'a> {
        pub id: usize,
        pub tree: &'a MockTree,
    }

    impl MockTree {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add(&mut self, parent: Option<usize>, name: &str) -> usize {
            self.elements.push(MockElement {
                name: name.to_string(),
                parent,
                ..Default::default()
            });
            self.elements.len() - 1
        }

        /// Adds a chain of nested elements below `parent`, returning the innermost id.
        pub fn add_chain(&mut self, parent: Option<usize>, names: &[&str]) -> usize {
            names
                .iter()
                .fold(parent, |parent, name| Some(self.add(parent, name)))
                .unwrap_or(0)
        }

        pub fn set_attribute(&mut self, id: usize, name: &str, value: &str) {
            self.elements[id]
                .attributes
                .push((name.to_string(), value.to_string()));
        }

        pub fn set_namespace(&mut self, id: usize, uri: &str) {
            self.elements[id].namespace = Some(uri.to_string());
        }

        pub fn set_text(&mut self, id: usize, text: &str) {
            self.elements[id].text = text.to_string();
        }

        pub fn node(&self, id: usize) -> MockNode<'_> {
            MockNode { id, tree: self }
        }
    }

    impl<'a> SelectorNode<'a> for MockNode<'a> {
        fn id(&self) -> NodeId {
            NodeId::new(self.id)
        }

        fn local_name(&self) -> &'a str {
            &self.tree.elements[self.id].name
        }

        fn namespace_uri(&self) -> Option<&'a str> {
            self.tree.elements[self.id].namespace.as_deref()
        }

        fn parent(&self) -> Option<Self> {
            self.tree.elements[self.id].parent.map(|id| MockNode {
                id,
                tree: self.tree,
            })
        }

        fn attribute(&self, namespace: Option<&str>, local_name: &str) -> Option<&'a str> {
            if namespace.is_some() {
                return None;
            }
            self.tree.elements[self.id]
                .attributes
                .iter()
                .find(|(name, _)| name == local_name)
                .map(|(_, value)| value.as_str())
        }

        fn text(&self) -> String {
            self.tree.elements[self.id].text.clone()
        }
    }

    /// A match context with positions supplied up front.
    #[derive(Debug, Default)]
    pub struct MockContext {
        pub positions: HashMap<(CounterId, NodeId), usize>,
        pub attributes: HashMap<String, String>,
    }

    impl MatchContext for MockContext {
        fn element_position(&self, counter: CounterId, node: NodeId) -> Option<usize> {
            self.positions.get(&(counter, node)).copied()
        }

        fn attribute_value(&self, name: &str) -> Option<String> {
            self.attributes.get(name).cloned()
        }
    }

    /// Creates the tree:
    /// ```text
    /// order                    (0)
    ///   header                 (1)
    ///   order-items            (2)
    ///     order-item  id="1"   (3)
    ///     order-item  id="2"   (4)
    ///   summary                (5) text "total"
    /// ```
    pub fn create_order_tree() -> MockTree {
        let mut tree = MockTree::new();
        let order = tree.add(None, "order");
        tree.add(Some(order), "header");
        let items = tree.add(Some(order), "order-items");
        let first = tree.add(Some(items), "order-item");
        tree.set_attribute(first, "id", "1");
        let second = tree.add(Some(items), "order-item");
        tree.set_attribute(second, "id", "2");
        let summary = tree.add(Some(order), "summary");
        tree.set_text(summary, "total");
        tree
    }
}
