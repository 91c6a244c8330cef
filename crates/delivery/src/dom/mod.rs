//! The mutable node arena both dispatchers materialize into.
//!
//! Nodes live in a slot vector addressed by [`NodeId`]. Removed subtrees
//! return their slots to a free list, so a streaming run that prunes behind
//! the cursor keeps the arena bounded by the retained window.
mod builder;
mod dispatcher;

pub use builder::DomBuilder;
pub use dispatcher::DomDispatcher;

use std::collections::HashMap;
use std::fmt;
use weft_selector::SelectorNode;
use weft_types::{Attribute, NodeId, QName};

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    // 1-based position among same-named siblings when appended; 0 if never appended.
    ordinal: usize,
    // Element children appended so far, per local name, including removed ones.
    appended: HashMap<String, usize>,
}

#[derive(Debug, Default, Clone)]
pub struct Document {
    nodes: Vec<Option<NodeData>>,
    free: Vec<usize>,
    root: Option<NodeId>,
    live: usize,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            ordinal: 0,
            appended: HashMap::new(),
        };
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(data);
                NodeId::new(slot)
            }
            None => {
                self.nodes.push(Some(data));
                NodeId::new(self.nodes.len() - 1)
            }
        }
    }

    pub fn create_element(&mut self, name: QName, attributes: Vec<Attribute>) -> NodeId {
        self.create(NodeKind::Element(Element { name, attributes }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.create(NodeKind::Text(text.into()))
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) {
        if self.contains(node) {
            self.detach(node);
            self.root = Some(node);
        }
    }

    /// Appends `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.detach(child);
        let name = self.name(child).map(|n| n.local_name.clone());
        let mut ordinal = 0;
        if let Some(data) = self.data_mut(parent) {
            data.children.push(child);
            if let Some(name) = name {
                let count = data.appended.entry(name).or_default();
                *count += 1;
                ordinal = *count;
            }
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = Some(parent);
            data.ordinal = ordinal;
        }
    }

    /// Unlinks `node` from its parent. The subtree stays allocated.
    pub fn detach(&mut self, node: NodeId) {
        if self.root == Some(node) {
            self.root = None;
        }
        let Some(parent) = self.data_mut(node).and_then(|d| d.parent.take()) else {
            return;
        };
        if let Some(data) = self.data_mut(parent) {
            data.children.retain(|&c| c != node);
        }
    }

    /// Detaches `node` and frees its whole subtree.
    pub fn remove(&mut self, node: NodeId) {
        if !self.contains(node) {
            return;
        }
        self.detach(node);
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(data) = self.nodes.get_mut(current.index()).and_then(Option::take) {
                pending.extend(data.children);
                self.free.push(current.index());
                self.live -= 1;
            }
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.data(node).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.data(node).map(|d| &d.kind)
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        match self.kind(node)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.data_mut(node)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    pub fn name(&self, node: NodeId) -> Option<&QName> {
        self.element(node).map(|e| &e.name)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node)?.parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.data(node).map(|d| d.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(node).iter().copied().filter(|&c| self.is_element(c))
    }

    /// Text or CDATA content of a character-data node. Comments are not text.
    pub fn character_data(&self, node: NodeId) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Text(text) | NodeKind::CData(text) => Some(text),
            _ => None,
        }
    }

    /// Content of the direct text and CDATA children.
    pub fn text(&self, node: NodeId) -> String {
        self.children(node)
            .iter()
            .filter_map(|&c| self.character_data(c))
            .collect()
    }

    /// Content of every text and CDATA descendant, in document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.character_data(node) {
            out.push_str(text);
            return;
        }
        for &child in self.children(node) {
            self.collect_text(child, out);
        }
    }

    /// Replaces the direct text and CDATA children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if !self.is_element(node) {
            return;
        }
        let stale: Vec<NodeId> = self
            .children(node)
            .iter()
            .copied()
            .filter(|&c| self.character_data(c).is_some())
            .collect();
        for child in stale {
            self.remove(child);
        }
        if !text.is_empty() {
            let child = self.create_text(text);
            self.append_child(node, child);
        }
    }

    pub fn attribute(&self, node: NodeId, namespace: Option<&str>, local_name: &str) -> Option<&str> {
        self.element(node)?
            .attributes
            .iter()
            .find(|a| a.name.local_name == local_name && a.name.namespace() == namespace)
            .map(|a| a.value.as_str())
    }

    pub fn set_attribute(&mut self, node: NodeId, name: QName, value: impl Into<String>) {
        let Some(element) = self.element_mut(node) else {
            return;
        };
        let value = value.into();
        match element
            .attributes
            .iter_mut()
            .find(|a| a.name.local_name == name.local_name && a.name.namespace() == name.namespace())
        {
            Some(existing) => existing.value = value,
            None => element.attributes.push(Attribute { name, value }),
        }
    }

    /// Number of elements on the path from the root down to `node`, inclusive.
    pub fn depth(&self, node: NodeId) -> usize {
        std::iter::successors(Some(node), |&n| self.parent(n))
            .filter(|&n| self.is_element(n))
            .count()
    }

    /// An XPath-like location for diagnostics, e.g. `/order/items/item[2]`.
    /// Sibling indexes count every same-named sibling appended before the
    /// node, including ones already removed.
    pub fn location(&self, node: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            segments.push(self.segment(id));
            current = self.parent(id);
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn segment(&self, node: NodeId) -> String {
        let Some(name) = self.name(node) else {
            return match self.kind(node) {
                Some(NodeKind::Comment(_)) => "comment()".to_string(),
                _ => "text()".to_string(),
            };
        };
        let Some(parent) = self.parent(node) else {
            return name.to_string();
        };
        let ordinal = self.data(node).map_or(0, |d| d.ordinal);
        let has_namesakes = ordinal > 1
            || self
                .element_children(parent)
                .any(|c| c != node && self.name(c).is_some_and(|n| n.local_name == name.local_name));
        if has_namesakes {
            format!("{}[{}]", name, ordinal.max(1))
        } else {
            name.to_string()
        }
    }

    pub fn node_ref(&self, node: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id: node }
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.index())?.as_ref()
    }

    fn data_mut(&mut self, node: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(node.index())?.as_mut()
    }
}

/// A borrowed element handle that selectors can be matched against.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn document(&self) -> &'a Document {
        self.doc
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.doc.name(self.id))
            .finish()
    }
}

impl<'a> SelectorNode<'a> for NodeRef<'a> {
    fn id(&self) -> NodeId {
        self.id
    }

    fn local_name(&self) -> &'a str {
        self.doc
            .name(self.id)
            .map(|n| n.local_name.as_str())
            .unwrap_or("")
    }

    fn namespace_uri(&self) -> Option<&'a str> {
        self.doc.name(self.id)?.namespace()
    }

    fn parent(&self) -> Option<Self> {
        let parent = self.doc.parent(self.id)?;
        self.doc.is_element(parent).then_some(NodeRef {
            doc: self.doc,
            id: parent,
        })
    }

    fn attribute(&self, namespace: Option<&str>, local_name: &str) -> Option<&'a str> {
        self.doc.attribute(self.id, namespace, local_name)
    }

    fn text(&self) -> String {
        self.doc.text(self.id)
    }
}
