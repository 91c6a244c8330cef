//! Per-node saved state, released when the node's fragment closes.
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use weft_types::NodeId;

/// Distinguishes mementos stored against the same node: by value type and by
/// the owner that stored them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MementoKey {
    kind: TypeId,
    owner: usize,
}

impl MementoKey {
    pub fn of<T: Any>(owner: usize) -> Self {
        Self {
            kind: TypeId::of::<T>(),
            owner,
        }
    }
}

#[derive(Default)]
pub struct MementoCaretaker {
    store: HashMap<NodeId, HashMap<MementoKey, Box<dyn Any + Send>>>,
}

impl fmt::Debug for MementoCaretaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MementoCaretaker")
            .field("nodes", &self.store.len())
            .field("mementos", &self.len())
            .finish()
    }
}

impl MementoCaretaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save<T: Any + Send>(&mut self, node: NodeId, owner: usize, value: T) {
        self.store
            .entry(node)
            .or_default()
            .insert(MementoKey::of::<T>(owner), Box::new(value));
    }

    /// Removes and returns a saved memento.
    pub fn restore<T: Any + Send>(&mut self, node: NodeId, owner: usize) -> Option<T> {
        let entries = self.store.get_mut(&node)?;
        let value = entries.remove(&MementoKey::of::<T>(owner))?;
        if entries.is_empty() {
            self.store.remove(&node);
        }
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn peek<T: Any + Send>(&self, node: NodeId, owner: usize) -> Option<&T> {
        self.store
            .get(&node)?
            .get(&MementoKey::of::<T>(owner))?
            .downcast_ref::<T>()
    }

    /// Applies `update` to the saved memento, creating it with `Default` first
    /// if there is none.
    pub fn stash<T, F>(&mut self, node: NodeId, owner: usize, update: F)
    where
        T: Any + Send + Default,
        F: FnOnce(&mut T),
    {
        let mut value = self.restore::<T>(node, owner).unwrap_or_default();
        update(&mut value);
        self.save(node, owner, value);
    }

    /// Drops every memento saved against `node`, returning them.
    pub fn forget(&mut self, node: NodeId) -> Vec<Box<dyn Any + Send>> {
        self.store
            .remove(&node)
            .map(|entries| entries.into_values().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.store.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_restore_and_forget() {
        let mut caretaker = MementoCaretaker::new();
        let a = NodeId::new(1);
        let b = NodeId::new(2);
        caretaker.save(a, 1, String::from("one"));
        caretaker.save(a, 2, String::from("two"));
        caretaker.save(b, 1, 42usize);
        assert_eq!(caretaker.len(), 3);

        assert_eq!(caretaker.peek::<String>(a, 2).map(String::as_str), Some("two"));
        assert_eq!(caretaker.restore::<String>(a, 1).as_deref(), Some("one"));
        assert_eq!(caretaker.restore::<String>(a, 1), None);
        // Same owner, different type.
        assert_eq!(caretaker.restore::<usize>(a, 2), None);

        assert_eq!(caretaker.forget(a).len(), 1);
        assert_eq!(caretaker.len(), 1);
    }

    #[test]
    fn stash_creates_and_updates() {
        let mut caretaker = MementoCaretaker::new();
        let node = NodeId::new(3);
        caretaker.stash::<String, _>(node, 7, |s| s.push_str("ab"));
        caretaker.stash::<String, _>(node, 7, |s| s.push('c'));
        assert_eq!(caretaker.peek::<String>(node, 7).map(String::as_str), Some("abc"));
        caretaker.forget(node);
        assert!(caretaker.is_empty());
    }
}
