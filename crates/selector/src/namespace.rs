use std::collections::BTreeMap;

/// Prefix to namespace URI bindings used to resolve prefixed selector names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.insert(prefix, uri);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), uri.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Adds every binding from `other`, keeping existing bindings on conflict.
    pub fn merge(&mut self, other: &NamespaceTable) {
        for (prefix, uri) in &other.prefixes {
            self.prefixes
                .entry(prefix.clone())
                .or_insert_with(|| uri.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NamespaceTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = NamespaceTable::new();
        for (prefix, uri) in iter {
            table.insert(prefix, uri);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_existing_bindings() {
        let mut table = NamespaceTable::new().with("a", "urn:a");
        let other: NamespaceTable = [("a", "urn:other"), ("b", "urn:b")].into_iter().collect();
        table.merge(&other);
        assert_eq!(table.get("a"), Some("urn:a"));
        assert_eq!(table.get("b"), Some("urn:b"));
        assert_eq!(table.iter().count(), 2);
    }
}
