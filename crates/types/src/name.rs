use serde::{Deserialize, Serialize};
use std::fmt;

/// A qualified XML name. `namespace_uri` is `None` for names in no namespace
/// and for names whose prefix has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QName {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace_uri: Option<String>,
}

impl QName {
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local_name: local_name.into(),
            namespace_uri: None,
        }
    }

    pub fn with_namespace(
        prefix: Option<String>,
        local_name: impl Into<String>,
        namespace_uri: Option<String>,
    ) -> Self {
        Self {
            prefix,
            local_name: local_name.into(),
            namespace_uri,
        }
    }

    /// Splits `prefix:local` into its parts without resolving the prefix.
    pub fn parse_prefixed(name: &str) -> Self {
        match name.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => Self {
                prefix: Some(prefix.to_string()),
                local_name: local.to_string(),
                namespace_uri: None,
            },
            _ => Self::new(name),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace_uri.as_deref()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: QName::new(name),
            value: value.into(),
        }
    }
}
