use serde::{Deserialize, Serialize};

/// Tunables for a single filter run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterSettings {
    /// Fail fast on the first visitor failure. When false, failures are
    /// logged and reported and the traversal keeps going.
    pub terminate_on_visitor_exception: bool,
    /// Run after-visitors in reverse registration order.
    pub reverse_visit_order_on_visit_after: bool,
    /// Materialize elements that no visitor targets.
    pub maintain_element_stack: bool,
    /// How many levels of the tree stay materialized behind the cursor
    /// when no visitor asks for more. 0 keeps everything.
    pub max_node_depth: usize,
    /// Deliver entity text as plain text instead of `&#N;` references.
    pub rewrite_entities: bool,
    pub sort_visitors: bool,
    /// Wrap visitors in the exception, text and writer interceptors.
    pub default_interceptors: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            terminate_on_visitor_exception: true,
            reverse_visit_order_on_visit_after: true,
            maintain_element_stack: true,
            max_node_depth: 1,
            rewrite_entities: true,
            sort_visitors: true,
            default_interceptors: true,
        }
    }
}

impl FilterSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_terminate_on_visitor_exception(mut self, value: bool) -> Self {
        self.terminate_on_visitor_exception = value;
        self
    }

    pub fn with_reverse_visit_order_on_visit_after(mut self, value: bool) -> Self {
        self.reverse_visit_order_on_visit_after = value;
        self
    }

    pub fn with_maintain_element_stack(mut self, value: bool) -> Self {
        self.maintain_element_stack = value;
        self
    }

    pub fn with_max_node_depth(mut self, value: usize) -> Self {
        self.max_node_depth = value;
        self
    }

    pub fn with_rewrite_entities(mut self, value: bool) -> Self {
        self.rewrite_entities = value;
        self
    }

    pub fn with_sort_visitors(mut self, value: bool) -> Self {
        self.sort_visitors = value;
        self
    }

    pub fn with_default_interceptors(mut self, value: bool) -> Self {
        self.default_interceptors = value;
        self
    }

    /// Depth below which materialized nodes are always kept.
    pub(crate) fn retained_depth(&self) -> usize {
        match self.max_node_depth {
            0 => usize::MAX,
            depth => depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = FilterSettings::default();
        assert!(settings.terminate_on_visitor_exception);
        assert!(settings.reverse_visit_order_on_visit_after);
        assert!(settings.maintain_element_stack);
        assert_eq!(settings.max_node_depth, 1);
        assert!(settings.rewrite_entities);
        assert!(settings.sort_visitors);
        assert!(settings.default_interceptors);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = FilterSettings::from_json(
            r#"{ "terminate-on-visitor-exception": false, "max-node-depth": 0 }"#,
        )
        .unwrap();
        assert!(!settings.terminate_on_visitor_exception);
        assert_eq!(settings.max_node_depth, 0);
        assert_eq!(settings.retained_depth(), usize::MAX);
        assert!(settings.rewrite_entities);
    }

    #[test]
    fn unknown_json_is_rejected_only_when_malformed() {
        assert!(FilterSettings::from_json("{ not json").is_err());
    }
}
