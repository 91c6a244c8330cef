use crate::event::VisitSequence;
use thiserror::Error;
use weft_selector::SelectorError;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Selector error: {0}")]
    Selector(#[from] SelectorError),

    #[error(
        "Error in '{visitor}' while processing {sequence} event for resource '{resource}' at '{location}' in source '{source_id}': {message}"
    )]
    Visitor {
        visitor: String,
        resource: String,
        source_id: String,
        location: String,
        sequence: VisitSequence,
        message: String,
    },

    #[error("Source error: {0}")]
    Source(String),
}

impl DeliveryError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }
}

/// The outcome of a single visitor callback.
#[derive(Error, Debug)]
pub enum VisitError {
    /// Stop the whole traversal now. Never reported as a failure.
    #[error("traversal terminated by visitor")]
    Terminate,

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A failure that has already been reported and wrapped.
    #[error(transparent)]
    Aborted(Box<DeliveryError>),
}

impl VisitError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed {
            message: msg.into(),
            source: None,
        }
    }

    pub fn wrap<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, VisitError::Terminate)
    }
}

pub type VisitResult = Result<(), VisitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn visitor_error_message_names_everything() {
        let err = DeliveryError::Visitor {
            visitor: "OrderVisitor".into(),
            resource: "order/item".into(),
            source_id: "orders.xml".into(),
            location: "/order/item[2]".into(),
            sequence: VisitSequence::Before,
            message: "boom".into(),
        };
        let text = err.to_string();
        assert!(text.contains("OrderVisitor"));
        assert!(text.contains("order/item"));
        assert!(text.contains("/order/item[2]"));
        assert!(text.contains("orders.xml"));
        assert!(text.contains("before"));
    }

    #[test]
    fn wrapped_errors_keep_their_source() {
        let io = std::io::Error::other("disk full");
        let err = VisitError::wrap(io);
        assert_eq!(err.to_string(), "disk full");
        assert!(err.source().is_some());
        assert!(!err.is_terminate());
        assert!(VisitError::Terminate.is_terminate());
    }
}
