use thiserror::Error;
use weft_delivery::DeliveryError;
use weft_selector::SelectorError;

/// Errors surfaced by the `weft` facade.
#[derive(Error, Debug)]
pub enum WeftError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WeftError {
    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml(msg.into())
    }
}

impl From<roxmltree::Error> for WeftError {
    fn from(e: roxmltree::Error) -> Self {
        WeftError::Xml(e.to_string())
    }
}

impl From<serde_json::Error> for WeftError {
    fn from(e: serde_json::Error) -> Self {
        WeftError::Settings(e.to_string())
    }
}
