use thiserror::Error;

/// Configuration errors raised while compiling or binding a selector.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Selector parse error in '{selector}': {message}")]
    Parse { selector: String, message: String },

    #[error("Invalid selector '{selector}': '#document' is only permitted as the first token")]
    DocumentTokenPosition { selector: String },

    #[error(
        "Invalid selector '{selector}': step '{step}' uses text(); only the last step may access text"
    )]
    TextPredicatePosition { selector: String, step: String },

    #[error("Unknown namespace prefix '{prefix}' in selector '{selector}'")]
    UnknownPrefix { selector: String, prefix: String },

    #[error("Unsupported axis '{axis}' in selector '{selector}'")]
    UnsupportedAxis { selector: String, axis: String },

    #[error("Invalid selector '{selector}': an attribute step may only be the last step")]
    AttributeStepPosition { selector: String },
}

impl SelectorError {
    pub fn parse(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            selector: selector.into(),
            message: message.into(),
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Parse { selector, .. }
            | Self::DocumentTokenPosition { selector }
            | Self::TextPredicatePosition { selector, .. }
            | Self::UnknownPrefix { selector, .. }
            | Self::UnsupportedAxis { selector, .. }
            | Self::AttributeStepPosition { selector } => selector,
        }
    }
}
