use std::fmt;

use thiserror::Error;

/// A selector string that is not valid selector syntax.
#[derive(Debug, Clone)]
pub struct ParseError {
    selector: String,
    message: String,
}

impl ParseError {
    pub(crate) fn new(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// The raw selector text that failed to parse.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid selector '{}': {}",
            self.selector, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// A parsed selector uses a construct the matcher cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("unknown combinator: '{0}'")]
    UnknownCombinator(String),

    #[error("unknown pseudo-class: ':{0}'")]
    UnknownPseudoClass(String),

    #[error("unknown attribute operator: '{0}'")]
    UnknownOperator(String),
}
