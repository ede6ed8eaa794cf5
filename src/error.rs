use thiserror::Error;

use crate::selector::{MatchError, ParseError};
use crate::{ConfigError, DependencyError, StateError};

/// Boxed error returned by fallible visitor factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type covering setup and traversal.
///
/// Returned by [`Engine::new()`](crate::Engine::new) and
/// [`Engine::run()`](crate::Engine::run). The first error aborts the run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    /// A rule's visitor factory failed. `rule` is the state tag being bound.
    #[error("failed to load rule '{rule}'")]
    RuleLoad {
        rule: String,
        #[source]
        source: BoxError,
    },

    /// A visitor gave up on the current node.
    #[error("rule '{rule}' failed: {message}")]
    Visitor { rule: String, message: String },
}
