use thiserror::Error;

/// Problems in the rule dependency graph, detected before traversal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    #[error("cyclic dependency detected: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("rule '{rule}' depends on '{dependency}', which could not be found")]
    MissingDependency { rule: String, dependency: String },
}

/// Invalid group configuration or an illegal cross-rule state request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the rule '{rule}', declared as part of the group '{group}', could not be found")]
    UnknownRule { rule: String, group: String },

    #[error(
        "cannot retrieve requested rule state '{requested}': it is not a part of the group '{group}'"
    )]
    NotInGroup { requested: String, group: String },

    #[error(
        "cannot retrieve requested rule state '{requested}': it is not declared as a dependency of '{rule}'"
    )]
    NotADependency { requested: String, rule: String },

    #[error("no state was initialized for dependency '{requested}' in group '{group}'")]
    MissingDependencyState { requested: String, group: String },
}

/// Failures of the rule state table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("cannot initialize existing state '{tag}'")]
    DuplicateState { tag: String },

    #[error("no state has been initialized for '{tag}'")]
    Lookup { tag: String },

    #[error("malformed state tag '{tag}'")]
    InvalidTag { tag: String },

    #[error("state '{tag}' does not hold a value of type {expected}")]
    TypeMismatch { tag: String, expected: &'static str },
}
