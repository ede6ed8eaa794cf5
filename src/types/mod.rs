mod diagnostic;
mod error;
mod group;
mod registry;
mod rule;
mod tree;

pub use diagnostic::{Diagnostic, Severity};
pub use error::{ConfigError, DependencyError, StateError};
pub use group::{EngineConfig, Group};
pub use registry::RuleRegistry;
pub use rule::{RuleModule, Visitor, VisitorSet};
pub use tree::{BasicNode, NodeId, Position, SourceFile, SourceText, SyntaxNode};
