//! A single-pass, selector-driven rule engine for pre-parsed syntax trees.
//!
//! Rules register visitors against CSS-like selectors, accumulate typed state
//! through reducers, and read the state of rules they depend on. Delivery
//! within a traversal step follows the rules' dependency order.

mod context;
mod dispatch;
mod engine;
mod error;
mod resolve;
pub mod rules;
pub mod selector;
mod state;
pub mod traversal;
mod types;

pub use context::{ExternalState, RuleContext};
pub use dispatch::{Emission, EventDispatcher, SelectorIndex, SelectorIndexBuilder};
pub use engine::{Engine, RunReport};
pub use error::{BoxError, EngineError};
pub use resolve::{resolve_order, DeliveryOrder};
pub use selector::{compare_specificity, MatchError, ParseError, Selector, SelectorCache};
pub use state::{ResolvedState, RuleState, Scope, StateManager, StateTag, Visit};
pub use types::{
    BasicNode, ConfigError, DependencyError, Diagnostic, EngineConfig, Group, NodeId, Position,
    RuleModule, RuleRegistry, Severity, SourceFile, SourceText, StateError, SyntaxNode, Visitor,
    VisitorSet,
};
