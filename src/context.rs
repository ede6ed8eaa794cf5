//! The per-rule view of a run handed to every visitor.

use std::any::Any;

use serde_json::Value;
use tracing::warn;

use crate::state::{type_mismatch, StateManager, StateTag, Visit};
use crate::{ConfigError, Diagnostic, EngineError, NodeId, Position, Severity, SourceText, SyntaxNode};

/// A group running a rule instance, with the rules it lists.
#[derive(Debug, Clone)]
pub(crate) struct Membership {
    pub(crate) group: String,
    pub(crate) members: Vec<String>,
}

impl Membership {
    fn contains(&self, rule: &str) -> bool {
        self.members.iter().any(|m| m == rule)
    }
}

/// What a rule instance was bound with during setup.
///
/// `groups` is never empty. A private instance has exactly one group; a
/// shared instance has every group running it, in setup order.
#[derive(Debug, Clone)]
pub(crate) struct RuleBinding {
    pub(crate) tag: StateTag,
    pub(crate) groups: Vec<Membership>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) config: Value,
}

/// Another rule's state as seen from a dependent rule.
#[derive(Debug, Clone, Copy)]
pub struct ExternalState<'a, T> {
    pub value: &'a T,
    pub updated_on_current_visit: Visit,
    pub updated_on_ancestor_visit: Visit,
    pub is_shared: bool,
}

/// Context passed to visitors: configuration, own and external state,
/// ancestry, source access, and diagnostics.
pub struct RuleContext<'a, 't, N> {
    binding: &'a RuleBinding,
    states: &'a mut StateManager,
    ancestry: &'a [&'t N],
    source: &'a dyn SourceText,
    node: NodeId,
    visit: Visit,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a, 't, N: SyntaxNode> RuleContext<'a, 't, N> {
    pub(crate) fn new(
        binding: &'a RuleBinding,
        states: &'a mut StateManager,
        ancestry: &'a [&'t N],
        source: &'a dyn SourceText,
        node: NodeId,
        visit: Visit,
        diagnostics: &'a mut Vec<Diagnostic>,
    ) -> Self {
        Self {
            binding,
            states,
            ancestry,
            source,
            node,
            visit,
            diagnostics,
        }
    }

    /// The state tag this rule instance writes to.
    #[must_use]
    pub fn id(&self) -> &StateTag {
        &self.binding.tag
    }

    #[must_use]
    pub fn rule_id(&self) -> &str {
        self.binding.tag.rule()
    }

    /// The first group running this instance.
    #[must_use]
    pub fn group_id(&self) -> &str {
        self.binding.groups.first().map_or("", |m| m.group.as_str())
    }

    /// Every group running this instance. More than one only for a shared
    /// instance.
    pub fn group_ids(&self) -> impl Iterator<Item = &str> {
        self.binding.groups.iter().map(|m| m.group.as_str())
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Value {
        &self.binding.config
    }

    /// Whether the current step enters or leaves the node.
    #[must_use]
    pub fn visit(&self) -> Visit {
        self.visit
    }

    /// This rule's current state.
    ///
    /// # Errors
    ///
    /// [`StateError::TypeMismatch`](crate::StateError::TypeMismatch) if the
    /// state is not a `T`.
    pub fn state<T: Any>(&self) -> Result<&T, EngineError> {
        let tag = &self.binding.tag;
        let resolved = self.states.resolve_state(tag)?;
        resolved
            .state
            .value::<T>()
            .ok_or_else(|| type_mismatch::<T>(tag).into())
    }

    /// Replace this rule's state with `reducer(old)` and stamp it as updated
    /// on the current visit.
    ///
    /// # Errors
    ///
    /// [`StateError::TypeMismatch`](crate::StateError::TypeMismatch) if the
    /// state is not a `T`; the state is left unchanged.
    pub fn set_state<T: Any>(&mut self, reducer: impl FnOnce(T) -> T) -> Result<(), EngineError> {
        let tag = &self.binding.tag;
        let state = self.states.resolve_state_mut(tag)?;
        if state.apply(reducer, self.node, self.visit) {
            Ok(())
        } else {
            Err(type_mismatch::<T>(tag).into())
        }
    }

    /// Read the state of `rule`, which must be in a group running this
    /// instance and be one of its declared dependencies. The state is the
    /// one that group sees: its private instance if it has one, else the
    /// shared instance.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NotInGroup`], [`ConfigError::NotADependency`],
    /// [`ConfigError::MissingDependencyState`], or a
    /// [`StateError`](crate::StateError) from the lookup.
    pub fn request_external_state<T: Any>(
        &self,
        rule: &str,
    ) -> Result<ExternalState<'_, T>, EngineError> {
        let binding = self.binding;
        let Some(membership) = binding.groups.iter().find(|m| m.contains(rule)) else {
            return Err(ConfigError::NotInGroup {
                requested: rule.to_owned(),
                group: self.group_id().to_owned(),
            }
            .into());
        };
        if !binding.dependencies.iter().any(|d| d == rule) {
            return Err(ConfigError::NotADependency {
                requested: rule.to_owned(),
                rule: binding.tag.rule().to_owned(),
            }
            .into());
        }

        let tag = self
            .states
            .resolve_state_tag(rule, &membership.group)
            .ok_or_else(|| ConfigError::MissingDependencyState {
                requested: rule.to_owned(),
                group: membership.group.clone(),
            })?;
        let resolved = self.states.resolve_state(&tag)?;
        let value = resolved
            .state
            .value::<T>()
            .ok_or_else(|| type_mismatch::<T>(&tag))?;
        Ok(ExternalState {
            value,
            updated_on_current_visit: resolved.state.updated_on_current_visit(),
            updated_on_ancestor_visit: resolved.state.updated_on_ancestor_visit(),
            is_shared: resolved.is_shared,
        })
    }

    /// Ancestors of the visited node, nearest first.
    #[must_use]
    pub fn ancestors(&self) -> &[&'t N] {
        self.ancestry
    }

    #[must_use]
    pub fn source(&self) -> &dyn SourceText {
        self.source
    }

    /// Source text spanned by `node`, from its first range start to its last
    /// range end.
    #[must_use]
    pub fn node_text(&self, node: &N) -> &str {
        match (node.ranges().first(), node.ranges().last()) {
            (Some(first), Some(last)) => self.source.slice(first.start, last.end),
            _ => "",
        }
    }

    #[must_use]
    pub fn position(&self, offset: usize) -> Position {
        self.source.position(offset)
    }

    /// Record an error diagnostic located at `node`.
    pub fn report_error(&mut self, node: &N, message: impl Into<String>) {
        self.report(Severity::Error, node, message.into());
    }

    /// Record a warning diagnostic located at `node`.
    pub fn report_warning(&mut self, node: &N, message: impl Into<String>) {
        let message = message.into();
        warn!(rule = %self.binding.tag, %message, "rule reported a warning");
        self.report(Severity::Warning, node, message);
    }

    /// An error that aborts the run, attributed to this rule.
    #[must_use]
    pub fn fail(&self, message: impl Into<String>) -> EngineError {
        EngineError::Visitor {
            rule: self.binding.tag.to_string(),
            message: message.into(),
        }
    }

    fn report(&mut self, severity: Severity, node: &N, message: String) {
        let position = node.ranges().first().map(|r| self.source.position(r.start));
        self.diagnostics.push(Diagnostic {
            rule: self.binding.tag.to_string(),
            severity,
            message,
            position,
        });
    }
}
