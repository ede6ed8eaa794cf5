//! Rule state instances, their scopes, and freshness bookkeeping.

use std::any::{self, Any};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::{NodeId, StateError};

const SHARED_SUFFIX: &str = "@shared";
const GROUP_SEPARATOR: &str = "@group:";

/// Which instance of a rule's state a tag refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance reused by every group running the rule with its default
    /// configuration.
    Shared,
    /// A private instance for a group that overrides the rule's configuration.
    Group(String),
}

/// Identifies one rule-state instance: `rule@shared` or `rule@group:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateTag {
    rule: String,
    scope: Scope,
}

impl StateTag {
    #[must_use]
    pub fn shared(rule: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            scope: Scope::Shared,
        }
    }

    #[must_use]
    pub fn group(rule: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            scope: Scope::Group(group.into()),
        }
    }

    #[must_use]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.scope == Scope::Shared
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Shared => write!(f, "{}{SHARED_SUFFIX}", self.rule),
            Scope::Group(group) => write!(f, "{}{GROUP_SEPARATOR}{group}", self.rule),
        }
    }
}

impl FromStr for StateTag {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StateError::InvalidTag { tag: s.to_owned() };
        if let Some(rule) = s.strip_suffix(SHARED_SUFFIX) {
            if rule.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::shared(rule));
        }
        match s.split_once(GROUP_SEPARATOR) {
            Some((rule, group)) if !rule.is_empty() && !group.is_empty() => {
                Ok(Self::group(rule, group))
            }
            _ => Err(invalid()),
        }
    }
}

/// When a state was last written relative to a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visit {
    #[default]
    Stale,
    OnEntry,
    OnExit,
}

/// A live rule-state instance.
pub struct RuleState {
    value: Box<dyn Any>,
    config: Value,
    updated_on_current_visit: Visit,
    updated_on_ancestor_visit: Visit,
    // Writes made while visiting nodes on the current root-to-node path.
    history: Vec<(NodeId, Visit)>,
}

impl RuleState {
    fn new(value: Box<dyn Any>, config: Value) -> Self {
        Self {
            value,
            config,
            updated_on_current_visit: Visit::Stale,
            updated_on_ancestor_visit: Visit::Stale,
            history: Vec::new(),
        }
    }

    /// The current value, if it is a `T`.
    #[must_use]
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    #[must_use]
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Whether the value was written while visiting the current node.
    #[must_use]
    pub fn updated_on_current_visit(&self) -> Visit {
        self.updated_on_current_visit
    }

    /// Whether the value was written while visiting the nearest ancestor that
    /// wrote it.
    #[must_use]
    pub fn updated_on_ancestor_visit(&self) -> Visit {
        self.updated_on_ancestor_visit
    }

    /// Replace the value with `reducer(old)`. Returns `false` without touching
    /// anything if the stored value is not a `T`.
    pub(crate) fn apply<T: Any>(
        &mut self,
        reducer: impl FnOnce(T) -> T,
        node: NodeId,
        visit: Visit,
    ) -> bool {
        let previous = std::mem::replace(&mut self.value, Box::new(()));
        match previous.downcast::<T>() {
            Ok(old) => self.value = Box::new(reducer(*old)),
            Err(previous) => {
                self.value = previous;
                return false;
            }
        }

        self.updated_on_current_visit = visit;
        match self.history.last_mut() {
            Some((id, last)) if *id == node => *last = visit,
            _ => self.history.push((node, visit)),
        }
        true
    }

    /// Recompute freshness for a new traversal step. `ancestors` is nearest
    /// first.
    pub(crate) fn refresh(&mut self, node: NodeId, ancestors: &[NodeId]) {
        self.history
            .retain(|(id, _)| *id == node || ancestors.contains(id));

        let written_at = |target: &NodeId| {
            self.history
                .iter()
                .rev()
                .find(|(id, _)| id == target)
                .map(|(_, visit)| *visit)
        };
        self.updated_on_current_visit = written_at(&node).unwrap_or_default();
        self.updated_on_ancestor_visit = ancestors.iter().find_map(written_at).unwrap_or_default();
    }
}

impl fmt::Debug for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleState")
            .field("config", &self.config)
            .field("updated_on_current_visit", &self.updated_on_current_visit)
            .field("updated_on_ancestor_visit", &self.updated_on_ancestor_visit)
            .finish_non_exhaustive()
    }
}

/// A state instance returned by [`StateManager::resolve_state`].
#[derive(Debug, Clone, Copy)]
pub struct ResolvedState<'a> {
    pub state: &'a RuleState,
    pub is_shared: bool,
}

/// Owns every rule-state instance of a run.
#[derive(Debug, Default)]
pub struct StateManager {
    shared: HashMap<String, RuleState>,
    groups: HashMap<String, HashMap<String, RuleState>>,
}

impl StateManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the shared instance for `rule_id`.
    ///
    /// If it already exists, returns its tag untouched when `ignore_duplicate`
    /// is set.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateState`] if the instance exists and
    /// `ignore_duplicate` is `false`.
    pub fn init_shared_state(
        &mut self,
        rule_id: &str,
        config: Value,
        initial_state: impl FnOnce() -> Box<dyn Any>,
        ignore_duplicate: bool,
    ) -> Result<StateTag, StateError> {
        let tag = StateTag::shared(rule_id);
        if self.shared.contains_key(rule_id) {
            return duplicate(tag, ignore_duplicate);
        }
        self.shared
            .insert(rule_id.to_owned(), RuleState::new(initial_state(), config));
        Ok(tag)
    }

    /// Create the private instance of `rule_id` for `group_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::DuplicateState`] if the instance exists and
    /// `ignore_duplicate` is `false`.
    pub fn init_state(
        &mut self,
        rule_id: &str,
        group_id: &str,
        config: Value,
        initial_state: impl FnOnce() -> Box<dyn Any>,
        ignore_duplicate: bool,
    ) -> Result<StateTag, StateError> {
        let tag = StateTag::group(rule_id, group_id);
        let group = self.groups.entry(group_id.to_owned()).or_default();
        if group.contains_key(rule_id) {
            return duplicate(tag, ignore_duplicate);
        }
        group.insert(rule_id.to_owned(), RuleState::new(initial_state(), config));
        Ok(tag)
    }

    /// Look up the instance a tag refers to.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Lookup`] if the tag was never initialized.
    pub fn resolve_state(&self, tag: &StateTag) -> Result<ResolvedState<'_>, StateError> {
        let state = match tag.scope() {
            Scope::Shared => self.shared.get(tag.rule()),
            Scope::Group(group) => self.groups.get(group).and_then(|g| g.get(tag.rule())),
        };
        state
            .map(|state| ResolvedState {
                state,
                is_shared: tag.is_shared(),
            })
            .ok_or_else(|| StateError::Lookup {
                tag: tag.to_string(),
            })
    }

    /// Parse a tag string and look up its instance.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidTag`] or [`StateError::Lookup`].
    pub fn resolve_state_str(&self, tag: &str) -> Result<ResolvedState<'_>, StateError> {
        self.resolve_state(&tag.parse()?)
    }

    pub(crate) fn resolve_state_mut(&mut self, tag: &StateTag) -> Result<&mut RuleState, StateError> {
        let state = match tag.scope() {
            Scope::Shared => self.shared.get_mut(tag.rule()),
            Scope::Group(group) => self
                .groups
                .get_mut(group)
                .and_then(|g| g.get_mut(tag.rule())),
        };
        state.ok_or_else(|| StateError::Lookup {
            tag: tag.to_string(),
        })
    }

    /// The tag a member of `group_id` should use to read `rule_id`: the
    /// group's private instance if there is one, else the shared instance.
    #[must_use]
    pub fn resolve_state_tag(&self, rule_id: &str, group_id: &str) -> Option<StateTag> {
        let private = self
            .groups
            .get(group_id)
            .is_some_and(|g| g.contains_key(rule_id));
        if private {
            Some(StateTag::group(rule_id, group_id))
        } else if self.shared.contains_key(rule_id) {
            Some(StateTag::shared(rule_id))
        } else {
            None
        }
    }

    /// Number of live instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.len() + self.groups.values().map(HashMap::len).sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn refresh(&mut self, node: NodeId, ancestors: &[NodeId]) {
        let group_states = self.groups.values_mut().flat_map(HashMap::values_mut);
        for state in self.shared.values_mut().chain(group_states) {
            state.refresh(node, ancestors);
        }
    }
}

fn duplicate(tag: StateTag, ignore_duplicate: bool) -> Result<StateTag, StateError> {
    if ignore_duplicate {
        Ok(tag)
    } else {
        Err(StateError::DuplicateState {
            tag: tag.to_string(),
        })
    }
}

pub(crate) fn type_mismatch<T: Any>(tag: &StateTag) -> StateError {
    StateError::TypeMismatch {
        tag: tag.to_string(),
        expected: any::type_name::<T>(),
    }
}
