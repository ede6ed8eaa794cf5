//! Setup and the visit loop.

use std::any::Any;
use std::collections::{HashMap, HashSet};

use tracing::{debug, error, trace};

use crate::context::{Membership, RuleBinding, RuleContext};
use crate::dispatch::{Emission, EventDispatcher, SelectorIndex};
use crate::resolve::{resolve_order, DeliveryOrder};
use crate::selector::SelectorCache;
use crate::state::{type_mismatch, StateManager, StateTag, Visit};
use crate::traversal::{self, Direction};
use crate::{
    ConfigError, Diagnostic, EngineConfig, EngineError, Group, NodeId, RuleModule, RuleRegistry,
    Severity, SourceText, StateError, SyntaxNode, Visitor,
};

struct BoundVisitor<N> {
    binding: usize,
    visitor: Visitor<N>,
}

/// A configured set of rule instances ready to walk one tree.
///
/// # Example
///
/// ```
/// use tabvisit::{BasicNode, Engine, EngineConfig, Group, RuleModule, RuleRegistry, SourceFile};
///
/// let registry: RuleRegistry<BasicNode> = RuleRegistry::new()
///     .define(RuleModule::new("notes", || 0_usize).on("Note", |_, cx| cx.set_state(|n: usize| n + 1)));
/// let groups = [Group::new("lint", &["notes"])];
/// let engine = Engine::new(&registry, &groups, &EngineConfig::new()).unwrap();
///
/// let tree = BasicNode::new("Measure")
///     .child(BasicNode::new("Note"))
///     .child(BasicNode::new("Note"));
/// let report = engine.run(&tree, &SourceFile::new("")).unwrap();
/// assert_eq!(report.state_for::<usize>("notes", "lint").unwrap(), &2);
/// ```
pub struct Engine<N> {
    states: StateManager,
    bindings: Vec<RuleBinding>,
    visitors: Vec<BoundVisitor<N>>,
    index: SelectorIndex<usize>,
    order: DeliveryOrder,
    cache: SelectorCache,
}

impl<N: SyntaxNode + 'static> Engine<N> {
    /// Bind every rule of every group.
    ///
    /// # Errors
    ///
    /// Fails before any listener runs on an unknown rule id, a missing or
    /// cyclic dependency, a visitor factory error, or an invalid selector.
    pub fn new(
        registry: &RuleRegistry<N>,
        groups: &[Group],
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        Self::with_cache(registry, groups, config, SelectorCache::new())
    }

    /// Like [`Engine::new`], reusing selectors already parsed into `cache`.
    ///
    /// # Errors
    ///
    /// See [`Engine::new`].
    pub fn with_cache(
        registry: &RuleRegistry<N>,
        groups: &[Group],
        config: &EngineConfig,
        mut cache: SelectorCache,
    ) -> Result<Self, EngineError> {
        let order = delivery_order(registry, groups)?;
        debug!(order = ?order.as_slice(), "resolved delivery order");

        let mut states = StateManager::new();
        let mut bound: HashMap<StateTag, usize> = HashMap::new();
        let mut bindings: Vec<RuleBinding> = Vec::new();
        let mut visitors = Vec::new();
        let mut builder = SelectorIndex::builder();

        for group in groups {
            for rule_id in &group.rules {
                let module = lookup(registry, group, rule_id)?;
                let rule_config = config.resolve(&group.id, rule_id, module.declared_config());
                let initial_state = || module.initial_state();
                let tag = if config.overrides(&group.id, rule_id) {
                    states.init_state(rule_id, &group.id, rule_config.clone(), initial_state, true)?
                } else {
                    states.init_shared_state(rule_id, rule_config.clone(), initial_state, true)?
                };
                let membership = Membership {
                    group: group.id.clone(),
                    members: group.rules.clone(),
                };
                // one listener set per instance, however many groups share it
                if let Some(&existing) = bound.get(&tag) {
                    let binding = &mut bindings[existing];
                    if binding.groups.iter().all(|m| m.group != group.id) {
                        debug!(%tag, group = %group.id, "group joins shared instance");
                        binding.groups.push(membership);
                    }
                    continue;
                }
                bound.insert(tag.clone(), bindings.len());

                let visitor_set = module
                    .build_visitors(&rule_config)
                    .map_err(|source| EngineError::RuleLoad {
                        rule: tag.to_string(),
                        source,
                    })?;
                for (selector, visitor) in visitor_set.into_entries() {
                    builder.on(&selector, rule_id, visitors.len());
                    visitors.push(BoundVisitor {
                        binding: bindings.len(),
                        visitor,
                    });
                }

                debug!(%tag, group = %group.id, "bound rule instance");
                bindings.push(RuleBinding {
                    tag,
                    groups: vec![membership],
                    dependencies: module.dependencies().to_vec(),
                    config: rule_config,
                });
            }
        }

        let index = builder.build(&mut cache, &order)?;
        debug!(
            selectors = index.selector_count(),
            instances = states.len(),
            "engine ready"
        );

        Ok(Self {
            states,
            bindings,
            visitors,
            index,
            order,
            cache,
        })
    }

    /// Walk `root` once, delivering every matching listener.
    ///
    /// # Errors
    ///
    /// The first [`MatchError`](crate::selector::MatchError) or visitor error
    /// aborts the run.
    pub fn run(self, root: &N, source: &dyn SourceText) -> Result<RunReport, EngineError> {
        let Self {
            mut states,
            bindings,
            visitors,
            index,
            ..
        } = self;

        let queue = traversal::build_queue(root);
        let mut dispatcher = EventDispatcher::new(&index);
        let mut diagnostics = Vec::new();
        let mut deliveries = 0;

        for step in &queue {
            let node = step.node;
            let node_id = node.node_id();
            let visit = match step.direction {
                Direction::Enter => Visit::OnEntry,
                Direction::Leave => Visit::OnExit,
            };
            let mut refreshed = false;

            let mut deliver = |emission: Emission<'_, usize>, ancestry: &[&N]| {
                if !refreshed {
                    let ancestor_ids: Vec<NodeId> = ancestry.iter().map(|a| a.node_id()).collect();
                    states.refresh(node_id, &ancestor_ids);
                    refreshed = true;
                }
                let bound = &visitors[*emission.listener];
                let binding = &bindings[bound.binding];
                trace!(
                    rule = %binding.tag,
                    selector = emission.selector,
                    node = node.name(),
                    "deliver"
                );
                let mut cx = RuleContext::new(
                    binding,
                    &mut states,
                    ancestry,
                    source,
                    node_id,
                    visit,
                    &mut diagnostics,
                );
                (bound.visitor)(node, &mut cx)
            };

            let delivered: Result<usize, EngineError> = match step.direction {
                Direction::Enter => dispatcher.enter_node(node, step.parent, &mut deliver),
                Direction::Leave => dispatcher.leave_node(node, &mut deliver),
            };
            deliveries += delivered.map_err(|err| {
                error!(%err, node = node.name(), "dispatch aborted");
                err
            })?;
        }

        debug!(
            steps = queue.len(),
            deliveries,
            diagnostics = diagnostics.len(),
            "run complete"
        );
        Ok(RunReport {
            states,
            diagnostics,
            steps: queue.len(),
            deliveries,
        })
    }
}

impl<N> Engine<N> {
    #[must_use]
    pub fn delivery_order(&self) -> &DeliveryOrder {
        &self.order
    }

    /// Tags of the bound rule instances, in binding order.
    #[must_use]
    pub fn state_tags(&self) -> Vec<&StateTag> {
        self.bindings.iter().map(|b| &b.tag).collect()
    }

    /// Instances as initialized, before any traversal.
    #[must_use]
    pub fn states(&self) -> &StateManager {
        &self.states
    }

    #[must_use]
    pub fn selector_cache(&self) -> &SelectorCache {
        &self.cache
    }
}

fn lookup<'r, N>(
    registry: &'r RuleRegistry<N>,
    group: &Group,
    rule_id: &str,
) -> Result<&'r RuleModule<N>, ConfigError> {
    registry.get(rule_id).ok_or_else(|| ConfigError::UnknownRule {
        rule: rule_id.to_owned(),
        group: group.id.clone(),
    })
}

/// Order every grouped rule plus, transitively, the rules they depend on.
fn delivery_order<N>(
    registry: &RuleRegistry<N>,
    groups: &[Group],
) -> Result<DeliveryOrder, EngineError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut graph: Vec<(&str, &[String])> = Vec::new();

    for group in groups {
        for rule_id in &group.rules {
            let module = lookup(registry, group, rule_id)?;
            if seen.insert(rule_id.as_str()) {
                graph.push((rule_id.as_str(), module.dependencies()));
            }
        }
    }

    let mut next = 0;
    while next < graph.len() {
        let (_, dependencies) = graph[next];
        next += 1;
        for dependency in dependencies {
            // unknown ids are left for the resolver to report
            if let Some(module) = registry.get(dependency) {
                if seen.insert(dependency.as_str()) {
                    graph.push((dependency.as_str(), module.dependencies()));
                }
            }
        }
    }

    Ok(resolve_order(&graph)?)
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct RunReport {
    states: StateManager,
    diagnostics: Vec<Diagnostic>,
    steps: usize,
    deliveries: usize,
}

impl RunReport {
    /// Final rule states.
    #[must_use]
    pub fn states(&self) -> &StateManager {
        &self.states
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Traversal steps replayed (two per node).
    #[must_use]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Listener invocations across the run.
    #[must_use]
    pub fn deliveries(&self) -> usize {
        self.deliveries
    }

    /// Final value of the instance `tag`.
    ///
    /// # Errors
    ///
    /// [`StateError::Lookup`] or [`StateError::TypeMismatch`].
    pub fn state<T: Any>(&self, tag: &StateTag) -> Result<&T, StateError> {
        let resolved = self.states.resolve_state(tag)?;
        resolved.state.value().ok_or_else(|| type_mismatch::<T>(tag))
    }

    /// Final value of `rule` as seen from `group`: the group's private
    /// instance if it has one, else the shared instance.
    ///
    /// # Errors
    ///
    /// [`StateError::Lookup`] or [`StateError::TypeMismatch`].
    pub fn state_for<T: Any>(&self, rule: &str, group: &str) -> Result<&T, StateError> {
        let tag = self
            .states
            .resolve_state_tag(rule, group)
            .ok_or_else(|| StateError::Lookup {
                tag: StateTag::group(rule, group).to_string(),
            })?;
        self.state(&tag)
    }
}
