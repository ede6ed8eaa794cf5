//! Total delivery order over rules, derived from declared dependencies.

use std::collections::HashMap;

use crate::DependencyError;

/// Rule ids in delivery order: every rule appears after all rules it
/// depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOrder {
    order: Vec<String>,
    ranks: HashMap<String, usize>,
}

impl DeliveryOrder {
    /// Position of a rule in the order.
    #[must_use]
    pub fn rank(&self, rule_id: &str) -> Option<usize> {
        self.ranks.get(rule_id).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

/// Topologically sort `graph`, a list of `(rule id, dependencies)` pairs.
///
/// Depth-first post-order over "is depended on by" edges, reversed. Ties are
/// broken by the order of `graph`, so the result is deterministic.
///
/// # Errors
///
/// Returns [`DependencyError::MissingDependency`] if a dependency is not a
/// vertex of `graph`, and [`DependencyError::CyclicDependency`] with the
/// offending path if the graph has a cycle.
pub fn resolve_order(graph: &[(&str, &[String])]) -> Result<DeliveryOrder, DependencyError> {
    // dependents[X] = rules that read X's state (X must run before them)
    let mut dependents: HashMap<&str, Vec<&str>> =
        graph.iter().map(|(id, _)| (*id, Vec::new())).collect();

    for (rule, dependencies) in graph {
        for dependency in *dependencies {
            match dependents.get_mut(dependency.as_str()) {
                Some(list) => list.push(rule),
                None => {
                    return Err(DependencyError::MissingDependency {
                        rule: (*rule).to_owned(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
    }

    let mut state: HashMap<&str, DfsState> = graph
        .iter()
        .map(|(id, _)| (*id, DfsState::Unvisited))
        .collect();
    let mut path = Vec::new();
    let mut finished = Vec::with_capacity(graph.len());

    // reverse post-order flips visiting order, so walk roots backwards
    for (rule, _) in graph.iter().rev() {
        if state.get(rule) == Some(&DfsState::Unvisited) {
            dfs(rule, &dependents, &mut state, &mut path, &mut finished)?;
        }
    }

    finished.reverse();
    let order: Vec<String> = finished.into_iter().map(str::to_owned).collect();
    let ranks = order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();
    Ok(DeliveryOrder { order, ranks })
}

fn dfs<'a>(
    node: &'a str,
    dependents: &HashMap<&'a str, Vec<&'a str>>,
    state: &mut HashMap<&'a str, DfsState>,
    path: &mut Vec<&'a str>,
    finished: &mut Vec<&'a str>,
) -> Result<(), DependencyError> {
    state.insert(node, DfsState::InStack);
    path.push(node);

    if let Some(neighbors) = dependents.get(node) {
        for &neighbor in neighbors.iter().rev() {
            match state.get(neighbor).copied().unwrap_or(DfsState::Unvisited) {
                DfsState::InStack => {
                    let pos = path.iter().position(|&n| n == neighbor).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|&s| s.to_owned()).collect();
                    cycle.push(neighbor.to_owned());
                    return Err(DependencyError::CyclicDependency { path: cycle });
                }
                DfsState::Unvisited => dfs(neighbor, dependents, state, path, finished)?,
                DfsState::Done => {}
            }
        }
    }

    path.pop();
    state.insert(node, DfsState::Done);
    finished.push(node);
    Ok(())
}
