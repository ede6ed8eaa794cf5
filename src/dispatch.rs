//! Selector indexing and dependency-ordered event delivery.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::resolve::DeliveryOrder;
use crate::selector::{self, compare_specificity, MatchError, ParseError, Selector, SelectorCache};
use crate::SyntaxNode;

/// A listener registered under one raw selector string.
#[derive(Debug, Clone)]
struct Listener<L> {
    owner: String,
    rank: usize,
    listener: L,
}

/// A matched listener waiting to be invoked for the current step.
#[derive(Debug)]
pub struct Emission<'i, L> {
    /// Rule id that registered the listener.
    pub owner: &'i str,
    /// The raw selector that matched.
    pub selector: &'i str,
    pub listener: &'i L,
    rank: usize,
}

/// Collects `(selector, owner, listener)` registrations before indexing.
#[derive(Debug)]
pub struct SelectorIndexBuilder<L> {
    registrations: Vec<(String, String, L)>,
}

impl<L> Default for SelectorIndexBuilder<L> {
    fn default() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }
}

impl<L> SelectorIndexBuilder<L> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `selector` on behalf of rule `owner`.
    pub fn on(&mut self, selector: &str, owner: &str, listener: L) -> &mut Self {
        self.registrations
            .push((selector.to_owned(), owner.to_owned(), listener));
        self
    }

    /// Parse every selector and bucket it by listener type and direction.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] among the registered selectors.
    pub fn build(
        self,
        cache: &mut SelectorCache,
        order: &DeliveryOrder,
    ) -> Result<SelectorIndex<L>, ParseError> {
        let mut index = SelectorIndex::empty();

        for (raw, owner, listener) in self.registrations {
            let rank = order.rank(&owner).unwrap_or(usize::MAX);
            let entry = index.listeners.entry(raw.clone()).or_default();
            let first_seen = entry.is_empty();
            entry.push(Listener {
                owner,
                rank,
                listener,
            });
            if !first_seen {
                continue;
            }

            let selector = cache.parse(&raw)?;
            let (by_type, any_type) = if selector.is_exit() {
                (&mut index.exit_by_type, &mut index.exit_any)
            } else {
                (&mut index.enter_by_type, &mut index.enter_any)
            };
            match selector.listener_types() {
                Some(types) => {
                    for node_type in types {
                        by_type
                            .entry(node_type.clone())
                            .or_default()
                            .push(Arc::clone(&selector));
                    }
                }
                None => any_type.push(Arc::clone(&selector)),
            }
        }

        let by_specificity = |a: &Arc<Selector>, b: &Arc<Selector>| compare_specificity(a, b);
        for bucket in index
            .enter_by_type
            .values_mut()
            .chain(index.exit_by_type.values_mut())
        {
            bucket.sort_by(by_specificity);
        }
        index.enter_any.sort_by(by_specificity);
        index.exit_any.sort_by(by_specificity);
        Ok(index)
    }
}

/// Registered selectors bucketed for fast per-step lookup.
///
/// Type buckets are keyed by lowercase node type. Every bucket is sorted by
/// [`compare_specificity`].
#[derive(Debug)]
pub struct SelectorIndex<L> {
    enter_by_type: HashMap<String, Vec<Arc<Selector>>>,
    exit_by_type: HashMap<String, Vec<Arc<Selector>>>,
    enter_any: Vec<Arc<Selector>>,
    exit_any: Vec<Arc<Selector>>,
    listeners: HashMap<String, Vec<Listener<L>>>,
}

impl<L> SelectorIndex<L> {
    fn empty() -> Self {
        Self {
            enter_by_type: HashMap::new(),
            exit_by_type: HashMap::new(),
            enter_any: Vec::new(),
            exit_any: Vec::new(),
            listeners: HashMap::new(),
        }
    }

    #[must_use]
    pub fn builder() -> SelectorIndexBuilder<L> {
        SelectorIndexBuilder::new()
    }

    /// Number of distinct raw selectors.
    #[must_use]
    pub fn selector_count(&self) -> usize {
        self.listeners.len()
    }

    /// Emissions for `node` in delivery order.
    ///
    /// Selectors are visited in global specificity order by merging the
    /// node's type bucket with the any-type bucket. The collected emissions
    /// are then stably sorted by owner rank, so listeners of one rule keep
    /// their specificity order.
    ///
    /// # Errors
    ///
    /// Propagates the first [`MatchError`].
    pub fn emissions<N: SyntaxNode>(
        &self,
        node: &N,
        ancestry: &[&N],
        is_exit: bool,
    ) -> Result<Vec<Emission<'_, L>>, MatchError> {
        let (by_type, any_type) = if is_exit {
            (&self.exit_by_type, &self.exit_any)
        } else {
            (&self.enter_by_type, &self.enter_any)
        };
        let typed = by_type
            .get(&node.name().to_ascii_lowercase())
            .map_or(&[][..], Vec::as_slice);

        let mut emissions = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < typed.len() || j < any_type.len() {
            let take_typed = match (typed.get(i), any_type.get(j)) {
                (Some(a), Some(b)) => compare_specificity(a, b) != Ordering::Greater,
                (Some(_), None) => true,
                _ => false,
            };
            let selector = if take_typed {
                i += 1;
                &typed[i - 1]
            } else {
                j += 1;
                &any_type[j - 1]
            };

            if !selector::matches(node, selector.ast(), ancestry)? {
                continue;
            }
            if let Some(listeners) = self.listeners.get(selector.raw()) {
                emissions.extend(listeners.iter().map(|l| Emission {
                    owner: &l.owner,
                    selector: selector.raw(),
                    listener: &l.listener,
                    rank: l.rank,
                }));
            }
        }

        emissions.sort_by_key(|e| e.rank);
        Ok(emissions)
    }
}

/// Replays traversal steps against a [`SelectorIndex`], tracking ancestry.
///
/// `ancestry[0]` is always the parent of the node being visited.
pub struct EventDispatcher<'i, 't, N, L> {
    index: &'i SelectorIndex<L>,
    ancestry: Vec<&'t N>,
}

impl<'i, 't, N: SyntaxNode, L> EventDispatcher<'i, 't, N, L> {
    #[must_use]
    pub fn new(index: &'i SelectorIndex<L>) -> Self {
        Self {
            index,
            ancestry: Vec::new(),
        }
    }

    /// Ancestors of the node currently being visited, nearest first.
    #[must_use]
    pub fn ancestry(&self) -> &[&'t N] {
        &self.ancestry
    }

    /// Deliver every enter listener matching `node`. Returns the number of
    /// listeners invoked.
    ///
    /// # Errors
    ///
    /// Stops at the first match failure or the first error from `deliver`.
    pub fn enter_node<E>(
        &mut self,
        node: &'t N,
        parent: Option<&'t N>,
        deliver: impl FnMut(Emission<'i, L>, &[&'t N]) -> Result<(), E>,
    ) -> Result<usize, E>
    where
        E: From<MatchError>,
    {
        if let Some(parent) = parent {
            self.ancestry.insert(0, parent);
        }
        self.dispatch(node, false, deliver)
    }

    /// Deliver every exit listener matching `node`, then drop its parent
    /// from the ancestry.
    ///
    /// # Errors
    ///
    /// Stops at the first match failure or the first error from `deliver`.
    pub fn leave_node<E>(
        &mut self,
        node: &'t N,
        deliver: impl FnMut(Emission<'i, L>, &[&'t N]) -> Result<(), E>,
    ) -> Result<usize, E>
    where
        E: From<MatchError>,
    {
        let delivered = self.dispatch(node, true, deliver)?;
        if !self.ancestry.is_empty() {
            self.ancestry.remove(0);
        }
        Ok(delivered)
    }

    fn dispatch<E>(
        &self,
        node: &'t N,
        is_exit: bool,
        mut deliver: impl FnMut(Emission<'i, L>, &[&'t N]) -> Result<(), E>,
    ) -> Result<usize, E>
    where
        E: From<MatchError>,
    {
        let index: &'i SelectorIndex<L> = self.index;
        let emissions = index.emissions(node, &self.ancestry, is_exit)?;
        let count = emissions.len();
        for emission in emissions {
            deliver(emission, &self.ancestry)?;
        }
        Ok(count)
    }
}
