//! Counts `Measure` nodes.

use crate::{RuleModule, SyntaxNode};

pub const ID: &str = "measure-count";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeasureCount {
    pub count: usize,
}

#[must_use]
pub fn rule<N: SyntaxNode + 'static>() -> RuleModule<N> {
    RuleModule::<N>::new(ID, MeasureCount::default).on("Measure", |_, cx| {
        cx.set_state(|state: MeasureCount| MeasureCount {
            count: state.count + 1,
        })
    })
}
