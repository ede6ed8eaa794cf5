//! The bundled rule pack.

pub mod line_naming;
pub mod measure_count;

use crate::{RuleModule, SyntaxNode};

/// `(id, loader)` for every bundled rule, in registration order.
pub(crate) fn builtins<N: SyntaxNode + 'static>() -> [(&'static str, fn() -> RuleModule<N>); 2] {
    [
        (measure_count::ID, measure_count::rule::<N>),
        (line_naming::ID, line_naming::rule::<N>),
    ]
}
