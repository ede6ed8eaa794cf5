//! CSS-like selectors over syntax-tree nodes.

mod ast;
mod error;
mod grammar;
mod matcher;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

pub use ast::{AttrOp, Attribute, Combinator, PseudoClass, SelectorAst};
pub use error::{MatchError, ParseError};
pub use matcher::matches;

const EXIT_SUFFIX: &str = ":exit";

/// A parsed selector together with the data needed to index and order it.
#[derive(Debug, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    is_exit: bool,
    ast: SelectorAst,
    listener_types: Option<Vec<String>>,
    attribute_count: usize,
    identifier_count: usize,
}

impl Selector {
    fn parse(raw: &str) -> Result<Self, ParseError> {
        use winnow::Parser;

        let (body, is_exit) = match raw.strip_suffix(EXIT_SUFFIX) {
            Some(body) => (body, true),
            None => (raw, false),
        };
        let ast = grammar::selector
            .parse(body)
            .map_err(|e| ParseError::new(raw, e.to_string()))?;

        Ok(Self {
            raw: raw.to_owned(),
            is_exit,
            listener_types: ast.possible_types(),
            attribute_count: ast.count_attributes(),
            identifier_count: ast.count_identifiers(),
            ast,
        })
    }

    /// The selector text exactly as registered, including any `:exit`.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether listeners fire when leaving the node rather than entering it.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.is_exit
    }

    #[must_use]
    pub fn ast(&self) -> &SelectorAst {
        &self.ast
    }

    /// Lowercased node types the selector can match; `None` means any type.
    #[must_use]
    pub fn listener_types(&self) -> Option<&[String]> {
        self.listener_types.as_deref()
    }

    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    #[must_use]
    pub fn identifier_count(&self) -> usize {
        self.identifier_count
    }
}

/// Total order used for delivery: fewer attribute predicates first, then
/// fewer identifiers, then raw text.
#[must_use]
pub fn compare_specificity(a: &Selector, b: &Selector) -> Ordering {
    a.attribute_count
        .cmp(&b.attribute_count)
        .then(a.identifier_count.cmp(&b.identifier_count))
        .then_with(|| a.raw.cmp(&b.raw))
}

/// Memoizes parsed selectors by their raw text.
///
/// A cache is an ordinary value: create one per engine (or share one between
/// engines by passing it in) rather than relying on process-wide state.
#[derive(Debug, Default, Clone)]
pub struct SelectorCache {
    entries: HashMap<String, Arc<Selector>>,
}

impl SelectorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached selector for `raw`, parsing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if `raw` (minus a trailing `:exit`) is not a
    /// valid selector. Failed parses are not cached.
    pub fn parse(&mut self, raw: &str) -> Result<Arc<Selector>, ParseError> {
        if let Some(selector) = self.entries.get(raw) {
            return Ok(Arc::clone(selector));
        }
        let selector = Arc::new(Selector::parse(raw)?);
        self.entries.insert(raw.to_owned(), Arc::clone(&selector));
        Ok(selector)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
