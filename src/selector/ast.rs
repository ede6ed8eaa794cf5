use std::fmt;

/// How two compound selectors relate inside a complex selector.
///
/// Only [`Child`](Combinator::Child) and [`Descendant`](Combinator::Descendant)
/// can be matched; the sibling combinators parse so that a selector using them
/// is reported by the matcher rather than rejected as a syntax error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Combinator {
    Child,
    Descendant,
    Adjacent,
    Sibling,
}

/// Pseudo-class names. Anything outside `is`/`where`/`not`/`has` is kept
/// verbatim in [`Other`](PseudoClass::Other).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoClass {
    Is,
    Where,
    Not,
    Has,
    Other(String),
}

/// Attribute comparison operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// CSS operators such as `~=` or `^=` that the matcher does not evaluate.
    Unsupported(String),
}

/// `[path op value]`. `test` is `None` for a presence check (`[path]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub path: String,
    pub test: Option<(AttrOp, String)>,
}

/// Parsed selector tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorAst {
    /// A type name, or `None` for the `*` wildcard.
    Type(Option<String>),
    Compound(Vec<SelectorAst>),
    Complex {
        left: Box<SelectorAst>,
        combinator: Combinator,
        right: Box<SelectorAst>,
    },
    Pseudo {
        class: PseudoClass,
        args: Vec<SelectorAst>,
    },
    Attribute(Attribute),
}

/// Bottom-up fold over a [`SelectorAst`].
///
/// Each callback receives the already-folded results of its children, so
/// every static analysis walks the tree in exactly the same shape.
pub(crate) trait SelectorFold {
    type Out;

    fn type_selector(&mut self, name: Option<&str>) -> Self::Out;
    fn attribute(&mut self, attr: &Attribute) -> Self::Out;
    fn compound(&mut self, parts: Vec<Self::Out>) -> Self::Out;
    fn complex(&mut self, left: Self::Out, combinator: &Combinator, right: Self::Out)
        -> Self::Out;
    fn pseudo(&mut self, class: &PseudoClass, args: Vec<Self::Out>) -> Self::Out;
}

impl SelectorAst {
    pub(crate) fn fold<F: SelectorFold>(&self, f: &mut F) -> F::Out {
        match self {
            SelectorAst::Type(name) => f.type_selector(name.as_deref()),
            SelectorAst::Attribute(attr) => f.attribute(attr),
            SelectorAst::Compound(parts) => {
                let parts = parts.iter().map(|p| p.fold(f)).collect();
                f.compound(parts)
            }
            SelectorAst::Complex {
                left,
                combinator,
                right,
            } => {
                let left = left.fold(f);
                let right = right.fold(f);
                f.complex(left, combinator, right)
            }
            SelectorAst::Pseudo { class, args } => {
                let args = args.iter().map(|a| a.fold(f)).collect();
                f.pseudo(class, args)
            }
        }
    }

    /// Number of non-wildcard type predicates, including those nested in
    /// `:is`, `:where` and `:not`.
    #[must_use]
    pub fn count_identifiers(&self) -> usize {
        self.fold(&mut PredicateCount {
            kind: PredicateKind::Identifier,
        })
    }

    /// Number of attribute predicates, including those nested in `:is`,
    /// `:where` and `:not`.
    #[must_use]
    pub fn count_attributes(&self) -> usize {
        self.fold(&mut PredicateCount {
            kind: PredicateKind::Attribute,
        })
    }

    /// Lowercased node types this selector can match, or `None` when it may
    /// match any type.
    #[must_use]
    pub fn possible_types(&self) -> Option<Vec<String>> {
        self.fold(&mut PossibleTypes)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PredicateKind {
    Identifier,
    Attribute,
}

struct PredicateCount {
    kind: PredicateKind,
}

impl SelectorFold for PredicateCount {
    type Out = usize;

    fn type_selector(&mut self, name: Option<&str>) -> usize {
        usize::from(self.kind == PredicateKind::Identifier && name.is_some())
    }

    fn attribute(&mut self, _attr: &Attribute) -> usize {
        usize::from(self.kind == PredicateKind::Attribute)
    }

    fn compound(&mut self, parts: Vec<usize>) -> usize {
        parts.into_iter().sum()
    }

    fn complex(&mut self, left: usize, _combinator: &Combinator, right: usize) -> usize {
        left + right
    }

    fn pseudo(&mut self, class: &PseudoClass, args: Vec<usize>) -> usize {
        match class {
            PseudoClass::Is | PseudoClass::Where | PseudoClass::Not => args.into_iter().sum(),
            PseudoClass::Has | PseudoClass::Other(_) => 0,
        }
    }
}

struct PossibleTypes;

impl SelectorFold for PossibleTypes {
    type Out = Option<Vec<String>>;

    fn type_selector(&mut self, name: Option<&str>) -> Self::Out {
        name.map(|n| vec![n.to_ascii_lowercase()])
    }

    fn attribute(&mut self, _attr: &Attribute) -> Self::Out {
        None
    }

    fn compound(&mut self, parts: Vec<Self::Out>) -> Self::Out {
        // Only constrained components narrow the compound; their intersection
        // is the result.
        let mut constrained = parts.into_iter().flatten();
        let first = constrained.next()?;
        Some(constrained.fold(dedup(first), |acc, types| {
            acc.into_iter().filter(|t| types.contains(t)).collect()
        }))
    }

    fn complex(&mut self, _left: Self::Out, _combinator: &Combinator, right: Self::Out) -> Self::Out {
        right
    }

    fn pseudo(&mut self, class: &PseudoClass, args: Vec<Self::Out>) -> Self::Out {
        match class {
            PseudoClass::Is | PseudoClass::Where => {
                let all: Option<Vec<Vec<String>>> = args.into_iter().collect();
                all.map(|lists| dedup(lists.into_iter().flatten().collect()))
            }
            PseudoClass::Not | PseudoClass::Has | PseudoClass::Other(_) => None,
        }
    }
}

fn dedup(types: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(types.len());
    for t in types {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::Child => write!(f, ">"),
            Combinator::Descendant => write!(f, " "),
            Combinator::Adjacent => write!(f, "+"),
            Combinator::Sibling => write!(f, "~"),
        }
    }
}

impl fmt::Display for PseudoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PseudoClass::Is => write!(f, "is"),
            PseudoClass::Where => write!(f, "where"),
            PseudoClass::Not => write!(f, "not"),
            PseudoClass::Has => write!(f, "has"),
            PseudoClass::Other(name) => write!(f, "{name}"),
        }
    }
}

impl fmt::Display for AttrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrOp::Eq => write!(f, "="),
            AttrOp::Lt => write!(f, "<"),
            AttrOp::Lte => write!(f, "<="),
            AttrOp::Gt => write!(f, ">"),
            AttrOp::Gte => write!(f, ">="),
            AttrOp::Unsupported(op) => write!(f, "{op}"),
        }
    }
}

impl fmt::Display for SelectorAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorAst::Type(Some(name)) => write!(f, "{name}"),
            SelectorAst::Type(None) => write!(f, "*"),
            SelectorAst::Compound(parts) => parts.iter().try_for_each(|p| write!(f, "{p}")),
            SelectorAst::Complex {
                left,
                combinator: Combinator::Descendant,
                right,
            } => write!(f, "{left} {right}"),
            SelectorAst::Complex {
                left,
                combinator,
                right,
            } => write!(f, "{left} {combinator} {right}"),
            SelectorAst::Pseudo { class, args } if args.is_empty() => write!(f, ":{class}"),
            SelectorAst::Pseudo { class, args } => {
                write!(f, ":{class}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            SelectorAst::Attribute(Attribute { path, test: None }) => write!(f, "[{path}]"),
            SelectorAst::Attribute(Attribute {
                path,
                test: Some((op, value)),
            }) => write!(f, "[{path}{op}{value:?}]"),
        }
    }
}
