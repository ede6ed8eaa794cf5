use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::ast::{AttrOp, Attribute, Combinator, PseudoClass, SelectorAst};
use super::error::MatchError;
use crate::SyntaxNode;

/// Test whether `node` satisfies `selector`.
///
/// `ancestry[0]` is the node's parent, `ancestry[1]` its grandparent, and so
/// on up to the root.
///
/// # Errors
///
/// Returns [`MatchError`] if the selector contains a sibling combinator, a
/// pseudo-class other than `is`/`where`/`not`/`has`, or an attribute operator
/// other than `=`, `<`, `<=`, `>`, `>=`.
pub fn matches<N: SyntaxNode>(
    node: &N,
    selector: &SelectorAst,
    ancestry: &[&N],
) -> Result<bool, MatchError> {
    match selector {
        SelectorAst::Type(None) => Ok(true),
        SelectorAst::Type(Some(name)) => Ok(name.eq_ignore_ascii_case(node.name())),
        SelectorAst::Compound(parts) => {
            for part in parts {
                if !matches(node, part, ancestry)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        SelectorAst::Complex {
            left,
            combinator,
            right,
        } => match combinator {
            Combinator::Child => {
                if !matches(node, right, ancestry)? {
                    return Ok(false);
                }
                match ancestry.split_first() {
                    Some((parent, rest)) => matches(*parent, left, rest),
                    None => Ok(false),
                }
            }
            Combinator::Descendant => {
                if !matches(node, right, ancestry)? {
                    return Ok(false);
                }
                for (i, ancestor) in ancestry.iter().enumerate() {
                    if matches(*ancestor, left, &ancestry[i + 1..])? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Combinator::Adjacent | Combinator::Sibling => {
                Err(MatchError::UnknownCombinator(combinator.to_string()))
            }
        },
        SelectorAst::Pseudo { class, args } => match class {
            PseudoClass::Is | PseudoClass::Where => any_matches(node, args, ancestry),
            PseudoClass::Not => any_matches(node, args, ancestry).map(|found| !found),
            PseudoClass::Has => {
                let mut chain = Vec::new();
                scan_descendants(node, args, &mut chain)
            }
            PseudoClass::Other(name) => Err(MatchError::UnknownPseudoClass(name.clone())),
        },
        SelectorAst::Attribute(attr) => match_attribute(node, attr),
    }
}

fn any_matches<N: SyntaxNode>(
    node: &N,
    selectors: &[SelectorAst],
    ancestry: &[&N],
) -> Result<bool, MatchError> {
    for selector in selectors {
        if matches(node, selector, ancestry)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Depth-first search below an anchor node. `chain` holds the ancestors of
/// the current level strictly below the anchor, nearest first.
fn scan_descendants<'n, N: SyntaxNode>(
    node: &'n N,
    selectors: &[SelectorAst],
    chain: &mut Vec<&'n N>,
) -> Result<bool, MatchError> {
    for child in node.children() {
        if any_matches(child, selectors, &chain[..])? {
            return Ok(true);
        }
        chain.insert(0, child);
        let found = scan_descendants(child, selectors, chain);
        chain.remove(0);
        if found? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn match_attribute<N: SyntaxNode>(node: &N, attr: &Attribute) -> Result<bool, MatchError> {
    let resolved = resolve_path(node, &attr.path);
    let Some((op, literal)) = &attr.test else {
        return Ok(resolved.is_some_and(|value| !value.is_null()));
    };

    let ordering = || compare_literal(resolved.as_ref(), literal);
    match op {
        AttrOp::Eq => Ok(resolved.as_ref().is_some_and(|value| match value {
            Value::Number(n) => compare_number(n, literal)
                .map_or_else(|| n.to_string() == *literal, Ordering::is_eq),
            other => display_value(other) == *literal,
        })),
        AttrOp::Lt => Ok(ordering().is_some_and(Ordering::is_lt)),
        AttrOp::Lte => Ok(ordering().is_some_and(Ordering::is_le)),
        AttrOp::Gt => Ok(ordering().is_some_and(Ordering::is_gt)),
        AttrOp::Gte => Ok(ordering().is_some_and(Ordering::is_ge)),
        AttrOp::Unsupported(op) => Err(MatchError::UnknownOperator(op.clone())),
    }
}

/// Resolve a dotted path: the first component through the node, the rest by
/// indexing into objects (by key) and arrays (by position).
fn resolve_path<N: SyntaxNode>(node: &N, path: &str) -> Option<Value> {
    let mut segments = path.split('.');
    let mut value = node.attribute(segments.next()?)?;
    for segment in segments {
        value = match value {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(mut items) => {
                let idx: usize = segment.parse().ok()?;
                if idx >= items.len() {
                    return None;
                }
                items.swap_remove(idx)
            }
            _ => return None,
        };
    }
    Some(value)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers compare numerically, strings lexicographically. Anything else is
/// not ordered against a selector literal.
fn compare_literal(value: Option<&Value>, literal: &str) -> Option<Ordering> {
    match value? {
        Value::Number(n) => compare_number(n, literal),
        Value::String(s) => Some(s.as_str().cmp(literal)),
        _ => None,
    }
}

/// Integers compare exactly; anything involving a float goes through `f64`.
/// `None` if the literal is not a number.
fn compare_number(n: &Number, literal: &str) -> Option<Ordering> {
    let literal = literal.trim();
    if let (Some(lhs), Ok(rhs)) = (n.as_i64(), literal.parse::<i64>()) {
        return Some(lhs.cmp(&rhs));
    }
    if let (Some(lhs), Ok(rhs)) = (n.as_u64(), literal.parse::<u64>()) {
        return Some(lhs.cmp(&rhs));
    }
    let rhs: f64 = literal.parse().ok()?;
    n.as_f64()?.partial_cmp(&rhs)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::selector::SelectorCache;
    use crate::BasicNode;

    fn check(node: &BasicNode, selector: &str, ancestry: &[&BasicNode]) -> bool {
        let mut cache = SelectorCache::new();
        let parsed = cache.parse(selector).unwrap();
        matches(node, parsed.ast(), ancestry).unwrap()
    }

    #[test]
    fn type_is_case_insensitive() {
        let node = BasicNode::new("MeasureLineName");
        assert!(check(&node, "measurelinename", &[]));
        assert!(check(&node, "*", &[]));
        assert!(!check(&node, "Measure", &[]));
    }

    #[test]
    fn child_requires_immediate_parent() {
        let measure = BasicNode::new("Measure");
        let naming = BasicNode::new("LineNaming");
        let name = BasicNode::new("MeasureLineName");
        let ancestry = [&naming, &measure];

        assert!(check(&name, "LineNaming > MeasureLineName", &ancestry));
        assert!(!check(&name, "Measure > MeasureLineName", &ancestry));
        assert!(check(&name, "Measure > LineNaming > MeasureLineName", &ancestry));
    }

    #[test]
    fn child_without_parent_never_matches() {
        let root = BasicNode::new("Root");
        assert!(!check(&root, "* > Root", &[]));
    }

    #[test]
    fn descendant_scans_all_ancestors() {
        let measure = BasicNode::new("Measure");
        let naming = BasicNode::new("LineNaming");
        let name = BasicNode::new("MeasureLineName");
        let ancestry = [&naming, &measure];

        assert!(check(&name, "Measure MeasureLineName", &ancestry));
        assert!(check(&name, "LineNaming MeasureLineName", &ancestry));
        assert!(!check(&name, "Staff MeasureLineName", &ancestry));
    }

    #[test]
    fn descendant_left_side_uses_remaining_chain() {
        let root = BasicNode::new("Root");
        let measure = BasicNode::new("Measure");
        let naming = BasicNode::new("LineNaming");
        let name = BasicNode::new("MeasureLineName");
        let ancestry = [&naming, &measure, &root];

        assert!(check(&name, "Root > Measure MeasureLineName", &ancestry));
        assert!(!check(&name, "Root > LineNaming MeasureLineName", &ancestry));
    }

    #[test]
    fn is_where_not() {
        let note = BasicNode::new("Note");
        assert!(check(&note, ":is(Rest, Note)", &[]));
        assert!(check(&note, ":where(Note)", &[]));
        assert!(!check(&note, ":is(Rest, Bar)", &[]));
        assert!(check(&note, ":not(Rest)", &[]));
        assert!(!check(&note, ":not(Rest, Note)", &[]));
        assert!(check(&note, "*:not(Rest)", &[]));
    }

    #[test]
    fn has_searches_descendants_only() {
        let tree = BasicNode::new("Measure").child(
            BasicNode::new("Line").child(BasicNode::new("Note").attr("fret", 7)),
        );
        assert!(check(&tree, "Measure:has(Note)", &[]));
        assert!(check(&tree, ":has(Line > Note)", &[]));
        assert!(check(&tree, ":has(Note[fret>5])", &[]));
        assert!(!check(&tree, ":has(Measure)", &[]));
        assert!(!check(&tree, ":has(Measure > Line)", &[]));
        assert!(!check(&tree, ":has(Rest)", &[]));
    }

    #[test]
    fn attribute_presence() {
        let node = BasicNode::new("Note")
            .attr("fret", 3)
            .attr("tie", json!(null))
            .attr("meta", json!({ "string": { "index": 2 } }));
        assert!(check(&node, "[fret]", &[]));
        assert!(!check(&node, "[tie]", &[]));
        assert!(!check(&node, "[missing]", &[]));
        assert!(check(&node, "[meta.string.index]", &[]));
        assert!(!check(&node, "[meta.missing.index]", &[]));
    }

    #[test]
    fn attribute_equality_uses_string_form() {
        let node = BasicNode::new("Note")
            .attr("fret", 3)
            .attr("string", "e")
            .attr("muted", false);
        assert!(check(&node, "[fret=3]", &[]));
        assert!(check(&node, "[string=e]", &[]));
        assert!(check(&node, "[string=\"e\"]", &[]));
        assert!(check(&node, "[muted=false]", &[]));
        assert!(!check(&node, "[fret=4]", &[]));
        assert!(!check(&node, "[missing=3]", &[]));
    }

    #[test]
    fn attribute_ordering() {
        let node = BasicNode::new("Note").attr("fret", 12).attr("string", "e");
        assert!(check(&node, "[fret>10]", &[]));
        assert!(check(&node, "[fret>=12]", &[]));
        assert!(check(&node, "[fret<=12]", &[]));
        assert!(!check(&node, "[fret<12]", &[]));
        assert!(check(&node, "[fret<12.5]", &[]));
        assert!(check(&node, "[string<f]", &[]));
        assert!(!check(&node, "[string>f]", &[]));
    }

    #[test]
    fn attribute_ordering_on_absent_or_non_comparable_never_matches() {
        let node = BasicNode::new("Note").attr("muted", true).attr("fret", 3);
        assert!(!check(&node, "[missing<1]", &[]));
        assert!(!check(&node, "[missing>=1]", &[]));
        assert!(!check(&node, "[muted>0]", &[]));
        assert!(!check(&node, "[fret>abc]", &[]));
    }

    #[test]
    fn whole_floats_equal_integer_literals() {
        let node = BasicNode::new("Note").attr("fret", 3.0).attr("bend", 0.5);
        assert!(check(&node, "[fret=3]", &[]));
        assert!(check(&node, "[fret=3.0]", &[]));
        assert!(!check(&node, "[fret=4]", &[]));
        assert!(check(&node, "[bend=0.5]", &[]));
        assert!(check(&node, "[bend=.5]", &[]));
        assert!(!check(&node, "[fret=three]", &[]));
    }

    #[test]
    fn large_integers_compare_exactly() {
        // 2^53 + 1 is not representable as f64
        let node = BasicNode::new("Event")
            .attr("tick", 9_007_199_254_740_993_u64)
            .attr("max", u64::MAX)
            .attr("min", i64::MIN);
        assert!(check(&node, "[tick>9007199254740992]", &[]));
        assert!(!check(&node, "[tick=9007199254740992]", &[]));
        assert!(check(&node, "[tick=9007199254740993]", &[]));
        assert!(check(&node, "[max=18446744073709551615]", &[]));
        assert!(check(&node, "[max>18446744073709551614]", &[]));
        assert!(check(&node, "[min<-9223372036854775807]", &[]));
        assert!(check(&node, "[max>-1]", &[]));
    }

    #[test]
    fn attribute_array_index() {
        let node = BasicNode::new("Chord").attr("frets", json!([0, 2, 2]));
        assert!(check(&node, "[frets.1=2]", &[]));
        assert!(!check(&node, "[frets.5]", &[]));
    }

    #[test]
    fn unsupported_constructs_fail() {
        let mut cache = SelectorCache::new();
        let node = BasicNode::new("Note");
        let cases = [
            ("A + Note", MatchError::UnknownCombinator("+".into())),
            ("A ~ Note", MatchError::UnknownCombinator("~".into())),
            ("Note:first-child", MatchError::UnknownPseudoClass("first-child".into())),
            ("[name^=N]", MatchError::UnknownOperator("^=".into())),
        ];
        for (text, expected) in cases {
            let selector = cache.parse(text).unwrap();
            assert_eq!(matches(&node, selector.ast(), &[]), Err(expected), "for {text}");
        }
    }
}
