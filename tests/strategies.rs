#![allow(dead_code)]

use proptest::prelude::*;
use tabvisit::BasicNode;

// --- Fixed vocabulary ---
// node types : a handful of tablature node names
// attributes : fret (0..=24), string (1..=6)

pub const TYPES: &[&str] = &["Measure", "Note", "Rest", "LineNaming", "MeasureLineName", "Staff"];

/// A generated selector with the predicate counts it was built from.
#[derive(Debug, Clone)]
pub struct GenSelector {
    pub text: String,
    pub identifiers: usize,
    pub attributes: usize,
}

fn arb_attribute() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("[fret]".to_owned()),
        Just("[string]".to_owned()),
        (prop::sample::select(&["=", "<", "<=", ">", ">="][..]), 0_u8..=24)
            .prop_map(|(op, v)| format!("[fret{op}{v}]")),
        (1_u8..=6).prop_map(|v| format!("[string={v}]")),
    ]
}

/// A compound: optional type name (or `*`) followed by 0..=2 attributes.
fn arb_compound() -> impl Strategy<Value = GenSelector> {
    (
        prop::option::of(prop::sample::select(TYPES)),
        prop::collection::vec(arb_attribute(), 0..=2),
    )
        .prop_filter("empty compound", |(name, attrs)| {
            name.is_some() || !attrs.is_empty()
        })
        .prop_map(|(name, attrs)| GenSelector {
            text: format!("{}{}", name.unwrap_or(""), attrs.concat()),
            identifiers: usize::from(name.is_some()),
            attributes: attrs.len(),
        })
}

fn arb_wildcard() -> impl Strategy<Value = GenSelector> {
    Just(GenSelector {
        text: "*".to_owned(),
        identifiers: 0,
        attributes: 0,
    })
}

/// Selectors built from compounds, `>`/descendant combinators, and the
/// counted pseudo-classes.
pub fn arb_selector() -> impl Strategy<Value = GenSelector> {
    let leaf = prop_oneof![4 => arb_compound(), 1 => arb_wildcard()];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(&[" > ", " "][..]), inner.clone()).prop_map(
                |(left, combinator, right)| GenSelector {
                    text: format!("{}{combinator}{}", left.text, right.text),
                    identifiers: left.identifiers + right.identifiers,
                    attributes: left.attributes + right.attributes,
                }
            ),
            (
                prop::sample::select(&["is", "where", "not"][..]),
                prop::collection::vec(inner, 1..=3),
            )
                .prop_map(|(class, args)| GenSelector {
                    text: format!(
                        ":{class}({})",
                        args.iter().map(|a| a.text.as_str()).collect::<Vec<_>>().join(", ")
                    ),
                    identifiers: args.iter().map(|a| a.identifiers).sum(),
                    attributes: args.iter().map(|a| a.attributes).sum(),
                }),
        ]
    })
}

/// A random tree over [`TYPES`] with fret/string attributes on some nodes.
pub fn arb_tree() -> impl Strategy<Value = BasicNode> {
    let leaf = (
        prop::sample::select(TYPES),
        prop::option::of(0_u8..=24),
        prop::option::of(1_u8..=6),
    )
        .prop_map(|(name, fret, string)| {
            let mut node = BasicNode::new(name);
            if let Some(fret) = fret {
                node = node.attr("fret", fret);
            }
            if let Some(string) = string {
                node = node.attr("string", string);
            }
            node
        });
    leaf.prop_recursive(4, 48, 4, |inner| {
        (
            prop::sample::select(TYPES),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(name, children)| {
                children
                    .into_iter()
                    .fold(BasicNode::new(name), BasicNode::child)
            })
    })
}

/// Count every node in a tree.
pub fn node_count(node: &BasicNode) -> usize {
    1 + node.children_slice().iter().map(node_count).sum::<usize>()
}
