//! Collects the string names written at the start of each staff line.

use std::collections::BTreeMap;

use crate::{RuleModule, SyntaxNode};

pub const ID: &str = "line-naming";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineNaming {
    /// Line name keyed by 1-based source line.
    pub naming: BTreeMap<usize, String>,
    /// Source line of the n-th named line, counting from 0.
    pub rel_to_abs: BTreeMap<usize, usize>,
}

impl LineNaming {
    #[must_use]
    pub fn absolute_line(&self, relative: usize) -> Option<usize> {
        self.rel_to_abs.get(&relative).copied()
    }
}

#[must_use]
pub fn rule<N: SyntaxNode + 'static>() -> RuleModule<N> {
    RuleModule::<N>::new(ID, LineNaming::default)
        .on("LineNaming", |_, cx| {
            cx.set_state(|_: LineNaming| LineNaming::default())
        })
        .on("LineNaming > MeasureLineName", |node, cx| {
            let Some(range) = node.ranges().first() else {
                cx.report_warning(node, "line name has no source range");
                return Ok(());
            };
            let line = cx.position(range.start).line;
            let name: String = cx
                .node_text(node)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();

            if cx.state::<LineNaming>()?.naming.contains_key(&line) {
                cx.report_error(node, format!("multiple line names on line {line}"));
                return Ok(());
            }
            cx.set_state(move |mut state: LineNaming| {
                state.naming.insert(line, name);
                state
            })
        })
        .on("LineNaming:exit", |_, cx| {
            cx.set_state(|mut state: LineNaming| {
                state.rel_to_abs = state.naming.keys().copied().enumerate().collect();
                state
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicNode, Engine, EngineConfig, Group, RuleRegistry, Severity, SourceFile};

    const TAB: &str = "e |--0--|\nB |--1--|\nG |--2--|\n";

    fn name_at(offset: usize, len: usize) -> BasicNode {
        BasicNode::new("MeasureLineName").range(offset..offset + len)
    }

    fn run(tree: &BasicNode) -> crate::RunReport {
        let registry: RuleRegistry<BasicNode> = RuleRegistry::with_builtins();
        let groups = [Group::new("xml-gen", &[ID])];
        let engine = Engine::new(&registry, &groups, &EngineConfig::new()).unwrap();
        engine.run(tree, &SourceFile::new(TAB)).unwrap()
    }

    #[test]
    fn names_are_keyed_by_line_and_stripped() {
        let tree = BasicNode::new("Measure").child(
            BasicNode::new("LineNaming")
                .child(name_at(0, 2))
                .child(name_at(10, 2))
                .child(name_at(20, 2)),
        );
        let report = run(&tree);
        let state = report.state_for::<LineNaming>(ID, "xml-gen").unwrap();

        let names: Vec<(usize, &str)> = state.naming.iter().map(|(l, n)| (*l, n.as_str())).collect();
        assert_eq!(names, [(1, "e"), (2, "B"), (3, "G")]);
        assert_eq!(state.absolute_line(0), Some(1));
        assert_eq!(state.absolute_line(2), Some(3));
        assert_eq!(state.absolute_line(3), None);
        assert!(!report.has_errors());
    }

    #[test]
    fn names_outside_line_naming_are_ignored() {
        let tree = BasicNode::new("Measure").child(name_at(0, 1));
        let report = run(&tree);
        let state = report.state_for::<LineNaming>(ID, "xml-gen").unwrap();
        assert!(state.naming.is_empty());
    }

    #[test]
    fn second_name_on_a_line_is_an_error() {
        let tree = BasicNode::new("LineNaming")
            .child(name_at(0, 1))
            .child(name_at(1, 1));
        let report = run(&tree);

        let state = report.state_for::<LineNaming>(ID, "xml-gen").unwrap();
        assert_eq!(state.naming.get(&1).map(String::as_str), Some("e"));
        assert_eq!(report.diagnostics().len(), 1);
        assert_eq!(report.diagnostics()[0].severity, Severity::Error);
        assert_eq!(report.diagnostics()[0].rule, "line-naming@shared");
    }

    #[test]
    fn each_line_naming_block_resets() {
        let tree = BasicNode::new("Staff")
            .child(BasicNode::new("LineNaming").child(name_at(0, 1)))
            .child(BasicNode::new("LineNaming").child(name_at(10, 1)));
        let report = run(&tree);
        let state = report.state_for::<LineNaming>(ID, "xml-gen").unwrap();

        assert_eq!(state.naming.len(), 1);
        assert_eq!(state.absolute_line(0), Some(2));
    }

    #[test]
    fn missing_range_is_a_warning() {
        let tree = BasicNode::new("LineNaming").child(BasicNode::new("MeasureLineName"));
        let report = run(&tree);
        assert_eq!(report.diagnostics()[0].severity, Severity::Warning);
        assert!(!report.has_errors());
    }
}
