//! The enter/leave event queue derived from a tree.

use crate::SyntaxNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Enter,
    Leave,
}

/// One traversal event. `parent` is `None` only for the root.
pub struct Step<'t, N> {
    pub direction: Direction,
    pub node: &'t N,
    pub parent: Option<&'t N>,
}

impl<N> Clone for Step<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for Step<'_, N> {}

impl<N: SyntaxNode> std::fmt::Debug for Step<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("direction", &self.direction)
            .field("node", &self.node.name())
            .field("parent", &self.parent.map(SyntaxNode::name))
            .finish()
    }
}

/// Flatten `root` into document-order enter/leave steps.
///
/// Every node yields exactly one `Enter` and one `Leave`; a node's subtree
/// lies strictly between them. Iterative, so deep trees cannot overflow the
/// stack.
pub fn build_queue<N: SyntaxNode>(root: &N) -> Vec<Step<'_, N>> {
    let mut queue = Vec::new();
    let mut pending = vec![Step {
        direction: Direction::Enter,
        node: root,
        parent: None,
    }];

    while let Some(step) = pending.pop() {
        queue.push(step);
        if step.direction == Direction::Leave {
            continue;
        }
        pending.push(Step {
            direction: Direction::Leave,
            ..step
        });
        let node = step.node;
        for child in node.children().into_iter().rev() {
            pending.push(Step {
                direction: Direction::Enter,
                node: child,
                parent: Some(node),
            });
        }
    }
    queue
}
