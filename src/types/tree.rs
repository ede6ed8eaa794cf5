use std::fmt;
use std::ops::Range;

use serde_json::{Map, Value};

/// Stable identity of a node for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// A node of a pre-parsed syntax tree.
///
/// Implement this for the host's tree type. Type names are compared ASCII
/// case-insensitively by the matcher.
pub trait SyntaxNode {
    /// The node's type name, e.g. `"Measure"`.
    fn name(&self) -> &str;

    /// Source ranges covered by this node, in document order.
    fn ranges(&self) -> &[Range<usize>];

    /// Direct children in document order.
    fn children(&self) -> Vec<&Self>;

    /// Value of a named property, used by attribute selectors. The first
    /// component of a dotted path is looked up here; the remaining components
    /// index into the returned JSON value.
    fn attribute(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Identity used for freshness bookkeeping. Defaults to the node's address,
    /// which is stable while the tree is borrowed.
    fn node_id(&self) -> NodeId {
        NodeId(std::ptr::from_ref(self).cast::<()>() as usize)
    }
}

/// 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Access to the text a tree was parsed from.
pub trait SourceText {
    /// Line and column of an absolute offset.
    fn position(&self, offset: usize) -> Position;

    /// Text between two absolute offsets. Out-of-range requests yield `""`.
    fn slice(&self, from: usize, to: usize) -> &str;
}

/// Owned source text with a precomputed line index.
#[derive(Debug, Clone)]
pub struct SourceFile {
    text: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

impl SourceText for SourceFile {
    fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position {
            line: line + 1,
            column: offset - self.line_starts[line],
        }
    }

    fn slice(&self, from: usize, to: usize) -> &str {
        self.text.get(from..to).unwrap_or("")
    }
}

/// A plain owned tree node.
///
/// # Example
///
/// ```
/// use tabvisit::BasicNode;
///
/// let tree = BasicNode::new("Measure")
///     .attr("index", 0)
///     .child(BasicNode::new("Note").range(4..5).attr("fret", 3));
/// assert_eq!(tree.children_slice().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicNode {
    name: String,
    ranges: Vec<Range<usize>>,
    attributes: Map<String, Value>,
    children: Vec<BasicNode>,
}

impl BasicNode {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn range(mut self, range: Range<usize>) -> Self {
        self.ranges.push(range);
        self
    }

    #[must_use]
    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: BasicNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children_slice(&self) -> &[BasicNode] {
        &self.children
    }
}

impl SyntaxNode for BasicNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    fn children(&self) -> Vec<&Self> {
        self.children.iter().collect()
    }

    fn attribute(&self, key: &str) -> Option<Value> {
        match self.attributes.get(key) {
            Some(value) => Some(value.clone()),
            None if key == "name" => Some(Value::String(self.name.clone())),
            None => None,
        }
    }
}
