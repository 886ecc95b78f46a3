//! Structural errors of a [MutationTree](crate::model::MutationTree).

use crate::model::tree::VertexIndex;
use thiserror::Error;

/// Reasons why a tree is structurally invalid.
///
/// Returned by [`MutationTree::validate()`](crate::model::MutationTree::validate)
/// and when building a [SampleMap](crate::model::SampleMap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("tree has no root")]
    NoRoot,
    #[error("root vertex {0} has a parent")]
    RootHasParent(VertexIndex),
    #[error("vertex stored at {position} claims index {claimed}")]
    IndexMismatch { position: usize, claimed: VertexIndex },
    #[error("vertex {vertex} references out-of-bounds vertex {reference}")]
    IndexOutOfBounds { vertex: VertexIndex, reference: VertexIndex },
    #[error("vertex {child} is listed as child of {parent} but has parent {actual:?}")]
    InconsistentParent {
        child: VertexIndex,
        parent: VertexIndex,
        actual: Option<VertexIndex>,
    },
    #[error("vertex {child} names {parent} as parent but is not among its children")]
    NotAChild { child: VertexIndex, parent: VertexIndex },
    #[error("vertex {child} is listed more than once as child of {parent}")]
    DuplicateChild { parent: VertexIndex, child: VertexIndex },
    #[error("vertex {0} is not reachable from the root")]
    Disconnected(VertexIndex),
    #[error("parent chain of vertex {0} contains a cycle")]
    Cycle(VertexIndex),
    #[error("internal vertex {0} carries a sample label")]
    LabelOnInternal(VertexIndex),
    #[error("vertex {0} has an empty sample label")]
    EmptyLabel(VertexIndex),
    #[error("sample label '{label}' appears on vertices {first} and {second}")]
    DuplicateLabel {
        label: String,
        first: VertexIndex,
        second: VertexIndex,
    },
}
