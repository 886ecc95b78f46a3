//! Vertex module for mutation-annotated tree representation.

use crate::model::mutation::Mutation;
use crate::model::tree::VertexIndex;

// =#========================================================================#=
// VERTEX
// =#========================================================================#=
/// Represents a vertex (node) in a mutation-annotated phylogenetic tree.
///
/// A vertex is either:
/// - **Root**: no parent
/// - **Internal**: has parent and at least one child, no label
/// - **Leaf**: has parent and no children; carries a sample label
///   if it represents a sequenced sample
///
/// # Invariants
/// - `index` is index in arena
/// - `mutations` are relative to the parent vertex, in the order they were given
/// - `children` is unordered for all purposes of this crate; insertion order is kept
/// - only leaves carry a label (checked by [validate](crate::model::MutationTree::validate))
#[derive(PartialEq, Debug, Clone)]
pub struct Vertex {
    /// Index of this vertex in the tree arena
    index: VertexIndex,
    /// Index of the parent vertex; `None` for the root and detached vertices
    parent: Option<VertexIndex>,
    /// Indices of the child vertices
    children: Vec<VertexIndex>,
    /// Sample label; only on leaves
    label: Option<String>,
    /// Mutations on the branch from the parent to this vertex
    mutations: Vec<Mutation>,
}

impl Vertex {
    /// Creates a new vertex without parent and children.
    ///
    /// # Arguments
    /// * `index` - The unique index of this vertex in the tree (arena)
    /// * `label` - Sample label, if this vertex is a sample leaf
    /// * `mutations` - Mutations relative to the (future) parent
    pub fn new(index: VertexIndex, label: Option<String>, mutations: Vec<Mutation>) -> Self {
        Vertex {
            index,
            parent: None,
            children: Vec::new(),
            label,
            mutations,
        }
    }

    /// Returns the index of this vertex.
    pub fn index(&self) -> VertexIndex {
        self.index
    }

    /// Returns the index of the parent, or `None` for a root or detached vertex.
    pub fn parent(&self) -> Option<VertexIndex> {
        self.parent
    }

    /// Returns `true` if this vertex has a parent set.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns the children of this vertex (empty for leaves).
    pub fn children(&self) -> &[VertexIndex] {
        &self.children
    }

    /// Returns the sample label, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the mutations on the branch leading into this vertex.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Returns `true` if this vertex has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns `true` if this vertex is a leaf carrying a sample label.
    pub fn is_sample(&self) -> bool {
        self.is_leaf() && self.label.is_some()
    }

    /// Returns `true` if this vertex has children and a parent.
    pub fn is_internal(&self) -> bool {
        !self.children.is_empty() && self.parent.is_some()
    }

    pub(crate) fn set_parent(&mut self, parent: VertexIndex) {
        self.parent = Some(parent);
    }

    pub(crate) fn push_child(&mut self, child: VertexIndex) {
        self.children.push(child);
    }
}
