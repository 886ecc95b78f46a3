//! Tree module for mutation-annotated phylogenetic tree representation.
//!
//! This module provides the core data structures for representing trees:
//! - [MutationTree]: The main tree structure using the arena pattern.
//! - [VertexIndex] is used to index vertices.
//! - [PreOrderIter] and [PostOrderIter] for traversals without recursion.

use crate::model::mutation::Mutation;
use crate::model::sample_map::SampleMap;
use crate::model::tree_error::TreeError;
use crate::model::vertex::Vertex;
use crate::newick::{self, NewickStyle};
use std::fmt;

/// Index of a vertex in a tree (arena).
pub type VertexIndex = usize;

/// *During construction only*, index for unset root.
const NO_ROOT_SET_INDEX: VertexIndex = usize::MAX;

// =#========================================================================#=
// TREE
// =#========================================================================#=
/// A rooted, mutation-annotated phylogenetic tree represented using the
/// arena pattern on [Vertex].
///
/// Vertices are stored in a contiguous vector and referenced by [VertexIndex].
/// Aim is to avoid referencing troubles as well as to provide efficient memory
/// layout and cache locality for traversal operations. Other structures (e.g.
/// a correspondence between two trees) only ever store indices, never
/// references into the arena.
///
/// # Structure
/// - All vertices (root, internal, and leaves) are stored in the arena.
/// - Index of root is maintained.
/// - No assumption on order of indices is maintained.
/// - Vertices may have any number of children (multifurcations are common).
/// - Each vertex carries the mutations on the branch from its parent.
/// - Leaves that represent sequenced samples carry a unique label.
///
/// # Construction
/// Top-down construction is easiest: add a root, then children with
/// [add_leaf](MutationTree::add_leaf) and
/// [add_internal](MutationTree::add_internal). Loaders that encounter vertices
/// out of order can use [add_detached](MutationTree::add_detached),
/// [connect](MutationTree::connect) and [set_root](MutationTree::set_root).
/// Test validity with [MutationTree::validate].
///
/// # Example
/// ```
/// use matmerge::model::{MutationTree, parse_mutation_list};
///
/// // Root with sample A, and clade {B, C} sharing C241T
/// let mut tree = MutationTree::new();
/// let root = tree.add_root(vec![]);
/// tree.add_leaf(root, "A", vec![]);
/// let clade = tree.add_internal(root, parse_mutation_list("C241T").unwrap());
/// tree.add_leaf(clade, "B", vec![]);
/// tree.add_leaf(clade, "C", parse_mutation_list("A23403G").unwrap());
///
/// assert!(tree.is_valid());
/// assert_eq!(tree.num_samples(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MutationTree {
    /// Vertices of this tree (arena pattern)
    vertices: Vec<Vertex>,

    /// Index of the root of this tree
    root_index: VertexIndex,

    /// Name of tree; optional
    name: Option<String>,
}

// ============================================================================
// New, Construction (pub)
// ============================================================================
impl MutationTree {
    /// Creates a new, empty tree.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new, empty tree with room for `num_vertices` vertices.
    pub fn with_capacity(num_vertices: usize) -> Self {
        MutationTree {
            vertices: Vec::with_capacity(num_vertices),
            root_index: NO_ROOT_SET_INDEX,
            name: None,
        }
    }

    /// Attaches a name to this tree.
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Adds a root to the tree, assigning a unique index, which gets returned.
    ///
    /// # Arguments
    /// * `mutations` - Mutations of the root relative to the reference (usually empty)
    ///
    /// # Panics
    /// Panics if a root has already been set.
    pub fn add_root(&mut self, mutations: Vec<Mutation>) -> VertexIndex {
        assert!(!self.is_root_set(), "Root has already been set");
        let index = self.add_detached(None, mutations);
        self.root_index = index;
        index
    }

    /// Adds a vertex as new child of `parent`, returning its index.
    ///
    /// # Arguments
    /// * `parent` - Index of the parent vertex
    /// * `label` - Sample label, if the new vertex is a sample leaf
    /// * `mutations` - Mutations on the branch from `parent` to the new vertex
    ///
    /// # Panics
    /// Panics if `parent` is out of bounds.
    pub fn add_child(
        &mut self,
        parent: VertexIndex,
        label: Option<String>,
        mutations: Vec<Mutation>,
    ) -> VertexIndex {
        let index = self.add_detached(label, mutations);
        self.connect(parent, index);
        index
    }

    /// Adds a sample leaf as new child of `parent`, returning its index.
    ///
    /// # Panics
    /// Panics if `parent` is out of bounds.
    pub fn add_leaf<S: Into<String>>(
        &mut self,
        parent: VertexIndex,
        label: S,
        mutations: Vec<Mutation>,
    ) -> VertexIndex {
        self.add_child(parent, Some(label.into()), mutations)
    }

    /// Adds an unlabeled vertex as new child of `parent`, returning its index.
    ///
    /// # Panics
    /// Panics if `parent` is out of bounds.
    pub fn add_internal(&mut self, parent: VertexIndex, mutations: Vec<Mutation>) -> VertexIndex {
        self.add_child(parent, None, mutations)
    }

    /// Adds a vertex without parent, returning its index.
    ///
    /// The vertex has to be [connected](MutationTree::connect) or made the
    /// [root](MutationTree::set_root) before the tree is valid.
    pub fn add_detached(&mut self, label: Option<String>, mutations: Vec<Mutation>) -> VertexIndex {
        let index = self.vertices.len();
        self.vertices.push(Vertex::new(index, label, mutations));
        index
    }

    /// Makes `child` a child of `parent`.
    ///
    /// No checks are performed here; an inconsistent structure
    /// (e.g. a vertex connected twice) is reported by [validate](MutationTree::validate).
    ///
    /// # Panics
    /// Panics if either index is out of bounds.
    pub fn connect(&mut self, parent: VertexIndex, child: VertexIndex) {
        assert!(child < self.vertices.len(), "Child index {child} out of bounds");
        self.vertices[parent].push_child(child);
        self.vertices[child].set_parent(parent);
    }

    /// Declares the vertex at `index` to be the root.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set_root(&mut self, index: VertexIndex) {
        assert!(index < self.vertices.len(), "Root index {index} out of bounds");
        self.root_index = index;
    }

    /// Set a name for this tree.
    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }
}

impl Default for MutationTree {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Getters / Accessors (pub)
// ============================================================================
impl MutationTree {
    /// Returns reference to name of this tree, or `None` if not set.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Returns whether root of tree has been set.
    pub fn is_root_set(&self) -> bool {
        self.root_index != NO_ROOT_SET_INDEX
    }

    /// Returns a reference to the root vertex.
    ///
    /// # Panics
    /// Panics if the root hasn't been set and thus tree hasn't been fully constructed yet.
    pub fn root(&self) -> &Vertex {
        &self[self.root_index]
    }

    /// Returns the index of the root.
    pub fn root_index(&self) -> VertexIndex {
        self.root_index
    }

    /// Returns a reference to the vertex at the given index.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn vertex(&self, index: VertexIndex) -> &Vertex {
        &self[index]
    }

    /// Returns all vertices in arena order.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Returns the number of vertices in this tree.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of leaves (labeled or not) in this tree.
    pub fn num_leaves(&self) -> usize {
        self.vertices.iter().filter(|&v| v.is_leaf()).count()
    }

    /// Returns the number of internal vertices (neither root nor leaf).
    pub fn num_internal(&self) -> usize {
        self.vertices.iter().filter(|&v| v.is_internal()).count()
    }

    /// Returns the number of sample leaves in this tree.
    pub fn num_samples(&self) -> usize {
        self.vertices.iter().filter(|&v| v.is_sample()).count()
    }

    /// Returns the total number of mutations over all branches,
    /// i.e. the parsimony score of the tree.
    pub fn total_mutations(&self) -> usize {
        self.vertices.iter().map(|v| v.mutations().len()).sum()
    }
}

impl std::ops::Index<VertexIndex> for MutationTree {
    type Output = Vertex;

    fn index(&self, index: VertexIndex) -> &Self::Output {
        &self.vertices[index]
    }
}

// ============================================================================
// Validation (pub)
// ============================================================================
impl MutationTree {
    /// Validates the tree structure, all index references and sample labels.
    ///
    /// Checks:
    /// - Root index is set and the root has no parent
    /// - All vertex indices match their position in the arena
    /// - All child indices are valid, unique per parent and point back to correct parent
    /// - All parent indices are valid and include this vertex as a child
    /// - Every vertex is reachable from the root (no detached parts or cycles)
    /// - Labels are non-empty, only on leaves, and unique
    ///
    /// # Returns
    /// `Ok(())` if tree is valid, otherwise the first problem found
    pub fn validate(&self) -> Result<(), TreeError> {
        if !self.is_root_set() {
            return Err(TreeError::NoRoot);
        }
        let num_vertices = self.vertices.len();
        if self.root().has_parent() {
            return Err(TreeError::RootHasParent(self.root_index));
        }

        for (position, vertex) in self.vertices.iter().enumerate() {
            // Check vertex index matches its arena position
            if vertex.index() != position {
                return Err(TreeError::IndexMismatch {
                    position,
                    claimed: vertex.index(),
                });
            }

            // Check children point back to this vertex as parent
            for &child in vertex.children() {
                if child >= num_vertices {
                    return Err(TreeError::IndexOutOfBounds {
                        vertex: position,
                        reference: child,
                    });
                }
                let actual = self.vertices[child].parent();
                if actual != Some(position) {
                    return Err(TreeError::InconsistentParent {
                        child,
                        parent: position,
                        actual,
                    });
                }
            }

            // Check parent includes this vertex in its children
            if let Some(parent) = vertex.parent() {
                if parent >= num_vertices {
                    return Err(TreeError::IndexOutOfBounds {
                        vertex: position,
                        reference: parent,
                    });
                }
                if !self.vertices[parent].children().contains(&position) {
                    return Err(TreeError::NotAChild {
                        child: position,
                        parent,
                    });
                }
            }

            // Check labels
            if let Some(label) = vertex.label() {
                if label.is_empty() {
                    return Err(TreeError::EmptyLabel(position));
                }
                if !vertex.is_leaf() {
                    return Err(TreeError::LabelOnInternal(position));
                }
            }
        }

        self.check_reachability()?;

        // Duplicate labels are detected while building the map
        SampleMap::from_tree(self).map(|_| ())
    }

    /// Returns `true` if [validate](MutationTree::validate) finds no problem.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Walks the tree from the root; every vertex must be visited exactly once.
    ///
    /// Assumes parent/child references have been checked to agree.
    fn check_reachability(&self) -> Result<(), TreeError> {
        let mut visited = vec![false; self.vertices.len()];
        let mut stack = vec![self.root_index];
        visited[self.root_index] = true;

        while let Some(index) = stack.pop() {
            for &child in self.vertices[index].children() {
                if visited[child] {
                    return Err(TreeError::DuplicateChild {
                        parent: index,
                        child,
                    });
                }
                visited[child] = true;
                stack.push(child);
            }
        }

        // Classify the first unreachable vertex: parent chain either loops or ends
        let Some(unreached) = visited.iter().position(|&v| !v) else {
            return Ok(());
        };
        let mut seen = vec![false; self.vertices.len()];
        let mut current = unreached;
        while let Some(parent) = self.vertices[current].parent() {
            if seen[current] {
                return Err(TreeError::Cycle(unreached));
            }
            seen[current] = true;
            current = parent;
        }
        Err(TreeError::Disconnected(unreached))
    }
}

// ============================================================================
// Paths and samples (pub)
// ============================================================================
impl MutationTree {
    /// Returns an iterator from the given vertex (inclusive) up to the root.
    ///
    /// Must only be used on [valid](MutationTree::validate) trees;
    /// a cyclic parent chain would never terminate.
    pub fn ancestors(&self, index: VertexIndex) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(index),
        }
    }

    /// Returns the path of vertex indices from the root to the given vertex (inclusive).
    pub fn path_from_root(&self, index: VertexIndex) -> Vec<VertexIndex> {
        let mut path: Vec<VertexIndex> = self.ancestors(index).collect();
        path.reverse();
        path
    }

    /// Returns the number of edges between the root and the given vertex.
    pub fn depth(&self, index: VertexIndex) -> usize {
        self.ancestors(index).count() - 1
    }

    /// Returns all mutations on the path from the root to the given vertex
    /// (both inclusive) as a sorted multiset.
    pub fn accumulated_mutations(&self, index: VertexIndex) -> Vec<Mutation> {
        let mut mutations: Vec<Mutation> = self
            .ancestors(index)
            .flat_map(|i| self.vertices[i].mutations().iter().copied())
            .collect();
        mutations.sort();
        mutations
    }

    /// Returns the sample labels of this tree in pre-order.
    pub fn samples(&self) -> Vec<&str> {
        self.pre_order_iter().filter_map(|v| v.label()).collect()
    }

    /// Returns the sample labels in the subtree rooted at the given vertex, in pre-order.
    pub fn samples_below(&self, index: VertexIndex) -> Vec<&str> {
        self.subtree_pre_order(index)
            .filter_map(|v| v.label())
            .collect()
    }

    /// Builds the label-to-leaf [SampleMap] of this tree.
    ///
    /// # Errors
    /// [TreeError::DuplicateLabel] if a label appears on two vertices.
    pub fn sample_map(&self) -> Result<SampleMap, TreeError> {
        SampleMap::from_tree(self)
    }

    /// Returns the index of the leaf with the given label, if any (linear scan).
    pub fn find_sample(&self, label: &str) -> Option<VertexIndex> {
        self.vertices
            .iter()
            .find(|v| v.label() == Some(label))
            .map(|v| v.index())
    }
}

/// Iterator from a vertex up to the root, see [MutationTree::ancestors].
pub struct Ancestors<'a> {
    tree: &'a MutationTree,
    next: Option<VertexIndex>,
}

impl Iterator for Ancestors<'_> {
    type Item = VertexIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree[current].parent();
        Some(current)
    }
}

// ============================================================================
// Printing (pub)
// ============================================================================
impl MutationTree {
    /// Convenience method to convert this tree to a Newick string
    pub fn to_newick(&self, style: NewickStyle) -> String {
        newick::to_newick(style, self)
    }

    /// Prints a visual representation of the tree to the console.
    ///
    /// See the [Display](fmt::Display) implementation for the format.
    pub fn print_tree(&self) {
        println!("{self}");
    }
}

/// Renders the tree, e.g.
///
/// ```text
/// Tree with 3 samples (5 vertices total):
/// [0] Root
///   ├─ [1] Leaf "A"
///   └─ [2] Internal {C241T}
///       ├─ [3] Leaf "B"
///       └─ [4] Leaf "C" {A23403G}
/// ```
impl fmt::Display for MutationTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Tree with {} samples ({} vertices total):",
            self.num_samples(),
            self.vertices.len()
        )?;
        if !self.is_root_set() {
            return write!(f, "\n(No root set)");
        }

        // (index, prefix for children, connector of this vertex)
        let mut stack: Vec<(VertexIndex, String, &str)> = vec![(self.root_index, String::new(), "")];
        while let Some((index, prefix, connector)) = stack.pop() {
            let vertex = &self.vertices[index];
            let kind = if index == self.root_index {
                "Root".to_string()
            } else if let Some(label) = vertex.label() {
                format!("Leaf \"{label}\"")
            } else if vertex.is_leaf() {
                "Leaf".to_string()
            } else {
                "Internal".to_string()
            };
            write!(f, "\n{prefix}{connector}[{index}] {kind}")?;
            if !vertex.mutations().is_empty() {
                let mutations: Vec<String> = vertex.mutations().iter().map(|m| m.to_string()).collect();
                write!(f, " {{{}}}", mutations.join(","))?;
            }

            let child_prefix = match connector {
                "" => format!("{prefix}  "),
                "└─ " => format!("{prefix}    "),
                _ => format!("{prefix}│   "),
            };
            // Push in reverse, so first child is printed first
            let children = vertex.children();
            for (i, &child) in children.iter().enumerate().rev() {
                let child_connector = if i + 1 == children.len() { "└─ " } else { "├─ " };
                stack.push((child, child_prefix.clone(), child_connector));
            }
        }

        Ok(())
    }
}

// =#========================================================================#=
// ITERATORS
// =#========================================================================#=
impl MutationTree {
    /// Returns an iterator over the tree in post-order (children before parents).
    ///
    /// Post-order traversal visits each vertex's children before visiting the vertex itself.
    /// This is useful for aggregating data from leaves upward, e.g. sample counts.
    pub fn post_order_iter(&self) -> PostOrderIter<'_> {
        PostOrderIter::new(self, self.is_root_set().then_some(self.root_index))
    }

    /// Returns an iterator over the tree in pre-order (parents before children).
    ///
    /// Pre-order traversal visits each vertex before visiting its children.
    /// This is useful for propagating data from root to leaves.
    ///
    /// # Example
    /// ```
    /// use matmerge::model::MutationTree;
    ///
    /// let mut tree = MutationTree::new();
    /// let root = tree.add_root(vec![]);
    /// tree.add_leaf(root, "A", vec![]);
    /// tree.add_leaf(root, "B", vec![]);
    ///
    /// let labels: Vec<_> = tree.pre_order_iter().map(|v| v.label()).collect();
    /// assert_eq!(labels, vec![None, Some("A"), Some("B")]);
    /// ```
    pub fn pre_order_iter(&self) -> PreOrderIter<'_> {
        PreOrderIter::new(self, self.is_root_set().then_some(self.root_index))
    }

    /// Returns a pre-order iterator over the subtree rooted at `index`.
    pub fn subtree_pre_order(&self, index: VertexIndex) -> PreOrderIter<'_> {
        PreOrderIter::new(self, Some(index))
    }
}

/// Iterator for post-order traversal (children before parents).
///
/// This iterator uses a stack-based approach to traverse the tree without recursion.
/// Each vertex is visited after all its descendants have been visited.
pub struct PostOrderIter<'a> {
    tree: &'a MutationTree,
    stack: Vec<(VertexIndex, bool)>, // (index, children_visited)
}

impl<'a> PostOrderIter<'a> {
    fn new(tree: &'a MutationTree, start: Option<VertexIndex>) -> Self {
        let stack = start.map(|index| vec![(index, false)]).unwrap_or_default();
        PostOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = &'a Vertex;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let vertex = &self.tree[index];

            if children_visited || vertex.is_leaf() {
                // Either we've already processed children, or this is a leaf
                return Some(vertex);
            } else {
                // Mark this vertex as "children will be visited"
                self.stack.push((index, true));

                // Push children in reverse, so first child is processed first
                for &child in vertex.children().iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}

/// Iterator for pre-order traversal (parents before children).
///
/// This iterator uses a stack-based approach to traverse the tree without recursion.
/// Each vertex is visited before any of its descendants.
pub struct PreOrderIter<'a> {
    tree: &'a MutationTree,
    stack: Vec<VertexIndex>,
}

impl<'a> PreOrderIter<'a> {
    fn new(tree: &'a MutationTree, start: Option<VertexIndex>) -> Self {
        let stack = start.map(|index| vec![index]).unwrap_or_default();
        PreOrderIter { tree, stack }
    }
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = &'a Vertex;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let vertex = &self.tree[index];

        // Push children onto stack in reverse, so first child is processed first
        self.stack.extend(vertex.children().iter().rev());

        Some(vertex)
    }
}
