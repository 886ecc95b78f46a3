//! Sample label lookup for mutation-annotated trees.
//!
//! - [SampleMap]: label-to-leaf mapping of a single tree, with label order kept.

use crate::model::tree::{MutationTree, VertexIndex};
use crate::model::tree_error::TreeError;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

// =#========================================================================#=
// SAMPLE MAP
// =#========================================================================#=
/// Maps sample labels to the leaf vertices of one tree.
///
/// Labels are kept in the order in which they were inserted (pre-order when
/// built with [from_tree](SampleMap::from_tree)). Building the map is where
/// the "no duplicate sample in one tree" invariant gets enforced.
///
/// # Example
/// ```
/// use matmerge::model::{MutationTree, SampleMap};
///
/// let mut tree = MutationTree::new();
/// let root = tree.add_root(vec![]);
/// let kiwi = tree.add_leaf(root, "Apteryx owenii", vec![]);
/// tree.add_leaf(root, "Apteryx haastii", vec![]);
///
/// let samples = SampleMap::from_tree(&tree).unwrap();
/// assert_eq!(samples.get_vertex("Apteryx owenii"), Some(kiwi));
/// assert_eq!(samples.num_samples(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SampleMap {
    /// List of sample labels
    labels: Vec<String>,
    /// Map from label to its leaf
    map: HashMap<String, VertexIndex>,
}

impl SampleMap {
    /// Creates a new SampleMap with pre-allocated capacity.
    ///
    /// # Arguments
    /// * `num_samples` - Expected number of samples
    pub fn with_capacity(num_samples: usize) -> Self {
        SampleMap {
            labels: Vec::with_capacity(num_samples),
            map: HashMap::with_capacity(num_samples),
        }
    }

    /// Builds the map of all labeled vertices of `tree`, in pre-order.
    ///
    /// Vertices not reachable from the root are included after the
    /// reachable ones, so duplicates are found even in disconnected trees.
    ///
    /// # Errors
    /// [TreeError::DuplicateLabel] for the first label found twice.
    pub fn from_tree(tree: &MutationTree) -> Result<Self, TreeError> {
        let mut samples = SampleMap::with_capacity(tree.num_vertices());
        for vertex in tree.vertices() {
            if let Some(label) = vertex.label() {
                samples.insert(label, vertex.index())?;
            }
        }
        samples.sort_by_tree_order(tree);
        Ok(samples)
    }

    /// Inserts a label for a leaf.
    ///
    /// # Errors
    /// [TreeError::DuplicateLabel] if the label is already present.
    pub fn insert(&mut self, label: &str, vertex: VertexIndex) -> Result<(), TreeError> {
        match self.map.entry(label.to_string()) {
            Entry::Occupied(entry) => Err(TreeError::DuplicateLabel {
                label: label.to_string(),
                first: *entry.get(),
                second: vertex,
            }),
            Entry::Vacant(entry) => {
                entry.insert(vertex);
                self.labels.push(label.to_string());
                Ok(())
            }
        }
    }

    /// Retrieves the leaf for a given label.
    ///
    /// # Returns
    /// `Some(index)` if the label exists, `None` otherwise
    pub fn get_vertex(&self, label: &str) -> Option<VertexIndex> {
        self.map.get(label).copied()
    }

    /// Checks if a label exists in the map.
    pub fn contains_label(&self, label: &str) -> bool {
        self.map.contains_key(label)
    }

    /// Returns the number of samples currently stored.
    pub fn num_samples(&self) -> usize {
        self.labels.len()
    }

    /// Returns whether the map holds no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns reference to the labels in this map.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Iterates over `(label, leaf)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, VertexIndex)> {
        self.labels.iter().map(|label| (label.as_str(), self.map[label]))
    }

    /// Reorders labels so that reachable leaves come in pre-order.
    fn sort_by_tree_order(&mut self, tree: &MutationTree) {
        if !tree.is_root_set() {
            return;
        }
        // Guarded walk, the tree has not necessarily been validated
        let mut rank = vec![usize::MAX; tree.num_vertices()];
        let mut stack = vec![tree.root_index()];
        let mut position = 0;
        while let Some(index) = stack.pop() {
            if index >= rank.len() || rank[index] != usize::MAX {
                continue;
            }
            rank[index] = position;
            position += 1;
            stack.extend(tree[index].children().iter().rev());
        }
        let map = &self.map;
        self.labels.sort_by_key(|label| (rank[map[label]], map[label]));
    }
}

impl fmt::Display for SampleMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "SampleMap ({} samples):", self.labels.len())?;
        for (label, vertex) in self.iter() {
            writeln!(f, "  [{}] {}", vertex, label)?;
        }
        Ok(())
    }
}

impl std::ops::Index<&str> for SampleMap {
    type Output = VertexIndex;

    fn index(&self, label: &str) -> &Self::Output {
        &self.map[label]
    }
}
