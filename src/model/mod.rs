//! Data model for mutation-annotated phylogenetic trees.
//!
//! # Tree representation
//! Trees are represented by [MutationTree], which uses the arena pattern to
//! store [Vertex] nodes, referenced by [VertexIndex]. Each vertex carries the
//! [Mutation]s on the branch from its parent, and leaves representing
//! sequenced samples carry a label.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [MutationTree] | Arena of vertices, construction, validation, traversal |
//! | [Vertex] | Parent, children, label, mutations |
//! | [Mutation] / [Nucleotide] | Branch annotations, equal by position and mutated state |
//! | [SampleMap] | Label-to-leaf lookup, enforces unique labels |
//!
//! # Building trees
//! Loading trees from files is left to the caller; trees are built with
//! [`MutationTree::add_root()`], [`MutationTree::add_leaf()`] and
//! [`MutationTree::add_internal()`], and checked with
//! [`MutationTree::validate()`].

pub mod mutation;
pub mod sample_map;
pub mod tree;
pub mod tree_error;
pub mod vertex;

pub use mutation::{Mutation, MutationParseError, Nucleotide, parse_mutation_list};
pub use sample_map::SampleMap;
pub use tree::{MutationTree, VertexIndex};
pub use tree_error::TreeError;
pub use vertex::Vertex;
