//! Matmerge is a library to merge two mutation-annotated phylogenetic trees.
//!
//! Given a "base" and an "other" tree that share some sequenced samples,
//! this crate builds one combined tree holding every sample of both inputs.
//! The structure of the base tree is kept; clades of the other tree whose
//! samples are unknown to the base are grafted onto it at the point where
//! both trees demonstrably agree. Core functionality provided:
//! - Tree model: [MutationTree](crate::model::MutationTree) with
//!   [Mutation](crate::model::Mutation)-annotated branches, structural
//!   validation, iterative traversals (see [crate::model]).
//! - Sample partition: base-only, other-only and shared samples, either the
//!   intersection of both trees or a caller-supplied list.
//! - Node correspondence: shared samples pin vertices of the base tree to
//!   vertices of the other tree; built concurrently, resolved
//!   deterministically.
//! - Consistency checks: corresponding vertices must agree on accumulated
//!   mutations and on the shared samples below them.
//! - Grafting: exclusive clades are attached under their nearest confirmed
//!   ancestor, with mutations rebased onto the attachment point.
//! - Merge report: missing or duplicate samples, conflicts, failed checks and
//!   low-confidence grafts are collected, never silently dropped.
//! - Newick rendering of trees for logging and hand-off to a writer.
//!
//! Limitations:
//! - Trees are consumed as objects; loading and storing tree files is
//!   left to the caller
//! - Mutations are taken as given; no placement or parsimony optimization
//!
//! # Usage patterns
//! 1. [merge_trees] merges with default settings.
//! 2. [TreeMergerBuilder](crate::merge::TreeMergerBuilder) gives control over
//!    shared samples, reference tree and worker count.
//!
//! ## Example Default Configuration
//! ```
//! use matmerge::merge_trees;
//! use matmerge::merge::SharedSamples;
//! use matmerge::model::MutationTree;
//!
//! let mut base = MutationTree::new();
//! let root = base.add_root(vec![]);
//! base.add_leaf(root, "A", vec![]);
//! base.add_leaf(root, "B", vec![]);
//!
//! let mut other = MutationTree::new();
//! let root = other.add_root(vec![]);
//! let clade = other.add_internal(root, vec!["G11083T".parse().unwrap()]);
//! other.add_leaf(clade, "B", vec![]);
//! other.add_leaf(clade, "C", vec![]);
//! other.add_leaf(root, "A", vec![]);
//!
//! let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
//! assert_eq!(outcome.tree.num_samples(), 3);
//! for record in outcome.report.records() {
//!     println!("{record}");
//! }
//! ```
//!
//! ## Example Merger Configuration
//! ```no_run
//! use matmerge::merge::TreeMerger;
//! # use matmerge::model::MutationTree;
//! # let (base, other, reference) = (MutationTree::new(), MutationTree::new(), MutationTree::new());
//!
//! let outcome = TreeMerger::builder(&base, &other)
//!     .with_shared_samples(["England/MILK-9E05B3/2020", "USA/CA-1234/2020"])
//!     .with_reference(&reference) // Cross-validate the result
//!     .with_num_threads(8)
//!     .build()?
//!     .merge()?;
//!
//! println!("{} samples, {} report records", outcome.tree.num_samples(), outcome.report.len());
//! # Ok::<(), matmerge::merge::MergeError>(())
//! ```

pub mod merge;
pub mod model;
pub mod newick;

pub use merge::merge_trees;
