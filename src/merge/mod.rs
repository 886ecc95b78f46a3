//! Merging two mutation-annotated trees.
//!
//! This module provides the [TreeMerger] (configured via [TreeMergerBuilder])
//! and the quick [merge_trees] function, together with the building blocks
//! the merge is made of.
//!
//! # Phases
//! | Phase | Entry point | Parallel |
//! |-------|-------------|----------|
//! | Sample partition | [partition] | no |
//! | Correspondence | [`CorrespondenceTable::build()`] | yes |
//! | Consistency checks | [`ConsistencyChecker::check_all()`] | yes |
//! | Grafting | [`GraftingEngine::graft()`] | no |
//! | Reference cross-validation | [consistent] | yes |
//!
//! The parallel phases run on a bounded rayon pool owned by the
//! [TreeMerger]. Results never depend on thread scheduling: competing
//! correspondences are resolved by the label order of the shared samples,
//! and grafting happens on a single thread in a fixed order.
//!
//! # Failure handling
//! Structurally invalid input trees abort with a [MergeError]. Everything
//! else (missing or duplicate shared samples, conflicting correspondences,
//! failed checks, low-confidence grafts, reference mismatches) is recorded
//! in the [MergeReport] of the [MergeOutcome] and the merge goes on.
//!
//! # Example
//! ```
//! use matmerge::merge::{Reason, TreeMerger};
//! use matmerge::model::{MutationTree, parse_mutation_list};
//!
//! let m1 = parse_mutation_list("C241T").unwrap();
//! let m2 = parse_mutation_list("A23403G").unwrap();
//!
//! // base: (A,(B,C)m1)
//! let mut base = MutationTree::new();
//! let root = base.add_root(vec![]);
//! base.add_leaf(root, "A", vec![]);
//! let bc = base.add_internal(root, m1.clone());
//! base.add_leaf(bc, "B", vec![]);
//! base.add_leaf(bc, "C", vec![]);
//!
//! // other: ((B,C,Dm2)m1)
//! let mut other = MutationTree::new();
//! let root = other.add_root(vec![]);
//! let bcd = other.add_internal(root, m1.clone());
//! other.add_leaf(bcd, "B", vec![]);
//! other.add_leaf(bcd, "C", vec![]);
//! other.add_leaf(bcd, "D", m2.clone());
//!
//! let outcome = TreeMerger::builder(&base, &other)
//!     .with_shared_samples(["B", "C"])
//!     .build()?
//!     .merge()?;
//!
//! let d = outcome.tree.find_sample("D").unwrap();
//! assert_eq!(outcome.tree[d].parent(), Some(bc));
//! assert_eq!(outcome.tree[d].mutations(), m2.as_slice());
//! assert_eq!(outcome.report.count(Reason::CorrespondenceConflict), 0);
//! # Ok::<(), matmerge::merge::MergeError>(())
//! ```

pub mod consistency;
pub mod correspondence;
pub mod graft;
pub mod merge_error;
pub mod merger;
pub mod partition;
pub mod report;

pub use consistency::{
    CheckOutcome, ConsistencyChecker, ConsistencyReport, Divergence, PairCheck, consistent,
};
pub use correspondence::{Conflict, Correspondence, CorrespondenceTable};
pub use graft::{Graft, GraftingEngine, copy_subtree};
pub use merge_error::MergeError;
pub use merger::{MergeConfig, MergeOutcome, TreeMerger, TreeMergerBuilder, merge_trees};
pub use partition::{SamplePartition, SharedSample, SharedSamples, partition};
pub use report::{MergeReport, Reason, ReportRecord, Subject, TreeSide};
