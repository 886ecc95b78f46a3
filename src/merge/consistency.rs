//! Consistency checks between corresponding vertices of two trees.
//!
//! A pair `(x, y)` of corresponding vertices is consistent if
//! 1. the mutations accumulated from the root to `x` equal those
//!    accumulated from the root to `y` (as multisets of
//!    `(position, state)`), and
//! 2. the shared samples below `x` are exactly the shared samples below `y`.
//!
//! Checks only read the two trees and the frozen [Correspondence], so they
//! run independently on a worker pool, one task per pair.

use crate::merge::correspondence::{Conflict, Correspondence, CorrespondenceTable};
use crate::merge::merge_error::MergeError;
use crate::merge::partition::{SamplePartition, SharedSample, SharedSamples, partition};
use crate::merge::report::{MergeReport, TreeSide};
use crate::model::{Mutation, MutationTree, Nucleotide, VertexIndex};
use rayon::ThreadPool;
use rayon::prelude::*;
use std::fmt;

// =#========================================================================#=
// OUTCOME
// =#========================================================================#=
/// First point where two corresponding subtrees disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Accumulated mutations differ; `position` is the smallest differing position
    Mutation {
        position: u32,
        /// States at `position` accumulated on the source side (empty if none)
        source_states: Vec<Nucleotide>,
        /// States at `position` accumulated on the target side (empty if none)
        target_states: Vec<Nucleotide>,
    },
    /// A shared sample is below one vertex of the pair but not below the other;
    /// the lexicographically smallest such sample is reported
    Sample { sample: String, missing_from: TreeSide },
}

/// Result of checking one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Consistent,
    Divergent(Divergence),
}

impl CheckOutcome {
    pub fn is_consistent(&self) -> bool {
        matches!(self, CheckOutcome::Consistent)
    }
}

/// A checked pair of corresponding vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCheck {
    pub source: VertexIndex,
    pub target: VertexIndex,
    pub outcome: CheckOutcome,
}

// =#========================================================================#=
// CHECKER
// =#========================================================================#=
/// Per-tree lookup structure: Euler intervals and shared leaves by entry time.
#[derive(Debug)]
struct SideIndex {
    /// Pre-order position of each vertex
    entry: Vec<usize>,
    /// Largest pre-order position within the subtree of each vertex
    exit: Vec<usize>,
    /// `(entry of leaf, rank in shared list)` sorted by entry
    shared_by_entry: Vec<(usize, usize)>,
}

impl SideIndex {
    fn new(tree: &MutationTree, leaves: impl Iterator<Item = VertexIndex>) -> Self {
        let n = tree.num_vertices();
        let mut entry = vec![0; n];
        for (position, vertex) in tree.pre_order_iter().enumerate() {
            entry[vertex.index()] = position;
        }
        let mut exit = entry.clone();
        for vertex in tree.post_order_iter() {
            for &child in vertex.children() {
                exit[vertex.index()] = exit[vertex.index()].max(exit[child]);
            }
        }
        let mut shared_by_entry: Vec<(usize, usize)> =
            leaves.enumerate().map(|(rank, leaf)| (entry[leaf], rank)).collect();
        shared_by_entry.sort_unstable();

        SideIndex {
            entry,
            exit,
            shared_by_entry,
        }
    }

    fn contains(&self, ancestor: VertexIndex, vertex: VertexIndex) -> bool {
        self.entry[ancestor] <= self.entry[vertex] && self.entry[vertex] <= self.exit[ancestor]
    }

    /// Ranks of shared samples below `vertex`, in entry order.
    fn shared_below(&self, vertex: VertexIndex) -> &[(usize, usize)] {
        let start = self.shared_by_entry.partition_point(|&(e, _)| e < self.entry[vertex]);
        let end = self.shared_by_entry.partition_point(|&(e, _)| e <= self.exit[vertex]);
        &self.shared_by_entry[start..end]
    }
}

/// Checks pairs of corresponding vertices of a source and a target tree.
///
/// Built once per merge; afterwards [check](Self::check) only reads.
#[derive(Debug)]
pub struct ConsistencyChecker<'a> {
    source: &'a MutationTree,
    target: &'a MutationTree,
    shared: &'a [SharedSample],
    source_index: SideIndex,
    target_index: SideIndex,
    sides: (TreeSide, TreeSide),
}

impl<'a> ConsistencyChecker<'a> {
    /// Creates a checker for `source` (the partition's base side) and
    /// `target` (the partition's other side).
    ///
    /// # Arguments
    /// * `sides` - How source and target are named in divergences
    pub fn new(
        source: &'a MutationTree,
        target: &'a MutationTree,
        partition: &'a SamplePartition,
        sides: (TreeSide, TreeSide),
    ) -> Self {
        let shared = partition.shared();
        ConsistencyChecker {
            source,
            target,
            shared,
            source_index: SideIndex::new(source, shared.iter().map(SharedSample::base_leaf)),
            target_index: SideIndex::new(target, shared.iter().map(SharedSample::other_leaf)),
            sides,
        }
    }

    /// Checks whether source vertex `x` and target vertex `y` are compatible.
    ///
    /// Mutations are compared first, so a pair diverging in both respects
    /// reports the mutation position.
    pub fn check(&self, x: VertexIndex, y: VertexIndex) -> CheckOutcome {
        let source_mutations = self.source.accumulated_mutations(x);
        let target_mutations = self.target.accumulated_mutations(y);
        if let Some(divergence) = first_mutation_divergence(&source_mutations, &target_mutations) {
            return CheckOutcome::Divergent(divergence);
        }

        match self.first_sample_divergence(x, y) {
            Some(divergence) => CheckOutcome::Divergent(divergence),
            None => CheckOutcome::Consistent,
        }
    }

    /// Checks every pair of `correspondence` on `pool`, ordered by source vertex.
    pub fn check_all(&self, correspondence: &Correspondence, pool: &ThreadPool) -> Vec<PairCheck> {
        let pairs: Vec<(VertexIndex, VertexIndex)> = correspondence.iter().collect();
        pool.install(|| {
            pairs
                .par_iter()
                .map(|&(source, target)| PairCheck {
                    source,
                    target,
                    outcome: self.check(source, target),
                })
                .collect()
        })
    }

    fn first_sample_divergence(&self, x: VertexIndex, y: VertexIndex) -> Option<Divergence> {
        let below_x = self.source_index.shared_below(x);
        let below_y = self.target_index.shared_below(y);

        // Every shared sample below x must be below y; equal counts then imply equal sets
        let all_below_y = below_x
            .iter()
            .all(|&(_, rank)| self.target_index.contains(y, self.shared[rank].other_leaf()));
        if all_below_y && below_x.len() == below_y.len() {
            return None;
        }

        // Ranks follow label order, so the smallest offending rank is the first sample
        let missing_from_target = below_x
            .iter()
            .map(|&(_, rank)| rank)
            .filter(|&rank| !self.target_index.contains(y, self.shared[rank].other_leaf()))
            .min()
            .map(|rank| (rank, self.sides.1));
        let missing_from_source = below_y
            .iter()
            .map(|&(_, rank)| rank)
            .filter(|&rank| !self.source_index.contains(x, self.shared[rank].base_leaf()))
            .min()
            .map(|rank| (rank, self.sides.0));

        [missing_from_target, missing_from_source]
            .into_iter()
            .flatten()
            .min()
            .map(|(rank, missing_from)| Divergence::Sample {
                sample: self.shared[rank].label.clone(),
                missing_from,
            })
    }
}

/// Compares two sorted mutation multisets and returns the smallest
/// position at which they differ.
fn first_mutation_divergence(source: &[Mutation], target: &[Mutation]) -> Option<Divergence> {
    let (mut i, mut j) = (0, 0);
    let position = loop {
        match (source.get(i), target.get(j)) {
            (None, None) => return None,
            (Some(s), None) => break s.position(),
            (None, Some(t)) => break t.position(),
            (Some(s), Some(t)) => {
                if s == t {
                    i += 1;
                    j += 1;
                } else {
                    break s.position().min(t.position());
                }
            }
        }
    };

    let states_at = |mutations: &[Mutation]| -> Vec<Nucleotide> {
        mutations
            .iter()
            .filter(|m| m.position() == position)
            .map(|m| m.mut_state())
            .collect()
    };
    Some(Divergence::Mutation {
        position,
        source_states: states_at(source),
        target_states: states_at(target),
    })
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn states(states: &[Nucleotide]) -> String {
            if states.is_empty() {
                "-".to_string()
            } else {
                states.iter().map(|s| s.as_char()).collect()
            }
        }

        match self {
            Divergence::Mutation {
                position,
                source_states,
                target_states,
            } => write!(
                f,
                "mutations diverge at position {position} ({} vs {})",
                states(source_states),
                states(target_states)
            ),
            Divergence::Sample {
                sample,
                missing_from,
            } => write!(f, "shared sample '{sample}' is not below the {missing_from} vertex"),
        }
    }
}

// =#========================================================================#=
// WHOLE-TREE CONSISTENCY
// =#========================================================================#=
/// Outcome of comparing two whole trees, see [consistent].
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    /// Number of corresponding pairs that were checked
    pub pairs_checked: usize,
    /// Pairs that failed their check, ordered by source vertex
    pub failures: Vec<PairCheck>,
    /// Vertices for which shared samples implied different counterparts
    pub conflicts: Vec<Conflict>,
}

impl ConsistencyReport {
    /// Returns `true` if no pair failed and no conflict occurred.
    pub fn is_consistent(&self) -> bool {
        self.failures.is_empty() && self.conflicts.is_empty()
    }
}

/// Checks whether two trees agree on all samples they have in common.
///
/// Builds a correspondence from the intersection of their samples and
/// checks every pair. Used to cross-validate a merged tree against a
/// reference tree, and usable on its own.
///
/// # Arguments
/// * `a`, `b` - Trees to compare; `a` is the source side
/// * `sides` - How `a` and `b` are named in errors and divergences
/// * `pool` - Worker pool for building and checking
///
/// # Errors
/// [MergeError::InvalidTree] if either tree is structurally invalid.
pub fn consistent(
    a: &MutationTree,
    b: &MutationTree,
    sides: (TreeSide, TreeSide),
    pool: &ThreadPool,
) -> Result<ConsistencyReport, MergeError> {
    a.validate().map_err(MergeError::invalid(sides.0))?;
    b.validate().map_err(MergeError::invalid(sides.1))?;
    let a_samples = a.sample_map().map_err(MergeError::invalid(sides.0))?;
    let b_samples = b.sample_map().map_err(MergeError::invalid(sides.1))?;

    // Intersection never produces report records
    let mut ignored = MergeReport::new();
    let partition = partition(a, &a_samples, b, &b_samples, &SharedSamples::Intersection, &mut ignored);

    let correspondence = CorrespondenceTable::build(&partition, pool).freeze();
    let checker = ConsistencyChecker::new(a, b, &partition, sides);
    let checks = checker.check_all(&correspondence, pool);

    Ok(ConsistencyReport {
        pairs_checked: checks.len(),
        failures: checks.into_iter().filter(|c| !c.outcome.is_consistent()).collect(),
        conflicts: correspondence.conflicts().to_vec(),
    })
}
