//! Node correspondence between two trees.
//!
//! A correspondence maps a vertex of a source tree to the vertex of a target
//! tree believed to represent the same ancestral point. It is built in two
//! phases:
//! 1. [CorrespondenceTable]: concurrent build phase. Many workers record
//!    pairs for independent shared samples at the same time.
//! 2. [Correspondence]: obtained via [`CorrespondenceTable::freeze()`],
//!    read-only for the rest of the merge.
//!
//! # Determinism
//! Two shared samples may imply different targets for the same source
//! vertex. The table keeps every distinct candidate together with the lowest
//! processing order (rank of the shared sample) that proposed it, and the
//! candidate with the lowest order wins. Arrival order between threads thus
//! never influences the result; losing candidates are reported as
//! [Conflict]s.

use crate::merge::partition::SamplePartition;
use crate::model::VertexIndex;
use dashmap::DashMap;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Candidate targets of one source vertex: target -> lowest order proposing it.
#[derive(Debug, Clone, Default)]
struct Candidates {
    targets: BTreeMap<VertexIndex, usize>,
}

impl Candidates {
    fn propose(&mut self, target: VertexIndex, order: usize) {
        self.targets
            .entry(target)
            .and_modify(|lowest| *lowest = (*lowest).min(order))
            .or_insert(order);
    }

    /// Returns `(target, order)` of the candidate with lowest order.
    fn winner(&self) -> Option<(VertexIndex, usize)> {
        self.targets
            .iter()
            .min_by_key(|&(&target, &order)| (order, target))
            .map(|(&target, &order)| (target, order))
    }
}

// =#========================================================================#=
// CORRESPONDENCE TABLE (build phase)
// =#========================================================================#=
/// Thread-safe correspondence map during its build phase.
///
/// Backed by a sharded [DashMap], so concurrent [record](Self::record)
/// calls for distinct keys proceed in parallel and calls for the same key
/// are serialized.
///
/// # Example
/// ```
/// use matmerge::merge::CorrespondenceTable;
///
/// let table = CorrespondenceTable::new();
/// table.record(3, 7, 1);
/// table.record(3, 9, 0); // lower order wins
/// assert_eq!(table.lookup(3), Some(9));
///
/// let frozen = table.freeze();
/// assert_eq!(frozen.lookup(3), Some(9));
/// assert_eq!(frozen.conflicts().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CorrespondenceTable {
    entries: DashMap<VertexIndex, Candidates>,
}

impl CorrespondenceTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table for all shared samples of `partition` on `pool`.
    ///
    /// For each shared sample, the two root-to-leaf paths are aligned from
    /// the leaf upward, and a pair is recorded for every depth both paths
    /// define. The processing order of a pair is the rank of its sample in
    /// [`SamplePartition::shared()`].
    pub fn build(partition: &SamplePartition, pool: &ThreadPool) -> Self {
        let table = CorrespondenceTable::new();
        pool.install(|| {
            partition
                .shared()
                .par_iter()
                .enumerate()
                .for_each(|(order, sample)| {
                    table.record_paths(&sample.base_path, &sample.other_path, order);
                });
        });
        table
    }

    /// Records the pairs of two root-to-leaf paths, aligned at the leaf.
    pub fn record_paths(&self, source_path: &[VertexIndex], target_path: &[VertexIndex], order: usize) {
        for (&source, &target) in source_path.iter().rev().zip(target_path.iter().rev()) {
            self.record(source, target, order);
        }
    }

    /// Records that `source` corresponds to `target`, proposed at processing `order`.
    ///
    /// If `source` already has a different target, the one with the lower
    /// order stays the current mapping; the other is kept as conflict.
    pub fn record(&self, source: VertexIndex, target: VertexIndex, order: usize) {
        self.entries.entry(source).or_default().propose(target, order);
    }

    /// Returns the current target of `source`, if any.
    pub fn lookup(&self, source: VertexIndex) -> Option<VertexIndex> {
        self.entries
            .get(&source)
            .and_then(|candidates| candidates.winner())
            .map(|(target, _)| target)
    }

    /// Returns the number of source vertices with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ends the build phase, resolving every entry to its winning target.
    pub fn freeze(self) -> Correspondence {
        let mut pairs = BTreeMap::new();
        let mut conflicts = Vec::new();

        for (source, candidates) in self.entries {
            let Some((kept, kept_order)) = candidates.winner() else {
                continue;
            };
            pairs.insert(source, kept);
            for (&rejected, &rejected_order) in &candidates.targets {
                if rejected != kept {
                    conflicts.push(Conflict {
                        source,
                        kept,
                        kept_order,
                        rejected,
                        rejected_order,
                    });
                }
            }
        }
        conflicts.sort_by_key(|c| (c.source, c.rejected_order, c.rejected));

        Correspondence { pairs, conflicts }
    }
}

// =#========================================================================#=
// CORRESPONDENCE (read-only)
// =#========================================================================#=
/// Two shared samples implying different targets for the same source vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub source: VertexIndex,
    /// Target that was kept
    pub kept: VertexIndex,
    /// Processing order of the sample establishing `kept`
    pub kept_order: usize,
    /// Target that was rejected
    pub rejected: VertexIndex,
    /// Lowest processing order of a sample proposing `rejected`
    pub rejected_order: usize,
}

/// Frozen, read-only correspondence: at most one target per source vertex.
#[derive(Debug, Clone, Default)]
pub struct Correspondence {
    pairs: BTreeMap<VertexIndex, VertexIndex>,
    conflicts: Vec<Conflict>,
}

impl Correspondence {
    /// Returns the target of `source`, if any.
    pub fn lookup(&self, source: VertexIndex) -> Option<VertexIndex> {
        self.pairs.get(&source).copied()
    }

    /// Iterates over `(source, target)` pairs ordered by source.
    pub fn iter(&self) -> impl Iterator<Item = (VertexIndex, VertexIndex)> + '_ {
        self.pairs.iter().map(|(&source, &target)| (source, target))
    }

    /// Returns the conflicts found during the build, ordered by source.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if there are no pairs.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
