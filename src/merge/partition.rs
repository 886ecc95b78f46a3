//! Sample partitioning: which samples are shared, which belong to one tree only.
//!
//! Besides the three disjoint sample sets, the partition holds for every
//! shared sample its root-to-leaf paths in both trees, and the maximal
//! clades of the other tree that contain only other-only samples (the
//! lowest common ancestors of exclusive samples, which are the units that
//! get grafted).

use crate::merge::report::{MergeReport, Reason};
use crate::model::{MutationTree, SampleMap, VertexIndex};
use std::collections::BTreeSet;

/// Which samples are used as anchors between the two trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SharedSamples {
    /// All samples present in both trees
    #[default]
    Intersection,
    /// A caller-supplied list; may be a subset of the intersection
    /// and may name samples missing from either tree
    Declared(Vec<String>),
}

/// A sample present in both trees, with its position in each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSample {
    pub label: String,
    /// Vertices from the base root down to the sample leaf
    pub base_path: Vec<VertexIndex>,
    /// Vertices from the other root down to the sample leaf
    pub other_path: Vec<VertexIndex>,
}

impl SharedSample {
    /// Returns the sample leaf in the base tree.
    pub fn base_leaf(&self) -> VertexIndex {
        self.base_path[self.base_path.len() - 1]
    }

    /// Returns the sample leaf in the other tree.
    pub fn other_leaf(&self) -> VertexIndex {
        self.other_path[self.other_path.len() - 1]
    }
}

// =#========================================================================#=
// SAMPLE PARTITION
// =#========================================================================#=
/// Classification of all samples of a base and an other tree.
///
/// Invariants:
/// - `base_only`, `other_only` and the shared labels are pairwise disjoint
/// - together they cover all samples of both trees
/// - `shared` is sorted by label; its position is the processing order
#[derive(Debug, Clone, Default)]
pub struct SamplePartition {
    base_only: Vec<String>,
    other_only: Vec<String>,
    shared: Vec<SharedSample>,
    other_exclusive_roots: Vec<VertexIndex>,
}

impl SamplePartition {
    /// Samples kept only from the base tree, sorted.
    ///
    /// Includes samples present in both trees that were not declared shared.
    pub fn base_only(&self) -> &[String] {
        &self.base_only
    }

    /// Samples only present in the other tree, sorted.
    pub fn other_only(&self) -> &[String] {
        &self.other_only
    }

    /// Shared samples in processing order (sorted by label).
    pub fn shared(&self) -> &[SharedSample] {
        &self.shared
    }

    /// Labels of the shared samples in processing order.
    pub fn shared_labels(&self) -> impl Iterator<Item = &str> {
        self.shared.iter().map(|s| s.label.as_str())
    }

    /// Roots of the maximal other-tree clades holding only other-only samples,
    /// in pre-order of the other tree.
    pub fn other_exclusive_roots(&self) -> &[VertexIndex] {
        &self.other_exclusive_roots
    }
}

/// Partitions the samples of `base` and `other`.
///
/// Declared-shared samples missing from a tree are recorded as
/// [Reason::MissingSharedSample] and treated as exclusive to the tree that
/// has them. Samples declared twice, and samples found in both trees that
/// were not declared shared, are recorded as [Reason::DuplicateSample]; the
/// latter keep their base placement.
///
/// # Arguments
/// * `base`, `base_samples` - Base tree and its sample map
/// * `other`, `other_samples` - Other tree and its sample map
/// * `selection` - Which samples to use as anchors
/// * `report` - Receives records about missing and duplicate samples
pub fn partition(
    base: &MutationTree,
    base_samples: &SampleMap,
    other: &MutationTree,
    other_samples: &SampleMap,
    selection: &SharedSamples,
    report: &mut MergeReport,
) -> SamplePartition {
    let declared: BTreeSet<&str> = match selection {
        SharedSamples::Intersection => base_samples
            .labels()
            .iter()
            .map(String::as_str)
            .filter(|label| other_samples.contains_label(label))
            .collect(),
        SharedSamples::Declared(labels) => {
            let mut declared = BTreeSet::new();
            let mut reported = BTreeSet::new();
            for label in labels {
                if !declared.insert(label.as_str()) && reported.insert(label.as_str()) {
                    report.sample(
                        label,
                        Reason::DuplicateSample,
                        "declared shared more than once".to_string(),
                    );
                }
            }
            declared
        }
    };

    let mut shared = Vec::with_capacity(declared.len());
    for &label in &declared {
        match (base_samples.get_vertex(label), other_samples.get_vertex(label)) {
            (Some(base_leaf), Some(other_leaf)) => shared.push(SharedSample {
                label: label.to_string(),
                base_path: base.path_from_root(base_leaf),
                other_path: other.path_from_root(other_leaf),
            }),
            (Some(_), None) => report.sample(
                label,
                Reason::MissingSharedSample,
                "declared shared but absent from other tree; kept as base-only".to_string(),
            ),
            (None, Some(_)) => report.sample(
                label,
                Reason::MissingSharedSample,
                "declared shared but absent from base tree; treated as other-only".to_string(),
            ),
            (None, None) => report.sample(
                label,
                Reason::MissingSharedSample,
                "declared shared but absent from both trees".to_string(),
            ),
        }
    }
    let shared_labels: BTreeSet<&str> = shared.iter().map(|s| s.label.as_str()).collect();

    let mut base_only: Vec<String> = Vec::new();
    for label in base_samples.labels() {
        if shared_labels.contains(label.as_str()) {
            continue;
        }
        if other_samples.contains_label(label) {
            report.sample(
                label,
                Reason::DuplicateSample,
                "present in both trees but not declared shared; base placement kept".to_string(),
            );
        }
        base_only.push(label.clone());
    }
    base_only.sort();

    let mut other_only: Vec<String> = other_samples
        .labels()
        .iter()
        .filter(|label| !base_samples.contains_label(label))
        .cloned()
        .collect();
    other_only.sort();

    let other_exclusive_roots = exclusive_roots(other, base_samples);

    SamplePartition {
        base_only,
        other_only,
        shared,
        other_exclusive_roots,
    }
}

/// Finds the maximal clades of `tree` whose samples are all absent from `blocking`.
///
/// A clade qualifies if it holds at least one sample and none of its
/// samples is known to `blocking`. Returned in pre-order.
fn exclusive_roots(tree: &MutationTree, blocking: &SampleMap) -> Vec<VertexIndex> {
    // Per vertex: (number of exclusive samples, number of blocking samples) in subtree
    let mut counts = vec![(0usize, 0usize); tree.num_vertices()];
    for vertex in tree.post_order_iter() {
        let mut count = match vertex.label() {
            Some(label) if blocking.contains_label(label) => (0, 1),
            Some(_) => (1, 0),
            None => (0, 0),
        };
        for &child in vertex.children() {
            count.0 += counts[child].0;
            count.1 += counts[child].1;
        }
        counts[vertex.index()] = count;
    }

    let is_exclusive = |index: VertexIndex| counts[index].0 > 0 && counts[index].1 == 0;

    tree.pre_order_iter()
        .map(|v| v.index())
        .filter(|&index| {
            is_exclusive(index) && tree[index].parent().is_none_or(|parent| !is_exclusive(parent))
        })
        .collect()
}
