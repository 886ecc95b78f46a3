//! Tree grafting: copy the base tree, then attach the other tree's exclusive clades.
//!
//! Each exclusive clade of the other tree is attached below the output copy
//! of the base counterpart of its nearest confirmed ancestor. Mutations of
//! the other-tree vertices skipped on the way up are prefixed to the clade
//! root's mutations, so every grafted sample keeps the mutations it
//! accumulated in the other tree.
//!
//! Clades without a confirmed ancestor hang below the output root. The base
//! root's mutations are taken off their path once; any the other tree lacks
//! are kept in [`Graft::unresolved`] and named in the report.

use crate::merge::consistency::PairCheck;
use crate::merge::partition::SamplePartition;
use crate::merge::report::{MergeReport, Reason, TreeSide};
use crate::model::{Mutation, MutationTree, VertexIndex};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Record of one grafted clade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graft {
    /// Root of the clade in the other tree
    pub other_root: VertexIndex,
    /// Nearest confirmed ancestor in the other tree, `None` for a low-confidence graft
    pub anchor: Option<VertexIndex>,
    /// Vertex of the output tree the clade was attached to
    pub attached_to: VertexIndex,
    /// Root of the copied clade in the output tree
    pub output_root: VertexIndex,
    /// Number of mutations prefixed to the clade root
    pub prefixed: usize,
    /// Base root mutations missing from the clade's path in the other tree;
    /// only for low-confidence grafts. Grafted samples carry these in excess.
    pub unresolved: Vec<Mutation>,
}

impl Graft {
    pub fn is_low_confidence(&self) -> bool {
        self.anchor.is_none()
    }
}

// =#========================================================================#=
// GRAFTING ENGINE
// =#========================================================================#=
/// Builds the merged tree. Single-threaded; output indices are allocated in
/// a fixed order, so equal inputs give equal outputs.
pub struct GraftingEngine<'a> {
    base: &'a MutationTree,
    other: &'a MutationTree,
    /// Other-tree vertex -> base-tree vertex, for checker-confirmed pairs only
    confirmed: BTreeMap<VertexIndex, VertexIndex>,
}

impl<'a> GraftingEngine<'a> {
    /// Creates an engine from the checked correspondence pairs (base -> other).
    ///
    /// Only consistent pairs are used as attachment points. If several base
    /// vertices are confirmed for one other vertex (e.g. a chain of
    /// mutation-free single-child vertices), the deepest one is used.
    pub fn new(base: &'a MutationTree, other: &'a MutationTree, checks: &[PairCheck]) -> Self {
        let mut confirmed: BTreeMap<VertexIndex, VertexIndex> = BTreeMap::new();
        for check in checks.iter().filter(|c| c.outcome.is_consistent()) {
            confirmed
                .entry(check.target)
                .and_modify(|current| {
                    let candidate = (base.depth(check.source), usize::MAX - check.source);
                    let existing = (base.depth(*current), usize::MAX - *current);
                    if candidate > existing {
                        *current = check.source;
                    }
                })
                .or_insert(check.source);
        }

        GraftingEngine {
            base,
            other,
            confirmed,
        }
    }

    /// Returns the confirmed base counterpart of an other-tree vertex.
    pub fn confirmed_counterpart(&self, other_vertex: VertexIndex) -> Option<VertexIndex> {
        self.confirmed.get(&other_vertex).copied()
    }

    /// Copies the base tree and grafts all exclusive clades of `partition`.
    ///
    /// Clades without any confirmed ancestor are attached under the output
    /// root and recorded as [Reason::LowConfidenceGraft].
    pub fn graft(&self, partition: &SamplePartition, report: &mut MergeReport) -> (MutationTree, Vec<Graft>) {
        let capacity = self.base.num_vertices()
            + partition
                .other_exclusive_roots()
                .iter()
                .map(|&root| self.other.subtree_pre_order(root).count())
                .sum::<usize>();
        let mut output = MutationTree::with_capacity(capacity);
        if let Some(name) = self.base.name() {
            output.set_name(name.clone());
        }

        let mut base_to_output = vec![usize::MAX; self.base.num_vertices()];
        let root_mutations = self.base.root().mutations().to_vec();
        for (base_index, output_index) in
            copy_subtree(self.base, self.base.root_index(), &mut output, None, root_mutations)
        {
            base_to_output[base_index] = output_index;
        }

        let mut grafts = Vec::with_capacity(partition.other_exclusive_roots().len());
        for &clade_root in partition.other_exclusive_roots() {
            let graft = self.graft_clade(clade_root, &base_to_output, &mut output);

            if graft.is_low_confidence() {
                let samples = self.other.samples_below(clade_root);
                warn!(
                    clade_root,
                    samples = samples.len(),
                    unresolved = graft.unresolved.len(),
                    "no confirmed ancestor, grafting under output root"
                );
                let mut detail = format!(
                    "clade of {} sample(s) starting with '{}' attached under output root with {} prefixed mutation(s)",
                    samples.len(),
                    samples.first().copied().unwrap_or_default(),
                    graft.prefixed
                );
                if !graft.unresolved.is_empty() {
                    let unresolved: Vec<String> = graft.unresolved.iter().map(|m| m.to_string()).collect();
                    detail.push_str(&format!(
                        "; base root mutations {} absent from its other-tree path",
                        unresolved.join(",")
                    ));
                }
                report.vertex(TreeSide::Other, clade_root, Reason::LowConfidenceGraft, detail);
            } else {
                debug!(
                    clade_root,
                    attached_to = graft.attached_to,
                    prefixed = graft.prefixed,
                    "grafted clade"
                );
            }
            grafts.push(graft);
        }

        (output, grafts)
    }

    fn graft_clade(
        &self,
        clade_root: VertexIndex,
        base_to_output: &[VertexIndex],
        output: &mut MutationTree,
    ) -> Graft {
        // Walk up to the nearest confirmed ancestor, remembering skipped vertices
        let mut skipped = Vec::new();
        let mut anchor = None;
        let mut current = self.other[clade_root].parent();
        while let Some(vertex) = current {
            if let Some(base_vertex) = self.confirmed_counterpart(vertex) {
                anchor = Some((vertex, base_vertex));
                break;
            }
            skipped.push(vertex);
            current = self.other[vertex].parent();
        }

        // Root-side mutations first
        let mut mutations: Vec<Mutation> = skipped
            .iter()
            .rev()
            .flat_map(|&v| self.other[v].mutations().iter().copied())
            .collect();
        let mut prefixed = mutations.len();
        mutations.extend_from_slice(self.other[clade_root].mutations());

        let mut unresolved = Vec::new();
        let attached_to = match anchor {
            Some((_, base_vertex)) => base_to_output[base_vertex],
            None => {
                // The output root already carries the base root's mutations
                for root_mutation in self.base.root().mutations() {
                    match mutations.iter().position(|m| m == root_mutation) {
                        Some(i) => {
                            mutations.remove(i);
                            if i < prefixed {
                                prefixed -= 1;
                            }
                        }
                        None => unresolved.push(*root_mutation),
                    }
                }
                output.root_index()
            }
        };
        let copied = copy_subtree(self.other, clade_root, output, Some(attached_to), mutations);

        Graft {
            other_root: clade_root,
            anchor: anchor.map(|(vertex, _)| vertex),
            attached_to,
            output_root: copied[0].1,
            prefixed,
            unresolved,
        }
    }
}

/// Deep-copies the subtree of `source` rooted at `source_root` into `target`.
///
/// The copy of `source_root` becomes the root of `target` if `target_parent`
/// is `None`, and a new child of `target_parent` otherwise; it receives
/// `root_mutations` instead of its own. Uses an explicit stack, so deep trees
/// are fine. Children keep their order.
///
/// # Returns
/// `(source index, target index)` pairs in pre-order; the first is the root.
pub fn copy_subtree(
    source: &MutationTree,
    source_root: VertexIndex,
    target: &mut MutationTree,
    target_parent: Option<VertexIndex>,
    root_mutations: Vec<Mutation>,
) -> Vec<(VertexIndex, VertexIndex)> {
    let mut copied = Vec::new();
    let mut root_mutations = Some(root_mutations);
    let mut stack = vec![(source_root, target_parent)];

    while let Some((index, parent)) = stack.pop() {
        let vertex = &source[index];
        let mutations = root_mutations
            .take()
            .unwrap_or_else(|| vertex.mutations().to_vec());
        let label = vertex.label().map(str::to_string);

        let new_index = match parent {
            Some(parent) => target.add_child(parent, label, mutations),
            None => {
                let root = target.add_detached(label, mutations);
                target.set_root(root);
                root
            }
        };
        copied.push((index, new_index));

        for &child in vertex.children().iter().rev() {
            stack.push((child, Some(new_index)));
        }
    }

    copied
}
