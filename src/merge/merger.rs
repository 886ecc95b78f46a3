//! Merge driver: runs partition, correspondence, checks and grafting in order.

use crate::merge::consistency::{CheckOutcome, ConsistencyChecker, PairCheck, consistent};
use crate::merge::correspondence::{Correspondence, CorrespondenceTable};
use crate::merge::graft::{Graft, GraftingEngine};
use crate::merge::merge_error::MergeError;
use crate::merge::partition::{SamplePartition, SharedSamples, partition};
use crate::merge::report::{MergeReport, Reason, TreeSide};
use crate::model::{MutationTree, SampleMap};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, info_span, warn};

/// Settings of a merge, as collected by [TreeMergerBuilder].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeConfig {
    /// Which samples anchor the two trees to each other
    pub shared: SharedSamples,
    /// Size of the worker pool; `None` lets rayon decide
    pub num_threads: Option<usize>,
}

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged tree, owned by the caller
    pub tree: MutationTree,
    /// Everything that was dropped, flagged or degraded
    pub report: MergeReport,
    /// Grafted clades, in grafting order
    pub grafts: Vec<Graft>,
}

// =#========================================================================#=
// BUILDER
// =#========================================================================#=
/// Builder for a [TreeMerger].
///
/// Defaults: shared samples are the intersection of both trees' samples, no
/// reference tree, worker count chosen by rayon.
///
/// # Example
/// ```
/// use matmerge::merge::TreeMerger;
/// use matmerge::model::{Mutation, MutationTree};
///
/// let m1: Mutation = "C241T".parse().unwrap();
///
/// let mut base = MutationTree::new();
/// let root = base.add_root(vec![]);
/// base.add_leaf(root, "A", vec![m1]);
///
/// let mut other = MutationTree::new();
/// let root = other.add_root(vec![]);
/// other.add_leaf(root, "A", vec![m1]);
/// other.add_leaf(root, "B", vec![]);
///
/// let outcome = TreeMerger::builder(&base, &other)
///     .with_shared_samples(["A"])
///     .with_num_threads(2)
///     .build()?
///     .merge()?;
///
/// assert_eq!(outcome.tree.num_samples(), 2);
/// assert!(outcome.report.is_empty());
/// # Ok::<(), matmerge::merge::MergeError>(())
/// ```
pub struct TreeMergerBuilder<'a> {
    base: &'a MutationTree,
    other: &'a MutationTree,
    reference: Option<&'a MutationTree>,
    config: MergeConfig,
}

impl<'a> TreeMergerBuilder<'a> {
    /// Uses exactly the given samples as shared samples.
    ///
    /// Samples missing from a tree, samples listed twice, and samples present
    /// in both trees but not listed end up in the report.
    pub fn with_shared_samples<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.shared = SharedSamples::Declared(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Uses all samples present in both trees as shared samples (default).
    pub fn with_intersection(mut self) -> Self {
        self.config.shared = SharedSamples::Intersection;
        self
    }

    /// Cross-validates the merged tree against `reference`.
    ///
    /// Pairs of the merged tree and the reference that fail the consistency
    /// check become [Reason::ReferenceMismatch] records.
    pub fn with_reference(mut self, reference: &'a MutationTree) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the number of worker threads for building and checking.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = Some(num_threads);
        self
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the input trees and starts the worker pool.
    ///
    /// # Errors
    /// - [MergeError::InvalidTree] if the base, other or reference tree
    ///   is structurally invalid (including duplicate sample labels)
    /// - [MergeError::ThreadPool] if the worker pool cannot be started
    pub fn build(self) -> Result<TreeMerger<'a>, MergeError> {
        let base_samples = checked_samples(self.base, TreeSide::Base)?;
        let other_samples = checked_samples(self.other, TreeSide::Other)?;
        if let Some(reference) = self.reference {
            checked_samples(reference, TreeSide::Reference)?;
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads.unwrap_or(0))
            .thread_name(|i| format!("matmerge-{i}"))
            .build()?;

        Ok(TreeMerger {
            base: self.base,
            other: self.other,
            reference: self.reference,
            base_samples,
            other_samples,
            config: self.config,
            pool,
        })
    }
}

fn checked_samples(tree: &MutationTree, side: TreeSide) -> Result<SampleMap, MergeError> {
    tree.validate().map_err(MergeError::invalid(side))?;
    tree.sample_map().map_err(MergeError::invalid(side))
}

// =#========================================================================#=
// MERGER
// =#========================================================================#=
/// Merges an other tree into a copy of a base tree.
///
/// Created via [`TreeMerger::builder()`]; the inputs are validated once at
/// [build](TreeMergerBuilder::build) time, [merge](TreeMerger::merge) can be
/// called repeatedly and returns equal outcomes.
pub struct TreeMerger<'a> {
    base: &'a MutationTree,
    other: &'a MutationTree,
    reference: Option<&'a MutationTree>,
    base_samples: SampleMap,
    other_samples: SampleMap,
    config: MergeConfig,
    pool: ThreadPool,
}

impl<'a> TreeMerger<'a> {
    /// Starts configuring a merge of `other` into `base`.
    pub fn builder(base: &'a MutationTree, other: &'a MutationTree) -> TreeMergerBuilder<'a> {
        TreeMergerBuilder {
            base,
            other,
            reference: None,
            config: MergeConfig::default(),
        }
    }

    /// Returns the configuration of this merger.
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Computes the sample partition of the two input trees.
    pub fn partition(&self, report: &mut MergeReport) -> SamplePartition {
        partition(
            self.base,
            &self.base_samples,
            self.other,
            &self.other_samples,
            &self.config.shared,
            report,
        )
    }

    /// Runs the merge.
    ///
    /// Phases:
    /// 1. Partition the samples
    /// 2. Build the correspondence table in parallel and freeze it
    /// 3. Check every corresponding pair in parallel
    /// 4. Copy the base tree and graft the exclusive clades of the other tree
    /// 5. Validate the output and, if configured, cross-validate it against
    ///    the reference tree
    ///
    /// # Errors
    /// [MergeError::InvalidOutput] if the merged tree fails validation, which
    /// indicates a bug rather than bad input.
    pub fn merge(&self) -> Result<MergeOutcome, MergeError> {
        let span = info_span!(
            "merge",
            base_samples = self.base_samples.num_samples(),
            other_samples = self.other_samples.num_samples()
        );
        let _guard = span.enter();
        let mut report = MergeReport::new();

        let partition = self.partition(&mut report);
        info!(
            shared = partition.shared().len(),
            base_only = partition.base_only().len(),
            other_only = partition.other_only().len(),
            clades = partition.other_exclusive_roots().len(),
            "partitioned samples"
        );

        let correspondence = CorrespondenceTable::build(&partition, &self.pool).freeze();
        info!(
            entries = correspondence.len(),
            conflicts = correspondence.conflicts().len(),
            "built correspondence"
        );
        report_conflicts(&correspondence, &partition, &mut report);

        let checker = ConsistencyChecker::new(self.base, self.other, &partition, (TreeSide::Base, TreeSide::Other));
        let checks = checker.check_all(&correspondence, &self.pool);
        let failed = report_failures(self.base, &checks, &mut report);
        info!(checked = checks.len(), failed, "checked correspondence");

        let engine = GraftingEngine::new(self.base, self.other, &checks);
        let (tree, grafts) = engine.graft(&partition, &mut report);
        tree.validate().map_err(MergeError::InvalidOutput)?;
        info!(
            grafts = grafts.len(),
            vertices = tree.num_vertices(),
            samples = tree.num_samples(),
            "grafted exclusive clades"
        );

        if let Some(reference) = self.reference {
            self.cross_validate(&tree, reference, &mut report)?;
        }

        Ok(MergeOutcome { tree, report, grafts })
    }

    fn cross_validate(
        &self,
        tree: &MutationTree,
        reference: &MutationTree,
        report: &mut MergeReport,
    ) -> Result<(), MergeError> {
        let result = consistent(tree, reference, (TreeSide::Output, TreeSide::Reference), &self.pool)?;
        for conflict in &result.conflicts {
            report.vertex(
                TreeSide::Output,
                conflict.source,
                Reason::ReferenceMismatch,
                format!(
                    "matches reference vertices {} and {}",
                    conflict.kept, conflict.rejected
                ),
            );
        }
        for failure in &result.failures {
            if let CheckOutcome::Divergent(divergence) = &failure.outcome {
                report.vertex(
                    TreeSide::Output,
                    failure.source,
                    Reason::ReferenceMismatch,
                    format!("reference vertex {}: {divergence}", failure.target),
                );
            }
        }
        if result.is_consistent() {
            info!(pairs = result.pairs_checked, "output agrees with reference");
        } else {
            warn!(
                failures = result.failures.len(),
                conflicts = result.conflicts.len(),
                "output disagrees with reference"
            );
        }
        Ok(())
    }
}

fn report_conflicts(correspondence: &Correspondence, partition: &SamplePartition, report: &mut MergeReport) {
    let label = |order: usize| partition.shared()[order].label.as_str();
    for conflict in correspondence.conflicts() {
        warn!(
            source = conflict.source,
            kept = conflict.kept,
            rejected = conflict.rejected,
            "conflicting correspondence"
        );
        report.vertex(
            TreeSide::Base,
            conflict.source,
            Reason::CorrespondenceConflict,
            format!(
                "sample '{}' maps it to other vertex {}, sample '{}' to other vertex {} (kept)",
                label(conflict.rejected_order),
                conflict.rejected,
                label(conflict.kept_order),
                conflict.kept
            ),
        );
    }
}

/// Records failed checks; returns their number.
fn report_failures(base: &MutationTree, checks: &[PairCheck], report: &mut MergeReport) -> usize {
    let mut failed = 0;
    for check in checks {
        let CheckOutcome::Divergent(divergence) = &check.outcome else {
            continue;
        };
        failed += 1;
        warn!(source = check.source, target = check.target, %divergence, "inconsistent pair");
        match base[check.source].label() {
            Some(label) => report.sample(
                label,
                Reason::ConsistencyFailure,
                format!("{divergence}; base placement kept"),
            ),
            None => report.vertex(
                TreeSide::Base,
                check.source,
                Reason::ConsistencyFailure,
                format!("paired with other vertex {}: {divergence}", check.target),
            ),
        }
    }
    debug!(failed, "recorded failed checks");
    failed
}

/// Merges `other` into `base` with default settings.
///
/// # Example
/// ```
/// use matmerge::merge::{SharedSamples, merge_trees};
/// use matmerge::model::MutationTree;
///
/// let mut base = MutationTree::new();
/// let root = base.add_root(vec![]);
/// base.add_leaf(root, "A", vec![]);
///
/// let mut other = MutationTree::new();
/// let root = other.add_root(vec![]);
/// other.add_leaf(root, "B", vec![]);
///
/// let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
/// assert_eq!(outcome.tree.samples(), vec!["A", "B"]);
/// ```
pub fn merge_trees(
    base: &MutationTree,
    other: &MutationTree,
    shared: SharedSamples,
) -> Result<MergeOutcome, MergeError> {
    TreeMerger::builder(base, other)
        .with_config(MergeConfig {
            shared,
            num_threads: None,
        })
        .build()?
        .merge()
}
