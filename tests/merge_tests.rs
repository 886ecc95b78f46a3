use matmerge::merge::{
    MergeConfig, MergeError, Reason, SharedSamples, Subject, TreeMerger, TreeSide, merge_trees,
};
use matmerge::model::{Mutation, MutationTree, TreeError, parse_mutation_list};
use matmerge::newick::NewickStyle;
use std::collections::BTreeMap;

fn muts(s: &str) -> Vec<Mutation> {
    parse_mutation_list(s).unwrap()
}

/// Sample label -> accumulated mutations
fn sample_mutations(tree: &MutationTree) -> BTreeMap<String, Vec<Mutation>> {
    tree.sample_map()
        .unwrap()
        .iter()
        .map(|(label, leaf)| (label.to_string(), tree.accumulated_mutations(leaf)))
        .collect()
}

fn sorted_samples(tree: &MutationTree) -> Vec<&str> {
    let mut samples = tree.samples();
    samples.sort();
    samples
}

/// base: (A,(B,C)m1)
fn scenario_base() -> MutationTree {
    let mut tree = MutationTree::new();
    let root = tree.add_root(vec![]);
    tree.add_leaf(root, "A", vec![]);
    let bc = tree.add_internal(root, muts("C241T"));
    tree.add_leaf(bc, "B", muts("G1000A"));
    tree.add_leaf(bc, "C", vec![]);
    tree
}

/// other: ((B,C,Dm2)m1)
fn scenario_other() -> MutationTree {
    let mut tree = MutationTree::new();
    let root = tree.add_root(vec![]);
    let bcd = tree.add_internal(root, muts("C241T"));
    tree.add_leaf(bcd, "B", muts("G1000A"));
    tree.add_leaf(bcd, "C", vec![]);
    tree.add_leaf(bcd, "D", muts("A23403G"));
    tree
}

/// A larger tree with nested clades and mutations at several levels
fn kiwi_tree() -> MutationTree {
    let mut tree = MutationTree::new();
    let root = tree.add_root(muts("C3037T"));
    let north = tree.add_internal(root, muts("C241T"));
    tree.add_leaf(north, "Apteryx mantelli", muts("A100G"));
    let spotted = tree.add_internal(north, muts("T200C,G300A"));
    tree.add_leaf(spotted, "Apteryx owenii", vec![]);
    tree.add_leaf(spotted, "Apteryx haastii", muts("C400T"));
    let south = tree.add_internal(root, muts("G500T"));
    tree.add_leaf(south, "Apteryx australis", vec![]);
    tree.add_leaf(south, "Apteryx rowi", muts("A600C"));
    tree
}

// ============= Properties =============

#[test]
fn test_idempotence() {
    let tree = kiwi_tree();
    let outcome = merge_trees(&tree, &tree, SharedSamples::Intersection).unwrap();

    assert!(outcome.report.is_empty(), "{}", outcome.report);
    assert!(outcome.grafts.is_empty());
    assert_eq!(sorted_samples(&outcome.tree), sorted_samples(&tree));
    assert_eq!(sample_mutations(&outcome.tree), sample_mutations(&tree));
    assert_eq!(
        outcome.tree.to_newick(NewickStyle::Annotated),
        tree.to_newick(NewickStyle::Annotated)
    );
}

#[test]
fn test_completeness_and_mutation_preservation() {
    let base = scenario_base();
    let other = scenario_other();
    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();

    assert!(outcome.tree.is_valid());
    assert_eq!(sorted_samples(&outcome.tree), vec!["A", "B", "C", "D"]);

    let merged = sample_mutations(&outcome.tree);
    for (label, mutations) in sample_mutations(&base) {
        assert_eq!(merged[&label], mutations, "base sample {label}");
    }
    for (label, mutations) in sample_mutations(&other) {
        assert_eq!(merged[&label], mutations, "other sample {label}");
    }
}

#[test]
fn test_merge_is_deterministic_across_thread_counts() {
    let base = kiwi_tree();
    let mut other = MutationTree::new();
    let root = other.add_root(muts("C3037T"));
    let north = other.add_internal(root, muts("C241T"));
    other.add_leaf(north, "Apteryx mantelli", muts("A100G"));
    let tokoeka = other.add_internal(north, muts("T200C"));
    other.add_leaf(tokoeka, "Apteryx owenii", muts("G300A"));
    other.add_leaf(tokoeka, "Apteryx australis", muts("G300A"));
    other.add_leaf(tokoeka, "Apteryx rowi", muts("G700A"));
    let extra = other.add_internal(root, muts("G800C"));
    other.add_leaf(extra, "Apteryx maxima", vec![]);
    other.add_leaf(extra, "Proapteryx", muts("T900A"));

    let run = |threads: usize| {
        TreeMerger::builder(&base, &other)
            .with_num_threads(threads)
            .build()
            .unwrap()
            .merge()
            .unwrap()
    };
    let single = run(1);
    let many = run(8);

    assert_eq!(
        single.tree.to_newick(NewickStyle::Annotated),
        many.tree.to_newick(NewickStyle::Annotated)
    );
    assert_eq!(single.report, many.report);
    assert_eq!(single.grafts, many.grafts);
}

#[test]
fn test_merge_can_be_repeated() {
    let (base, other) = (scenario_base(), scenario_other());
    let merger = TreeMerger::builder(&base, &other).build().unwrap();

    let first = merger.merge().unwrap();
    let second = merger.merge().unwrap();
    assert_eq!(first.tree.to_string(), second.tree.to_string());
    assert_eq!(first.report, second.report);
}

// ============= Scenarios =============

#[test]
fn test_exclusive_sample_grafted_under_shared_ancestor() {
    let (base, other) = (scenario_base(), scenario_other());
    let outcome = TreeMerger::builder(&base, &other)
        .with_shared_samples(["B", "C"])
        .build()
        .unwrap()
        .merge()
        .unwrap();

    let tree = &outcome.tree;
    let d = tree.find_sample("D").unwrap();
    let b = tree.find_sample("B").unwrap();
    let bc = tree[b].parent().unwrap();

    // D hangs below the (B,C) ancestor, carrying only m2
    assert_eq!(tree[d].parent(), Some(bc));
    assert_eq!(tree[d].mutations(), muts("A23403G").as_slice());
    assert_eq!(tree.accumulated_mutations(d), muts("C241T,A23403G"));
    assert_eq!(tree.samples_below(bc), vec!["B", "C", "D"]);

    assert_eq!(outcome.report.count(Reason::CorrespondenceConflict), 0);
    assert!(outcome.report.is_empty(), "{}", outcome.report);
    assert_eq!(outcome.grafts.len(), 1);
    assert!(!outcome.grafts[0].is_low_confidence());
    assert_eq!(outcome.grafts[0].prefixed, 0);
}

#[test]
fn test_divergent_shared_sample_keeps_base_placement() {
    // base: (X[A5T],Y), other: (X[A5G],Y,Z)
    let mut base = MutationTree::new();
    let root = base.add_root(vec![]);
    let x = base.add_leaf(root, "X", muts("A5T"));
    base.add_leaf(root, "Y", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(vec![]);
    other.add_leaf(root, "X", muts("A5G"));
    other.add_leaf(root, "Y", vec![]);
    other.add_leaf(root, "Z", muts("C9T"));

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    let tree = &outcome.tree;

    // X exactly once, at its base placement with base mutations
    assert_eq!(sorted_samples(tree), vec!["X", "Y", "Z"]);
    let merged_x = tree.find_sample("X").unwrap();
    assert_eq!(tree[merged_x].parent(), Some(tree.root_index()));
    assert_eq!(tree[merged_x].mutations(), base[x].mutations());

    let failures: Vec<_> = outcome.report.with_reason(Reason::ConsistencyFailure).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subject, Subject::Sample("X".to_string()));
    assert!(failures[0].detail.contains("position 5"), "{}", failures[0].detail);
    assert_eq!(outcome.report.unmerged_samples(), vec!["X"]);

    // Z still finds the agreeing root
    let z = tree.find_sample("Z").unwrap();
    assert_eq!(tree[z].parent(), Some(tree.root_index()));
    assert_eq!(outcome.report.count(Reason::LowConfidenceGraft), 0);
}

#[test]
fn test_graft_rebases_skipped_mutations() {
    // base: ((B,C)m1)
    let mut base = MutationTree::new();
    let root = base.add_root(vec![]);
    let x = base.add_internal(root, muts("C241T"));
    base.add_leaf(x, "B", vec![]);
    base.add_leaf(x, "C", vec![]);

    // other: ((B,(C,(D,E)m2)m5)m1)
    let mut other = MutationTree::new();
    let root = other.add_root(vec![]);
    let x_other = other.add_internal(root, muts("C241T"));
    other.add_leaf(x_other, "B", vec![]);
    let w = other.add_internal(x_other, muts("G500A"));
    other.add_leaf(w, "C", vec![]);
    let s = other.add_internal(w, muts("T200C"));
    other.add_leaf(s, "D", muts("A23403G"));
    other.add_leaf(s, "E", vec![]);

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    let tree = &outcome.tree;

    // (D,E) attached below m1 vertex, with m5 moved onto the clade root
    assert_eq!(outcome.grafts.len(), 1);
    let graft = &outcome.grafts[0];
    assert_eq!(graft.other_root, s);
    assert_eq!(graft.anchor, Some(x_other));
    assert_eq!(graft.attached_to, x);
    assert_eq!(graft.prefixed, 1);
    assert_eq!(tree[graft.output_root].mutations(), muts("G500A,T200C").as_slice());

    let d = tree.find_sample("D").unwrap();
    assert_eq!(tree.accumulated_mutations(d), other.accumulated_mutations(other.find_sample("D").unwrap()));

    // C aligns (m1) with (m5) and loses
    assert_eq!(outcome.report.count(Reason::CorrespondenceConflict), 2);
    assert_eq!(outcome.report.count(Reason::ConsistencyFailure), 1);
    assert_eq!(sorted_samples(tree), vec!["B", "C", "D", "E"]);
}

#[test]
fn test_low_confidence_graft_under_root() {
    // Roots disagree on C1T, so nothing is confirmed above D
    let mut base = MutationTree::new();
    let root = base.add_root(vec![]);
    base.add_leaf(root, "A", vec![]);
    base.add_leaf(root, "B", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(muts("C1T"));
    other.add_leaf(root, "A", vec![]);
    other.add_leaf(root, "B", vec![]);
    let d = other.add_leaf(root, "D", muts("G5A"));

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    let tree = &outcome.tree;

    let merged_d = tree.find_sample("D").unwrap();
    assert_eq!(tree[merged_d].parent(), Some(tree.root_index()));
    assert_eq!(tree[merged_d].mutations(), muts("C1T,G5A").as_slice());

    let low: Vec<_> = outcome.report.with_reason(Reason::LowConfidenceGraft).collect();
    assert_eq!(low.len(), 1);
    assert_eq!(
        low[0].subject,
        Subject::Vertex {
            side: TreeSide::Other,
            index: d
        }
    );
    assert!(outcome.grafts[0].is_low_confidence());
}

#[test]
fn test_low_confidence_graft_shares_root_mutations() {
    // Disjoint trees whose roots both carry C3037T
    let mut base = MutationTree::new();
    let root = base.add_root(muts("C3037T"));
    base.add_leaf(root, "Kea", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(muts("C3037T"));
    let d = other.add_leaf(root, "Kakariki", muts("G5A"));

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    let tree = &outcome.tree;

    let merged_d = tree.find_sample("Kakariki").unwrap();
    assert_eq!(tree.accumulated_mutations(merged_d), other.accumulated_mutations(d));
    assert_eq!(tree.accumulated_mutations(merged_d), muts("C3037T,G5A"));

    let graft = &outcome.grafts[0];
    assert!(graft.is_low_confidence());
    assert!(graft.unresolved.is_empty());
    assert!(tree[graft.output_root].mutations().is_empty());

    let low: Vec<_> = outcome.report.with_reason(Reason::LowConfidenceGraft).collect();
    assert_eq!(low.len(), 1);
    assert!(!low[0].detail.contains("absent"), "{}", low[0].detail);
}

#[test]
fn test_low_confidence_prefix_drops_base_root_mutations() {
    // Roots share C3037T but disagree on C1T, so nothing is confirmed
    let mut base = MutationTree::new();
    let root = base.add_root(muts("C3037T"));
    base.add_leaf(root, "A", vec![]);
    base.add_leaf(root, "B", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(muts("C3037T,C1T"));
    other.add_leaf(root, "A", vec![]);
    other.add_leaf(root, "B", vec![]);
    let d = other.add_leaf(root, "D", muts("G5A"));

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    let tree = &outcome.tree;

    let merged_d = tree.find_sample("D").unwrap();
    assert_eq!(tree[merged_d].parent(), Some(tree.root_index()));
    assert_eq!(tree[merged_d].mutations(), muts("C1T,G5A").as_slice());
    assert_eq!(tree.accumulated_mutations(merged_d), other.accumulated_mutations(d));

    let graft = &outcome.grafts[0];
    assert_eq!(graft.prefixed, 1);
    assert!(graft.unresolved.is_empty());
}

#[test]
fn test_low_confidence_graft_reports_unresolved_root_mutations() {
    // Base root carries C3037T, which the other tree never has
    let mut base = MutationTree::new();
    let root = base.add_root(muts("C3037T"));
    base.add_leaf(root, "Kea", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(vec![]);
    other.add_leaf(root, "Kakariki", muts("G5A"));

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();

    let graft = &outcome.grafts[0];
    assert_eq!(graft.unresolved, muts("C3037T"));

    let low: Vec<_> = outcome.report.with_reason(Reason::LowConfidenceGraft).collect();
    assert_eq!(low.len(), 1);
    assert!(
        low[0].detail.contains("base root mutations C3037T absent"),
        "{}",
        low[0].detail
    );
}

#[test]
fn test_disjoint_trees() {
    let mut base = MutationTree::new();
    let root = base.add_root(vec![]);
    base.add_leaf(root, "Kea", vec![]);

    let mut other = MutationTree::new();
    let root = other.add_root(vec![]);
    other.add_leaf(root, "Kaka", muts("C7T"));
    other.add_leaf(root, "Kakapo", vec![]);

    let outcome = merge_trees(&base, &other, SharedSamples::Intersection).unwrap();
    assert_eq!(sorted_samples(&outcome.tree), vec!["Kaka", "Kakapo", "Kea"]);
    assert_eq!(outcome.report.count(Reason::LowConfidenceGraft), 1);
    assert_eq!(
        outcome.tree.to_newick(NewickStyle::MutationCounts),
        "(Kea:0,(Kaka:1,Kakapo:0):0);"
    );
}

// ============= Report Records =============

#[test]
fn test_missing_shared_sample_is_reported() {
    let (base, other) = (scenario_base(), scenario_other());
    let outcome = TreeMerger::builder(&base, &other)
        .with_shared_samples(["B", "C", "D", "Q"])
        .build()
        .unwrap()
        .merge()
        .unwrap();

    assert_eq!(outcome.report.count(Reason::MissingSharedSample), 2);
    assert_eq!(outcome.report.unmerged_samples(), vec!["D", "Q"]);
    // D is only in the other tree and still gets merged
    assert_eq!(sorted_samples(&outcome.tree), vec!["A", "B", "C", "D"]);
}

#[test]
fn test_undeclared_overlap_is_reported() {
    let (base, other) = (scenario_base(), scenario_other());
    let outcome = TreeMerger::builder(&base, &other)
        .with_shared_samples(["B"])
        .build()
        .unwrap()
        .merge()
        .unwrap();

    let duplicates: Vec<_> = outcome.report.with_reason(Reason::DuplicateSample).collect();
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].subject, Subject::Sample("C".to_string()));

    // C appears once, D is still grafted
    assert_eq!(sorted_samples(&outcome.tree), vec!["A", "B", "C", "D"]);
}

#[test]
fn test_report_display() {
    let (base, other) = (scenario_base(), scenario_other());
    let outcome = TreeMerger::builder(&base, &other)
        .with_shared_samples(["B", "C", "Q"])
        .build()
        .unwrap()
        .merge()
        .unwrap();

    let text = outcome.report.to_string();
    assert!(text.starts_with("Merge report (1 records):"));
    assert!(text.contains("[missing] sample 'Q': declared shared but absent from both trees"));
}

// ============= Errors and Configuration =============

#[test]
fn test_invalid_base_is_fatal() {
    let base = MutationTree::new();
    let other = scenario_other();
    let result = merge_trees(&base, &other, SharedSamples::Intersection);

    match result {
        Err(MergeError::InvalidTree { side, source }) => {
            assert_eq!(side, TreeSide::Base);
            assert_eq!(source, TreeError::NoRoot);
        }
        unexpected => panic!("expected invalid base, got {unexpected:?}"),
    }
}

#[test]
fn test_duplicate_label_in_other_is_fatal() {
    let base = scenario_base();
    let mut other = scenario_other();
    let root = other.root_index();
    other.add_leaf(root, "B", vec![]);

    let result = TreeMerger::builder(&base, &other).build();
    assert!(matches!(
        result,
        Err(MergeError::InvalidTree {
            side: TreeSide::Other,
            source: TreeError::DuplicateLabel { .. }
        })
    ));
}

#[test]
fn test_error_message() {
    let err = merge_trees(&MutationTree::new(), &MutationTree::new(), SharedSamples::Intersection).unwrap_err();
    assert_eq!(err.to_string(), "base tree is invalid: tree has no root");
}

#[test]
fn test_config_roundtrip() {
    let (base, other) = (scenario_base(), scenario_other());
    let config = MergeConfig {
        shared: SharedSamples::Declared(vec!["B".to_string(), "C".to_string()]),
        num_threads: Some(2),
    };
    let merger = TreeMerger::builder(&base, &other)
        .with_intersection()
        .with_config(config.clone())
        .build()
        .unwrap();
    assert_eq!(merger.config(), &config);

    let merger = TreeMerger::builder(&base, &other)
        .with_shared_samples(["B"])
        .with_intersection()
        .build()
        .unwrap();
    assert_eq!(merger.config().shared, SharedSamples::Intersection);
}

// ============= Reference Cross-Validation =============

/// Expected merge of the scenario trees, optionally with a different mutation on D
fn scenario_reference(d_mutations: &str) -> MutationTree {
    let mut tree = MutationTree::new();
    let root = tree.add_root(vec![]);
    let bcd = tree.add_internal(root, muts("C241T"));
    tree.add_leaf(bcd, "D", muts(d_mutations));
    tree.add_leaf(bcd, "C", vec![]);
    tree.add_leaf(bcd, "B", muts("G1000A"));
    tree.add_leaf(root, "A", vec![]);
    tree
}

#[test]
fn test_reference_agrees() {
    let (base, other) = (scenario_base(), scenario_other());
    let reference = scenario_reference("A23403G");
    let outcome = TreeMerger::builder(&base, &other)
        .with_reference(&reference)
        .build()
        .unwrap()
        .merge()
        .unwrap();

    assert_eq!(outcome.report.count(Reason::ReferenceMismatch), 0);
}

#[test]
fn test_reference_mismatch_is_reported() {
    let (base, other) = (scenario_base(), scenario_other());
    let reference = scenario_reference("A23403T");
    let outcome = TreeMerger::builder(&base, &other)
        .with_reference(&reference)
        .build()
        .unwrap()
        .merge()
        .unwrap();

    let mismatches: Vec<_> = outcome.report.with_reason(Reason::ReferenceMismatch).collect();
    assert_eq!(mismatches.len(), 1);
    let d = outcome.tree.find_sample("D").unwrap();
    assert_eq!(
        mismatches[0].subject,
        Subject::Vertex {
            side: TreeSide::Output,
            index: d
        }
    );
    assert!(mismatches[0].detail.contains("position 23403"));
}

#[test]
fn test_invalid_reference_is_fatal() {
    let (base, other) = (scenario_base(), scenario_other());
    let mut reference = scenario_reference("A23403G");
    reference.add_detached(None, vec![]);

    let result = TreeMerger::builder(&base, &other).with_reference(&reference).build();
    assert!(matches!(
        result,
        Err(MergeError::InvalidTree {
            side: TreeSide::Reference,
            source: TreeError::Disconnected(_)
        })
    ));
}
