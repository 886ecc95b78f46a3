use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use matmerge::merge::{SharedSamples, TreeMerger};
use matmerge::model::{Mutation, MutationTree, Nucleotide, VertexIndex};
use std::hint::black_box;

const SIZES: &[usize] = &[1_000, 10_000, 50_000];

/// Balanced-ish tree over samples `first..first + n`; every vertex carries one
/// mutation derived from its depth and position, so equal clades agree.
fn build_tree(n: usize, first: usize) -> MutationTree {
    let mut tree = MutationTree::with_capacity(2 * n);
    let root = tree.add_root(vec![]);
    // (parent, first sample, number of samples, depth)
    let mut stack: Vec<(VertexIndex, usize, usize, u32)> = vec![(root, first, n, 1)];
    while let Some((parent, start, count, depth)) = stack.pop() {
        let mutation = vec![Mutation::new(depth * 1_000 + (start % 997) as u32, Nucleotide::C, Nucleotide::T)];
        if count == 1 {
            tree.add_leaf(parent, format!("sample/{start}"), mutation);
            continue;
        }
        let clade = tree.add_internal(parent, mutation);
        let half = count / 2;
        stack.push((clade, start + half, count - half, depth + 1));
        stack.push((clade, start, half, depth + 1));
    }
    tree
}

fn merge_overlapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for &n in SIZES {
        // Other tree shares its first half with the base
        let base = build_tree(n, 0);
        let other = build_tree(n, n / 2);

        group.bench_with_input(BenchmarkId::new("overlapping", n), &n, |b, _| {
            b.iter(|| {
                let merger = TreeMerger::builder(black_box(&base), black_box(&other))
                    .build()
                    .unwrap();
                merger.merge().unwrap()
            });
        });
    }
    group.finish();
}

fn merge_self(c: &mut Criterion) {
    let tree = build_tree(10_000, 0);
    for threads in [1, 4] {
        c.bench_function(&format!("self-merge-{threads}-threads"), |b| {
            let merger = TreeMerger::builder(&tree, &tree)
                .with_num_threads(threads)
                .build()
                .unwrap();
            b.iter(|| merger.merge().unwrap());
        });
    }
}

fn merge_disjoint(c: &mut Criterion) {
    let base = build_tree(10_000, 0);
    let other = build_tree(10_000, 10_000);
    c.bench_function("disjoint-10k", |b| {
        b.iter(|| {
            matmerge::merge_trees(&base, &other, SharedSamples::Intersection).unwrap()
        });
    });
}

criterion_group!(regression, merge_self, merge_disjoint);
criterion_group! {
    name = scaling;
    config = Criterion::default().sample_size(10);
    targets = merge_overlapping
}
criterion_main!(regression, scaling);
