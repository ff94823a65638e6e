//! Benchmarks for one chain step on square grids.
//!
//! Run with `cargo bench --bench transition`.

use std::sync::Arc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use FlipChain::gen_weights::gen_random_weights;
use FlipChain::proposals::propose_random_flip;
use FlipChain::{Assignment, Graph, Partition, UpdaterRegistry};

// side x side grid, left half in part 0 and right half in part 1.
fn make_grid(side: usize) -> Partition {
    let mut edges = Vec::with_capacity(2 * side * side);
    for row in 0..side {
        for col in 0..side {
            let v = row * side + col;
            if col + 1 < side {
                edges.push((v, v + 1));
            }
            if row + 1 < side {
                edges.push((v, v + side));
            }
        }
    }

    let num_nodes = side * side;
    let mut rng = SmallRng::seed_from_u64(side as u64);
    let mut graph = Graph::from_edges(num_nodes, &edges).unwrap();
    graph
        .add_attribute("population", gen_random_weights(num_nodes, 100, 1000, &mut rng).unwrap())
        .unwrap();

    let updaters = UpdaterRegistry::new()
        .with_cut_edges()
        .unwrap()
        .with_cut_edges_by_part()
        .unwrap()
        .with_tally("population", None)
        .unwrap();
    let parts = (0..num_nodes).map(|v| usize::from(v % side >= side / 2)).collect();
    let assignment = Assignment::new(parts);
    Partition::new(Arc::new(graph), assignment, Arc::new(updaters)).unwrap()
}

fn bench_transition(c: &mut Criterion) {
    let mut group = c.benchmark_group("transition");
    for side in [16_usize, 64, 256] {
        let partition = make_grid(side);
        let mut rng = SmallRng::seed_from_u64(7);

        group.bench_with_input(BenchmarkId::new("single_flip", side), &partition, |b, partition| {
            b.iter(|| {
                let flip = propose_random_flip(partition, &mut rng).unwrap();
                black_box(partition.transition(black_box(&flip)).unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("from_scratch", side), &partition, |b, partition| {
            b.iter(|| {
                black_box(
                    Partition::new(
                        partition.graph_handle(),
                        partition.assignment().clone(),
                        partition.updaters().clone(),
                    )
                    .unwrap(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transition);
criterion_main!(benches);
