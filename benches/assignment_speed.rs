use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mbff_tray::scipy::cluster::kmeans;
use mbff_tray::scipy::optimize::linear_sum_assignment;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

// Square cost matrices the size of a tray slot problem and beyond.
fn bench_linear_sum_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("Slot Assignment");
    let mut rng = StdRng::seed_from_u64(1);
    for size in [2, 4, 8, 16, 64] {
        let cost = Array2::from_shape_fn((size, size), |_| rng.gen_range(0.0..100.0_f64));
        group.bench_with_input(BenchmarkId::new("linear_sum_assignment", size), &cost, |b, cost| {
            b.iter(|| black_box(linear_sum_assignment(cost)));
        });
    }
    group.finish();
}

// Capacity-4 clustering of uniformly scattered flops.
fn bench_capacitated_kmeans(c: &mut Criterion) {
    let mut group = c.benchmark_group("Capacitated KMeans");
    let mut rng = StdRng::seed_from_u64(2);
    for n in [64, 512, 4096] {
        let samples = (0..n)
            .map(|_| (rng.gen_range(0.0..1000.0_f64), rng.gen_range(0.0..1000.0_f64)))
            .collect::<Vec<_>>();
        let init = samples.iter().step_by(4).copied().collect::<Vec<_>>();
        group.bench_with_input(BenchmarkId::new("kmeans", n), &samples, |b, samples| {
            b.iter(|| {
                black_box(
                    kmeans()
                        .samples(samples)
                        .init(init.clone())
                        .cap(4)
                        .max_iter(10)
                        .call(),
                )
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_linear_sum_assignment, bench_capacitated_kmeans);
criterion_main!(benches);
