use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ig_core::{DiscoveryConfig, Idea, discover, score};

fn idea(i: usize) -> Idea {
    Idea::new("bench", &format!("idea number {i} about graph unification"))
        .with_content(&format!(
            "notes {i}: merge structures monotonically, keep complement arcs, stamp generations"
        ))
        .with_tags(&["graphs", if i % 2 == 0 { "logic" } else { "storage" }])
        .with_energy((i % 5) as u8 + 1)
}

fn bench_score_pair(c: &mut Criterion) {
    let a = idea(1);
    let b = idea(2);
    c.bench_function("score_pair", |bench| {
        bench.iter(|| score(black_box(&a), black_box(&b)));
    });
}

fn bench_discover_pool_200(c: &mut Criterion) {
    let target = idea(0);
    let pool: Vec<Idea> = (1..=200).map(idea).collect();
    let cfg = DiscoveryConfig::default();
    c.bench_function("discover_pool_200", |bench| {
        bench.iter(|| discover(black_box(&target), black_box(&pool), &cfg));
    });
}

fn bench_score_long_content(c: &mut Criterion) {
    let body: String = (0..2000)
        .map(|i| char::from(b'a' + ((i * 7 + i / 13) % 26) as u8))
        .collect();
    let a = idea(1).with_content(&body);
    let b = idea(2).with_content(&format!("{body} and a little more"));
    c.bench_function("score_long_content_2k", |bench| {
        bench.iter(|| score(black_box(&a), black_box(&b)));
    });
}

criterion_group!(
    benches,
    bench_score_pair,
    bench_discover_pool_200,
    bench_score_long_content
);
criterion_main!(benches);
