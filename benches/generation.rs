//! Benchmarks for state-space generation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulespace::prelude::*;
use std::collections::BTreeSet;

/// A birth-death process of two species, bounded at `bound` copies each.
fn birth_death() -> Model {
    let rules: Vec<Rule> = [
        "X()::rep => 2 X()::rep @ 1",
        "X()::rep => @ k*[X()::rep]",
        "=> Y()::rep @ 2",
        "X()::rep + Y()::rep => X()::rep @ k",
    ]
    .iter()
    .map(|r| r.parse().unwrap())
    .collect();
    let x: Complex = "X()::rep".parse().unwrap();
    let init: Multiset = [(x, 1)].into_iter().collect();
    let definitions = Definitions::from([("k".to_string(), 0.3)]);
    Model::new(rules, init, definitions, BTreeSet::new(), None).unwrap()
}

fn bench_generation(c: &mut Criterion) {
    let model = birth_death();
    let mut group = c.benchmark_group("generate_birth_death_bound_20");
    for threads in [1, 4] {
        let config = GenerationConfig::default().with_bound(20).with_threads(threads);
        group.bench_function(format!("threads_{threads}"), |b| {
            b.iter(|| {
                let generation = black_box(&model).generate_transition_system(&config).unwrap();
                assert_eq!(generation.outcome, Outcome::Complete);
            });
        });
    }
    group.finish();
}

fn bench_reaction_mode(c: &mut Criterion) {
    let model = birth_death();
    let config = GenerationConfig::default()
        .with_bound(20)
        .with_mode(GenerationMode::Reactions);

    c.bench_function("generate_birth_death_reactions", |b| {
        b.iter(|| {
            let generation = black_box(&model).generate_transition_system(&config).unwrap();
            assert!(generation.ts.is_complete());
        });
    });
}

criterion_group!(benches, bench_generation, bench_reaction_mode);
criterion_main!(benches);
