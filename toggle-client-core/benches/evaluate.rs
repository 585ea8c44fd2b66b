use criterion::{Criterion, black_box, criterion_group, criterion_main};
use toggle_client_core::feature::Feature;
use toggle_client_core::model::{Context, FeatureDefinition, StrategyRef};
use toggle_client_core::strategy::{StrategyRegistry, normalize};

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize", |b| {
        b.iter(|| normalize(black_box("user-42"), black_box("group")))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let registry = StrategyRegistry::with_defaults();
    let definition = FeatureDefinition {
        name: "bench".to_string(),
        enabled: true,
        strategies: vec![StrategyRef {
            name: "gradualRolloutUserId".to_string(),
            parameters: [
                ("groupId".to_string(), "bench".to_string()),
                ("percentage".to_string(), "50".to_string()),
            ]
            .into_iter()
            .collect(),
        }],
    };
    let feature = Feature::new(&registry, definition);
    let context = Context::new().with_user_id("user-42");
    c.bench_function("evaluate_gradual_rollout", |b| {
        b.iter(|| feature.evaluate(black_box(&context)))
    });
}

criterion_group!(benches, bench_normalize, bench_evaluate);
criterion_main!(benches);
