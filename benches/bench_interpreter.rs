use std::sync::Arc;

use beagle::gp::{
    init::init_individual,
    primitives::{Add, Divide, EphemeralDouble, Multiply, Subtract, Variable},
    ArgumentStrategy, Context, InitConfig, InitMethod, PrimitiveSet, PrimitiveSuperSet, Value,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn primitives(strategy: ArgumentStrategy) -> PrimitiveSuperSet {
    let set = PrimitiveSet::new()
        .with_argument_strategy(strategy)
        .with(Arc::new(Add))
        .and_then(|set| set.with(Arc::new(Subtract)))
        .and_then(|set| set.with(Arc::new(Multiply)))
        .and_then(|set| set.with(Arc::new(Divide)))
        .and_then(|set| set.with(Arc::new(Variable::new("X"))))
        .and_then(|set| set.with(Arc::new(EphemeralDouble::new("E", -1.0, 1.0))))
        .unwrap();
    PrimitiveSuperSet::new().with_set(set)
}

fn bench_interpretation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpretation");
    for depth in [3usize, 5, 7, 9].iter() {
        let mut context = Context::with_seed(primitives(ArgumentStrategy::JustInTime), 17);
        let config = InitConfig::default().with_depth(*depth, *depth);
        let individual = init_individual(InitMethod::Full, &config, &mut context).unwrap();

        group.bench_function(&format!("full_tree_depth_{}", depth), |b| {
            b.iter(|| {
                let mut interpreter = individual.interpreter(&context);
                interpreter.set_variable("X", Value::Float(black_box(0.5)));
                let result = interpreter.run();
                assert!(result.is_ok());
            })
        });
    }
    group.finish();
}

fn bench_generation(c: &mut Criterion) {
    let mut context = Context::with_seed(primitives(ArgumentStrategy::JustInTime), 3);
    let config = InitConfig::default().with_depth(2, 6);

    c.bench_function("init_half_and_half", |b| {
        b.iter(|| {
            let individual =
                init_individual(black_box(InitMethod::Half), &config, &mut context).unwrap();
            black_box(individual.size())
        })
    });
}

criterion_group!(benches, bench_interpretation, bench_generation);
criterion_main!(benches);
