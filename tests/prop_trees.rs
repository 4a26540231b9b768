//! Property-based tests for tree generation and the structural operators.

use std::sync::Arc;

use proptest::prelude::*;

use beagle::gp::{
    crossover::mate_constrained,
    init::init_individual,
    mutation::{mutate_shrink, mutate_standard, mutate_swap},
    persistence::{read_individual, write_individual},
    primitives::{Add, Divide, EphemeralDouble, Multiply, Subtract, Variable},
    Context, InitConfig, InitMethod, PrimitiveSet, PrimitiveSuperSet, Tree, ValueType,
};

fn primitives() -> PrimitiveSuperSet {
    let set = PrimitiveSet::new()
        .with_root_type(ValueType::Float)
        .with(Arc::new(Add))
        .and_then(|set| set.with(Arc::new(Subtract)))
        .and_then(|set| set.with(Arc::new(Multiply)))
        .and_then(|set| set.with(Arc::new(Divide)))
        .and_then(|set| set.with(Arc::new(Variable::typed("X", ValueType::Float))))
        .and_then(|set| set.with(Arc::new(EphemeralDouble::new("E", -1.0, 1.0))))
        .unwrap();
    PrimitiveSuperSet::new().with_set(set)
}

fn method(index: u8) -> InitMethod {
    match index % 3 {
        0 => InitMethod::Grow,
        1 => InitMethod::Full,
        _ => InitMethod::Half,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Generated trees are typed correctly and respect the depth range.
    #[test]
    fn prop_init_respects_depth_and_types(
        seed in any::<u64>(),
        kind in 0u8..3,
        min_depth in 1usize..4,
        extra in 0usize..3,
    ) {
        let mut context = Context::with_seed(primitives(), seed);
        let config = InitConfig::default().with_depth(min_depth, min_depth + extra);
        let individual = init_individual(method(kind), &config, &mut context).unwrap();

        let tree = &individual.trees[0];
        prop_assert!(tree.depth() >= min_depth);
        prop_assert!(tree.depth() <= min_depth + extra);
        prop_assert!(individual.validate(&mut context));
        let rebuilt = Tree::from_nodes(tree.nodes().to_vec(), 0, 0);
        prop_assert!(rebuilt.is_ok());
    }

    /// Constrained crossover never produces invalid or too deep offspring.
    #[test]
    fn prop_constrained_crossover_keeps_offspring_valid(seed in any::<u64>(), max_depth in 3usize..8) {
        let mut context = Context::with_seed(primitives(), seed);
        let config = InitConfig::default().with_depth(2, 3);
        let mut first = init_individual(InitMethod::Half, &config, &mut context).unwrap();
        let mut second = init_individual(InitMethod::Half, &config, &mut context).unwrap();

        mate_constrained(&mut first, &mut second, &mut context, max_depth, 5);

        for individual in [&first, &second] {
            prop_assert!(individual.validate(&mut context));
            prop_assert!(individual.depth() <= max_depth.max(3));
        }
    }

    /// Mutations keep individuals valid and within the depth limit.
    #[test]
    fn prop_mutations_keep_individuals_valid(seed in any::<u64>(), rounds in 1usize..6) {
        let mut context = Context::with_seed(primitives(), seed);
        let config = InitConfig::default().with_depth(2, 4);
        let mut individual = init_individual(InitMethod::Half, &config, &mut context).unwrap();

        for _ in 0..rounds {
            mutate_standard(&mut individual, &mut context, 8, 3, 3).unwrap();
            mutate_swap(&mut individual, &mut context, 3).unwrap();
            mutate_shrink(&mut individual, &mut context, 3).unwrap();
            prop_assert!(individual.validate(&mut context));
            prop_assert!(individual.depth() <= 8);
        }
    }

    /// A written individual reads back to the same program.
    #[test]
    fn prop_persistence_preserves_programs(seed in any::<u64>()) {
        let mut context = Context::with_seed(primitives(), seed);
        let individual =
            init_individual(InitMethod::Half, &InitConfig::default(), &mut context).unwrap();
        let text = write_individual(&individual).unwrap();
        let restored = read_individual(&text, context.primitives()).unwrap();
        prop_assert_eq!(restored.to_string(), individual.to_string());
    }
}
