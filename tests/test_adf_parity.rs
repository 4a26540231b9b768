use std::sync::Arc;

use beagle::{
    error::Result,
    evolution::{Evaluator, EvolverBuilder},
    fitness::Fitness,
    gp::{
        primitives::{AdfInvoker, And, Argument, Nand, Nor, Or, Variable},
        Context, Individual, Node, Primitive, PrimitiveSet, PrimitiveSuperSet, Tree, Value,
        ValueType,
    },
    register::ParameterValue,
};

const INPUTS: [&str; 3] = ["D0", "D1", "D2"];

fn gates(set: PrimitiveSet) -> PrimitiveSet {
    set.with(Arc::new(And))
        .and_then(|set| set.with(Arc::new(Or)))
        .and_then(|set| set.with(Arc::new(Nand)))
        .and_then(|set| set.with(Arc::new(Nor)))
        .unwrap()
}

fn primitives() -> PrimitiveSuperSet {
    let mut main = gates(PrimitiveSet::new().with_root_type(ValueType::Bool));
    for input in INPUTS {
        main.insert(Arc::new(Variable::typed(input, ValueType::Bool)))
            .unwrap();
    }
    main.insert(Arc::new(AdfInvoker::new(1).with_return_type(ValueType::Bool)))
        .unwrap();

    let mut adf = gates(PrimitiveSet::new().with_root_type(ValueType::Bool));
    for index in 0..2 {
        adf.insert(Arc::new(Argument::typed(index, ValueType::Bool)))
            .unwrap();
    }
    PrimitiveSuperSet::new().with_set(main).with_set(adf)
}

/// Odd-3-parity: true when an odd number of inputs are set.
struct OddParity;

impl Evaluator for OddParity {
    fn evaluate(&self, individual: &Individual, context: &Context) -> Result<Fitness> {
        let mut hits = 0;
        for case in 0..8u32 {
            let mut interpreter = individual.interpreter(context);
            for (bit, input) in INPUTS.iter().enumerate() {
                interpreter.set_variable(input, Value::Bool(case & (1 << bit) != 0));
            }
            if interpreter.run()?.as_bool()? == (case.count_ones() % 2 == 1) {
                hits += 1;
            }
        }
        Ok(Fitness::with_hits(hits as f64 / 8.0, hits))
    }
}

fn node(primitive: impl Primitive + 'static) -> Node {
    Node::new(Arc::new(primitive))
}

fn invoker() -> Node {
    let primitive = AdfInvoker::new(1)
        .with_return_type(ValueType::Bool)
        .instantiate(None, 2)
        .unwrap()
        .unwrap();
    Node::new(primitive)
}

/// `ADF1(ADF1(D0, D1), D2)` with `ADF1` computing equality of its arguments.
fn solution() -> Individual {
    let main = Tree::from_nodes(
        vec![
            invoker(),
            invoker(),
            node(Variable::typed("D0", ValueType::Bool)),
            node(Variable::typed("D1", ValueType::Bool)),
            node(Variable::typed("D2", ValueType::Bool)),
        ],
        0,
        0,
    )
    .unwrap();
    let equal = Tree::from_nodes(
        vec![
            node(Or),
            node(Nor),
            node(Argument::typed(0, ValueType::Bool)),
            node(Argument::typed(1, ValueType::Bool)),
            node(And),
            node(Argument::typed(0, ValueType::Bool)),
            node(Argument::typed(1, ValueType::Bool)),
        ],
        1,
        2,
    )
    .unwrap();
    Individual::with_trees(vec![main, equal])
}

#[test]
fn test_hand_written_adf_solution_scores_every_case() {
    let mut context = Context::with_seed(primitives(), 1);
    let individual = solution();
    assert!(individual.validate(&mut context));

    let fitness = OddParity.evaluate(&individual, &context).unwrap();
    assert_eq!(fitness.hits(), 8);
    assert_eq!(fitness.value(), Some(1.0));
}

#[test]
fn test_invoker_arity_must_match_the_called_tree() {
    let mut context = Context::with_seed(primitives(), 1);
    let mut individual = solution();
    individual.trees[1].set_number_arguments(3);
    assert!(!individual.validate(&mut context));
}

#[test]
fn test_evolved_individuals_keep_their_adf_structure() {
    let mut evolver = EvolverBuilder::new()
        .with_primitives(primitives())
        .with_evaluator(OddParity)
        .with_seed(7)
        .with_main_loop(&[
            "SelectTournamentOp",
            "GP-CrossoverConstrainedOp",
            "GP-MutationStandardOp",
            "GP-MutationSwapOp",
            "EvaluationOp",
            "StatsCalcOp",
            "TerminationOp",
        ])
        .with_arguments([
            "-OBec.pop.size=30,ec.term.maxgen=3",
            "-OBgp.init.mintree=2,gp.init.maxtree=2",
            "-OBgp.tree.minargs=2,gp.tree.maxargs=2,gp.term.maxhits=8",
        ])
        .build()
        .unwrap();
    let result = evolver.evolve().unwrap();
    assert!(result.best.fitness.hits() <= 8);

    let individuals: Vec<Individual> = evolver.vivarium().individuals().cloned().collect();
    assert_eq!(individuals.len(), 30);
    let context = evolver.context_mut();
    for individual in &individuals {
        assert_eq!(individual.tree_arguments(), vec![0, 2]);
        assert!(individual.validate(context), "invalid individual {}", individual);
        assert!(individual.fitness.is_valid());
    }
}

#[test]
fn test_default_pipelines_with_varying_adf_arity() {
    for seed in 1..=5 {
        let mut evolver = EvolverBuilder::new()
            .with_primitives(primitives())
            .with_evaluator(OddParity)
            .with_seed(seed)
            .with_arguments([
                "-OBec.pop.size=60,ec.term.maxgen=10",
                "-OBgp.init.mintree=2,gp.init.maxtree=2",
                "-OBgp.tree.minargs=1,gp.tree.maxargs=2",
            ])
            .build()
            .unwrap();
        let result = evolver.evolve();
        assert!(result.is_ok(), "seed {}: {:?}", seed, result.err());

        let individuals: Vec<Individual> = evolver.vivarium().individuals().cloned().collect();
        let context = evolver.context_mut();
        for individual in &individuals {
            assert!(individual.validate(context), "invalid individual {}", individual);
        }
    }
}
