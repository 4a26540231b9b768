use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use beagle::{
    breeding::{Operator, OperatorRegistry},
    error::Result,
    evolution::{Deme, Evaluator, EvolverBuilder},
    fitness::Fitness,
    gp::{
        primitives::{Add, EphemeralDouble, Multiply, Subtract, Variable},
        Context, Individual, ModuleVector, PrimitiveSet, PrimitiveSuperSet, Value,
    },
    register::{ParameterValue, Register},
};

fn primitives() -> PrimitiveSuperSet {
    let set = PrimitiveSet::new()
        .with(Arc::new(Add))
        .and_then(|set| set.with(Arc::new(Subtract)))
        .and_then(|set| set.with(Arc::new(Multiply)))
        .and_then(|set| set.with(Arc::new(Variable::new("X"))))
        .and_then(|set| set.with(Arc::new(EphemeralDouble::new("E", -1.0, 1.0))))
        .unwrap();
    PrimitiveSuperSet::new().with_set(set)
}

fn closeness(individual: &Individual, context: &Context) -> Result<Fitness> {
    let mut interpreter = individual.interpreter(context);
    interpreter.set_variable("X", Value::Float(1.5));
    let value = interpreter.run()?.as_float()?;
    let fitness = 1.0 / (1.0 + (value - 3.0).abs());
    Ok(Fitness::new(if fitness.is_finite() { fitness } else { 0.0 }))
}

fn builder() -> EvolverBuilder {
    EvolverBuilder::new()
        .with_primitives(primitives())
        .with_evaluator(closeness)
        .with_seed(3)
        .with_parameter("ec.pop.size", ParameterValue::Int(20))
        .with_parameter("ec.term.maxgen", ParameterValue::Int(3))
}

#[derive(Debug)]
struct CountingOp {
    calls: Arc<AtomicUsize>,
}

impl Operator for CountingOp {
    fn name(&self) -> &str {
        "CountingOp"
    }

    fn initialize(&mut self, _register: &mut Register) -> Result<()> {
        Ok(())
    }

    fn operate(&mut self, _deme: &mut Deme, _context: &mut Context) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_custom_operator_runs_once_per_deme_and_generation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let evaluator: Arc<dyn Evaluator> = Arc::new(closeness);
    let mut registry = OperatorRegistry::standard(Arc::clone(&evaluator));
    let shared = Arc::clone(&calls);
    registry
        .register("CountingOp", move || CountingOp {
            calls: Arc::clone(&shared),
        })
        .unwrap();

    let mut evolver = builder()
        .with_registry(registry)
        .with_main_loop(&["CountingOp", "StatsCalcOp"])
        .with_parameter("ec.demes", ParameterValue::Int(2))
        .build()
        .unwrap();
    let result = evolver.evolve().unwrap();

    assert_eq!(result.generation, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(evolver
        .vivarium()
        .demes
        .iter()
        .all(|deme| deme.stats.as_ref().map(|stats| stats.generation) == Some(3)));
}

#[test]
fn test_unknown_operator_name_fails_the_build() {
    let result = builder().with_main_loop(&["NoSuchOp"]).build();
    assert!(result.is_err());
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(&path, r#"{ "ec.pop.size": 12, "ec.term.maxgen": 1 }"#).unwrap();

    let mut evolver = EvolverBuilder::new()
        .with_primitives(primitives())
        .with_evaluator(closeness)
        .with_seed(3)
        .with_config_file(&path)
        .build()
        .unwrap();
    let result = evolver.evolve().unwrap();
    assert_eq!(result.generation, 1);
    assert_eq!(evolver.vivarium().demes[0].population.len(), 12);
    assert_eq!(evolver.context().register.uint("ec.pop.size").unwrap(), 12);
}

#[test]
fn test_module_acquisition_keeps_live_modules() {
    let mut evolver = builder()
        .with_main_loop(&[
            "SelectTournamentOp",
            "GP-EMACompressOp",
            "GP-CrossoverOp",
            "GP-EMAExpandOp",
            "EvaluationOp",
            "StatsCalcOp",
        ])
        .with_parameter("gp.ema.compress.indpb", ParameterValue::Float(0.5))
        .with_parameter("gp.ema.expand.indpb", ParameterValue::Float(0.2))
        .build()
        .unwrap();
    evolver.initialize().unwrap();
    evolver.bootstrap().unwrap();
    while !evolver.is_finished() {
        evolver.step().unwrap();
        let vivarium = evolver.vivarium();
        let referenced = ModuleVector::referenced(
            vivarium
                .individuals()
                .chain(vivarium.hall_of_fame.members()),
        );
        let modules = evolver.context().modules();
        for index in referenced {
            assert!(modules.get(index).is_some(), "module {} was released", index);
        }
        assert!(evolver
            .vivarium()
            .individuals()
            .all(|individual| individual.fitness.is_valid()));
    }
}

#[test]
fn test_milestone_restart_resumes_the_generation_count() {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("quadratic");
    let prefix = prefix.to_string_lossy().into_owned();

    let mut first = builder()
        .with_parameter("ec.term.maxgen", ParameterValue::Int(2))
        .with_parameter("ms.write.prefix", ParameterValue::Text(prefix.clone()))
        .with_parameter("ms.write.interval", ParameterValue::Int(1))
        .build()
        .unwrap();
    let interrupted = first.evolve().unwrap();
    let milestone = first.milestone_path().unwrap();
    assert!(milestone.exists());

    let mut resumed = builder()
        .with_parameter("ec.term.maxgen", ParameterValue::Int(4))
        .with_parameter(
            "ms.restart.file",
            ParameterValue::Text(milestone.to_string_lossy().into_owned()),
        )
        .build()
        .unwrap();
    resumed.initialize().unwrap();
    resumed.bootstrap().unwrap();
    assert_eq!(resumed.generation(), 2);
    assert_eq!(resumed.vivarium().demes[0].population.len(), 20);
    assert_eq!(
        resumed.vivarium().hall_of_fame.best().map(|best| best.fitness),
        Some(interrupted.best.fitness)
    );

    let result = resumed.evolve().unwrap();
    assert_eq!(result.generation, 4);
    assert!(result.best.fitness.score() >= interrupted.best.fitness.score());
}
