//! Optimizer loop and configuration.
//!
//! Drives the population lifecycle: random initialization, then per
//! generation select → crossover → mutate → evaluate → elitist replace,
//! tracking the best individual ever seen and the per-generation
//! best/average fitness history. Termination is a fixed generation count;
//! a cooperative cancellation flag is checked once per generation
//! boundary.
//!
//! Population evaluation touches only the shared read-only catalog and
//! each individual's own state, so it can fan out across worker threads
//! when [`OptimizerConfig::parallel`] is set. Random numbers always come
//! from one explicit seedable generator consumed sequentially, so a run
//! is reproducible for a given seed regardless of the parallel flag.

use chrono::NaiveDateTime;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::ga::{
    elitist_replacement, mutate, order_crossover, tournament_select, Individual,
};
use crate::models::{Machine, ManufacturingOrder, TimelineEntry};
use crate::sim::{decode_timeline, Objective};

/// Configuration for an optimization run.
///
/// Defaults follow the reference shop parameters: 30 min setup,
/// population 100, 200 generations, crossover 0.8, mutation 0.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Machine setup time per block (minutes).
    pub setup_time_min: f64,
    /// Overrides the tool-capacity threshold. `None` = minimum magazine
    /// capacity across machines.
    pub tool_capacity: Option<usize>,
    /// Population size (≥ 2).
    pub population_size: usize,
    /// Generation count (≥ 1).
    pub generations: usize,
    /// Probability of applying crossover to a parent pair, in [0, 1].
    pub crossover_rate: f64,
    /// Probability of mutating an offspring, in [0, 1].
    pub mutation_rate: f64,
    /// Optimization objective.
    pub objective: Objective,
    /// Schedule epoch: due dates and the decoded timeline are anchored
    /// here.
    pub schedule_start: NaiveDateTime,
    /// RNG seed. `None` = seeded from the OS.
    pub seed: Option<u64>,
    /// Evaluate the population on a rayon thread pool.
    pub parallel: bool,
}

impl OptimizerConfig {
    /// Creates a config with reference defaults anchored at
    /// `schedule_start`.
    pub fn new(schedule_start: NaiveDateTime) -> Self {
        Self {
            setup_time_min: 30.0,
            tool_capacity: None,
            population_size: 100,
            generations: 200,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            objective: Objective::default(),
            schedule_start,
            seed: None,
            parallel: false,
        }
    }

    /// Sets the per-block setup time (minutes).
    pub fn with_setup_time(mut self, minutes: f64) -> Self {
        self.setup_time_min = minutes;
        self
    }

    /// Overrides the tool-capacity threshold.
    pub fn with_tool_capacity(mut self, capacity: usize) -> Self {
        self.tool_capacity = Some(capacity);
        self
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Sets the generation count.
    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate;
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Sets the objective.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Fixes the RNG seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables parallel population evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Rejected configuration or input. Raised at construction, before any
/// population is built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("no manufacturing orders supplied")]
    NoOrders,
    #[error("no machines supplied")]
    NoMachines,
    #[error("population size {0} is below the minimum of 2")]
    PopulationTooSmall(usize),
    #[error("generation count must be at least 1")]
    NoGenerations,
    #[error("{name} rate {value} is outside [0, 1]")]
    RateOutOfRange { name: &'static str, value: f64 },
}

/// Convergence statistics of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerStats {
    /// Scalar fitness of the best individual.
    pub final_fitness: f64,
    /// Makespan of the best individual (minutes).
    pub makespan: f64,
    /// Total lateness of the best individual (minutes).
    pub total_delay: f64,
    /// Machine load variance of the best individual.
    pub load_variance: f64,
    /// Final per-machine completion times of the best individual.
    pub machine_loads: Vec<f64>,
    /// Over-capacity singleton blocks in the best individual.
    pub over_capacity_blocks: usize,
    /// Generations actually run (shorter than configured when cancelled).
    pub generations_run: usize,
    /// Best-so-far fitness after each generation. Non-increasing.
    pub best_fitness_history: Vec<f64>,
    /// Population mean fitness after each generation.
    pub avg_fitness_history: Vec<f64>,
}

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizerResult {
    /// Best individual found across all generations.
    pub best: Individual,
    /// Convergence statistics.
    pub stats: OptimizerStats,
    /// Decoded timeline of the best individual, anchored at the schedule
    /// start.
    pub timeline: Vec<TimelineEntry>,
}

/// Genetic scheduling optimizer.
///
/// Owns the read-only catalog for the run; orders and machines are
/// borrowed only during construction.
#[derive(Debug)]
pub struct Optimizer {
    catalog: Catalog,
    machines: Vec<Machine>,
    config: OptimizerConfig,
    tool_capacity: usize,
}

impl Optimizer {
    /// Builds an optimizer, validating configuration and inputs.
    pub fn new(
        orders: &[ManufacturingOrder],
        machines: &[Machine],
        config: OptimizerConfig,
    ) -> Result<Self, OptimizerError> {
        if orders.is_empty() {
            return Err(OptimizerError::NoOrders);
        }
        if machines.is_empty() {
            return Err(OptimizerError::NoMachines);
        }
        if config.population_size < 2 {
            return Err(OptimizerError::PopulationTooSmall(config.population_size));
        }
        if config.generations < 1 {
            return Err(OptimizerError::NoGenerations);
        }
        for (name, value) in [
            ("crossover", config.crossover_rate),
            ("mutation", config.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(OptimizerError::RateOutOfRange { name, value });
            }
        }

        // Any block within the smallest magazine fits every machine.
        let tool_capacity = config.tool_capacity.unwrap_or_else(|| {
            machines
                .iter()
                .map(|m| m.tool_capacity as usize)
                .min()
                .unwrap_or(0)
        });

        Ok(Self {
            catalog: Catalog::build(orders, config.schedule_start),
            machines: machines.to_vec(),
            config,
            tool_capacity,
        })
    }

    /// The task catalog built for this run.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Effective tool-capacity threshold used by the block builder.
    pub fn tool_capacity(&self) -> usize {
        self.tool_capacity
    }

    /// Runs the full configured generation count.
    pub fn run(&self) -> OptimizerResult {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    /// Runs until the generation count is reached or `cancel` is set.
    /// Cancellation is observed at generation boundaries; the best
    /// individual found so far is returned either way.
    pub fn run_with_cancel(&self, cancel: &AtomicBool) -> OptimizerResult {
        let machine_count = self.machines.len();
        let objective = self.config.objective;
        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        info!(
            tasks = self.catalog.task_count(),
            machines = machine_count,
            population = self.config.population_size,
            generations = self.config.generations,
            ?objective,
            "starting genetic optimization"
        );

        let mut population: Vec<Individual> = (0..self.config.population_size)
            .map(|_| Individual::random(&self.catalog, self.tool_capacity, machine_count, &mut rng))
            .collect();
        self.evaluate_all(&mut population);

        let mut best = self.best_of(&population).clone();
        let mut best_history = Vec::with_capacity(self.config.generations);
        let mut avg_history = Vec::with_capacity(self.config.generations);
        let mut generations_run = 0;

        for generation in 1..=self.config.generations {
            if cancel.load(Ordering::Relaxed) {
                info!(generation, "optimization cancelled");
                break;
            }

            let parents = tournament_select(&population, self.config.population_size, &mut rng);

            let mut offspring = Vec::with_capacity(parents.len());
            for pair in parents.chunks(2) {
                let [p1, p2] = pair else {
                    offspring.push(pair[0].clone());
                    continue;
                };
                let (mut c1, mut c2) = if rng.random::<f64>() < self.config.crossover_rate {
                    order_crossover(
                        &self.catalog,
                        p1,
                        p2,
                        self.tool_capacity,
                        machine_count,
                        &mut rng,
                    )
                } else {
                    (p1.clone(), p2.clone())
                };
                if rng.random::<f64>() < self.config.mutation_rate {
                    mutate(&self.catalog, &mut c1, self.tool_capacity, machine_count, &mut rng);
                }
                if rng.random::<f64>() < self.config.mutation_rate {
                    mutate(&self.catalog, &mut c2, self.tool_capacity, machine_count, &mut rng);
                }
                offspring.push(c1);
                offspring.push(c2);
            }
            self.evaluate_all(&mut offspring);

            population = elitist_replacement(population, offspring, self.config.population_size);

            let current_best = self.best_of(&population);
            if current_best.fitness < best.fitness {
                best = current_best.clone();
            }

            let avg = population.iter().map(|i| i.fitness).sum::<f64>()
                / population.len() as f64;
            best_history.push(best.fitness);
            avg_history.push(avg);
            generations_run = generation;

            if generation % 20 == 0 || generation == self.config.generations {
                info!(
                    generation,
                    best = best.fitness,
                    avg,
                    makespan = best.makespan,
                    "generation complete"
                );
            }
        }

        let over_capacity_blocks = best.over_capacity_blocks();
        if over_capacity_blocks > 0 {
            warn!(
                over_capacity_blocks,
                "best schedule contains tasks exceeding the tool magazine on their own"
            );
        }

        // Decoding replays the same walk that produced the fitness, so
        // this only fails if the individual itself is malformed; the best
        // individual always simulated successfully.
        let timeline = decode_timeline(
            &self.catalog,
            &best.blocks,
            &best.machine_assignment,
            &self.machines,
            self.config.setup_time_min,
            self.config.schedule_start,
        )
        .unwrap_or_default();

        let stats = OptimizerStats {
            final_fitness: best.fitness,
            makespan: best.makespan,
            total_delay: best.total_delay,
            load_variance: best.load_variance,
            machine_loads: self.machine_loads(&best),
            over_capacity_blocks,
            generations_run,
            best_fitness_history: best_history,
            avg_fitness_history: avg_history,
        };

        info!(
            fitness = stats.final_fitness,
            makespan = stats.makespan,
            "optimization finished"
        );

        OptimizerResult {
            best,
            stats,
            timeline,
        }
    }

    fn evaluate_all(&self, individuals: &mut [Individual]) {
        let machine_count = self.machines.len();
        let objective = self.config.objective;
        let setup = self.config.setup_time_min;

        if self.config.parallel {
            individuals.par_iter_mut().for_each(|ind| {
                ind.evaluate(&self.catalog, machine_count, setup, objective);
            });
        } else {
            for ind in individuals.iter_mut() {
                ind.evaluate(&self.catalog, machine_count, setup, objective);
            }
        }
    }

    fn best_of<'a>(&self, population: &'a [Individual]) -> &'a Individual {
        population
            .iter()
            .min_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .expect("population is never empty")
    }

    fn machine_loads(&self, individual: &Individual) -> Vec<f64> {
        match crate::sim::simulate(
            &self.catalog,
            &individual.blocks,
            &individual.machine_assignment,
            self.machines.len(),
            self.config.setup_time_min,
        ) {
            Ok(outcome) => outcome.machine_ends,
            Err(_) => vec![0.0; self.machines.len()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Operation, PalletType, PieceType};
    use chrono::NaiveDate;

    fn epoch() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn sample_orders() -> Vec<ManufacturingOrder> {
        let piece_a = PieceType::new(
            "PIECE_A",
            Operation::new("OP10", 15.0).with_tools(["t1", "t2", "t3", "t4", "t5"]),
            PalletType::Small,
        )
        .with_op2(Operation::new("OP20", 25.0).with_tools(["t6", "t7", "t8"]))
        .with_fixture("F1");
        let piece_c = PieceType::new(
            "PIECE_C",
            Operation::new("OP20", 10.0).with_tools(["t9", "t10"]),
            PalletType::Big,
        )
        .with_fixture("F2");

        vec![
            ManufacturingOrder::new("O1", 4, piece_a)
                .with_reference("OF001")
                .with_due_date(epoch() + chrono::Duration::minutes(300))
                .with_load_delay(5.0)
                .with_rotation_delay(2.0),
            ManufacturingOrder::new("O2", 6, piece_c)
                .with_reference("OF002")
                .with_due_date(epoch() + chrono::Duration::minutes(600)),
        ]
    }

    fn sample_machines() -> Vec<Machine> {
        vec![
            Machine::new("M1", 40).with_name("Machine 1"),
            Machine::new("M2", 40).with_name("Machine 2"),
        ]
    }

    fn small_config() -> OptimizerConfig {
        OptimizerConfig::new(epoch())
            .with_population_size(20)
            .with_generations(15)
            .with_seed(42)
    }

    #[test]
    fn test_construction_rejects_bad_input() {
        let orders = sample_orders();
        let machines = sample_machines();

        assert_eq!(
            Optimizer::new(&[], &machines, small_config()).unwrap_err(),
            OptimizerError::NoOrders
        );
        assert_eq!(
            Optimizer::new(&orders, &[], small_config()).unwrap_err(),
            OptimizerError::NoMachines
        );
        assert_eq!(
            Optimizer::new(&orders, &machines, small_config().with_population_size(1))
                .unwrap_err(),
            OptimizerError::PopulationTooSmall(1)
        );
        assert_eq!(
            Optimizer::new(&orders, &machines, small_config().with_generations(0)).unwrap_err(),
            OptimizerError::NoGenerations
        );
        assert!(matches!(
            Optimizer::new(&orders, &machines, small_config().with_crossover_rate(1.5)),
            Err(OptimizerError::RateOutOfRange { name: "crossover", .. })
        ));
        assert!(matches!(
            Optimizer::new(&orders, &machines, small_config().with_mutation_rate(-0.1)),
            Err(OptimizerError::RateOutOfRange { name: "mutation", .. })
        ));
    }

    #[test]
    fn test_capacity_defaults_to_minimum_machine() {
        let orders = sample_orders();
        let machines = vec![Machine::new("M1", 40), Machine::new("M2", 24)];
        let opt = Optimizer::new(&orders, &machines, small_config()).unwrap();
        assert_eq!(opt.tool_capacity(), 24);

        let opt = Optimizer::new(
            &orders,
            &machines,
            small_config().with_tool_capacity(30),
        )
        .unwrap();
        assert_eq!(opt.tool_capacity(), 30);
    }

    #[test]
    fn test_run_produces_consistent_result() {
        let opt = Optimizer::new(&sample_orders(), &sample_machines(), small_config()).unwrap();
        let result = opt.run();

        assert!(result.best.fitness.is_finite());
        assert_eq!(result.best.sequence.len(), opt.catalog().task_count());
        assert_eq!(result.stats.generations_run, 15);
        assert_eq!(result.stats.best_fitness_history.len(), 15);
        assert_eq!(result.stats.avg_fitness_history.len(), 15);

        // Timeline covers one setup per block plus one entry per task.
        let expected = result.best.blocks.len() + opt.catalog().task_count();
        assert_eq!(result.timeline.len(), expected);

        let last_end = result.timeline.iter().map(|e| e.end).max().unwrap();
        let decoded_makespan = (last_end - epoch()).num_seconds() as f64 / 60.0;
        assert!((decoded_makespan - result.best.makespan).abs() < 1e-6);
    }

    #[test]
    fn test_best_history_is_non_increasing() {
        let opt = Optimizer::new(&sample_orders(), &sample_machines(), small_config()).unwrap();
        let result = opt.run();

        let history = &result.stats.best_fitness_history;
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(result.stats.final_fitness, *history.last().unwrap());
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let orders = sample_orders();
        let machines = sample_machines();

        let a = Optimizer::new(&orders, &machines, small_config()).unwrap().run();
        let b = Optimizer::new(&orders, &machines, small_config()).unwrap().run();

        assert_eq!(a.best.sequence, b.best.sequence);
        assert_eq!(a.best.machine_assignment, b.best.machine_assignment);
        assert_eq!(a.stats.best_fitness_history, b.stats.best_fitness_history);
        assert_eq!(a.stats.avg_fitness_history, b.stats.avg_fitness_history);
    }

    #[test]
    fn test_parallel_evaluation_matches_sequential() {
        let orders = sample_orders();
        let machines = sample_machines();

        let seq = Optimizer::new(&orders, &machines, small_config()).unwrap().run();
        let par = Optimizer::new(&orders, &machines, small_config().with_parallel(true))
            .unwrap()
            .run();

        assert_eq!(seq.stats.best_fitness_history, par.stats.best_fitness_history);
    }

    #[test]
    fn test_cancel_before_first_generation() {
        let opt = Optimizer::new(&sample_orders(), &sample_machines(), small_config()).unwrap();
        let cancel = AtomicBool::new(true);
        let result = opt.run_with_cancel(&cancel);

        // The initial population is still evaluated, so a best exists.
        assert!(result.best.fitness.is_finite());
        assert_eq!(result.stats.generations_run, 0);
        assert!(result.stats.best_fitness_history.is_empty());
    }

    #[test]
    fn test_delay_objective_reports_lateness() {
        let config = small_config().with_objective(crate::sim::Objective::Delay);
        let opt = Optimizer::new(&sample_orders(), &sample_machines(), config).unwrap();
        let result = opt.run();

        assert!(result.best.fitness.is_finite());
        assert!(result.stats.total_delay >= 0.0);
        assert!(
            (result.best.fitness - (result.stats.total_delay + 0.1 * result.stats.makespan)).abs()
                < 1e-6
        );
    }
}
