//! # Hybrid DE + VQE Loop
//!
//! $$
//! \theta^\* = \arg\min_\theta\;\mathbb E_{s\sim p_\theta}\,[E(s)]
//! $$
//!
//! Differential Evolution over the ansatz parameters, with the expectation
//! of the cost Hamiltonian (estimated by repeated quantum sampling) as the
//! fitness function. Every candidate evaluation submits one sampling job,
//! so the loop runs sequentially and is bounded by a wall-clock timeout and
//! a hard evaluation cap.

use std::f64::consts::PI;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::backend::sampler::MeasurementCounts;
use crate::backend::sampler::QuantumSampler;
use crate::circuit::AnsatzCircuit;
use crate::config::OptimizerConfig;
use crate::expectation::expectation_from_counts;
use crate::hamiltonian::CostHamiltonian;

/// Fitness assigned to governed or failed evaluations.
pub const PENALTY_SENTINEL: f64 = 1e6;

/// Wall-clock budget for one optimization run.
const OPTIMIZATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Seed for the DE population and mutation draws.
const DE_SEED: u64 = 42;

/// Differential weight for rand/1 mutation.
const DIFFERENTIAL_WEIGHT: f64 = 0.8;

/// Relative fitness-spread tolerance for early convergence.
const CONVERGENCE_TOL: f64 = 1e-3;

/// Absolute fitness-spread tolerance for early convergence.
const CONVERGENCE_ATOL: f64 = 1e-6;

/// Result of the hybrid optimization loop.
#[derive(Clone, Debug)]
pub struct HybridOutcome {
  /// Most probable bitstring of the final sampling pass.
  pub best_bitstring: String,
  /// Best expectation value found during the search.
  pub objective_value: f64,
  /// Sampling jobs actually executed (governed calls excluded).
  pub jobs_executed: usize,
  /// Full measurement distribution of the final pass.
  pub final_counts: MeasurementCounts,
  /// True when the evaluation cap cut the search short.
  pub evaluation_capped: bool,
}

/// Hard cap on cost-function evaluations for a run.
pub fn max_evaluations(config: &OptimizerConfig) -> usize {
  (config.num_generations * config.population_size * 3).max(20)
}

/// Per-candidate cost evaluator with the two run governors.
///
/// Timeout and cap checks happen at the start of each invocation; an
/// in-flight sampling job cannot be interrupted. Job failures degrade the
/// candidate's fitness to the sentinel instead of aborting the search.
struct CostEvaluator<'a> {
  sampler: &'a dyn QuantumSampler,
  ansatz: &'a AnsatzCircuit,
  hamiltonian: &'a CostHamiltonian,
  estimator_shots: u64,
  started: Instant,
  max_jobs: usize,
  jobs: usize,
  capped: bool,
}

impl CostEvaluator<'_> {
  fn evaluate(&mut self, params: &[f64]) -> f64 {
    if self.started.elapsed() > OPTIMIZATION_TIMEOUT {
      warn!("optimization timeout reached, short-circuiting evaluation");
      self.capped = true;
      return PENALTY_SENTINEL;
    }
    if self.jobs >= self.max_jobs {
      debug!(max_jobs = self.max_jobs, "evaluation cap reached, short-circuiting");
      self.capped = true;
      return PENALTY_SENTINEL;
    }

    let circuit = match self.ansatz.bind(params) {
      Ok(circuit) => circuit,
      Err(err) => {
        warn!(error = %err, "parameter binding failed, penalizing candidate");
        return PENALTY_SENTINEL;
      }
    };

    // Only a submitted sampling job counts against the cap.
    self.jobs += 1;

    match self.sampler.sample(&circuit, self.estimator_shots) {
      Ok(counts) => {
        let expectation = expectation_from_counts(&counts, self.hamiltonian);
        if self.jobs % 50 == 0 {
          debug!(job = self.jobs, expectation, "hybrid evaluation");
        }
        expectation
      }
      Err(err) => {
        warn!(error = %err, "sampling job failed, penalizing candidate");
        PENALTY_SENTINEL
      }
    }
  }
}

/// Run the DE-driven VQE search and the terminal high-shot sampling pass.
///
/// Candidate-level quantum failures never abort the search; a failure of
/// the final sampling pass does, because that distribution is the answer.
pub fn run_hybrid_vqe(
  hamiltonian: &CostHamiltonian,
  ansatz: &AnsatzCircuit,
  sampler: &dyn QuantumSampler,
  config: &OptimizerConfig,
) -> Result<HybridOutcome> {
  let num_params = ansatz.num_parameters();
  // rand/1 mutation needs the target plus three distinct donors.
  let pop_size = config.population_size.max(4);

  info!(
    generations = config.num_generations,
    population = pop_size,
    num_params,
    backend = sampler.name(),
    "starting differential-evolution VQE"
  );

  let mut evaluator = CostEvaluator {
    sampler,
    ansatz,
    hamiltonian,
    estimator_shots: config.estimator_shots,
    started: Instant::now(),
    max_jobs: max_evaluations(config),
    jobs: 0,
    capped: false,
  };

  let mut rng = StdRng::seed_from_u64(DE_SEED);

  let mut population: Vec<Vec<f64>> = (0..pop_size)
    .map(|_| (0..num_params).map(|_| rng.gen_range(0.0..2.0 * PI)).collect())
    .collect();
  let mut fitness: Vec<f64> = population
    .iter()
    .map(|member| evaluator.evaluate(member))
    .collect();

  let mut best_idx = argmin(&fitness);

  'generations: for generation in 0..config.num_generations {
    for target in 0..pop_size {
      if evaluator.jobs >= evaluator.max_jobs {
        evaluator.capped = true;
        break 'generations;
      }

      let (r0, r1, r2) = pick_donors(target, pop_size, &mut rng);
      let forced = rng.gen_range(0..num_params);

      let mut trial = population[target].clone();
      for d in 0..num_params {
        if d == forced || rng.gen::<f64>() < config.recombination {
          let mutated = population[r0][d]
            + DIFFERENTIAL_WEIGHT * (population[r1][d] - population[r2][d]);
          trial[d] = mutated.clamp(0.0, 2.0 * PI);
        }
      }

      let trial_fitness = evaluator.evaluate(&trial);
      if trial_fitness < fitness[target] {
        population[target] = trial;
        fitness[target] = trial_fitness;
        if trial_fitness < fitness[best_idx] {
          best_idx = target;
        }
      }
    }

    if converged(&fitness) {
      debug!(generation, "fitness spread converged, stopping early");
      break;
    }
  }

  let best_fitness = fitness[best_idx];
  info!(
    jobs = evaluator.jobs,
    best_cost = best_fitness,
    capped = evaluator.capped,
    "differential-evolution VQE complete"
  );

  // Terminal pass: one high-shot sampling of the best candidate. Failures
  // here propagate, there is no fallback for the answer itself.
  let final_circuit = ansatz.bind(&population[best_idx])?;
  let final_counts = sampler
    .sample(&final_circuit, config.sampler_shots)
    .context("final sampling pass failed")?;

  let best_bitstring = most_probable(&final_counts)
    .context("final sampling pass returned no measurements")?;

  Ok(HybridOutcome {
    best_bitstring,
    objective_value: best_fitness,
    jobs_executed: evaluator.jobs,
    final_counts,
    evaluation_capped: evaluator.capped,
  })
}

fn argmin(values: &[f64]) -> usize {
  let mut best = 0;
  for (i, &v) in values.iter().enumerate() {
    if v < values[best] {
      best = i;
    }
  }
  best
}

/// Three distinct donor indices, all different from `target`.
fn pick_donors(target: usize, pop_size: usize, rng: &mut StdRng) -> (usize, usize, usize) {
  let mut pick = |taken: &[usize]| loop {
    let candidate = rng.gen_range(0..pop_size);
    if candidate != target && !taken.contains(&candidate) {
      return candidate;
    }
  };

  let r0 = pick(&[]);
  let r1 = pick(&[r0]);
  let r2 = pick(&[r0, r1]);
  (r0, r1, r2)
}

/// Population fitness spread below `atol + tol * |mean|`.
fn converged(fitness: &[f64]) -> bool {
  let n = fitness.len() as f64;
  let mean = fitness.iter().sum::<f64>() / n;
  let var = fitness.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n;
  var.sqrt() <= CONVERGENCE_ATOL + CONVERGENCE_TOL * mean.abs()
}

/// Highest-count bitstring, name as a deterministic tie-break.
fn most_probable(counts: &MeasurementCounts) -> Option<String> {
  counts
    .iter()
    .max_by(|(name_a, count_a), (name_b, count_b)| {
      count_a.cmp(count_b).then_with(|| name_b.cmp(name_a))
    })
    .map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::simulator::StatevectorSampler;
  use crate::circuit::BoundCircuit;
  use crate::hamiltonian::compile_hamiltonian;
  use crate::qubo::QuboModel;
  use anyhow::bail;
  use ndarray::Array1;
  use ndarray::Array2;
  use std::collections::HashMap;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;

  fn two_qubit_hamiltonian() -> CostHamiltonian {
    // Minimized by both qubits measuring 1.
    let model = QuboModel {
      linear: Array1::from_vec(vec![1.0, 1.0]),
      quadratic: Array2::zeros((2, 2)),
      num_qubits: 2,
    };
    compile_hamiltonian(&model)
  }

  fn fast_config() -> OptimizerConfig {
    OptimizerConfig {
      num_generations: 2,
      population_size: 4,
      estimator_shots: 256,
      sampler_shots: 1024,
      ansatz_reps: 1,
      ..Default::default()
    }
  }

  /// Counts true sampling calls; optionally fails estimator-level jobs.
  struct CountingSampler {
    calls: AtomicUsize,
    fail_estimator_jobs: bool,
    estimator_shots: u64,
  }

  impl CountingSampler {
    fn new(estimator_shots: u64, fail_estimator_jobs: bool) -> Self {
      Self {
        calls: AtomicUsize::new(0),
        fail_estimator_jobs,
        estimator_shots,
      }
    }
  }

  impl QuantumSampler for CountingSampler {
    fn name(&self) -> &str {
      "counting"
    }

    fn available(&self) -> bool {
      true
    }

    fn sample(&self, circuit: &BoundCircuit, shots: u64) -> Result<HashMap<String, u64>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_estimator_jobs && shots == self.estimator_shots {
        bail!("injected job failure");
      }
      let all_ones = "1".repeat(circuit.num_qubits());
      Ok(HashMap::from([(all_ones, shots)]))
    }
  }

  #[test]
  fn evaluation_cap_bounds_true_sampling_calls() {
    let hamiltonian = two_qubit_hamiltonian();
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let config = OptimizerConfig {
      num_generations: 2,
      population_size: 4,
      ..fast_config()
    };
    assert_eq!(max_evaluations(&config), 24);

    let sampler = CountingSampler::new(config.estimator_shots, false);
    let outcome = run_hybrid_vqe(&hamiltonian, &ansatz, &sampler, &config).unwrap();

    // All estimator jobs plus the one terminal pass.
    let calls = sampler.calls.load(Ordering::SeqCst);
    assert!(calls <= 24 + 1, "true sampling calls {calls} exceed the cap");
    assert_eq!(outcome.jobs_executed, calls - 1);
  }

  #[test]
  fn per_evaluation_failures_degrade_to_sentinel() {
    let hamiltonian = two_qubit_hamiltonian();
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let config = fast_config();

    let sampler = CountingSampler::new(config.estimator_shots, true);
    let outcome = run_hybrid_vqe(&hamiltonian, &ansatz, &sampler, &config).unwrap();

    // Every candidate was penalized, yet the search still finished and the
    // terminal pass produced an answer.
    assert_eq!(outcome.objective_value, PENALTY_SENTINEL);
    assert_eq!(outcome.best_bitstring, "11");
  }

  #[test]
  fn binding_failures_do_not_count_as_jobs() {
    let hamiltonian = two_qubit_hamiltonian();
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let sampler = CountingSampler::new(256, false);

    let mut evaluator = CostEvaluator {
      sampler: &sampler,
      ansatz: &ansatz,
      hamiltonian: &hamiltonian,
      estimator_shots: 256,
      started: std::time::Instant::now(),
      max_jobs: 24,
      jobs: 0,
      capped: false,
    };

    // Wrong parameter count: the bind fails before any job is submitted.
    let fitness = evaluator.evaluate(&[0.0; 3]);
    assert_eq!(fitness, PENALTY_SENTINEL);
    assert_eq!(evaluator.jobs, 0);
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);

    // A full parameter vector submits exactly one job.
    let _ = evaluator.evaluate(&[0.0; 4]);
    assert_eq!(evaluator.jobs, 1);
  }

  #[test]
  fn terminal_sampling_failure_propagates() {
    struct AlwaysFailing;
    impl QuantumSampler for AlwaysFailing {
      fn name(&self) -> &str {
        "broken"
      }
      fn available(&self) -> bool {
        false
      }
      fn sample(&self, _circuit: &BoundCircuit, _shots: u64) -> Result<HashMap<String, u64>> {
        bail!("backend down")
      }
    }

    let hamiltonian = two_qubit_hamiltonian();
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let result = run_hybrid_vqe(&hamiltonian, &ansatz, &AlwaysFailing, &fast_config());
    assert!(result.is_err());
  }

  #[test]
  fn simulator_run_finds_the_ground_state_direction() {
    // Minimizing +Z0 +Z1 drives both qubits toward |1>.
    let hamiltonian = two_qubit_hamiltonian();
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let config = OptimizerConfig {
      num_generations: 8,
      population_size: 8,
      ..fast_config()
    };

    let sampler = StatevectorSampler::new("test", 9);
    let outcome = run_hybrid_vqe(&hamiltonian, &ansatz, &sampler, &config).unwrap();

    assert_eq!(outcome.best_bitstring.len(), 2);
    assert!(outcome.objective_value < 0.5);
    assert!(outcome.jobs_executed <= max_evaluations(&config));
    let total: u64 = outcome.final_counts.values().sum();
    assert_eq!(total, config.sampler_shots);
  }

  #[test]
  fn most_probable_breaks_ties_deterministically() {
    let counts = HashMap::from([
      ("01".to_string(), 10u64),
      ("10".to_string(), 10u64),
      ("11".to_string(), 3u64),
    ]);
    assert_eq!(most_probable(&counts).unwrap(), "01");
  }
}
