//! # Optimization Engine
//!
//! End-to-end orchestration of a dynamic portfolio optimization run:
//! validate, partition, build the QUBO, compile the Hamiltonian, drive the
//! hybrid loop on a resolved backend, then decode the winning bitstring
//! into per-period allocations alongside a classical benchmark.

use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::backend::BackendCatalog;
use crate::backend::SamplerMode;
use crate::backend::sampler::MeasurementCounts;
use crate::circuit::AnsatzCircuit;
use crate::classical::markowitz_benchmark;
use crate::classical::ClassicalBenchmark;
use crate::config::OptimizerConfig;
use crate::data::partition_periods;
use crate::data::PriceHistory;
use crate::encoding::decode_allocations;
use crate::hamiltonian::compile_hamiltonian;
use crate::hybrid::run_hybrid_vqe;
use crate::qubo::build_qubo;

/// Per-period, per-ticker allocation map keyed `time_step_{i}`.
pub type AllocationMap = BTreeMap<String, BTreeMap<String, f64>>;

/// Full result of one optimization run.
#[derive(Clone, Debug, Serialize)]
pub struct OptimizationOutcome {
  /// Decoded allocations per time step and ticker.
  pub allocations: AllocationMap,
  /// Best objective (expectation) value reached by the search.
  pub objective_value: f64,
  /// Quantum sampling jobs executed.
  pub quantum_jobs_executed: usize,
  /// Winning bitstring of the final sampling pass.
  pub solution_bitstring: String,
  /// Final measurement distribution.
  pub measurement_counts: MeasurementCounts,
  /// Backend that executed the run.
  pub backend_name: String,
  /// Width of the encoded problem.
  pub total_qubits: usize,
  /// Whether the quantum loop was bypassed.
  pub test_mode: bool,
  /// QUBO contributions dropped during construction, zero when complete.
  pub skipped_qubo_terms: usize,
  /// Classical Markowitz reference for the same inputs.
  pub classical_benchmark: ClassicalBenchmark,
}

/// Dynamic portfolio optimizer over a fixed backend catalogue.
pub struct OptimizerEngine {
  config: OptimizerConfig,
  catalog: BackendCatalog,
}

impl OptimizerEngine {
  /// Validate the configuration and discover the local backends.
  pub fn new(config: OptimizerConfig, seed: u64) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      catalog: BackendCatalog::discover(seed),
    })
  }

  /// Backend catalogue, for registering additional providers.
  pub fn catalog_mut(&mut self) -> &mut BackendCatalog {
    &mut self.catalog
  }

  /// Run the full hybrid optimization for `history`.
  ///
  /// `requested_backend` is honored when known; unknown names fall back to
  /// automatic selection under `mode`. `previous_allocation` enables the
  /// transaction-cost contribution.
  pub fn optimize(
    &self,
    history: &PriceHistory,
    requested_backend: Option<&str>,
    mode: SamplerMode,
    previous_allocation: Option<&[f64]>,
  ) -> Result<OptimizationOutcome> {
    let num_assets = history.num_assets();
    if num_assets == 0 {
      bail!("price history contains no assets");
    }

    let periods = partition_periods(history, &self.config);
    if periods.is_empty() {
      bail!(
        "insufficient price history: {} days cannot cover any {}-day rebalance window",
        history.num_days(),
        self.config.rebalance_frequency_days
      );
    }
    let num_periods = periods.len();
    let total_qubits = self.config.total_qubits(num_assets, num_periods);

    info!(
      num_assets,
      num_periods, total_qubits, test_mode = self.config.test_mode,
      "starting dynamic portfolio optimization"
    );

    let (qubo, report) = build_qubo(&periods, &self.config, previous_allocation)?;

    if self.config.test_mode {
      return Ok(self.mock_outcome(history, num_periods, total_qubits, report.skipped_terms));
    }

    let hamiltonian = compile_hamiltonian(&qubo);
    let ansatz = AnsatzCircuit::real_amplitudes(total_qubits, self.config.ansatz_reps);

    let backend_name = self
      .catalog
      .resolve(requested_backend, total_qubits, mode)?;
    let sampler = self
      .catalog
      .provider(&backend_name)
      .with_context(|| format!("backend {backend_name} has no sampler provider"))?;

    let outcome = run_hybrid_vqe(&hamiltonian, &ansatz, sampler.as_ref(), &self.config)?;

    let decoded = decode_allocations(
      &outcome.best_bitstring,
      &self.config,
      num_assets,
      num_periods,
    );
    let allocations = label_allocations(&decoded, history.tickers());

    let first = &periods[0];
    let classical_benchmark = markowitz_benchmark(&first.expected_returns(), &first.covariance());

    info!(
      backend = %backend_name,
      jobs = outcome.jobs_executed,
      objective = outcome.objective_value,
      "optimization run complete"
    );

    Ok(OptimizationOutcome {
      allocations,
      objective_value: outcome.objective_value,
      quantum_jobs_executed: outcome.jobs_executed,
      solution_bitstring: outcome.best_bitstring,
      measurement_counts: outcome.final_counts,
      backend_name,
      total_qubits,
      test_mode: false,
      skipped_qubo_terms: report.skipped_terms,
      classical_benchmark,
    })
  }

  /// Deterministic bypass result with the same shape as a real run.
  fn mock_outcome(
    &self,
    history: &PriceHistory,
    num_periods: usize,
    total_qubits: usize,
    skipped_qubo_terms: usize,
  ) -> OptimizationOutcome {
    let num_assets = history.num_assets();
    let equal = 1.0 / num_assets as f64;
    let decoded = vec![vec![equal; num_assets]; num_periods];

    OptimizationOutcome {
      allocations: label_allocations(&decoded, history.tickers()),
      objective_value: -0.5,
      quantum_jobs_executed: 1,
      solution_bitstring: "10".repeat(total_qubits / 2),
      measurement_counts: MeasurementCounts::from([
        ("11".to_string(), 10),
        ("00".to_string(), 5),
      ]),
      backend_name: "test_mode_simulator".to_string(),
      total_qubits,
      test_mode: true,
      skipped_qubo_terms,
      classical_benchmark: ClassicalBenchmark::mock(),
    }
  }
}

fn label_allocations(decoded: &[Vec<f64>], tickers: &[String]) -> AllocationMap {
  decoded
    .iter()
    .enumerate()
    .map(|(period_idx, weights)| {
      let row = tickers
        .iter()
        .zip(weights.iter())
        .map(|(ticker, &w)| (ticker.clone(), w))
        .collect();
      (format!("time_step_{period_idx}"), row)
    })
    .collect()
}
