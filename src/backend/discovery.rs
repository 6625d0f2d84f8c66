//! # Backend Discovery
//!
//! $$
//! \mathrm{score}(b) = s_{\mathrm{status}} + s_{\mathrm{kind}}
//!   - 1000\,\epsilon_g - 100\,\epsilon_r - 2\,q - 0.1\,\bar t + \min(\Delta n, 10)
//! $$
//!
//! Catalogue of known sampling backends with a scoring heuristic for
//! automatic selection and a warn-and-fall-back policy for unknown names.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::backend::sampler::QuantumSampler;
use crate::backend::simulator::StatevectorSampler;

/// Simulator or physical hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
  /// Local or cloud simulator.
  Simulator,
  /// Physical quantum hardware.
  Hardware,
}

/// Operational status reported at discovery time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendStatus {
  Available,
  Busy,
  Maintenance,
  Offline,
}

/// Execution-mode preference, threaded explicitly through the optimizer
/// entry call rather than held in process-wide state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerMode {
  /// Prefer simulators during selection.
  Simulator,
  /// Prefer hardware during selection.
  Hardware,
}

/// Capability descriptor for one backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendDescriptor {
  /// Backend identifier.
  pub name: String,
  /// Simulator or hardware.
  pub kind: BackendKind,
  /// Qubit capacity.
  pub num_qubits: usize,
  /// Operational status.
  pub status: BackendStatus,
  /// Jobs currently queued.
  pub queue_length: usize,
  /// Average queue time in minutes.
  pub avg_queue_time_min: f64,
  /// Mean gate error rate.
  pub gate_error_rate: f64,
  /// Mean readout error rate.
  pub readout_error_rate: f64,
  /// Maximum shots per job.
  pub max_shots: u64,
}

/// Discovered backends and their sampler providers.
pub struct BackendCatalog {
  descriptors: BTreeMap<String, BackendDescriptor>,
  providers: BTreeMap<String, Arc<dyn QuantumSampler>>,
}

impl BackendCatalog {
  /// Discover the built-in local simulators.
  ///
  /// A perfect statevector simulator and a noisy variant are always
  /// registered; hardware descriptors arrive via [`BackendCatalog::register`].
  pub fn discover(seed: u64) -> Self {
    let mut catalog = Self {
      descriptors: BTreeMap::new(),
      providers: BTreeMap::new(),
    };

    catalog.register(
      BackendDescriptor {
        name: "local_statevector".to_string(),
        kind: BackendKind::Simulator,
        num_qubits: 24,
        status: BackendStatus::Available,
        queue_length: 0,
        avg_queue_time_min: 0.0,
        gate_error_rate: 0.0,
        readout_error_rate: 0.0,
        max_shots: 1_000_000,
      },
      Arc::new(StatevectorSampler::new("local_statevector", seed)),
    );

    catalog.register(
      BackendDescriptor {
        name: "local_statevector_noisy".to_string(),
        kind: BackendKind::Simulator,
        num_qubits: 24,
        status: BackendStatus::Available,
        queue_length: 0,
        avg_queue_time_min: 0.0,
        gate_error_rate: 0.001,
        readout_error_rate: 0.02,
        max_shots: 1_000_000,
      },
      Arc::new(StatevectorSampler::with_readout_error(
        "local_statevector_noisy",
        seed,
        0.02,
      )),
    );

    info!(backends = catalog.descriptors.len(), "discovered quantum backends");
    catalog
  }

  /// Register a backend descriptor together with its sampler provider.
  pub fn register(&mut self, descriptor: BackendDescriptor, provider: Arc<dyn QuantumSampler>) {
    self.providers.insert(descriptor.name.clone(), provider);
    self.descriptors.insert(descriptor.name.clone(), descriptor);
  }

  /// Look up a descriptor by name.
  pub fn get(&self, name: &str) -> Option<&BackendDescriptor> {
    self.descriptors.get(name)
  }

  /// All registered descriptors.
  pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
    self.descriptors.values()
  }

  /// Sampler provider for a registered backend.
  pub fn provider(&self, name: &str) -> Option<Arc<dyn QuantumSampler>> {
    self.providers.get(name).cloned()
  }

  /// Pick the best usable backend for `min_qubits` under `mode`.
  pub fn select_best(&self, min_qubits: usize, mode: SamplerMode) -> Option<String> {
    let candidates: Vec<&BackendDescriptor> = self
      .descriptors
      .values()
      .filter(|d| d.num_qubits >= min_qubits)
      .filter(|d| matches!(d.status, BackendStatus::Available | BackendStatus::Busy))
      .collect();

    if candidates.is_empty() {
      warn!(min_qubits, "no backends available with enough qubits");
      return None;
    }

    let best = candidates
      .into_iter()
      .max_by(|a, b| {
        score_backend(a, min_qubits, mode)
          .partial_cmp(&score_backend(b, min_qubits, mode))
          .unwrap_or(std::cmp::Ordering::Equal)
      })?;

    info!(backend = %best.name, min_qubits, ?mode, "selected quantum backend");
    Some(best.name.clone())
  }

  /// Resolve a possibly-named backend request.
  ///
  /// Unknown names degrade to auto-selection with a warning; running out of
  /// candidates entirely is an error.
  pub fn resolve(
    &self,
    requested: Option<&str>,
    min_qubits: usize,
    mode: SamplerMode,
  ) -> Result<String> {
    if let Some(name) = requested {
      if self.descriptors.contains_key(name) {
        return Ok(name.to_string());
      }
      warn!(backend = name, "requested backend not found, using auto-selection");
    }

    match self.select_best(min_qubits, mode) {
      Some(name) => Ok(name),
      None => bail!("no quantum backend can fit {min_qubits} qubits"),
    }
  }
}

/// Selection heuristic: availability bonus, mode-preference bonus, error and
/// queue penalties, and a capped bonus for spare qubits so selection does
/// not over-provision.
fn score_backend(descriptor: &BackendDescriptor, min_qubits: usize, mode: SamplerMode) -> f64 {
  let mut score = 0.0;

  score += match descriptor.status {
    BackendStatus::Available => 100.0,
    BackendStatus::Busy => 50.0,
    _ => 0.0,
  };

  match (mode, descriptor.kind) {
    (SamplerMode::Hardware, BackendKind::Hardware) => score += 50.0,
    (SamplerMode::Simulator, BackendKind::Simulator) => score += 40.0,
    _ => {}
  }

  score -= descriptor.gate_error_rate * 1000.0;
  score -= descriptor.readout_error_rate * 100.0;
  score -= descriptor.queue_length as f64 * 2.0;
  score -= descriptor.avg_queue_time_min * 0.1;

  let excess = descriptor.num_qubits.saturating_sub(min_qubits);
  score += (excess as f64).min(10.0);

  score
}
