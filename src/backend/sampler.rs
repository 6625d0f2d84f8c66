//! # Sampler Contract
//!
//! The seam between the hybrid loop and whatever executes circuits. A
//! sampler receives parameter-bound circuits only, never unbound templates,
//! and reports capability through [`QuantumSampler::available`] instead of
//! being probed through optional imports.

use std::collections::HashMap;

use anyhow::Result;

use crate::circuit::BoundCircuit;

/// Measurement-count map keyed by bitstring, character position = qubit.
pub type MeasurementCounts = HashMap<String, u64>;

/// A quantum sampling backend.
pub trait QuantumSampler: Send + Sync {
  /// Backend identifier, matching its discovery descriptor.
  fn name(&self) -> &str;

  /// Whether this backend can currently execute jobs.
  fn available(&self) -> bool;

  /// Execute `circuit` for `shots` repetitions and return the observed
  /// bitstring counts. Errors represent job-level backend failures.
  fn sample(&self, circuit: &BoundCircuit, shots: u64) -> Result<MeasurementCounts>;
}
