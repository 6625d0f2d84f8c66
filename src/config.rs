//! # Optimizer Configuration
//!
//! $$
//! n_q = n_a \times n_p \times n_b
//! $$
//!
//! Validated parameter bundle for a hybrid optimization run.

use anyhow::bail;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;

/// Immutable configuration for one dynamic portfolio optimization run.
///
/// All numeric bounds are enforced by [`OptimizerConfig::validate`], which is
/// called before the optimizer core is entered. `bit_resolution` determines
/// the encoding granularity: `2^bit_resolution - 1` discrete allocation
/// levels per asset per period.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizerConfig {
  /// Number of rebalancing time steps requested (2-12).
  pub num_time_steps: usize,
  /// Rebalance frequency in calendar days (7-90).
  pub rebalance_frequency_days: usize,
  /// Per-asset allocation cap in (0, 1].
  pub max_investment_per_asset: f64,
  /// Bits per allocation variable (1-4).
  pub bit_resolution: u32,
  /// Risk-aversion coefficient, non-negative.
  pub risk_aversion: f64,
  /// Transaction fee rate in [0, 0.1].
  pub transaction_fee: f64,
  /// Penalty coefficient for the budget soft constraint.
  pub restriction_coefficient: f64,
  /// Differential Evolution generation count.
  pub num_generations: usize,
  /// Differential Evolution population size.
  pub population_size: usize,
  /// Differential Evolution recombination (crossover) rate in [0, 1].
  pub recombination: f64,
  /// Shots per cost-function evaluation.
  pub estimator_shots: u64,
  /// Shots for the final sampling pass.
  pub sampler_shots: u64,
  /// Ansatz repetition depth.
  pub ansatz_reps: usize,
  /// Bypass the quantum loop and return a deterministic mock result.
  pub test_mode: bool,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      num_time_steps: 4,
      rebalance_frequency_days: 30,
      max_investment_per_asset: 0.8,
      bit_resolution: 2,
      risk_aversion: 1000.0,
      transaction_fee: 0.01,
      restriction_coefficient: 1.0,
      num_generations: 20,
      population_size: 40,
      recombination: 0.4,
      estimator_shots: 25_000,
      sampler_shots: 100_000,
      ansatz_reps: 3,
      test_mode: false,
    }
  }
}

impl OptimizerConfig {
  /// Reject out-of-range parameter values before any optimization work.
  pub fn validate(&self) -> Result<()> {
    if !(2..=12).contains(&self.num_time_steps) {
      bail!(
        "num_time_steps must be in 2..=12, got {}",
        self.num_time_steps
      );
    }
    if !(7..=90).contains(&self.rebalance_frequency_days) {
      bail!(
        "rebalance_frequency_days must be in 7..=90, got {}",
        self.rebalance_frequency_days
      );
    }
    if !(self.max_investment_per_asset > 0.0 && self.max_investment_per_asset <= 1.0) {
      bail!(
        "max_investment_per_asset must be in (0, 1], got {}",
        self.max_investment_per_asset
      );
    }
    if !(1..=4).contains(&self.bit_resolution) {
      bail!("bit_resolution must be in 1..=4, got {}", self.bit_resolution);
    }
    if self.risk_aversion.is_nan() || self.risk_aversion < 0.0 {
      bail!("risk_aversion must be non-negative, got {}", self.risk_aversion);
    }
    if !(0.0..=0.1).contains(&self.transaction_fee) {
      bail!(
        "transaction_fee must be in 0.0..=0.1, got {}",
        self.transaction_fee
      );
    }
    if !(0.0..=1.0).contains(&self.recombination) {
      bail!(
        "recombination must be in 0.0..=1.0, got {}",
        self.recombination
      );
    }
    if self.num_generations == 0 || self.population_size == 0 {
      bail!("num_generations and population_size must be positive");
    }
    if self.estimator_shots == 0 || self.sampler_shots == 0 {
      bail!("shot counts must be positive");
    }

    Ok(())
  }

  /// Number of discrete allocation levels per asset per period.
  pub fn allocation_levels(&self) -> u64 {
    (1u64 << self.bit_resolution) - 1
  }

  /// Total qubits for `num_assets` assets over `num_periods` periods.
  pub fn total_qubits(&self, num_assets: usize, num_periods: usize) -> usize {
    num_assets * num_periods * self.bit_resolution as usize
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    assert!(OptimizerConfig::default().validate().is_ok());
  }

  #[test]
  fn rejects_out_of_range_periods() {
    let config = OptimizerConfig {
      num_time_steps: 1,
      ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = OptimizerConfig {
      num_time_steps: 13,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn rejects_bad_bit_resolution_and_fee() {
    let config = OptimizerConfig {
      bit_resolution: 0,
      ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = OptimizerConfig {
      bit_resolution: 5,
      ..Default::default()
    };
    assert!(config.validate().is_err());

    let config = OptimizerConfig {
      transaction_fee: 0.2,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn qubit_accounting() {
    let config = OptimizerConfig {
      bit_resolution: 2,
      ..Default::default()
    };
    assert_eq!(config.allocation_levels(), 3);
    assert_eq!(config.total_qubits(3, 4), 24);
  }
}
