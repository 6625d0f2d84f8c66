//! # QUBO Construction
//!
//! $$
//! O = -F + \gamma R + C + \rho P
//! $$
//!
//! Assembles the multi-objective cost function over the bit-encoded
//! allocation variables: expected return, risk, transaction cost and the
//! budget soft-constraint penalty. Contributions are strictly additive and
//! the quadratic matrix stays symmetric throughout.

use anyhow::bail;
use anyhow::Result;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use crate::config::OptimizerConfig;
use crate::data::PricePeriod;
use crate::encoding::bit_weight;
use crate::encoding::qubit_index;

/// Scalar objective `x^T Q x + L^T x` over binary variables.
///
/// Mutated only during construction; immutable once handed to the
/// Hamiltonian compiler.
#[derive(Clone, Debug)]
pub struct QuboModel {
  /// Linear coefficient vector of length `num_qubits`.
  pub linear: Array1<f64>,
  /// Symmetric quadratic coefficient matrix.
  pub quadratic: Array2<f64>,
  /// Total encoded variables.
  pub num_qubits: usize,
}

/// Completeness report for a QUBO build.
///
/// Out-of-range coefficient writes are skipped with a warning instead of
/// aborting; the skip count is surfaced here so callers can assert
/// completeness instead of inspecting logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuboBuildReport {
  /// Number of individual contributions dropped due to index overflow.
  pub skipped_terms: usize,
}

impl QuboBuildReport {
  /// True when every contribution landed in the coefficient arrays.
  pub fn is_complete(&self) -> bool {
    self.skipped_terms == 0
  }
}

/// Build the QUBO for a multi-period optimization run.
///
/// `previous_allocation` enables the transaction-cost contribution for
/// periods after the first. Fails hard when no periods are supplied; an
/// index mismatch between period data and the encoded space is degraded to
/// skipped terms recorded in the report.
pub fn build_qubo(
  periods: &[PricePeriod],
  config: &OptimizerConfig,
  previous_allocation: Option<&[f64]>,
) -> Result<(QuboModel, QuboBuildReport)> {
  let Some(first) = periods.first() else {
    bail!("no price periods supplied, cannot build QUBO");
  };
  let num_assets = first.num_assets();
  if num_assets == 0 {
    bail!("price periods contain no assets");
  }

  let num_periods = periods.len();
  let num_qubits = config.total_qubits(num_assets, num_periods);

  debug!(
    num_assets,
    num_periods, num_qubits, "building dynamic QUBO"
  );

  let mut model = QuboModel {
    linear: Array1::zeros(num_qubits),
    quadratic: Array2::zeros((num_qubits, num_qubits)),
    num_qubits,
  };
  let mut report = QuboBuildReport::default();

  add_return_terms(&mut model, &mut report, periods, config);
  add_risk_terms(&mut model, &mut report, periods, config);
  add_transaction_terms(&mut model, &mut report, config, num_periods, previous_allocation);
  add_penalty_terms(&mut model, &mut report, config, num_periods, num_assets);

  debug!(
    skipped = report.skipped_terms,
    "QUBO construction complete"
  );

  Ok((model, report))
}

/// Guarded linear accumulation; out-of-range writes are counted, not fatal.
fn add_linear(model: &mut QuboModel, report: &mut QuboBuildReport, qubit: usize, value: f64) {
  if qubit >= model.num_qubits {
    warn!(qubit, num_qubits = model.num_qubits, "qubit index out of bounds, term skipped");
    report.skipped_terms += 1;
    return;
  }
  model.linear[qubit] += value;
}

fn add_quadratic(
  model: &mut QuboModel,
  report: &mut QuboBuildReport,
  qubit_i: usize,
  qubit_j: usize,
  value: f64,
) {
  if qubit_i >= model.num_qubits || qubit_j >= model.num_qubits {
    warn!(
      qubit_i,
      qubit_j,
      num_qubits = model.num_qubits,
      "qubit pair out of bounds, term skipped"
    );
    report.skipped_terms += 1;
    return;
  }
  model.quadratic[[qubit_i, qubit_j]] += value;
}

/// Return maximization: subtract expected returns so minimization of the
/// objective maximizes portfolio return.
fn add_return_terms(
  model: &mut QuboModel,
  report: &mut QuboBuildReport,
  periods: &[PricePeriod],
  config: &OptimizerConfig,
) {
  let num_periods = periods.len();

  for period in periods {
    let mu = period.expected_returns();
    for asset_idx in 0..period.num_assets() {
      let Some(&mu_a) = mu.get(asset_idx) else {
        warn!(asset_idx, "expected-return index out of bounds, term skipped");
        report.skipped_terms += 1;
        continue;
      };

      for bit_idx in 0..config.bit_resolution as usize {
        let qubit = qubit_index(asset_idx, period.index(), bit_idx, config, num_periods);
        add_linear(model, report, qubit, -mu_a * bit_weight(bit_idx, config));
      }
    }
  }
}

/// Risk minimization: covariance terms within each period, scaled by the
/// risk-aversion coefficient. Same-qubit self-terms accumulate linearly;
/// cross terms split evenly across the two symmetric quadratic entries.
fn add_risk_terms(
  model: &mut QuboModel,
  report: &mut QuboBuildReport,
  periods: &[PricePeriod],
  config: &OptimizerConfig,
) {
  let num_periods = periods.len();
  let bits = config.bit_resolution as usize;

  for period in periods {
    let cov = period.covariance();
    let num_assets = period.num_assets();

    for i in 0..num_assets {
      for j in 0..num_assets {
        let Some(&cov_ij) = cov.get([i, j]) else {
          warn!(i, j, "covariance index out of bounds, term skipped");
          report.skipped_terms += 1;
          continue;
        };

        for bit_i in 0..bits {
          for bit_j in 0..bits {
            let qubit_i = qubit_index(i, period.index(), bit_i, config, num_periods);
            let qubit_j = qubit_index(j, period.index(), bit_j, config, num_periods);

            let coeff = config.risk_aversion
              * cov_ij
              * bit_weight(bit_i, config)
              * bit_weight(bit_j, config);

            if qubit_i == qubit_j {
              add_linear(model, report, qubit_i, coeff);
            } else {
              add_quadratic(model, report, qubit_i, qubit_j, coeff / 2.0);
            }
          }
        }
      }
    }
  }
}

/// Transaction cost between consecutive rebalances.
///
/// Linear proxy for the `|current - previous|` cost: each bit of an asset in
/// periods 1..N carries `fee * previous_allocation[asset]`. This is a
/// documented modeling approximation, not a true absolute-value penalty.
fn add_transaction_terms(
  model: &mut QuboModel,
  report: &mut QuboBuildReport,
  config: &OptimizerConfig,
  num_periods: usize,
  previous_allocation: Option<&[f64]>,
) {
  let Some(previous) = previous_allocation else {
    return;
  };
  if num_periods <= 1 {
    return;
  }

  for period_idx in 1..num_periods {
    for (asset_idx, &prev) in previous.iter().enumerate() {
      for bit_idx in 0..config.bit_resolution as usize {
        let qubit = qubit_index(asset_idx, period_idx, bit_idx, config, num_periods);
        add_linear(model, report, qubit, config.transaction_fee * prev);
      }
    }
  }
}

/// Budget soft constraint: quadratic expansion of `(sum(x) - 1)^2` per
/// period, scaled by the restriction coefficient. Self-terms pick up the
/// `-2x` cross term with the constant one.
fn add_penalty_terms(
  model: &mut QuboModel,
  report: &mut QuboBuildReport,
  config: &OptimizerConfig,
  num_periods: usize,
  num_assets: usize,
) {
  let bits = config.bit_resolution as usize;
  let penalty = config.restriction_coefficient;

  for period_idx in 0..num_periods {
    for asset_i in 0..num_assets {
      for asset_j in 0..num_assets {
        for bit_i in 0..bits {
          for bit_j in 0..bits {
            let qubit_i = qubit_index(asset_i, period_idx, bit_i, config, num_periods);
            let qubit_j = qubit_index(asset_j, period_idx, bit_j, config, num_periods);

            let w_i = bit_weight(bit_i, config);
            let w_j = bit_weight(bit_j, config);

            if qubit_i == qubit_j {
              add_linear(model, report, qubit_i, penalty * w_i * (w_i - 2.0));
            } else {
              add_quadratic(model, report, qubit_i, qubit_j, penalty * w_i * w_j / 2.0);
            }
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::data::partition_periods;
  use crate::data::sample_history;
  use approx::assert_relative_eq;

  fn small_config() -> OptimizerConfig {
    OptimizerConfig {
      num_time_steps: 2,
      rebalance_frequency_days: 30,
      bit_resolution: 2,
      risk_aversion: 10.0,
      transaction_fee: 0.01,
      restriction_coefficient: 1.0,
      ..Default::default()
    }
  }

  #[test]
  fn quadratic_matrix_is_symmetric() {
    let config = small_config();
    let history = sample_history(90, 3);
    let periods = partition_periods(&history, &config);
    let (model, report) = build_qubo(&periods, &config, None).unwrap();

    assert!(report.is_complete());
    for i in 0..model.num_qubits {
      for j in 0..model.num_qubits {
        assert_relative_eq!(
          model.quadratic[[i, j]],
          model.quadratic[[j, i]],
          epsilon = 1e-12
        );
      }
    }
  }

  #[test]
  fn qubit_count_matches_encoding() {
    let config = small_config();
    let history = sample_history(90, 3);
    let periods = partition_periods(&history, &config);
    let (model, _) = build_qubo(&periods, &config, None).unwrap();

    assert_eq!(model.num_qubits, config.total_qubits(3, periods.len()));
    assert_eq!(model.linear.len(), model.num_qubits);
    assert_eq!(model.quadratic.dim(), (model.num_qubits, model.num_qubits));
  }

  #[test]
  fn empty_periods_fail_hard() {
    let config = small_config();
    assert!(build_qubo(&[], &config, None).is_err());
  }

  #[test]
  fn transaction_costs_bias_later_periods() {
    let config = small_config();
    let history = sample_history(90, 2);
    let periods = partition_periods(&history, &config);
    assert!(periods.len() > 1);

    let (without, _) = build_qubo(&periods, &config, None).unwrap();
    let previous = vec![0.6, 0.4];
    let (with, _) = build_qubo(&periods, &config, Some(&previous)).unwrap();

    let num_periods = periods.len();
    // Period 0 has no predecessor, its coefficients are untouched.
    for asset in 0..2 {
      for bit in 0..2 {
        let q = qubit_index(asset, 0, bit, &config, num_periods);
        assert_relative_eq!(with.linear[q], without.linear[q], epsilon = 1e-12);
      }
    }

    // Periods >= 1 pick up fee * previous_allocation on every bit.
    for asset in 0..2 {
      for bit in 0..2 {
        let q = qubit_index(asset, 1, bit, &config, num_periods);
        let expected = without.linear[q] + config.transaction_fee * previous[asset];
        assert_relative_eq!(with.linear[q], expected, epsilon = 1e-12);
      }
    }
  }

  #[test]
  fn penalty_terms_expand_the_budget_square() {
    // Single asset, one bit: (w x - 1)^2 contributes w(w - 2) x linearly.
    let config = OptimizerConfig {
      bit_resolution: 1,
      restriction_coefficient: 2.0,
      ..small_config()
    };

    let mut model = QuboModel {
      linear: Array1::zeros(2),
      quadratic: Array2::zeros((2, 2)),
      num_qubits: 2,
    };
    let mut report = QuboBuildReport::default();
    add_penalty_terms(&mut model, &mut report, &config, 2, 1);

    // bit weight is 1.0 at single-bit resolution, so each qubit gets
    // penalty * 1 * (1 - 2) = -2.
    assert_relative_eq!(model.linear[0], -2.0, epsilon = 1e-12);
    assert_relative_eq!(model.linear[1], -2.0, epsilon = 1e-12);
    assert!(report.is_complete());
  }

  #[test]
  fn overflow_writes_are_skipped_and_reported() {
    let mut model = QuboModel {
      linear: Array1::zeros(2),
      quadratic: Array2::zeros((2, 2)),
      num_qubits: 2,
    };
    let mut report = QuboBuildReport::default();

    add_linear(&mut model, &mut report, 5, 1.0);
    add_quadratic(&mut model, &mut report, 0, 9, 1.0);

    assert_eq!(report.skipped_terms, 2);
    assert!(!report.is_complete());
    assert_relative_eq!(model.linear.sum(), 0.0, epsilon = 1e-12);
  }
}
