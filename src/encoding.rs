//! # Bit Encoding
//!
//! $$
//! q(a,t,b) = a\,n_p n_b + t\,n_b + b,\qquad
//! w_b = \frac{2^b}{2^{n_b}-1}
//! $$
//!
//! Bijection between (asset, period, bit) triples and the flat qubit index
//! space, plus bitstring decoding back to fractional allocations.
//!
//! The same bijection must be used during QUBO construction and during
//! solution decoding; a mismatch silently produces wrong allocations.

use tracing::warn;

use crate::config::OptimizerConfig;

/// Flat qubit index for an (asset, period, bit) triple.
///
/// Ordering is asset-major: asset 0 exhausts all of its period/bit slots
/// before asset 1 begins. The caller is responsible for passing in-range
/// indices; downstream coefficient writes are bounds-checked defensively.
pub fn qubit_index(
  asset_idx: usize,
  period_idx: usize,
  bit_idx: usize,
  config: &OptimizerConfig,
  num_periods: usize,
) -> usize {
  let bits = config.bit_resolution as usize;
  asset_idx * num_periods * bits + period_idx * bits + bit_idx
}

/// Fractional allocation contributed by `bit_idx` when set.
pub fn bit_weight(bit_idx: usize, config: &OptimizerConfig) -> f64 {
  (1u64 << bit_idx) as f64 / config.allocation_levels() as f64
}

/// Decode a measured bitstring into per-period, per-asset allocations.
///
/// Bits are gathered least-significant-first at the flat indices of the
/// encoding bijection and mapped linearly onto
/// `[0, max_investment_per_asset]`. A bitstring shorter than the encoded
/// space is padded with zeros, which degrades silently rather than failing.
/// Allocations are not renormalized to sum to one; budget adherence is a
/// soft QUBO penalty only.
pub fn decode_allocations(
  bitstring: &str,
  config: &OptimizerConfig,
  num_assets: usize,
  num_periods: usize,
) -> Vec<Vec<f64>> {
  let expected = config.total_qubits(num_assets, num_periods);
  if bitstring.len() < expected {
    warn!(
      got = bitstring.len(),
      expected, "bitstring shorter than encoded space, padding with zeros"
    );
  }

  let bits = bitstring.as_bytes();
  let levels = config.allocation_levels() as f64;
  let mut allocations = Vec::with_capacity(num_periods);

  for period_idx in 0..num_periods {
    let mut period_allocs = Vec::with_capacity(num_assets);
    for asset_idx in 0..num_assets {
      let mut value = 0u64;
      for bit_idx in 0..config.bit_resolution as usize {
        let qubit = qubit_index(asset_idx, period_idx, bit_idx, config, num_periods);
        let bit_set = matches!(bits.get(qubit), Some(b'1'));
        if bit_set {
          value |= 1 << bit_idx;
        }
      }
      period_allocs.push(value as f64 / levels * config.max_investment_per_asset);
    }
    allocations.push(period_allocs);
  }

  allocations
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  fn config(bits: u32) -> OptimizerConfig {
    OptimizerConfig {
      bit_resolution: bits,
      max_investment_per_asset: 0.8,
      ..Default::default()
    }
  }

  #[test]
  fn encoding_is_injective_over_valid_domain() {
    let config = config(2);
    let (num_assets, num_periods) = (3, 4);
    let total = config.total_qubits(num_assets, num_periods);

    let mut seen = vec![false; total];
    for asset in 0..num_assets {
      for period in 0..num_periods {
        for bit in 0..config.bit_resolution as usize {
          let q = qubit_index(asset, period, bit, &config, num_periods);
          assert!(q < total);
          assert!(!seen[q], "index {q} hit twice");
          seen[q] = true;
        }
      }
    }
    assert!(seen.iter().all(|&s| s));
  }

  #[test]
  fn asset_major_ordering() {
    let config = config(2);
    // Asset 0 spans qubits 0..4 over 2 periods before asset 1 begins.
    assert_eq!(qubit_index(0, 0, 0, &config, 2), 0);
    assert_eq!(qubit_index(0, 0, 1, &config, 2), 1);
    assert_eq!(qubit_index(0, 1, 0, &config, 2), 2);
    assert_eq!(qubit_index(1, 0, 0, &config, 2), 4);
  }

  #[test]
  fn decode_round_trips_lsb_first() {
    let config = config(2);
    // One asset, one period: bits "10" mean bit0=1, bit1=0 -> value 1 of 3.
    let allocs = decode_allocations("10", &config, 1, 1);
    assert_relative_eq!(allocs[0][0], 1.0 / 3.0 * 0.8, epsilon = 1e-12);

    // "01" means bit0=0, bit1=1 -> value 2 of 3.
    let allocs = decode_allocations("01", &config, 1, 1);
    assert_relative_eq!(allocs[0][0], 2.0 / 3.0 * 0.8, epsilon = 1e-12);

    // "11" saturates at the per-asset cap.
    let allocs = decode_allocations("11", &config, 1, 1);
    assert_relative_eq!(allocs[0][0], 0.8, epsilon = 1e-12);
  }

  #[test]
  fn short_bitstring_pads_with_zeros() {
    let config = config(2);
    let allocs = decode_allocations("1", &config, 2, 1);
    assert_relative_eq!(allocs[0][0], 1.0 / 3.0 * 0.8, epsilon = 1e-12);
    assert_relative_eq!(allocs[0][1], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn decoded_values_stay_within_cap() {
    let config = config(3);
    let allocs = decode_allocations("111111111111", &config, 2, 2);
    for period in &allocs {
      for &a in period {
        assert!((0.0..=0.8 + 1e-12).contains(&a));
      }
    }
  }

  #[test]
  fn single_bit_resolution_is_binary() {
    let config = config(1);
    let allocs = decode_allocations("10", &config, 2, 1);
    assert_relative_eq!(allocs[0][0], 0.8, epsilon = 1e-12);
    assert_relative_eq!(allocs[0][1], 0.0, epsilon = 1e-12);
  }
}
