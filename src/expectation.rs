//! # Expectation Evaluation
//!
//! $$
//! \langle H\rangle \approx \sum_s p_s \sum_k c_k \prod_{q\in S_k} z_q(s)
//! $$
//!
//! Monte-Carlo estimate of the cost operator's expectation value from a
//! measurement-count distribution. Converges with shot count; no variance
//! reduction or error mitigation is attempted here.

use std::collections::HashMap;

use crate::hamiltonian::CostHamiltonian;

/// Expectation value of `hamiltonian` under the measured distribution.
///
/// Counts are normalized to probabilities. Each bitstring contributes its
/// energy, the coefficient-weighted product of Z eigenvalues (`+1` for bit
/// `0`, `-1` for bit `1`) at the positions each term touches. Character
/// position in the bitstring corresponds to qubit index; missing positions
/// read as `0`.
pub fn expectation_from_counts(
  counts: &HashMap<String, u64>,
  hamiltonian: &CostHamiltonian,
) -> f64 {
  let total_shots: u64 = counts.values().sum();
  if total_shots == 0 {
    return 0.0;
  }

  let mut expectation = 0.0;
  for (bitstring, &count) in counts {
    let probability = count as f64 / total_shots as f64;
    expectation += probability * bitstring_energy(bitstring, hamiltonian);
  }
  expectation
}

fn bitstring_energy(bitstring: &str, hamiltonian: &CostHamiltonian) -> f64 {
  let bits = bitstring.as_bytes();

  let mut energy = 0.0;
  for term in hamiltonian.terms() {
    let mut value = term.coeff;
    for &qubit in &term.z_qubits {
      let eigenvalue = match bits.get(qubit) {
        Some(b'1') => -1.0,
        _ => 1.0,
      };
      value *= eigenvalue;
    }
    energy += value;
  }
  energy
}
