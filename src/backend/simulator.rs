//! # Statevector Simulator
//!
//! $$
//! p_s = |\langle s|\psi(\theta)\rangle|^2
//! $$
//!
//! Local ideal-amplitude simulation of the real-amplitudes ansatz with
//! multinomial shot sampling and an optional readout-error channel.

use std::sync::Mutex;

use anyhow::bail;
use anyhow::Result;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::backend::sampler::MeasurementCounts;
use crate::backend::sampler::QuantumSampler;
use crate::circuit::BoundCircuit;
use crate::circuit::Gate;

/// Simulation above this width would allocate a prohibitive statevector.
const MAX_SIM_QUBITS: usize = 24;

/// Local statevector sampler.
///
/// Bitstring character position corresponds to qubit index, matching the
/// conventions of the encoder and expectation evaluator. Seeded for
/// reproducible sampling.
pub struct StatevectorSampler {
  name: String,
  readout_error: f64,
  rng: Mutex<StdRng>,
}

impl StatevectorSampler {
  /// Ideal noiseless sampler.
  pub fn new(name: impl Into<String>, seed: u64) -> Self {
    Self {
      name: name.into(),
      readout_error: 0.0,
      rng: Mutex::new(StdRng::seed_from_u64(seed)),
    }
  }

  /// Sampler with a symmetric per-qubit readout flip probability.
  pub fn with_readout_error(name: impl Into<String>, seed: u64, readout_error: f64) -> Self {
    Self {
      name: name.into(),
      readout_error,
      rng: Mutex::new(StdRng::seed_from_u64(seed)),
    }
  }
}

impl QuantumSampler for StatevectorSampler {
  fn name(&self) -> &str {
    &self.name
  }

  fn available(&self) -> bool {
    true
  }

  fn sample(&self, circuit: &BoundCircuit, shots: u64) -> Result<MeasurementCounts> {
    let n = circuit.num_qubits();
    if n == 0 {
      bail!("cannot sample a zero-qubit circuit");
    }
    if n > MAX_SIM_QUBITS {
      bail!("circuit width {n} exceeds simulator limit of {MAX_SIM_QUBITS} qubits");
    }
    if shots == 0 {
      bail!("shot count must be positive");
    }

    let state = run_statevector(circuit);
    let cumulative = cumulative_probabilities(&state);

    let mut rng = self
      .rng
      .lock()
      .map_err(|_| anyhow::anyhow!("simulator rng lock poisoned"))?;

    let mut counts = MeasurementCounts::new();
    for _ in 0..shots {
      let u: f64 = rng.gen();
      let index = cumulative.partition_point(|&c| c < u).min(state.len() - 1);
      let bitstring = format_bitstring(apply_readout_noise(index, n, self.readout_error, &mut rng), n);
      *counts.entry(bitstring).or_insert(0) += 1;
    }

    Ok(counts)
  }
}

/// Apply the bound gate sequence to `|0...0>`.
fn run_statevector(circuit: &BoundCircuit) -> Vec<Complex64> {
  let n = circuit.num_qubits();
  let dim = 1usize << n;
  let mut state = vec![Complex64::new(0.0, 0.0); dim];
  state[0] = Complex64::new(1.0, 0.0);

  for gate in circuit.gates() {
    match *gate {
      Gate::Ry { qubit, theta } => {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..dim {
          if (i >> qubit) & 1 == 0 {
            let j = i | (1 << qubit);
            let a = state[i];
            let b = state[j];
            state[i] = a * c - b * s;
            state[j] = a * s + b * c;
          }
        }
      }
      Gate::Cx { control, target } => {
        for i in 0..dim {
          if (i >> control) & 1 == 1 && (i >> target) & 1 == 0 {
            let j = i | (1 << target);
            state.swap(i, j);
          }
        }
      }
    }
  }

  state
}

fn cumulative_probabilities(state: &[Complex64]) -> Vec<f64> {
  let mut acc = 0.0;
  let mut cumulative = Vec::with_capacity(state.len());
  for amp in state {
    acc += amp.norm_sqr();
    cumulative.push(acc);
  }
  // Guard the tail against float drift so partition_point stays in range.
  if let Some(last) = cumulative.last_mut() {
    *last = last.max(1.0);
  }
  cumulative
}

fn apply_readout_noise(index: usize, n: usize, error: f64, rng: &mut StdRng) -> usize {
  if error <= 0.0 {
    return index;
  }

  let mut noisy = index;
  for q in 0..n {
    if rng.gen::<f64>() < error {
      noisy ^= 1 << q;
    }
  }
  noisy
}

/// Qubit `q` maps to character position `q`.
fn format_bitstring(index: usize, n: usize) -> String {
  (0..n)
    .map(|q| if (index >> q) & 1 == 1 { '1' } else { '0' })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::circuit::AnsatzCircuit;

  #[test]
  fn zero_rotations_always_measure_all_zeros() {
    let ansatz = AnsatzCircuit::real_amplitudes(3, 1);
    let circuit = ansatz.bind(&[0.0; 6]).unwrap();
    let sampler = StatevectorSampler::new("test", 7);

    let counts = sampler.sample(&circuit, 500).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("000"), Some(&500));
  }

  #[test]
  fn pi_rotation_flips_a_single_qubit() {
    // One qubit, no reps: Ry(pi)|0> = |1> up to phase.
    let ansatz = AnsatzCircuit::real_amplitudes(1, 0);
    let circuit = ansatz.bind(&[std::f64::consts::PI]).unwrap();
    let sampler = StatevectorSampler::new("test", 7);

    let counts = sampler.sample(&circuit, 200).unwrap();
    assert_eq!(counts.get("1"), Some(&200));
  }

  #[test]
  fn sampling_is_reproducible_per_seed() {
    let ansatz = AnsatzCircuit::real_amplitudes(2, 1);
    let params = [0.3, 1.2, 0.7, 2.1];
    let circuit = ansatz.bind(&params).unwrap();

    let a = StatevectorSampler::new("a", 11)
      .sample(&circuit, 1000)
      .unwrap();
    let b = StatevectorSampler::new("b", 11)
      .sample(&circuit, 1000)
      .unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn counts_sum_to_shots() {
    let ansatz = AnsatzCircuit::real_amplitudes(2, 2);
    let params = [0.4, 0.9, 1.5, 0.2, 0.8, 1.1];
    let circuit = ansatz.bind(&params).unwrap();
    let sampler = StatevectorSampler::new("test", 3);

    let counts = sampler.sample(&circuit, 4096).unwrap();
    let total: u64 = counts.values().sum();
    assert_eq!(total, 4096);
  }

  #[test]
  fn rejects_oversized_circuits() {
    let ansatz = AnsatzCircuit::real_amplitudes(30, 0);
    let circuit = ansatz.bind(&vec![0.0; 30]).unwrap();
    let sampler = StatevectorSampler::new("test", 1);
    assert!(sampler.sample(&circuit, 10).is_err());
  }

  #[test]
  fn readout_noise_spreads_the_distribution() {
    let ansatz = AnsatzCircuit::real_amplitudes(2, 0);
    let circuit = ansatz.bind(&[0.0, 0.0]).unwrap();
    let sampler = StatevectorSampler::with_readout_error("noisy", 5, 0.25);

    let counts = sampler.sample(&circuit, 2000).unwrap();
    // With 25% flip probability per qubit, more than one outcome shows up.
    assert!(counts.len() > 1);
  }
}
