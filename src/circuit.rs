//! # Variational Ansatz
//!
//! $$
//! |\psi(\theta)\rangle = \Big(\prod_{r} U_{\mathrm{ent}}\,R_y(\theta_r)\Big)|0\rangle
//! $$
//!
//! Hardware-efficient real-amplitudes circuit template: alternating layers
//! of per-qubit Ry rotations and circular CX entanglement, closed by a final
//! rotation layer. Only parameter-bound circuits ever leave this module.

use anyhow::bail;
use anyhow::Result;

/// Gate alphabet of the real-amplitudes template.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gate {
  /// Y-axis rotation by `theta` on `qubit`.
  Ry { qubit: usize, theta: f64 },
  /// Controlled-X with `control` and `target`.
  Cx { control: usize, target: usize },
}

/// Unbound ansatz template: defines the layer structure and parameter count.
#[derive(Clone, Copy, Debug)]
pub struct AnsatzCircuit {
  num_qubits: usize,
  reps: usize,
}

impl AnsatzCircuit {
  /// Real-amplitudes template over `num_qubits` with `reps` entangling
  /// repetitions.
  pub fn real_amplitudes(num_qubits: usize, reps: usize) -> Self {
    Self { num_qubits, reps }
  }

  /// Circuit width.
  pub fn num_qubits(&self) -> usize {
    self.num_qubits
  }

  /// Number of rotation parameters: one Ry per qubit per rotation layer.
  pub fn num_parameters(&self) -> usize {
    self.num_qubits * (self.reps + 1)
  }

  /// Bind a full parameter vector, producing an executable circuit.
  pub fn bind(&self, params: &[f64]) -> Result<BoundCircuit> {
    if params.len() != self.num_parameters() {
      bail!(
        "ansatz expects {} parameters, got {}",
        self.num_parameters(),
        params.len()
      );
    }

    let n = self.num_qubits;
    let mut gates = Vec::with_capacity((self.reps + 1) * n + self.reps * n);
    let mut offset = 0;

    for _ in 0..self.reps {
      for q in 0..n {
        gates.push(Gate::Ry {
          qubit: q,
          theta: params[offset + q],
        });
      }
      offset += n;

      // Circular entanglement couples qubit q to its successor modulo n.
      if n > 1 {
        for q in 0..n {
          gates.push(Gate::Cx {
            control: q,
            target: (q + 1) % n,
          });
        }
      }
    }

    for q in 0..n {
      gates.push(Gate::Ry {
        qubit: q,
        theta: params[offset + q],
      });
    }

    Ok(BoundCircuit {
      num_qubits: n,
      gates,
    })
  }
}

/// Parameter-bound circuit ready for sampling.
#[derive(Clone, Debug)]
pub struct BoundCircuit {
  num_qubits: usize,
  gates: Vec<Gate>,
}

impl BoundCircuit {
  /// Circuit width.
  pub fn num_qubits(&self) -> usize {
    self.num_qubits
  }

  /// Gate sequence in application order.
  pub fn gates(&self) -> &[Gate] {
    &self.gates
  }
}
