//! # Cost Hamiltonian
//!
//! $$
//! H = \sum_k c_k \prod_{q\in S_k} Z_q
//! $$
//!
//! Compiles QUBO coefficients into a weighted sum of Pauli-Z tensor-product
//! terms. The cost operator is diagonal, so only Z and implicit identity
//! operators appear.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::qubo::QuboModel;

/// Coefficients with magnitude at or below this are dropped at compilation.
const COEFF_THRESHOLD: f64 = 1e-10;

/// One weighted Pauli-Z product term.
///
/// `z_qubits` lists the qubit positions carrying a Z operator, sorted
/// ascending; every other position implicitly carries the identity. An empty
/// list is the identity term.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PauliTerm {
  /// Real coefficient.
  pub coeff: f64,
  /// Qubit positions with a Z operator, sorted ascending.
  pub z_qubits: Vec<usize>,
}

impl PauliTerm {
  /// Single-qubit Z term.
  pub fn z(qubit: usize, coeff: f64) -> Self {
    Self {
      coeff,
      z_qubits: vec![qubit],
    }
  }

  /// Two-qubit ZZ coupling term.
  pub fn zz(q0: usize, q1: usize, coeff: f64) -> Self {
    let mut z_qubits = vec![q0, q1];
    z_qubits.sort_unstable();
    Self { coeff, z_qubits }
  }

  /// Identity term carrying only a constant offset.
  pub fn identity(coeff: f64) -> Self {
    Self {
      coeff,
      z_qubits: Vec::new(),
    }
  }

  /// True when no qubit carries a non-identity operator.
  pub fn is_identity(&self) -> bool {
    self.z_qubits.is_empty()
  }
}

/// Diagonal cost operator as a sum of weighted Pauli-Z products.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostHamiltonian {
  terms: Vec<PauliTerm>,
  num_qubits: usize,
}

impl CostHamiltonian {
  /// All terms.
  pub fn terms(&self) -> &[PauliTerm] {
    &self.terms
  }

  /// Number of terms.
  pub fn num_terms(&self) -> usize {
    self.terms.len()
  }

  /// Width of the encoded variable space.
  pub fn num_qubits(&self) -> usize {
    self.num_qubits
  }
}

/// Compile a QUBO into its cost Hamiltonian.
///
/// One single-qubit Z term per linear coefficient and one ZZ term per
/// upper-triangular quadratic entry, both subject to the magnitude
/// threshold. The result is never empty: a zero-coefficient identity term
/// stands in when nothing qualifies, so downstream expectation evaluation
/// never sees a degenerate empty sum.
pub fn compile_hamiltonian(qubo: &QuboModel) -> CostHamiltonian {
  let n = qubo.num_qubits;
  let mut terms = Vec::new();

  for i in 0..n {
    let coeff = qubo.linear[i];
    if coeff.abs() > COEFF_THRESHOLD {
      terms.push(PauliTerm::z(i, coeff));
    }
  }

  for i in 0..n {
    for j in (i + 1)..n {
      let coeff = qubo.quadratic[[i, j]];
      if coeff.abs() > COEFF_THRESHOLD {
        terms.push(PauliTerm::zz(i, j, coeff));
      }
    }
  }

  if terms.is_empty() {
    terms.push(PauliTerm::identity(0.0));
  }

  debug!(num_terms = terms.len(), num_qubits = n, "compiled cost Hamiltonian");

  CostHamiltonian {
    terms,
    num_qubits: n,
  }
}
