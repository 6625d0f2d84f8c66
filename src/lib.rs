//! # Quantfolio
//!
//! $$
//! \min_{\mathbf x \in \{0,1\}^n}\ \mathbf x^\top Q\,\mathbf x + L^\top\mathbf x
//! $$
//!
//! Hybrid quantum-classical dynamic portfolio optimization. Price history is
//! partitioned into overlapping rebalancing periods, allocations are
//! bit-encoded into a QUBO covering return, risk, transaction cost and a
//! budget penalty, the QUBO is compiled to an Ising cost Hamiltonian, and a
//! Differential Evolution driver tunes a hardware-efficient ansatz whose
//! measurement statistics score each candidate. The most probable bitstring
//! of a final high-shot sampling pass decodes back into per-period
//! allocations, reported next to a classical Markowitz benchmark.

pub mod backend;
pub mod circuit;
pub mod classical;
pub mod config;
pub mod data;
pub mod encoding;
pub mod engine;
pub mod expectation;
pub mod hamiltonian;
pub mod hybrid;
pub mod qubo;

pub use backend::BackendCatalog;
pub use backend::BackendDescriptor;
pub use backend::BackendKind;
pub use backend::BackendStatus;
pub use backend::QuantumSampler;
pub use backend::SamplerMode;
pub use backend::StatevectorSampler;
pub use circuit::AnsatzCircuit;
pub use circuit::BoundCircuit;
pub use classical::ClassicalBenchmark;
pub use config::OptimizerConfig;
pub use data::PriceHistory;
pub use data::PricePeriod;
pub use engine::OptimizationOutcome;
pub use engine::OptimizerEngine;
pub use expectation::expectation_from_counts;
pub use hamiltonian::CostHamiltonian;
pub use hamiltonian::PauliTerm;
pub use hybrid::HybridOutcome;
pub use qubo::QuboBuildReport;
pub use qubo::QuboModel;
