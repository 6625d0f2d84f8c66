//! # Quantum Backends
//!
//! $$
//! \text{circuit} \times \text{shots} \to \{\,\text{bitstring} \mapsto \text{count}\,\}
//! $$
//!
//! Sampling abstraction, a local statevector simulator, and the backend
//! discovery/selection catalogue.

pub mod discovery;
pub mod sampler;
pub mod simulator;

pub use discovery::BackendCatalog;
pub use discovery::BackendDescriptor;
pub use discovery::BackendKind;
pub use discovery::BackendStatus;
pub use discovery::SamplerMode;
pub use sampler::QuantumSampler;
pub use simulator::StatevectorSampler;
