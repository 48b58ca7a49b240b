//! Compute engine interface and backends.
//!
//! - [`capabilities`]: the traits the controller consumes
//! - [`runtime`]: one-time initialization lifecycle shared by every session
//! - [`simulated`]: deterministic in-process backend used by the CLI and tests

pub mod capabilities;
pub mod runtime;
pub mod simulated;

pub use capabilities::{ComputeEngine, EngineBackend, EngineOptions};
pub use runtime::{EngineRuntime, EngineState};
pub use simulated::{SimulatedBackend, SimulatedEngine};
