//! # Progressive Render Controller
//!
//! This crate drives an external sampling compute engine (a path/ray tracer) and turns
//! its accumulating image into a live display. It paces sampling passes against the
//! host runtime, reads back and presents partial results, restarts accumulation when
//! the camera is edited mid-render, and derives throughput figures along the way.
//! Organizing it as a library lets the CLI (`main.rs`) and any embedding frontend
//! share one controller.
//!
//! ## Crate Structure
//!
//! - **`camera`**: `CameraConfiguration`, its settings-text round trip and single-field
//!   edits.
//! - **`engine`**: the `ComputeEngine` / `EngineBackend` capability traits, the one-time
//!   initialization lifecycle (`EngineRuntime`) and a simulated backend.
//! - **`session`**: `RenderSession`, one engine bound to the controller, and the
//!   per-pass `FrameSample`.
//! - **`metrics`**: fps and pixel throughput from accumulated pass time.
//! - **`presentation`**: display surfaces and the `PresentationSink` readback contract.
//! - **`reconfigure`**: validated camera replacement.
//! - **`scheduler`**: the render loop actor and its `RenderController` handle.
//! - **`messages`**: commands and status snapshots exchanged with the scheduler.
//! - **`config`**: Figment-based configuration loading.
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: the `RenderError` enum.

pub mod camera;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod messages;
pub mod metrics;
pub mod presentation;
pub mod reconfigure;
pub mod scheduler;
pub mod session;

pub use camera::{CameraConfiguration, FieldEdit};
pub use error::{RenderError, RenderResult};
pub use scheduler::{RenderController, RenderScheduler, SchedulerConfig};
pub use session::{RenderSession, SessionParams};
