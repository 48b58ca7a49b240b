//! Compute Engine Capabilities
//!
//! The sampling engine is an opaque, externally owned mutable object. Rather than a
//! class hierarchy, the controller talks to it through two small traits:
//!
//! - [`ComputeEngine`]: one constructed scene/camera plus its accumulated samples
//!   (advance, read back, replace camera)
//! - [`EngineBackend`]: the process-wide factory that is initialized once with a
//!   worker-pool size and then constructs engines
//!
//! Any backend (single-threaded, pooled, remote) that satisfies these contracts can be
//! driven by the scheduler unchanged.
//!
//! # Example
//!
//! ```rust,ignore
//! struct RemoteEngine { /* ... */ }
//!
//! impl ComputeEngine for RemoteEngine {
//!     fn advance_pass(&mut self) { /* one round-trip, blocks until done */ }
//!     fn current_sample_count(&self) -> u32 { self.samples }
//!     fn image_width(&self) -> u32 { self.width }
//!     fn image_height(&self) -> u32 { self.height }
//!     fn read_pixel_buffer(&self) -> Vec<u8> { self.last_frame.clone() }
//!     fn replace_camera(&mut self, camera: &CameraConfiguration) { /* ... */ }
//! }
//! ```

use crate::camera::CameraConfiguration;
use crate::error::RenderResult;
use crate::session::SessionParams;
use serde::{Deserialize, Serialize};

/// Capability: progressive sample accumulation for one scene.
///
/// # Contract
/// - `advance_pass` is synchronous and infallible once the backend is initialized;
///   it increases the sample count by a fixed step and updates the pixel buffer
/// - `read_pixel_buffer().len() == image_width() * image_height() * 4` (RGBA,
///   row-major) at all times
/// - `replace_camera` discards every accumulated sample, resizes to the camera's
///   dimensions and restarts accumulation from zero
///
/// # Thread Safety
/// Engines are `Send` so the scheduler can run a pass off the async executor, but
/// they are only ever touched by one owner at a time.
pub trait ComputeEngine: Send {
    /// Run one sampling pass over the whole image.
    fn advance_pass(&mut self);

    /// Samples accumulated per pixel since construction or the last camera replace.
    fn current_sample_count(&self) -> u32;

    /// Current image width in pixels.
    fn image_width(&self) -> u32;

    /// Current image height in pixels.
    fn image_height(&self) -> u32;

    /// Copy of the accumulated image as RGBA8.
    fn read_pixel_buffer(&self) -> Vec<u8>;

    /// Replace the camera wholesale and reset accumulation.
    fn replace_camera(&mut self, camera: &CameraConfiguration);
}

/// Options for the one-time engine initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Worker threads used inside the engine
    pub worker_count: usize,
    /// Whether passes are spread across the worker pool
    pub enable_pooling: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            enable_pooling: true,
        }
    }
}

/// Capability: process-wide engine factory.
///
/// # Contract
/// - `initialize` is called exactly once, before any `construct`
///   (enforced by [`EngineRuntime`](super::EngineRuntime))
/// - `construct` receives already-validated parameters
pub trait EngineBackend: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &str;

    /// One-time startup (worker pool creation and the like).
    fn initialize(&self, options: &EngineOptions) -> RenderResult<()>;

    /// Build an engine for a new scene.
    fn construct(&self, params: &SessionParams) -> RenderResult<Box<dyn ComputeEngine>>;
}
