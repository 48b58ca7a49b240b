//! Render sessions.
//!
//! A [`RenderSession`] binds one constructed compute engine to the controller together
//! with everything needed to pace it: the target sample count, the camera that was last
//! applied, and the timing baseline for metrics. The scheduler owns exactly one session
//! per display surface and swaps it out wholesale on `rebuild`.
//!
//! ## Lifecycle
//!
//! - **`RenderSession::start`**: constructs the engine through an initialized
//!   [`EngineRuntime`] and applies the starting camera.
//! - **`RenderSession::run_pass`**: one timed `advance_pass` followed by readback,
//!   returned as a [`FrameSample`].
//! - **`RenderSession::replace_camera`**: forwards a validated camera and drops the
//!   timing baseline.

use crate::camera::CameraConfiguration;
use crate::engine::{ComputeEngine, EngineRuntime};
use crate::error::{RenderError, RenderResult};
use crate::metrics::{MetricsAggregator, PerformanceMetrics};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

/// Scene construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Image width in pixels
    pub width: u32,
    /// Image width / height
    pub aspect_ratio: f64,
    /// Target sample count; rendering idles once reached
    pub samples_per_pixel: u32,
    /// Bounce/depth limit handed to the engine
    pub max_bounces: u32,
}

impl SessionParams {
    /// Bundle construction parameters.
    pub fn new(width: u32, aspect_ratio: f64, samples_per_pixel: u32, max_bounces: u32) -> Self {
        Self {
            width,
            aspect_ratio,
            samples_per_pixel,
            max_bounces,
        }
    }

    /// Reject parameters no engine can be built from.
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 {
            return Err(RenderError::InvalidSessionParams(
                "width must be greater than 0".into(),
            ));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(RenderError::InvalidSessionParams(format!(
                "aspect_ratio must be a positive number, got {}",
                self.aspect_ratio
            )));
        }
        if crate::camera::pixel_count(self.width, self.aspect_ratio).is_none() {
            return Err(RenderError::InvalidSessionParams(format!(
                "{}x{} image exceeds {} pixels",
                self.width,
                self.image_height(),
                crate::camera::MAX_IMAGE_PIXELS
            )));
        }
        if self.samples_per_pixel == 0 {
            return Err(RenderError::InvalidSessionParams(
                "samples_per_pixel must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Image height these parameters produce.
    pub fn image_height(&self) -> u32 {
        crate::camera::image_height(self.width, self.aspect_ratio)
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        let camera = CameraConfiguration::default();
        Self::new(camera.width, camera.aspect_ratio, 100, 50)
    }
}

/// Result of one sampling pass, consumed by metrics and presentation.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Wall-clock cost of `advance_pass`
    pub elapsed: Duration,
    /// Engine sample count after the pass
    pub sample_index: u32,
    /// Image width at readback
    pub width: u32,
    /// Image height at readback
    pub height: u32,
    /// RGBA8 pixels, row-major
    pub pixels: Vec<u8>,
}

/// Live binding of one compute engine to the controller.
pub struct RenderSession {
    id: Uuid,
    params: SessionParams,
    camera: CameraConfiguration,
    engine: Box<dyn ComputeEngine>,
    metrics: MetricsAggregator,
    passes: u64,
}

impl RenderSession {
    /// Construct an engine and point it at `base_camera`.
    ///
    /// The camera's width and aspect ratio are taken from `params`; the remaining
    /// fields come from `base_camera`.
    pub fn start(
        runtime: &EngineRuntime,
        params: SessionParams,
        base_camera: &CameraConfiguration,
    ) -> RenderResult<Self> {
        params.validate()?;
        let camera = CameraConfiguration {
            width: params.width,
            aspect_ratio: params.aspect_ratio,
            ..base_camera.clone()
        };
        camera.validate()?;

        let mut engine = runtime.construct(&params)?;
        engine.replace_camera(&camera);

        let session = Self {
            id: Uuid::new_v4(),
            params,
            camera,
            engine,
            metrics: MetricsAggregator::new(),
            passes: 0,
        };
        info!(
            session = %session.id,
            width = session.engine.image_width(),
            height = session.engine.image_height(),
            target = session.params.samples_per_pixel,
            "Render session started"
        );
        Ok(session)
    }

    /// Run one timed pass and read the result back.
    ///
    /// # Errors
    ///
    /// `PassAborted` if the engine panicked during the pass.
    pub fn run_pass(&mut self) -> RenderResult<FrameSample> {
        let started = Instant::now();
        let engine = &mut self.engine;
        panic::catch_unwind(AssertUnwindSafe(|| engine.advance_pass())).map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "engine panicked".to_string());
            RenderError::PassAborted(reason)
        })?;
        let elapsed = started.elapsed();

        self.metrics.record(elapsed);
        self.passes += 1;

        let sample = FrameSample {
            elapsed,
            sample_index: self.engine.current_sample_count(),
            width: self.engine.image_width(),
            height: self.engine.image_height(),
            pixels: self.engine.read_pixel_buffer(),
        };
        self.metrics
            .update(sample.sample_index, sample.width, sample.height);
        Ok(sample)
    }

    /// Forward an already validated camera and restart accumulation.
    pub fn replace_camera(&mut self, camera: CameraConfiguration) {
        self.engine.replace_camera(&camera);
        self.params.width = camera.width;
        self.params.aspect_ratio = camera.aspect_ratio;
        self.camera = camera;
        self.metrics.reset();
    }

    /// Whether the target sample count has been reached.
    pub fn is_complete(&self) -> bool {
        self.engine.current_sample_count() >= self.params.samples_per_pixel
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Construction parameters (width/aspect follow the applied camera).
    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Last applied camera.
    pub fn camera(&self) -> &CameraConfiguration {
        &self.camera
    }

    /// Engine sample count.
    pub fn sample_count(&self) -> u32 {
        self.engine.current_sample_count()
    }

    /// Current engine dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.engine.image_width(), self.engine.image_height())
    }

    /// Passes issued since the session started.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Cumulative compute time since the last camera change.
    pub fn elapsed(&self) -> Duration {
        self.metrics.elapsed()
    }

    /// Latest derived performance figures.
    pub fn performance(&self) -> PerformanceMetrics {
        self.metrics.latest()
    }
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("samples", &self.sample_count())
            .field("passes", &self.passes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineOptions, SimulatedBackend};
    use std::sync::Arc;

    fn runtime() -> Arc<EngineRuntime> {
        EngineRuntime::initialized(
            Arc::new(SimulatedBackend::new()),
            EngineOptions {
                worker_count: 2,
                enable_pooling: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn params_validation() {
        assert!(SessionParams::new(10, 1.0, 1, 0).validate().is_ok());
        assert!(SessionParams::new(0, 1.0, 1, 0).validate().is_err());
        assert!(SessionParams::new(10, 0.0, 1, 0).validate().is_err());
        assert!(SessionParams::new(10, f64::NAN, 1, 0).validate().is_err());
        assert!(SessionParams::new(10, 1.0, 0, 0).validate().is_err());
        assert!(matches!(
            SessionParams::new(u32::MAX, 1.0, 1, 0).validate(),
            Err(RenderError::InvalidSessionParams(_))
        ));
    }

    #[test]
    fn start_uses_params_dimensions() {
        let params = SessionParams::new(1000, 16.0 / 9.0, 10, 12);
        let session =
            RenderSession::start(&runtime(), params, &CameraConfiguration::default()).unwrap();
        assert_eq!(session.dimensions(), (1000, 562));
        assert_eq!(session.camera().width, 1000);
        assert_eq!(session.sample_count(), 0);
        assert!(!session.is_complete());
    }

    #[test]
    fn run_pass_records_time_and_reads_back() {
        let params = SessionParams::new(40, 2.0, 2, 4);
        let mut session =
            RenderSession::start(&runtime(), params, &CameraConfiguration::default()).unwrap();

        let frame = session.run_pass().unwrap();
        assert_eq!(frame.sample_index, 1);
        assert_eq!((frame.width, frame.height), (40, 20));
        assert_eq!(frame.pixels.len(), 40 * 20 * 4);
        assert_eq!(session.elapsed(), frame.elapsed);

        session.run_pass().unwrap();
        assert!(session.is_complete());
        assert_eq!(session.passes(), 2);
    }

    #[test]
    fn replace_camera_resets_count_and_elapsed() {
        let params = SessionParams::new(40, 2.0, 5, 4);
        let mut session =
            RenderSession::start(&runtime(), params, &CameraConfiguration::default()).unwrap();
        session.run_pass().unwrap();

        let camera = CameraConfiguration {
            width: 30,
            aspect_ratio: 1.5,
            ..session.camera().clone()
        };
        session.replace_camera(camera);
        assert_eq!(session.sample_count(), 0);
        assert_eq!(session.elapsed(), Duration::ZERO);
        assert_eq!(session.dimensions(), (30, 20));
        assert_eq!(session.params().width, 30);

        session.run_pass().unwrap();
        assert_eq!(session.sample_count(), 1);
    }

    #[test]
    fn start_requires_initialized_runtime() {
        let runtime = EngineRuntime::new(Arc::new(SimulatedBackend::new()));
        let result = RenderSession::start(
            &runtime,
            SessionParams::default(),
            &CameraConfiguration::default(),
        );
        assert!(matches!(result, Err(RenderError::EngineNotInitialized)));
    }
}
