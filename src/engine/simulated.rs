//! Simulated compute engine.
//!
//! Stands in for the external path tracer. The scene is empty, so every camera ray
//! escapes and picks up the background sky gradient; the camera model (field of view,
//! orientation, defocus blur) is the real one. Each pass adds one jittered sample per
//! pixel to a running sum, and readback returns the gamma-corrected average.
//!
//! Output is deterministic for a given seed, with or without the worker pool.

use super::{ComputeEngine, EngineBackend, EngineOptions};
use crate::camera::CameraConfiguration;
use crate::error::{RenderError, RenderResult};
use crate::session::SessionParams;
use glam::{DVec3, Vec3};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DEFAULT_SEED: u64 = 0x5eed_cafe;

/// Backend producing [`SimulatedEngine`]s.
pub struct SimulatedBackend {
    pool: Mutex<Option<Arc<ThreadPool>>>,
    pass_delay: Duration,
    seed: u64,
}

impl SimulatedBackend {
    /// Backend with no artificial pass delay and the default seed.
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(None),
            pass_delay: Duration::ZERO,
            seed: DEFAULT_SEED,
        }
    }

    /// Sleep this long inside every pass, emulating an expensive scene.
    pub fn with_pass_delay(mut self, delay: Duration) -> Self {
        self.pass_delay = delay;
        self
    }

    /// Use a specific jitter seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn initialize(&self, options: &EngineOptions) -> RenderResult<()> {
        if !options.enable_pooling {
            return Ok(());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.worker_count.max(1))
            .thread_name(|i| format!("render-worker-{i}"))
            .build()
            .map_err(|e| RenderError::EngineInit(e.to_string()))?;
        *self.pool.lock() = Some(Arc::new(pool));
        Ok(())
    }

    fn construct(&self, params: &SessionParams) -> RenderResult<Box<dyn ComputeEngine>> {
        let camera = CameraConfiguration {
            width: params.width,
            aspect_ratio: params.aspect_ratio,
            ..CameraConfiguration::default()
        };
        let mut engine = SimulatedEngine::new(&camera, self.pool.lock().clone(), self.seed);
        engine.pass_delay = self.pass_delay;
        Ok(Box::new(engine))
    }
}

/// Precomputed camera frame: pixel grid location plus defocus disk basis.
#[derive(Debug, Clone, Copy)]
struct View {
    center: DVec3,
    pixel00: DVec3,
    delta_u: DVec3,
    delta_v: DVec3,
    defocus_u: DVec3,
    defocus_v: DVec3,
    defocus: bool,
}

impl View {
    fn new(camera: &CameraConfiguration) -> Self {
        let width = f64::from(camera.width);
        let height = f64::from(camera.image_height());
        let center = DVec3::from_array(camera.lookfrom);

        let h = (camera.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * camera.focus_dist;
        let viewport_width = viewport_height * (width / height);

        let w = (center - DVec3::from_array(camera.lookat)).normalize();
        let u = DVec3::from_array(camera.vup).cross(w).normalize();
        let v = w.cross(u);

        let viewport_u = viewport_width * u;
        let viewport_v = viewport_height * -v;
        let delta_u = viewport_u / width;
        let delta_v = viewport_v / height;

        let upper_left = center - camera.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        let pixel00 = upper_left + 0.5 * (delta_u + delta_v);

        let defocus_radius = camera.focus_dist * (camera.defocus_angle / 2.0).to_radians().tan();

        Self {
            center,
            pixel00,
            delta_u,
            delta_v,
            defocus_u: u * defocus_radius,
            defocus_v: v * defocus_radius,
            defocus: camera.defocus_angle > 0.0,
        }
    }

    fn shade<R: Rng>(&self, x: usize, y: usize, rng: &mut R) -> Vec3 {
        let jitter_x: f64 = rng.gen::<f64>() - 0.5;
        let jitter_y: f64 = rng.gen::<f64>() - 0.5;
        let target = self.pixel00
            + (x as f64 + jitter_x) * self.delta_u
            + (y as f64 + jitter_y) * self.delta_v;

        let origin = if self.defocus {
            let (a, b) = random_in_unit_disk(rng);
            self.center + a * self.defocus_u + b * self.defocus_v
        } else {
            self.center
        };

        let direction = (target - origin).normalize_or_zero();
        let a = 0.5 * (direction.y + 1.0);
        let color = (1.0 - a) * DVec3::ONE + a * DVec3::new(0.5, 0.7, 1.0);
        color.as_vec3()
    }
}

fn random_in_unit_disk<R: Rng>(rng: &mut R) -> (f64, f64) {
    loop {
        let a = rng.gen_range(-1.0..1.0);
        let b = rng.gen_range(-1.0..1.0);
        if a * a + b * b < 1.0 {
            return (a, b);
        }
    }
}

/// Seed for one image row of one pass (splitmix64 finalizer).
fn row_seed(seed: u64, row: usize, sample: u32) -> u64 {
    let mut z = seed ^ ((row as u64) << 32) ^ u64::from(sample);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn render_row(view: &View, seed: u64, sample: u32, y: usize, row: &mut [Vec3]) {
    let mut rng = StdRng::seed_from_u64(row_seed(seed, y, sample));
    for (x, acc) in row.iter_mut().enumerate() {
        *acc += view.shade(x, y, &mut rng);
    }
}

fn to_byte(linear: f32) -> u8 {
    let gamma = linear.max(0.0).sqrt().clamp(0.0, 0.999);
    (255.999 * gamma) as u8
}

/// One scene in the simulated backend.
pub struct SimulatedEngine {
    view: View,
    width: u32,
    height: u32,
    accum: Vec<Vec3>,
    rgba: Vec<u8>,
    sample_count: u32,
    pool: Option<Arc<ThreadPool>>,
    pass_delay: Duration,
    seed: u64,
}

impl SimulatedEngine {
    /// Engine for `camera`, optionally running passes on `pool`.
    pub fn new(camera: &CameraConfiguration, pool: Option<Arc<ThreadPool>>, seed: u64) -> Self {
        let mut engine = Self {
            view: View::new(camera),
            width: 0,
            height: 0,
            accum: Vec::new(),
            rgba: Vec::new(),
            sample_count: 0,
            pool,
            pass_delay: Duration::ZERO,
            seed,
        };
        engine.replace_camera(camera);
        engine
    }

    /// Whether passes run on the shared worker pool.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    fn resolve(&mut self) {
        let scale = 1.0 / self.sample_count.max(1) as f32;
        for (px, sum) in self.rgba.chunks_exact_mut(4).zip(&self.accum) {
            let avg = *sum * scale;
            px[0] = to_byte(avg.x);
            px[1] = to_byte(avg.y);
            px[2] = to_byte(avg.z);
            px[3] = 255;
        }
    }
}

impl ComputeEngine for SimulatedEngine {
    fn advance_pass(&mut self) {
        if !self.pass_delay.is_zero() {
            std::thread::sleep(self.pass_delay);
        }

        let width = self.width as usize;
        let sample = self.sample_count;
        let seed = self.seed;
        let view = &self.view;
        let accum = &mut self.accum;

        match &self.pool {
            Some(pool) => pool.install(|| {
                accum
                    .par_chunks_mut(width)
                    .enumerate()
                    .for_each(|(y, row)| render_row(view, seed, sample, y, row));
            }),
            None => accum
                .chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| render_row(view, seed, sample, y, row)),
        }

        self.sample_count += 1;
        self.resolve();
        debug!(samples = self.sample_count, "Simulated pass complete");
    }

    fn current_sample_count(&self) -> u32 {
        self.sample_count
    }

    fn image_width(&self) -> u32 {
        self.width
    }

    fn image_height(&self) -> u32 {
        self.height
    }

    fn read_pixel_buffer(&self) -> Vec<u8> {
        self.rgba.clone()
    }

    fn replace_camera(&mut self, camera: &CameraConfiguration) {
        self.view = View::new(camera);
        self.width = camera.width;
        self.height = camera.image_height();

        let pixels = self.width as usize * self.height as usize;
        self.accum.clear();
        self.accum.resize(pixels, Vec3::ZERO);
        self.rgba.clear();
        self.rgba.resize(pixels * 4, 0);
        self.sample_count = 0;
    }
}
