//! Configuration loading using Figment
//!
//! Strongly-typed settings for the render controller, loaded from:
//! 1. `config/render.toml` (optional; every section has defaults)
//! 2. Environment variables prefixed with `PROGRESSIVE_RENDER_`, nested with `__`
//!
//! # Example
//! ```no_run
//! use progressive_render::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("Target samples: {}", config.session.samples_per_pixel);
//! # Ok::<(), progressive_render::error::RenderError>(())
//! ```
//!
//! Override a nested value from the shell:
//! `PROGRESSIVE_RENDER_SCHEDULER__IDLE_POLL_MS=500`.

use crate::camera::CameraConfiguration;
use crate::engine::EngineOptions;
use crate::error::{RenderError, RenderResult};
use crate::scheduler::{SchedulerConfig, YieldStrategy};
use crate::session::SessionParams;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/render.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PROGRESSIVE_RENDER_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Compute engine startup
    pub engine: EngineConfig,
    /// Scene construction
    pub session: SessionConfig,
    /// Starting camera
    pub camera: CameraConfiguration,
    /// Render loop pacing
    pub scheduler: SchedulerSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "progressive-render".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// Engine initialization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads (0 = one per available core)
    pub worker_count: usize,
    /// Spread passes over the worker pool
    pub enable_pooling: bool,
    /// Artificial per-pass delay for the simulated backend
    pub simulated_pass_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            enable_pooling: true,
            simulated_pass_delay_ms: 0,
        }
    }
}

/// Scene construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target sample count
    pub samples_per_pixel: u32,
    /// Bounce/depth limit
    pub max_bounces: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: default_samples_per_pixel(),
            max_bounces: default_max_bounces(),
        }
    }
}

/// Render loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Idle re-check interval in milliseconds (1..=10000)
    pub idle_poll_ms: u64,
    /// Between-pass suspension: "task" or "sleep"
    pub yield_mode: String,
    /// Sleep length for `yield_mode = "sleep"`
    pub yield_interval_ms: u64,
    /// Command channel capacity
    pub command_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            idle_poll_ms: 2000,
            yield_mode: "task".to_string(),
            yield_interval_ms: 16,
            command_capacity: 32,
        }
    }
}

// Default value functions
fn default_samples_per_pixel() -> u32 {
    100
}

fn default_max_bounces() -> u32 {
    50
}

impl AppConfig {
    /// Load configuration from `config/render.toml` and environment variables
    pub fn load() -> RenderResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> RenderResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(RenderError::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(RenderError::Validation(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            )));
        }

        if !(1..=10_000).contains(&self.scheduler.idle_poll_ms) {
            return Err(RenderError::Validation(format!(
                "Invalid idle_poll_ms {}. Must be 1-10000",
                self.scheduler.idle_poll_ms
            )));
        }

        if !matches!(self.scheduler.yield_mode.as_str(), "task" | "sleep") {
            return Err(RenderError::Validation(format!(
                "Invalid yield_mode '{}'. Must be 'task' or 'sleep'",
                self.scheduler.yield_mode
            )));
        }

        if self.scheduler.command_capacity == 0 {
            return Err(RenderError::Validation(
                "command_capacity must be at least 1".to_string(),
            ));
        }

        self.session_params()
            .validate()
            .map_err(|e| RenderError::Validation(e.to_string()))?;
        self.camera
            .validate()
            .map_err(|e| RenderError::Validation(e.to_string()))?;

        Ok(())
    }

    /// Engine initialization options
    pub fn engine_options(&self) -> EngineOptions {
        let defaults = EngineOptions::default();
        EngineOptions {
            worker_count: if self.engine.worker_count == 0 {
                defaults.worker_count
            } else {
                self.engine.worker_count
            },
            enable_pooling: self.engine.enable_pooling,
        }
    }

    /// Scene parameters; width and aspect come from the starting camera
    pub fn session_params(&self) -> SessionParams {
        SessionParams::new(
            self.camera.width,
            self.camera.aspect_ratio,
            self.session.samples_per_pixel,
            self.session.max_bounces,
        )
    }

    /// Render loop pacing
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let yield_strategy = match self.scheduler.yield_mode.as_str() {
            "sleep" => YieldStrategy::Sleep(Duration::from_millis(self.scheduler.yield_interval_ms)),
            _ => YieldStrategy::TaskYield,
        };
        SchedulerConfig {
            idle_poll: Duration::from_millis(self.scheduler.idle_poll_ms),
            yield_strategy,
            command_capacity: self.scheduler.command_capacity,
        }
    }

    /// Artificial per-pass delay for the simulated backend
    pub fn simulated_pass_delay(&self) -> Duration {
        Duration::from_millis(self.engine.simulated_pass_delay_ms)
    }

    /// Effective configuration as TOML, in the same layout `load_from` reads
    pub fn to_toml(&self) -> RenderResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RenderError::Validation(format!("Failed to serialize configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.session.samples_per_pixel, 100);
        assert_eq!(config.session.max_bounces, 50);
        assert_eq!(config.camera, CameraConfiguration::default());
        assert_eq!(config.scheduler_config().idle_poll, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[session]
samples_per_pixel = 10

[camera]
width = 1000
vfov = 35.0

[scheduler]
yield_mode = "sleep"
yield_interval_ms = 5
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.session.samples_per_pixel, 10);
        assert_eq!(config.session.max_bounces, 50);
        assert_eq!(config.camera.width, 1000);
        assert_eq!(config.camera.vfov, 35.0);
        assert_eq!(config.camera.lookfrom, [13.0, 2.0, 3.0]);
        assert_eq!(
            config.scheduler_config().yield_strategy,
            YieldStrategy::Sleep(Duration::from_millis(5))
        );
        assert_eq!(config.session_params().image_height(), 562);
    }

    #[test]
    fn validation_rejects_out_of_domain_values() {
        let mut config = AppConfig::default();
        config.scheduler.idle_poll_ms = 20_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.session.samples_per_pixel = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.focus_dist = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_config_round_trips_through_toml() {
        let mut config = AppConfig::default();
        config.session.samples_per_pixel = 12;
        config.camera.width = 640;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", config.to_toml().unwrap()).unwrap();

        let loaded = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(loaded.session.samples_per_pixel, 12);
        assert_eq!(loaded.camera.width, 640);
        assert_eq!(loaded.scheduler, config.scheduler);
    }

    #[test]
    fn zero_workers_means_available_parallelism() {
        let config = AppConfig::default();
        assert!(config.engine_options().worker_count >= 1);

        let mut config = AppConfig::default();
        config.engine.worker_count = 3;
        assert_eq!(config.engine_options().worker_count, 3);
    }
}
