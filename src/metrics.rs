//! Throughput metrics derived from pass timings.
//!
//! Elapsed time only covers `advance_pass` calls, so the figures describe the engine
//! rather than presentation overhead. Everything resets when the camera changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Derived performance figures; `None` until any time has been measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Accumulated samples per second of compute
    pub fps: Option<f64>,
    /// Pixels sampled per second (`width * height * fps`)
    pub throughput: Option<f64>,
}

impl PerformanceMetrics {
    /// Derive fps and pixel throughput from raw counters.
    ///
    /// A zero (or otherwise non-positive) elapsed time yields the "not available"
    /// value rather than NaN or infinity.
    pub fn derive(sample_count: u32, elapsed: Duration, width: u32, height: u32) -> Self {
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return Self::default();
        }
        let fps = f64::from(sample_count) / seconds;
        let throughput = f64::from(width) * f64::from(height) * fps;
        Self {
            fps: Some(fps),
            throughput: Some(throughput),
        }
    }

    /// Whether any figure has been measured.
    pub fn is_available(&self) -> bool {
        self.fps.is_some()
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.fps, self.throughput) {
            (Some(fps), Some(throughput)) => {
                write!(f, "{:.1} fps, {:.2} Mpx/s", fps, throughput / 1_000_000.0)
            }
            _ => write!(f, "n/a"),
        }
    }
}

/// Running total of compute time for one camera configuration.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    elapsed: Duration,
    latest: PerformanceMetrics,
}

impl MetricsAggregator {
    /// Fresh aggregator with nothing recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one pass's wall-clock cost.
    pub fn record(&mut self, pass: Duration) {
        self.elapsed += pass;
    }

    /// Recompute the derived figures from the engine's current counters.
    pub fn update(&mut self, sample_count: u32, width: u32, height: u32) -> PerformanceMetrics {
        self.latest = PerformanceMetrics::derive(sample_count, self.elapsed, width, height);
        self.latest
    }

    /// Drop the timing baseline (camera change or new session).
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.latest = PerformanceMetrics::default();
    }

    /// Cumulative compute time since the last reset.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Last derived figures.
    pub fn latest(&self) -> PerformanceMetrics {
        self.latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_elapsed_is_not_available() {
        let metrics = PerformanceMetrics::derive(0, Duration::ZERO, 100, 50);
        assert_eq!(metrics.fps, None);
        assert_eq!(metrics.throughput, None);
        assert!(!metrics.is_available());
        assert_eq!(metrics.to_string(), "n/a");

        // Samples without time still must not divide by zero.
        let metrics = PerformanceMetrics::derive(5, Duration::ZERO, 100, 50);
        assert!(!metrics.is_available());
    }

    #[test]
    fn derives_fps_and_throughput() {
        let metrics = PerformanceMetrics::derive(10, Duration::from_secs(2), 1000, 500);
        assert_eq!(metrics.fps, Some(5.0));
        assert_eq!(metrics.throughput, Some(2_500_000.0));
        assert_eq!(metrics.to_string(), "5.0 fps, 2.50 Mpx/s");
    }

    #[test]
    fn aggregator_accumulates_and_resets() {
        let mut agg = MetricsAggregator::new();
        agg.record(Duration::from_millis(250));
        agg.record(Duration::from_millis(250));
        assert_eq!(agg.elapsed(), Duration::from_millis(500));

        let metrics = agg.update(2, 10, 10);
        assert_eq!(metrics.fps, Some(4.0));
        assert_eq!(agg.latest(), metrics);

        agg.reset();
        assert_eq!(agg.elapsed(), Duration::ZERO);
        assert!(!agg.latest().is_available());
    }
}
