//! Message types for talking to the render scheduler.
//!
//! The scheduler task is the single owner of the render session. Everything else
//! (settings panel, CLI, tests) talks to it through [`RenderCommand`]s sent over an
//! mpsc channel; each command carries a oneshot sender for its reply. Progress flows
//! the other way as [`RenderStatus`] snapshots on a watch channel.
//!
//! # Message Flow
//!
//! ```text
//! Controller                          Scheduler Task
//! ----------                          --------------
//! 1. Create command with oneshot
//! 2. Send via mpsc channel    ------>
//!                                     3. Finish in-flight pass + readback
//!                                     4. Receive command, mutate session
//!                                     5. Publish status, send response
//! 6. Await oneshot receiver   <------
//! ```
//!
//! # Helper Methods
//!
//! Each variant has a helper that builds the command and hands back the receiver:
//!
//! ```rust
//! use progressive_render::messages::RenderCommand;
//!
//! let (cmd, rx) = RenderCommand::settings_text();
//! // cmd_tx.send(cmd).await?;
//! // let text = rx.await?;
//! ```

use crate::error::RenderResult;
use crate::metrics::PerformanceMetrics;
use crate::reconfigure::{ConfigInput, ReconfigureOutcome};
use crate::session::SessionParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Commands accepted by the render scheduler.
#[derive(Debug)]
pub enum RenderCommand {
    /// Apply a camera reconfiguration.
    ///
    /// # Response
    ///
    /// - `Ok(outcome)`: engine restarted with the new camera
    /// - `Err`: input rejected; session unchanged
    Apply {
        /// Raw input from the settings surface
        input: ConfigInput,
        /// Response channel
        response: oneshot::Sender<RenderResult<ReconfigureOutcome>>,
    },

    /// Construct a fresh scene and replace the session.
    ///
    /// The current camera's view parameters carry over; width and aspect come from
    /// `params`. On error the old session keeps running.
    Rebuild {
        /// New construction parameters
        params: SessionParams,
        /// Response channel
        response: oneshot::Sender<RenderResult<RenderStatus>>,
    },

    /// Round-trip the applied camera back to settings text.
    SettingsText {
        /// Response channel
        response: oneshot::Sender<String>,
    },

    /// Current status snapshot.
    Status {
        /// Response channel
        response: oneshot::Sender<RenderStatus>,
    },

    /// Stop the scheduler loop after replying.
    Shutdown {
        /// Response channel (final status)
        response: oneshot::Sender<RenderStatus>,
    },
}

impl RenderCommand {
    /// Helper to create an Apply command
    pub fn apply(input: ConfigInput) -> (Self, oneshot::Receiver<RenderResult<ReconfigureOutcome>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Apply { input, response: tx }, rx)
    }

    /// Helper to create a Rebuild command
    pub fn rebuild(params: SessionParams) -> (Self, oneshot::Receiver<RenderResult<RenderStatus>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Rebuild { params, response: tx }, rx)
    }

    /// Helper to create a SettingsText command
    pub fn settings_text() -> (Self, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (Self::SettingsText { response: tx }, rx)
    }

    /// Helper to create a Status command
    pub fn status() -> (Self, oneshot::Receiver<RenderStatus>) {
        let (tx, rx) = oneshot::channel();
        (Self::Status { response: tx }, rx)
    }

    /// Helper to create a Shutdown command
    pub fn shutdown() -> (Self, oneshot::Receiver<RenderStatus>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}

/// What the scheduler loop is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerPhase {
    /// Issuing passes toward the target sample count
    Rendering,
    /// Target reached; polling for reconfiguration
    Idle,
    /// Loop ended (shutdown or fatal error)
    Halted,
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerPhase::Rendering => write!(f, "rendering"),
            SchedulerPhase::Idle => write!(f, "idle"),
            SchedulerPhase::Halted => write!(f, "halted"),
        }
    }
}

/// Snapshot of scheduler progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderStatus {
    /// Active session
    pub session_id: Uuid,
    /// Loop phase
    pub phase: SchedulerPhase,
    /// Engine sample count
    pub sample_count: u32,
    /// Target sample count
    pub target_samples: u32,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Passes issued in this session
    pub passes: u64,
    /// Compute time since the last camera change
    pub elapsed_secs: f64,
    /// Derived fps and throughput
    pub metrics: PerformanceMetrics,
    /// Diagnostic for a fatal error, if the loop halted on one
    pub last_error: Option<String>,
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} samples, {}x{}, {}",
            self.phase, self.sample_count, self.target_samples, self.width, self.height, self.metrics
        )?;
        if let Some(err) = &self.last_error {
            write!(f, " (error: {err})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn helpers_pair_command_with_receiver() {
        let (cmd, rx) = RenderCommand::settings_text();
        match cmd {
            RenderCommand::SettingsText { response } => {
                response.send("{}".to_string()).unwrap();
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(rx.await.unwrap(), "{}");
    }

    #[test]
    fn status_display_includes_hud_metrics() {
        let status = RenderStatus {
            session_id: Uuid::nil(),
            phase: SchedulerPhase::Idle,
            sample_count: 10,
            target_samples: 10,
            width: 1000,
            height: 562,
            passes: 10,
            elapsed_secs: 0.0,
            metrics: PerformanceMetrics::default(),
            last_error: None,
        };
        assert_eq!(status.to_string(), "[idle] 10/10 samples, 1000x562, n/a");
    }
}
