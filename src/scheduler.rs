//! Frame scheduler: the render loop actor.
//!
//! [`RenderScheduler`] is the single owner of the active [`RenderSession`] and the
//! [`PresentationSink`]. It runs in its own Tokio task and alternates between three
//! things:
//!
//! 1. **Commands**: anything queued on the command channel is applied first, so a
//!    reconfiguration that arrived during a pass takes effect right after that pass's
//!    readback and never mid-pass.
//! 2. **Passes**: while the sample count is below target, one timed `advance_pass`,
//!    readback, presentation, status publish, then a yield back to the runtime.
//! 3. **Idle**: once the target is reached the loop waits for either a command or the
//!    idle poll interval, and re-checks the sample count. A later reconfiguration
//!    resets the count and rendering resumes without a restart.
//!
//! Passes are synchronous and may be expensive. On a multi-threaded runtime they run
//! under `block_in_place` so other tasks keep being scheduled.
//!
//! The loop ends on `Shutdown`, when every [`RenderController`] has been dropped, or
//! on a contract violation (presentation mismatch, aborted pass), which is returned
//! from the task.

use crate::camera::{CameraConfiguration, FieldEdit};
use crate::engine::EngineRuntime;
use crate::error::{RenderError, RenderResult};
use crate::messages::{RenderCommand, RenderStatus, SchedulerPhase};
use crate::presentation::PresentationSink;
use crate::reconfigure::{self, ConfigInput, ReconfigureOutcome};
use crate::session::{FrameSample, RenderSession, SessionParams};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// How the loop hands control back to the runtime between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldStrategy {
    /// `tokio::task::yield_now`
    TaskYield,
    /// Sleep a fixed interval (frame pacing)
    Sleep(Duration),
}

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How often an idle scheduler re-checks the sample count
    pub idle_poll: Duration,
    /// Suspension between passes
    pub yield_strategy: YieldStrategy,
    /// Command channel capacity
    pub command_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(2),
            yield_strategy: YieldStrategy::TaskYield,
            command_capacity: 32,
        }
    }
}

/// Render loop actor.
pub struct RenderScheduler {
    runtime: Arc<EngineRuntime>,
    session: RenderSession,
    sink: PresentationSink,
    config: SchedulerConfig,
    status_tx: watch::Sender<RenderStatus>,
    phase: SchedulerPhase,
    last_error: Option<String>,
}

impl RenderScheduler {
    /// Bind a session to a sink. The surface is sized to the session's image.
    pub fn new(
        runtime: Arc<EngineRuntime>,
        session: RenderSession,
        mut sink: PresentationSink,
        config: SchedulerConfig,
    ) -> Self {
        let (width, height) = session.dimensions();
        sink.resize(width, height);

        let phase = if session.is_complete() {
            SchedulerPhase::Idle
        } else {
            SchedulerPhase::Rendering
        };
        let initial = status_of(&session, phase, None);
        let (status_tx, _) = watch::channel(initial);

        Self {
            runtime,
            session,
            sink,
            config,
            status_tx,
            phase,
            last_error: None,
        }
    }

    /// Start a session and its scheduler in one step.
    pub fn start(
        runtime: Arc<EngineRuntime>,
        params: SessionParams,
        camera: &CameraConfiguration,
        sink: PresentationSink,
        config: SchedulerConfig,
    ) -> RenderResult<Self> {
        let session = RenderSession::start(&runtime, params, camera)?;
        Ok(Self::new(runtime, session, sink, config))
    }

    /// Spawn the loop on the current Tokio runtime.
    pub fn spawn(self) -> (RenderController, JoinHandle<RenderResult<()>>) {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_capacity.max(1));
        let controller = RenderController::new(command_tx, self.status_tx.subscribe());
        let span = info_span!("render_scheduler", session = %self.session.id());
        let handle = tokio::spawn(self.run(command_rx).instrument(span));
        (controller, handle)
    }

    /// Session currently owned by the scheduler.
    pub fn session(&self) -> &RenderSession {
        &self.session
    }

    /// Watch channel carrying status snapshots.
    pub fn subscribe(&self) -> watch::Receiver<RenderStatus> {
        self.status_tx.subscribe()
    }

    /// Run the event loop until shutdown, controller drop, or a fatal error.
    pub async fn run(mut self, mut commands: mpsc::Receiver<RenderCommand>) -> RenderResult<()> {
        info!(
            backend = self.runtime.backend_name(),
            target_samples = self.session.params().samples_per_pixel,
            idle_poll_ms = self.config.idle_poll.as_millis() as u64,
            "Render scheduler started"
        );
        self.publish();

        let result = self.event_loop(&mut commands).await;

        self.phase = SchedulerPhase::Halted;
        if let Err(e) = &result {
            error!("Render session halted: {}", e);
            self.last_error = Some(e.to_string());
        }
        self.publish();
        info!(passes = self.session.passes(), "Render scheduler stopped");
        result
    }

    /// Issue passes until the target sample count is reached, without serving commands.
    ///
    /// Returns the final sample count.
    pub async fn run_until_complete(&mut self) -> RenderResult<u32> {
        while !self.session.is_complete() {
            self.step().await?;
        }
        self.enter_idle();
        Ok(self.session.sample_count())
    }

    async fn event_loop(&mut self, commands: &mut mpsc::Receiver<RenderCommand>) -> RenderResult<()> {
        loop {
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if self.handle_command(command).is_break() {
                            return Ok(());
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("All controllers dropped");
                        return Ok(());
                    }
                }
            }

            if self.session.is_complete() {
                self.enter_idle();
                tokio::select! {
                    command = commands.recv() => match command {
                        Some(command) => {
                            if self.handle_command(command).is_break() {
                                return Ok(());
                            }
                        }
                        None => {
                            info!("All controllers dropped");
                            return Ok(());
                        }
                    },
                    _ = tokio::time::sleep(self.config.idle_poll) => {}
                }
                continue;
            }

            self.step().await?;
        }
    }

    /// One pass: run, present, publish, yield.
    async fn step(&mut self) -> RenderResult<()> {
        self.phase = SchedulerPhase::Rendering;
        let frame = run_pass(&mut self.session)?;
        self.sink.present(&frame.pixels, frame.width, frame.height)?;
        debug!(
            sample = frame.sample_index,
            pass_ms = frame.elapsed.as_secs_f64() * 1000.0,
            "Pass presented"
        );
        self.publish();

        match self.config.yield_strategy {
            YieldStrategy::TaskYield => tokio::task::yield_now().await,
            YieldStrategy::Sleep(interval) => tokio::time::sleep(interval).await,
        }
        Ok(())
    }

    fn enter_idle(&mut self) {
        if self.phase == SchedulerPhase::Idle {
            return;
        }
        self.phase = SchedulerPhase::Idle;
        let status = self.status();
        info!(
            samples = status.sample_count,
            elapsed_secs = status.elapsed_secs,
            "Target sample count reached ({})",
            status.metrics
        );
        self.publish();
    }

    fn handle_command(&mut self, command: RenderCommand) -> ControlFlow<()> {
        match command {
            RenderCommand::Apply { input, response } => {
                let result = self.apply(&input);
                let _ = response.send(result);
            }

            RenderCommand::Rebuild { params, response } => {
                let result = self.rebuild(params);
                let _ = response.send(result);
            }

            RenderCommand::SettingsText { response } => {
                let _ = response.send(self.session.camera().to_settings_text());
            }

            RenderCommand::Status { response } => {
                let _ = response.send(self.status());
            }

            RenderCommand::Shutdown { response } => {
                info!("Shutdown command received");
                self.phase = SchedulerPhase::Halted;
                self.publish();
                let _ = response.send(self.status());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn apply(&mut self, input: &ConfigInput) -> RenderResult<ReconfigureOutcome> {
        match reconfigure::apply_configuration(&mut self.session, &mut self.sink, input) {
            Ok(outcome) => {
                self.refresh_phase();
                self.publish();
                Ok(outcome)
            }
            Err(e) => {
                warn!("Rejected camera configuration: {}", e);
                Err(e)
            }
        }
    }

    fn rebuild(&mut self, params: SessionParams) -> RenderResult<RenderStatus> {
        match RenderSession::start(&self.runtime, params, self.session.camera()) {
            Ok(session) => {
                info!(previous = %self.session.id(), next = %session.id(), "Session rebuilt");
                self.session = session;
                let (width, height) = self.session.dimensions();
                self.sink.resize(width, height);
                self.refresh_phase();
                self.publish();
                Ok(self.status())
            }
            Err(e) => {
                warn!("Rebuild rejected: {}", e);
                Err(e)
            }
        }
    }

    fn refresh_phase(&mut self) {
        self.phase = if self.session.is_complete() {
            SchedulerPhase::Idle
        } else {
            SchedulerPhase::Rendering
        };
    }

    fn status(&self) -> RenderStatus {
        status_of(&self.session, self.phase, self.last_error.clone())
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

fn status_of(
    session: &RenderSession,
    phase: SchedulerPhase,
    last_error: Option<String>,
) -> RenderStatus {
    let (width, height) = session.dimensions();
    RenderStatus {
        session_id: session.id(),
        phase,
        sample_count: session.sample_count(),
        target_samples: session.params().samples_per_pixel,
        width,
        height,
        passes: session.passes(),
        elapsed_secs: session.elapsed().as_secs_f64(),
        metrics: session.performance(),
        last_error,
    }
}

fn run_pass(session: &mut RenderSession) -> RenderResult<FrameSample> {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| session.run_pass()),
        _ => session.run_pass(),
    }
}

/// Cloneable handle for driving a running scheduler.
#[derive(Debug, Clone)]
pub struct RenderController {
    commands: mpsc::Sender<RenderCommand>,
    status: watch::Receiver<RenderStatus>,
}

impl RenderController {
    fn new(commands: mpsc::Sender<RenderCommand>, status: watch::Receiver<RenderStatus>) -> Self {
        Self { commands, status }
    }

    async fn request<T>(
        &self,
        (command, rx): (RenderCommand, oneshot::Receiver<T>),
    ) -> RenderResult<T> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RenderError::ControllerClosed)?;
        rx.await.map_err(|_| RenderError::ControllerClosed)
    }

    /// Apply any reconfiguration input.
    pub async fn apply(&self, input: ConfigInput) -> RenderResult<ReconfigureOutcome> {
        self.request(RenderCommand::apply(input)).await?
    }

    /// Apply settings text.
    pub async fn apply_text(&self, text: impl Into<String>) -> RenderResult<ReconfigureOutcome> {
        self.apply(ConfigInput::Text(text.into())).await
    }

    /// Apply one control value.
    pub async fn apply_edit(&self, edit: FieldEdit) -> RenderResult<ReconfigureOutcome> {
        self.apply(ConfigInput::Edit(edit)).await
    }

    /// Apply a structured camera.
    pub async fn apply_camera(
        &self,
        camera: CameraConfiguration,
    ) -> RenderResult<ReconfigureOutcome> {
        self.apply(ConfigInput::Camera(camera)).await
    }

    /// Apply a line of user input (settings text or `field=value`).
    pub async fn apply_line(&self, line: &str) -> RenderResult<ReconfigureOutcome> {
        self.apply(ConfigInput::from_line(line)?).await
    }

    /// Replace the session with a freshly constructed scene.
    pub async fn rebuild(&self, params: SessionParams) -> RenderResult<RenderStatus> {
        self.request(RenderCommand::rebuild(params)).await?
    }

    /// Applied camera as settings text.
    pub async fn settings_text(&self) -> RenderResult<String> {
        self.request(RenderCommand::settings_text()).await
    }

    /// Status straight from the scheduler.
    pub async fn status(&self) -> RenderResult<RenderStatus> {
        self.request(RenderCommand::status()).await
    }

    /// Most recently published status, without a round-trip.
    pub fn latest_status(&self) -> RenderStatus {
        self.status.borrow().clone()
    }

    /// New receiver for status updates.
    pub fn subscribe(&self) -> watch::Receiver<RenderStatus> {
        self.status.clone()
    }

    /// Wait until the scheduler publishes `phase`.
    ///
    /// # Errors
    ///
    /// `ControllerClosed` if the scheduler halts (or goes away) first.
    pub async fn wait_for_phase(&self, phase: SchedulerPhase) -> RenderResult<RenderStatus> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|s| s.phase == phase || s.phase == SchedulerPhase::Halted)
            .await
            .map_err(|_| RenderError::ControllerClosed)?
            .clone();
        if status.phase == phase {
            Ok(status)
        } else {
            Err(RenderError::ControllerClosed)
        }
    }

    /// Stop the scheduler; returns its final status.
    pub async fn shutdown(&self) -> RenderResult<RenderStatus> {
        self.request(RenderCommand::shutdown()).await
    }
}
