//! Live camera reconfiguration.
//!
//! Every change, whether a full settings document or a single slider, is turned into
//! a complete validated [`CameraConfiguration`] before anything is forwarded. Invalid
//! input leaves the engine, the sample count and the timing baseline untouched.

use crate::camera::{CameraConfiguration, FieldEdit};
use crate::error::RenderResult;
use crate::presentation::PresentationSink;
use crate::session::RenderSession;
use tracing::info;

/// Raw reconfiguration request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigInput {
    /// Settings text (JSON)
    Text(String),
    /// One control changed
    Edit(FieldEdit),
    /// Already structured configuration
    Camera(CameraConfiguration),
}

impl ConfigInput {
    /// Turn a line of user input into a request.
    ///
    /// Lines starting with `{` are settings text, anything else is read as a
    /// `field=value` edit.
    pub fn from_line(line: &str) -> RenderResult<Self> {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            Ok(ConfigInput::Text(trimmed.to_string()))
        } else {
            Ok(ConfigInput::Edit(trimmed.parse()?))
        }
    }
}

/// What an accepted reconfiguration did.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconfigureOutcome {
    /// Configuration now in effect
    pub camera: CameraConfiguration,
    /// Whether the output dimensions changed and the surface was resized
    pub resized: bool,
}

/// Produce the full configuration `input` asks for, starting from `current`.
pub fn resolve(current: &CameraConfiguration, input: &ConfigInput) -> RenderResult<CameraConfiguration> {
    match input {
        ConfigInput::Text(text) => CameraConfiguration::parse(text),
        ConfigInput::Edit(edit) => current.with_edit(edit),
        ConfigInput::Camera(camera) => {
            camera.validate()?;
            Ok(camera.clone())
        }
    }
}

/// Validate `input` and, if accepted, forward it to the session's engine.
///
/// On success the engine restarts accumulation, cumulative elapsed time drops to zero,
/// and the display surface is resized when the output dimensions changed.
pub fn apply_configuration(
    session: &mut RenderSession,
    sink: &mut PresentationSink,
    input: &ConfigInput,
) -> RenderResult<ReconfigureOutcome> {
    let camera = resolve(session.camera(), input)?;
    let resized = camera.changes_dimensions(session.camera());

    session.replace_camera(camera.clone());
    let (width, height) = session.dimensions();
    if resized {
        sink.resize(width, height);
    }

    info!(
        session = %session.id(),
        width,
        height,
        resized,
        "Camera reconfigured"
    );
    Ok(ReconfigureOutcome { camera, resized })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraField;
    use crate::engine::{EngineOptions, EngineRuntime, SimulatedBackend};
    use crate::error::RenderError;
    use crate::presentation::{DisplaySurface, SharedSurface};
    use crate::session::SessionParams;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup() -> (RenderSession, PresentationSink, SharedSurface) {
        let runtime = EngineRuntime::initialized(
            Arc::new(SimulatedBackend::new()),
            EngineOptions {
                worker_count: 1,
                enable_pooling: false,
            },
        )
        .unwrap();
        let session = RenderSession::start(
            &runtime,
            SessionParams::new(64, 2.0, 4, 4),
            &CameraConfiguration::default(),
        )
        .unwrap();
        let surface = SharedSurface::new(64, 32);
        let sink = PresentationSink::new(surface.clone());
        (session, sink, surface)
    }

    #[test]
    fn apply_then_one_pass_counts_one() {
        let (mut session, mut sink, _) = setup();
        session.run_pass().unwrap();
        session.run_pass().unwrap();

        let text = session.camera().to_settings_text();
        apply_configuration(&mut session, &mut sink, &ConfigInput::Text(text)).unwrap();
        assert_eq!(session.sample_count(), 0);
        assert_eq!(session.elapsed(), Duration::ZERO);

        session.run_pass().unwrap();
        assert_eq!(session.sample_count(), 1);
    }

    #[test]
    fn malformed_text_leaves_state_untouched() {
        let (mut session, mut sink, _) = setup();
        session.run_pass().unwrap();
        let elapsed = session.elapsed();
        let before = session.camera().clone();

        let err = apply_configuration(
            &mut session,
            &mut sink,
            &ConfigInput::Text("{\"width\": 700,".into()),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::ConfigurationParse(_)));
        assert_eq!(session.sample_count(), 1);
        assert_eq!(session.elapsed(), elapsed);
        assert_eq!(session.camera(), &before);
    }

    #[test]
    fn field_edit_changes_one_field_and_resizes() {
        let (mut session, mut sink, surface) = setup();
        let edit = FieldEdit::new(CameraField::Width, 40.0);

        let outcome =
            apply_configuration(&mut session, &mut sink, &ConfigInput::Edit(edit)).unwrap();
        assert!(outcome.resized);
        assert_eq!(outcome.camera.width, 40);
        assert_eq!(outcome.camera.vfov, CameraConfiguration::default().vfov);
        assert_eq!(surface.snapshot().size(), (40, 20));
    }

    #[test]
    fn applying_twice_matches_applying_once() {
        let (mut session, mut sink, _) = setup();
        let camera = CameraConfiguration {
            vfov: 35.0,
            ..session.camera().clone()
        };
        let input = ConfigInput::Camera(camera);

        let first = apply_configuration(&mut session, &mut sink, &input).unwrap();
        let state_once = (session.sample_count(), session.elapsed(), session.dimensions());
        let second = apply_configuration(&mut session, &mut sink, &input).unwrap();

        assert_eq!(first.camera, second.camera);
        assert!(!second.resized);
        assert_eq!(
            state_once,
            (session.sample_count(), session.elapsed(), session.dimensions())
        );
    }

    #[test]
    fn input_lines_are_classified() {
        assert!(matches!(
            ConfigInput::from_line("  {\"width\": 1}"),
            Ok(ConfigInput::Text(_))
        ));
        assert!(matches!(
            ConfigInput::from_line("vfov=30"),
            Ok(ConfigInput::Edit(_))
        ));
        assert!(ConfigInput::from_line("vfov").is_err());
    }
}
