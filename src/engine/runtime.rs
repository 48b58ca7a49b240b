//! Process-wide engine lifecycle.
//!
//! The backend must be initialized exactly once before any engine is constructed.
//! [`EngineRuntime`] makes that an explicit state machine instead of a global flag:
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──ok──► Ready(options)
//!       ▲                              │
//!       └────────────── err ───────────┘
//! ```

use super::{ComputeEngine, EngineBackend, EngineOptions};
use crate::error::{RenderError, RenderResult};
use crate::session::SessionParams;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle state of the shared engine backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// `initialize` has not been called (or the last attempt failed)
    Uninitialized,
    /// `initialize` is running
    Initializing,
    /// Engines may be constructed
    Ready(EngineOptions),
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "uninitialized"),
            EngineState::Initializing => write!(f, "initializing"),
            EngineState::Ready(options) => write!(
                f,
                "ready ({} workers, pooling {})",
                options.worker_count,
                if options.enable_pooling { "on" } else { "off" }
            ),
        }
    }
}

/// Shared handle to an engine backend and its one-time initialization.
pub struct EngineRuntime {
    backend: Arc<dyn EngineBackend>,
    state: Mutex<EngineState>,
}

impl EngineRuntime {
    /// Wrap a backend; nothing is initialized yet.
    pub fn new(backend: Arc<dyn EngineBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(EngineState::Uninitialized),
        }
    }

    /// Create a runtime and initialize it in one step.
    pub fn initialized(
        backend: Arc<dyn EngineBackend>,
        options: EngineOptions,
    ) -> RenderResult<Arc<Self>> {
        let runtime = Arc::new(Self::new(backend));
        runtime.initialize(options)?;
        Ok(runtime)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Whether engines can be constructed.
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), EngineState::Ready(_))
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run the backend's one-time initialization.
    ///
    /// # Errors
    ///
    /// `EngineAlreadyInitialized` if called a second time (or while another call is
    /// still running); any backend error, after which the runtime returns to
    /// `Uninitialized` and may be initialized again.
    pub fn initialize(&self, options: EngineOptions) -> RenderResult<()> {
        {
            let mut state = self.state.lock();
            if *state != EngineState::Uninitialized {
                return Err(RenderError::EngineAlreadyInitialized(state.to_string()));
            }
            *state = EngineState::Initializing;
        }

        // Lock is released while the backend spins up its worker pool.
        match self.backend.initialize(&options) {
            Ok(()) => {
                *self.state.lock() = EngineState::Ready(options);
                info!(
                    backend = self.backend.name(),
                    workers = options.worker_count,
                    pooling = options.enable_pooling,
                    "Compute engine initialized"
                );
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = EngineState::Uninitialized;
                warn!(backend = self.backend.name(), "Engine initialization failed: {}", e);
                Err(e)
            }
        }
    }

    /// Construct an engine for a new scene.
    ///
    /// # Errors
    ///
    /// `EngineNotInitialized` before `initialize` has completed,
    /// `InvalidSessionParams` for out-of-domain parameters, or a backend error.
    pub fn construct(&self, params: &SessionParams) -> RenderResult<Box<dyn ComputeEngine>> {
        if !self.is_ready() {
            return Err(RenderError::EngineNotInitialized);
        }
        params.validate()?;
        self.backend.construct(params)
    }
}

impl fmt::Debug for EngineRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRuntime")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingBackend {
        attempts: AtomicUsize,
    }

    impl EngineBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn initialize(&self, _options: &EngineOptions) -> RenderResult<()> {
            // First attempt fails, later attempts succeed.
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RenderError::EngineInit("no workers".into()))
            } else {
                Ok(())
            }
        }

        fn construct(&self, _params: &SessionParams) -> RenderResult<Box<dyn ComputeEngine>> {
            Err(RenderError::EngineInit("cannot construct".into()))
        }
    }

    fn options() -> EngineOptions {
        EngineOptions {
            worker_count: 2,
            enable_pooling: false,
        }
    }

    #[test]
    fn construct_before_initialize_is_rejected() {
        let runtime = EngineRuntime::new(Arc::new(SimulatedBackend::new()));
        assert_eq!(runtime.state(), EngineState::Uninitialized);

        let result = runtime.construct(&SessionParams::new(16, 2.0, 1, 1));
        assert!(matches!(result, Err(RenderError::EngineNotInitialized)));
    }

    #[test]
    fn initialize_only_once() {
        let runtime = EngineRuntime::new(Arc::new(SimulatedBackend::new()));
        runtime.initialize(options()).unwrap();
        assert_eq!(runtime.state(), EngineState::Ready(options()));

        let second = runtime.initialize(options());
        assert!(matches!(second, Err(RenderError::EngineAlreadyInitialized(_))));
        assert!(runtime.is_ready());
    }

    #[test]
    fn failed_initialize_can_be_retried() {
        let runtime = EngineRuntime::new(Arc::new(FailingBackend {
            attempts: AtomicUsize::new(0),
        }));

        assert!(matches!(
            runtime.initialize(options()),
            Err(RenderError::EngineInit(_))
        ));
        assert_eq!(runtime.state(), EngineState::Uninitialized);

        runtime.initialize(options()).unwrap();
        assert!(runtime.is_ready());
    }

    #[test]
    fn construct_validates_params() {
        let runtime =
            EngineRuntime::initialized(Arc::new(SimulatedBackend::new()), options()).unwrap();
        let result = runtime.construct(&SessionParams::new(16, 2.0, 0, 1));
        assert!(matches!(result, Err(RenderError::InvalidSessionParams(_))));

        let engine = runtime.construct(&SessionParams::new(16, 2.0, 4, 1)).unwrap();
        assert_eq!((engine.image_width(), engine.image_height()), (16, 8));
    }
}
