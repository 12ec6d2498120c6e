//! Owned, injectable handle to the single engine instance.

use std::sync::Arc;

use parking_lot::RwLock;

use super::traits::MediaEngine;
use super::types::EngineState;

struct Slot {
    state: EngineState,
    engine: Option<Arc<dyn MediaEngine>>,
    source: Option<String>,
    failure: Option<String>,
}

/// Shared handle to the engine and its lifecycle state.
///
/// Clones refer to the same slot. The loader installs an instance, the
/// pipeline borrows it per job, and `dispose` releases it. The lock is never
/// held across an await point.
#[derive(Clone)]
pub struct EngineHandle {
    slot: Arc<RwLock<Slot>>,
}

impl EngineHandle {
    /// Create a handle with no engine loaded.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(Slot {
                state: EngineState::NotLoaded,
                engine: None,
                source: None,
                failure: None,
            })),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.slot.read().state
    }

    /// Whether an engine is installed and accepting work.
    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// The installed engine, only while ready.
    pub fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        let slot = self.slot.read();
        match slot.state {
            EngineState::Ready => slot.engine.clone(),
            _ => None,
        }
    }

    /// Name of the source the current engine came from.
    pub fn source_name(&self) -> Option<String> {
        self.slot.read().source.clone()
    }

    /// Why readiness was lost, if it was.
    pub fn failure_reason(&self) -> Option<String> {
        self.slot.read().failure.clone()
    }

    /// Enter `Loading`. Any engine still held is returned for termination.
    pub(crate) fn begin_loading(&self) -> Option<Arc<dyn MediaEngine>> {
        let mut slot = self.slot.write();
        slot.state = EngineState::Loading;
        slot.source = None;
        slot.failure = None;
        slot.engine.take()
    }

    /// Install a verified engine and enter `Ready`.
    pub(crate) fn install(&self, engine: Arc<dyn MediaEngine>, source: &str) {
        let mut slot = self.slot.write();
        slot.state = EngineState::Ready;
        slot.engine = Some(engine);
        slot.source = Some(source.to_string());
        slot.failure = None;
    }

    /// Return to `NotLoaded` after a load that produced no engine.
    pub(crate) fn reset(&self) {
        let mut slot = self.slot.write();
        slot.state = EngineState::NotLoaded;
        slot.engine = None;
        slot.source = None;
    }

    /// Record that a ready engine died. The instance is handed back so the
    /// caller can terminate it.
    pub fn mark_failed(&self, reason: impl Into<String>) -> Option<Arc<dyn MediaEngine>> {
        let mut slot = self.slot.write();
        if slot.state != EngineState::Ready {
            return None;
        }
        let reason = reason.into();
        tracing::error!(reason = %reason, "Engine readiness lost");
        slot.state = EngineState::Failed;
        slot.failure = Some(reason);
        slot.engine.take()
    }

    /// Release the engine and return to `NotLoaded`.
    pub async fn dispose(&self) {
        let engine = {
            let mut slot = self.slot.write();
            slot.state = EngineState::NotLoaded;
            slot.source = None;
            slot.failure = None;
            slot.engine.take()
        };
        if let Some(engine) = engine {
            tracing::debug!("Disposing engine instance");
            engine.terminate().await;
        }
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.read();
        f.debug_struct("EngineHandle")
            .field("state", &slot.state)
            .field("source", &slot.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;

    #[tokio::test]
    async fn lifecycle_transitions() {
        let handle = EngineHandle::new();
        assert_eq!(handle.state(), EngineState::NotLoaded);
        assert!(handle.engine().is_none());

        handle.begin_loading();
        assert_eq!(handle.state(), EngineState::Loading);
        assert!(handle.engine().is_none());

        let engine = FakeEngine::new();
        handle.install(engine.clone(), "system");
        assert!(handle.is_ready());
        assert_eq!(handle.source_name().as_deref(), Some("system"));
        assert!(handle.engine().is_some());

        handle.dispose().await;
        assert_eq!(handle.state(), EngineState::NotLoaded);
        assert!(engine.was_terminated());
    }

    #[test]
    fn mark_failed_only_from_ready() {
        let handle = EngineHandle::new();
        assert!(handle.mark_failed("nothing loaded").is_none());
        assert_eq!(handle.state(), EngineState::NotLoaded);

        handle.install(FakeEngine::new(), "system");
        let taken = handle.mark_failed("process vanished");
        assert!(taken.is_some());
        assert_eq!(handle.state(), EngineState::Failed);
        assert!(handle.engine().is_none());
        assert_eq!(handle.failure_reason().as_deref(), Some("process vanished"));
    }

    #[test]
    fn clones_share_state() {
        let handle = EngineHandle::new();
        let other = handle.clone();
        handle.install(FakeEngine::new(), "local");
        assert!(other.is_ready());
    }
}
