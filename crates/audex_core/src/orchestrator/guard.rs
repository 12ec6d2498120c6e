//! Single-flight admission for batch runs.

use crate::jobs::JobSetKey;

/// Whether a batch run is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    /// No run in flight. `last_key` is the job set the last finished run
    /// covered, if any.
    Idle { last_key: Option<JobSetKey> },
    /// A run over `key` is in flight.
    Running { key: JobSetKey },
}

impl Default for BatchState {
    fn default() -> Self {
        Self::Idle { last_key: None }
    }
}

impl BatchState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// What asked for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fired on its own, e.g. when the engine became ready or jobs were
    /// added. Deduplicated per job set.
    Auto,
    /// Explicit user request.
    Manual,
}

/// Decision of [`admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Start,
    /// Another run is in flight.
    AlreadyRunning,
    /// An automatic trigger for the job set the last run already covered.
    AlreadyProcessed,
}

/// Decide whether a run over `key` may start.
///
/// Never more than one run at a time. Automatic triggers additionally skip
/// a job set that the previous run already covered, so status updates made
/// by that run do not start another one. A different set of job ids always
/// re-arms the guard.
pub fn admit(state: &BatchState, key: &JobSetKey, trigger: Trigger) -> Admission {
    match state {
        BatchState::Running { .. } => Admission::AlreadyRunning,
        BatchState::Idle {
            last_key: Some(last),
        } if trigger == Trigger::Auto && last == key => Admission::AlreadyProcessed,
        BatchState::Idle { .. } => Admission::Start,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ids: &[&str]) -> JobSetKey {
        JobSetKey::from_ids(ids)
    }

    #[test]
    fn idle_admits_first_run() {
        let state = BatchState::default();
        assert_eq!(admit(&state, &key(&["a"]), Trigger::Auto), Admission::Start);
        assert_eq!(admit(&state, &key(&["a"]), Trigger::Manual), Admission::Start);
    }

    #[test]
    fn running_rejects_everything() {
        let state = BatchState::Running { key: key(&["a"]) };
        assert_eq!(admit(&state, &key(&["a"]), Trigger::Manual), Admission::AlreadyRunning);
        assert_eq!(admit(&state, &key(&["b"]), Trigger::Auto), Admission::AlreadyRunning);
    }

    #[test]
    fn auto_skips_already_processed_set() {
        let state = BatchState::Idle {
            last_key: Some(key(&["a", "b"])),
        };
        assert_eq!(
            admit(&state, &key(&["b", "a"]), Trigger::Auto),
            Admission::AlreadyProcessed
        );
        // A new file re-arms the guard.
        assert_eq!(admit(&state, &key(&["a", "b", "c"]), Trigger::Auto), Admission::Start);
        // Manual runs only respect single-flight.
        assert_eq!(admit(&state, &key(&["a", "b"]), Trigger::Manual), Admission::Start);
    }
}
