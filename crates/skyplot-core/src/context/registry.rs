use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, Result};
use crate::state::{ContextKey, PlotState};

/// Lifecycle of a plot context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotPhase {
    /// Registered but never resolved.
    Uninitialized,
    /// Planes resolved from the current band files.
    Valid,
    /// Band files could not be resolved.
    Stale,
    /// Rebuilding from the original requests.
    Recreating,
    /// Recreation failed; the context will not retry.
    Failed,
}

impl std::fmt::Display for PlotPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Valid => write!(f, "Valid"),
            Self::Stale => write!(f, "Stale"),
            Self::Recreating => write!(f, "Recreating"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub state: PlotState,
    pub phase: PlotPhase,
    pub last_access: Instant,
}

/// Live sessions by context key. Records are replaced whole, never
/// edited in place, so readers see either the old or the new state.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ContextKey, SessionRecord>>,
}

impl SessionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<ContextKey, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, state: PlotState, phase: PlotPhase) {
        let key = state.context_key.clone();
        self.lock().insert(
            key,
            SessionRecord {
                state,
                phase,
                last_access: Instant::now(),
            },
        );
    }

    /// Copy of the record, marking it as accessed.
    pub fn touch(&self, key: &ContextKey) -> Result<SessionRecord> {
        let mut sessions = self.lock();
        let record = sessions
            .get_mut(key)
            .ok_or_else(|| PlotError::UnknownContext(key.to_string()))?;
        record.last_access = Instant::now();
        Ok(record.clone())
    }

    pub fn get(&self, key: &ContextKey) -> Option<SessionRecord> {
        self.lock().get(key).cloned()
    }

    pub fn set_phase(&self, key: &ContextKey, phase: PlotPhase) {
        if let Some(record) = self.lock().get_mut(key) {
            record.phase = phase;
        }
    }

    /// Replace the state of a live session. Fails if it was deleted.
    pub fn replace(&self, state: PlotState, phase: PlotPhase) -> Result<()> {
        let mut sessions = self.lock();
        let record = sessions
            .get_mut(&state.context_key)
            .ok_or_else(|| PlotError::UnknownContext(state.context_key.to_string()))?;
        *record = SessionRecord {
            state,
            phase,
            last_access: Instant::now(),
        };
        Ok(())
    }

    pub fn remove(&self, key: &ContextKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Drop sessions idle for longer than `idle`. Returns how many went.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, r| r.last_access.elapsed() <= idle);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
