use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::{
    db::Database,
    log_debug, log_error, log_info, log_warn,
    models::{ScanSessionRecord, SessionOutcome},
    settings::ScanSettings,
};

use super::{
    transition, Outcome, ScanAction, ScanFlags, ScanKind, ScanPhase, ScanState, Transition,
};

const ENABLE_LOGS: bool = true;
const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub state: ScanState,
    pub flags: ScanFlags,
}

impl ScanSnapshot {
    fn of(state: ScanState) -> Self {
        Self {
            flags: ScanFlags::of(&state),
            state,
        }
    }
}

/// Owner of the single [`ScanState`] of one scan UI instance.
///
/// Dispatches are serialized on the state lock, so they apply in call order.
/// After every applied action the controller refreshes the crash-recovery
/// snapshot and the session history row, then broadcasts the new snapshot.
#[derive(Clone)]
pub struct ScanController {
    state: Arc<Mutex<ScanState>>,
    db: Database,
    settings: Arc<RwLock<ScanSettings>>,
    events: broadcast::Sender<ScanSnapshot>,
}

impl ScanController {
    pub fn new(db: Database, settings: ScanSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(ScanState::new())),
            db,
            settings: Arc::new(RwLock::new(settings)),
            events,
        }
    }

    pub async fn get_state(&self) -> ScanState {
        self.state.lock().await.clone()
    }

    pub async fn get_snapshot(&self) -> ScanSnapshot {
        ScanSnapshot::of(self.get_state().await)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanSnapshot> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> ScanSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the settings. Takes effect from the next action.
    pub fn update_settings(&self, settings: ScanSettings) {
        let mut guard = match self.settings.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings;
    }

    /// Applies an action. Actions invalid for the current state leave it
    /// unchanged and are only logged.
    pub async fn dispatch(&self, action: ScanAction) -> ScanSnapshot {
        self.apply(action).await.0
    }

    /// Like [`dispatch`](Self::dispatch) but reports an ignored action as an error.
    pub async fn try_dispatch(&self, action: ScanAction) -> Result<ScanSnapshot> {
        let name = action.name();
        match self.apply(action).await {
            (snapshot, Outcome::Applied) => Ok(snapshot),
            (_, Outcome::Ignored(reason)) => Err(anyhow!("{name} rejected: {reason}")),
        }
    }

    /// Starts a new session and applies the configured default currency.
    pub async fn start_session(&self, kind: ScanKind, user_id: &str) -> Result<ScanSnapshot> {
        let snapshot = self.try_dispatch(ScanAction::start(kind, user_id)).await?;

        match self.settings().default_currency {
            Some(currency) => {
                self.try_dispatch(ScanAction::SetCurrency {
                    currency: Some(currency),
                })
                .await
            }
            None => Ok(snapshot),
        }
    }

    /// Sends the captured images to extraction, reserving `credits_count`
    /// credits of the configured default type.
    pub async fn begin_processing(&self, credits_count: u32) -> Result<ScanSnapshot> {
        let credit_type = self.settings().default_credit_type;
        self.try_dispatch(ScanAction::process_start(credit_type, credits_count))
            .await
    }

    /// Rehydrates the persisted snapshot for `user_id`, if any. A snapshot that
    /// was still scanning comes back as a refunded error and its history row is
    /// closed as interrupted.
    ///
    /// The state lock is held from the idle check through the restore, so a
    /// session started concurrently is never overwritten by the snapshot.
    pub async fn recover(&self, user_id: &str) -> Result<Option<ScanSnapshot>> {
        let mut guard = self.state.lock().await;
        if guard.phase != ScanPhase::Idle {
            log_warn!("Skipping recovery for {user_id}: a scan session is already active");
            return Ok(None);
        }

        let Some(restored) = self.db.load_snapshot(user_id).await? else {
            return Ok(None);
        };

        let interrupted = restored.phase == Some(ScanPhase::Scanning);
        let row_open = match restored.request_id.as_deref() {
            Some(request_id) => self.db.has_active_scan_session(request_id).await?,
            None => false,
        };

        let (snapshot, _) = self
            .apply_locked(&mut guard, ScanAction::restore(restored))
            .await;

        if interrupted {
            log_warn!(
                "Recovered interrupted scan {:?} for {user_id}; credit refunded",
                snapshot.state.request_id
            );
            if row_open {
                if let Some(record) = ScanSessionRecord::from_state(&snapshot.state, Utc::now()) {
                    let record = record.finish(SessionOutcome::Interrupted, Utc::now());
                    self.db.upsert_scan_session(&record).await?;
                }
            }
        } else {
            log_info!(
                "Restored scan {:?} for {user_id} in phase {}",
                snapshot.state.request_id,
                snapshot.state.phase.as_str()
            );
        }

        Ok(Some(snapshot))
    }

    pub async fn history(&self, user_id: &str, limit: u32) -> Result<Vec<ScanSessionRecord>> {
        self.db.list_scan_sessions(user_id, limit).await
    }

    async fn apply(&self, action: ScanAction) -> (ScanSnapshot, Outcome) {
        let mut guard = self.state.lock().await;
        self.apply_locked(&mut guard, action).await
    }

    async fn apply_locked(
        &self,
        current: &mut ScanState,
        action: ScanAction,
    ) -> (ScanSnapshot, Outcome) {
        let name = action.name();
        let ending = session_ending(&action);

        let before = current.clone();
        let Transition { state, outcome } = transition(before.clone(), action);

        if let Outcome::Ignored(reason) = &outcome {
            log_warn!("Ignored {name} in phase {}: {reason}", before.phase.as_str());
            return (ScanSnapshot::of(state), outcome);
        }

        *current = state.clone();
        log_debug!(
            "Applied {name}: {} -> {}",
            before.phase.as_str(),
            state.phase.as_str()
        );

        self.record_history(&before, &state, ending).await;
        if self.settings().persist_snapshots {
            self.persist_snapshot(&before, &state).await;
        }

        let snapshot = ScanSnapshot::of(state);
        // No subscribers is fine.
        let _ = self.events.send(snapshot.clone());
        (snapshot, outcome)
    }

    async fn record_history(&self, before: &ScanState, after: &ScanState, ending: SessionOutcome) {
        let now = Utc::now();
        let record = match ScanSessionRecord::from_state(after, now) {
            Some(active) => active,
            None => match ScanSessionRecord::from_state(before, now) {
                Some(finished) => {
                    let outcome = match ending {
                        SessionOutcome::Saved if before.phase != ScanPhase::Saving => {
                            SessionOutcome::Abandoned
                        }
                        other => other,
                    };
                    log_info!(
                        "Scan session {} ended: {}",
                        finished.request_id,
                        outcome.as_str()
                    );
                    finished.finish(outcome, now)
                }
                None => return,
            },
        };

        if let Err(err) = self.db.upsert_scan_session(&record).await {
            log_error!(
                "Failed to record scan session {}: {err:#}",
                record.request_id
            );
        }
    }

    async fn persist_snapshot(&self, before: &ScanState, after: &ScanState) {
        let result = if after.phase == ScanPhase::Idle {
            match before.user_id.as_deref() {
                Some(user_id) => self.db.clear_snapshot(user_id).await,
                None => Ok(()),
            }
        } else {
            self.db.save_snapshot(after).await
        };

        if let Err(err) = result {
            log_error!("Failed to persist scan snapshot: {err:#}");
        }
    }
}

/// Outcome recorded if `action` ends the session.
fn session_ending(action: &ScanAction) -> SessionOutcome {
    match action {
        ScanAction::SaveSuccess => SessionOutcome::Saved,
        ScanAction::Cancel => SessionOutcome::Cancelled,
        _ => SessionOutcome::Abandoned,
    }
}
