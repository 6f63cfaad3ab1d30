//! Scan session history records.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::{CreditStatus, CreditType, ScanKind, ScanPhase, ScanState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionOutcome {
    Active,
    Saved,
    Cancelled,
    Abandoned,
    Interrupted,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Active => "Active",
            SessionOutcome::Saved => "Saved",
            SessionOutcome::Cancelled => "Cancelled",
            SessionOutcome::Abandoned => "Abandoned",
            SessionOutcome::Interrupted => "Interrupted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSessionRecord {
    pub request_id: String,
    pub user_id: String,
    pub mode: ScanKind,
    pub phase: ScanPhase,
    pub credit_status: CreditStatus,
    pub credit_type: Option<CreditType>,
    pub credits_count: u32,
    pub image_count: u32,
    pub result_count: u32,
    pub outcome: SessionOutcome,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ScanSessionRecord {
    /// Captures the bookkeeping fields of an active session. Returns `None`
    /// for a state that carries no session identity.
    pub fn from_state(state: &ScanState, now: DateTime<Utc>) -> Option<Self> {
        let request_id = state.request_id.clone()?;
        let user_id = state.user_id.clone()?;
        let started_at = state
            .started_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now);

        Some(Self {
            request_id,
            user_id,
            mode: state.mode.kind(),
            phase: state.phase,
            credit_status: state.credit.status,
            credit_type: state.credit.credit_type,
            credits_count: state.credit.credits_count,
            image_count: u32::try_from(state.images.len()).unwrap_or(u32::MAX),
            result_count: u32::try_from(state.results.len()).unwrap_or(u32::MAX),
            outcome: SessionOutcome::Active,
            error: state.error.clone(),
            started_at,
            ended_at: None,
            updated_at: now,
        })
    }

    pub fn finish(mut self, outcome: SessionOutcome, ended_at: DateTime<Utc>) -> Self {
        self.outcome = outcome;
        self.ended_at = Some(ended_at);
        self.updated_at = ended_at;
        self
    }
}
