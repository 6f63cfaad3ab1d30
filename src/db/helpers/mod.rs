use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::SessionOutcome;
use crate::scan::{CreditStatus, CreditType, ScanKind, ScanPhase};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_phase(value: &str) -> Result<ScanPhase> {
    match value {
        "idle" => Ok(ScanPhase::Idle),
        "capturing" => Ok(ScanPhase::Capturing),
        "scanning" => Ok(ScanPhase::Scanning),
        "reviewing" => Ok(ScanPhase::Reviewing),
        "saving" => Ok(ScanPhase::Saving),
        "error" => Ok(ScanPhase::Error),
        other => Err(anyhow!("unknown scan phase {other}")),
    }
}

pub fn parse_kind(value: &str) -> Result<ScanKind> {
    match value {
        "single" => Ok(ScanKind::Single),
        "batch" => Ok(ScanKind::Batch),
        "statement" => Ok(ScanKind::Statement),
        other => Err(anyhow!("unknown scan mode {other}")),
    }
}

pub fn parse_credit_status(value: &str) -> Result<CreditStatus> {
    match value {
        "none" => Ok(CreditStatus::None),
        "reserved" => Ok(CreditStatus::Reserved),
        "confirmed" => Ok(CreditStatus::Confirmed),
        "refunded" => Ok(CreditStatus::Refunded),
        other => Err(anyhow!("unknown credit status {other}")),
    }
}

pub fn parse_credit_type(value: Option<String>) -> Result<Option<CreditType>> {
    match value.as_deref() {
        None => Ok(None),
        Some("normal") => Ok(Some(CreditType::Normal)),
        Some("super") => Ok(Some(CreditType::Super)),
        Some(other) => Err(anyhow!("unknown credit type {other}")),
    }
}

pub fn parse_outcome(value: &str) -> Result<SessionOutcome> {
    match value {
        "Active" => Ok(SessionOutcome::Active),
        "Saved" => Ok(SessionOutcome::Saved),
        "Cancelled" => Ok(SessionOutcome::Cancelled),
        "Abandoned" => Ok(SessionOutcome::Abandoned),
        "Interrupted" => Ok(SessionOutcome::Interrupted),
        other => Err(anyhow!("unknown session outcome {other}")),
    }
}
