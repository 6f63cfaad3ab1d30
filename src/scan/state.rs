use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Transaction, TransactionPatch};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    Idle,
    Capturing,
    Scanning,
    Reviewing,
    Saving,
    Error,
}

impl Default for ScanPhase {
    fn default() -> Self {
        ScanPhase::Idle
    }
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Capturing => "capturing",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Reviewing => "reviewing",
            ScanPhase::Saving => "saving",
            ScanPhase::Error => "error",
        }
    }
}

/// Mode label without the per-mode payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Single,
    Batch,
    Statement,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanKind::Single => "single",
            ScanKind::Batch => "batch",
            ScanKind::Statement => "statement",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreditStatus {
    None,
    Reserved,
    Confirmed,
    Refunded,
}

impl Default for CreditStatus {
    fn default() -> Self {
        CreditStatus::None
    }
}

impl CreditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditStatus::None => "none",
            CreditStatus::Reserved => "reserved",
            CreditStatus::Confirmed => "confirmed",
            CreditStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CreditType {
    Normal,
    Super,
}

impl Default for CreditType {
    fn default() -> Self {
        CreditType::Normal
    }
}

impl CreditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditType::Normal => "normal",
            CreditType::Super => "super",
        }
    }
}

/// The metered credit held by a session. It is reserved at most once and then
/// resolved exactly once, to `Confirmed` or `Refunded`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreditState {
    pub status: CreditStatus,
    pub credit_type: Option<CreditType>,
    pub credits_count: u32,
}

impl CreditState {
    pub fn is_reserved(&self) -> bool {
        self.status == CreditStatus::Reserved
    }

    /// Settles a reserved credit. Anything other than `Reserved` is left as is.
    pub fn settle(&mut self, outcome: CreditStatus) {
        if self.is_reserved() {
            self.status = outcome;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub completed: Vec<Transaction>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchReceiptStatus {
    Ready,
    Review,
    Edited,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    pub id: String,
    pub index: usize,
    pub transaction: Transaction,
    pub status: BatchReceiptStatus,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchReceipt {
    pub fn apply(&mut self, patch: BatchReceiptPatch) {
        if let Some(transaction) = patch.transaction {
            self.transaction.apply(transaction);
        }
        if let Some(status) = patch.status {
            if status != BatchReceiptStatus::Error {
                self.error = None;
            }
            self.status = status;
        }
        if let Some(confidence) = patch.confidence {
            self.confidence = confidence;
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceiptPatch {
    #[serde(default)]
    pub transaction: Option<TransactionPatch>,
    #[serde(default)]
    pub status: Option<BatchReceiptStatus>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Batch-only session data. Lives inside [`ScanMode::Batch`] so single and
/// statement sessions cannot carry it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSession {
    pub progress: BatchProgress,
    #[serde(default)]
    pub receipts: Option<Vec<BatchReceipt>>,
    #[serde(default)]
    pub editing_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScanMode {
    Single,
    Batch(BatchSession),
    Statement,
}

impl Default for ScanMode {
    fn default() -> Self {
        ScanMode::Single
    }
}

impl ScanMode {
    pub fn fresh(kind: ScanKind) -> Self {
        match kind {
            ScanKind::Single => ScanMode::Single,
            ScanKind::Batch => ScanMode::Batch(BatchSession::default()),
            ScanKind::Statement => ScanMode::Statement,
        }
    }

    pub fn kind(&self) -> ScanKind {
        match self {
            ScanMode::Single => ScanKind::Single,
            ScanMode::Batch(_) => ScanKind::Batch,
            ScanMode::Statement => ScanKind::Statement,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DialogType {
    CurrencyMismatch,
    TotalMismatch,
    Quicksave,
    ScanComplete,
    CancelWarning,
    BatchCancelWarning,
    BatchDiscard,
    BatchComplete,
    CreditWarning,
}

/// A blocking modal request that must be resolved or dismissed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanDialog {
    #[serde(rename = "type")]
    pub kind: DialogType,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub phase: ScanPhase,
    pub mode: ScanMode,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    /// Epoch milliseconds.
    pub started_at: Option<i64>,
    /// Base64-encoded captures, in capture order.
    pub images: Vec<String>,
    pub store_type: Option<String>,
    pub currency: Option<String>,
    pub credit: CreditState,
    pub results: Vec<Transaction>,
    pub active_dialog: Option<ScanDialog>,
    pub active_result_index: usize,
    pub error: Option<String>,
}

impl ScanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self) -> Option<&BatchSession> {
        match &self.mode {
            ScanMode::Batch(batch) => Some(batch),
            _ => None,
        }
    }

    pub fn batch_mut(&mut self) -> Option<&mut BatchSession> {
        match &mut self.mode {
            ScanMode::Batch(batch) => Some(batch),
            _ => None,
        }
    }

    /// Overlays the fields present in a persisted snapshot.
    pub fn merge(&mut self, restored: RestoredState) {
        if let Some(phase) = restored.phase {
            self.phase = phase;
        }
        if let Some(mode) = restored.mode {
            self.mode = mode;
        }
        if restored.request_id.is_some() {
            self.request_id = restored.request_id;
        }
        if restored.user_id.is_some() {
            self.user_id = restored.user_id;
        }
        if restored.started_at.is_some() {
            self.started_at = restored.started_at;
        }
        if let Some(images) = restored.images {
            self.images = images;
        }
        if restored.store_type.is_some() {
            self.store_type = restored.store_type;
        }
        if restored.currency.is_some() {
            self.currency = restored.currency;
        }
        if let Some(credit) = restored.credit {
            self.credit = credit;
        }
        if let Some(results) = restored.results {
            self.results = results;
        }
        if restored.active_dialog.is_some() {
            self.active_dialog = restored.active_dialog;
        }
        if let Some(index) = restored.active_result_index {
            self.active_result_index = index;
        }
        if restored.error.is_some() {
            self.error = restored.error;
        }
    }
}

/// Partial [`ScanState`] loaded from crash-recovery storage. Absent fields keep
/// the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RestoredState {
    pub phase: Option<ScanPhase>,
    pub mode: Option<ScanMode>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub started_at: Option<i64>,
    pub images: Option<Vec<String>>,
    pub store_type: Option<String>,
    pub currency: Option<String>,
    pub credit: Option<CreditState>,
    pub results: Option<Vec<Transaction>>,
    pub active_dialog: Option<ScanDialog>,
    pub active_result_index: Option<usize>,
    pub error: Option<String>,
}

impl From<ScanState> for RestoredState {
    fn from(state: ScanState) -> Self {
        Self {
            phase: Some(state.phase),
            mode: Some(state.mode),
            request_id: state.request_id,
            user_id: state.user_id,
            started_at: state.started_at,
            images: Some(state.images),
            store_type: state.store_type,
            currency: state.currency,
            credit: Some(state.credit),
            results: Some(state.results),
            active_dialog: state.active_dialog,
            active_result_index: Some(state.active_result_index),
            error: state.error,
        }
    }
}
