//! Actions accepted by the scan state machine.
//!
//! On the wire an action is `{"type": "ADD_IMAGE", "payload": {...}}`; unit
//! actions carry no payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::state::{
    BatchReceipt, BatchReceiptPatch, CreditType, DialogType, RestoredState, ScanDialog, ScanKind,
};
use crate::models::{Transaction, TransactionPatch};

fn new_request_id() -> String {
    format!("scan_{}", Uuid::new_v4())
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Payload of the `START_*` actions. Identity and clock are captured when the
/// action is created so the reducer stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub user_id: String,
    #[serde(default = "new_request_id")]
    pub request_id: String,
    #[serde(default = "now_ms")]
    pub started_at: i64,
}

impl SessionStart {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            request_id: new_request_id(),
            started_at: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ScanAction {
    StartSingle(SessionStart),
    StartBatch(SessionStart),
    StartStatement(SessionStart),
    AddImage {
        image: String,
    },
    RemoveImage {
        index: usize,
    },
    SetImages {
        images: Vec<String>,
    },
    SetStoreType {
        store_type: Option<String>,
    },
    SetCurrency {
        currency: Option<String>,
    },
    ProcessStart {
        credit_type: CreditType,
        credits_count: u32,
    },
    ProcessSuccess {
        results: Vec<Transaction>,
    },
    ProcessError {
        error: String,
    },
    BatchItemStart {
        index: usize,
    },
    BatchItemSuccess {
        index: usize,
        result: Transaction,
    },
    BatchItemError {
        index: usize,
        error: String,
    },
    BatchComplete {
        #[serde(default)]
        batch_receipts: Option<Vec<BatchReceipt>>,
    },
    SetBatchReceipts {
        receipts: Vec<BatchReceipt>,
    },
    UpdateBatchReceipt {
        id: String,
        updates: BatchReceiptPatch,
    },
    DiscardBatchReceipt {
        id: String,
    },
    ClearBatchReceipts,
    SetBatchEditingIndex {
        index: Option<usize>,
    },
    UpdateResult {
        index: usize,
        updates: TransactionPatch,
    },
    SetActiveResult {
        index: usize,
    },
    ShowDialog(ScanDialog),
    ResolveDialog {
        #[serde(rename = "type")]
        kind: DialogType,
        #[serde(default)]
        result: Option<Value>,
    },
    DismissDialog,
    SaveStart,
    SaveSuccess,
    SaveError {
        error: String,
    },
    Cancel,
    Reset,
    RestoreState(Box<RestoredState>),
    RefundCredit,
}

impl ScanAction {
    pub fn start(kind: ScanKind, user_id: impl Into<String>) -> Self {
        let start = SessionStart::new(user_id);
        match kind {
            ScanKind::Single => ScanAction::StartSingle(start),
            ScanKind::Batch => ScanAction::StartBatch(start),
            ScanKind::Statement => ScanAction::StartStatement(start),
        }
    }

    pub fn start_single(user_id: impl Into<String>) -> Self {
        Self::start(ScanKind::Single, user_id)
    }

    pub fn start_batch(user_id: impl Into<String>) -> Self {
        Self::start(ScanKind::Batch, user_id)
    }

    pub fn start_statement(user_id: impl Into<String>) -> Self {
        Self::start(ScanKind::Statement, user_id)
    }

    pub fn add_image(image: impl Into<String>) -> Self {
        ScanAction::AddImage {
            image: image.into(),
        }
    }

    pub fn process_start(credit_type: CreditType, credits_count: u32) -> Self {
        ScanAction::ProcessStart {
            credit_type,
            credits_count,
        }
    }

    pub fn process_error(error: impl Into<String>) -> Self {
        ScanAction::ProcessError {
            error: error.into(),
        }
    }

    pub fn save_error(error: impl Into<String>) -> Self {
        ScanAction::SaveError {
            error: error.into(),
        }
    }

    pub fn show_dialog(kind: DialogType, data: Value) -> Self {
        ScanAction::ShowDialog(ScanDialog { kind, data })
    }

    pub fn resolve_dialog(kind: DialogType, result: Option<Value>) -> Self {
        ScanAction::ResolveDialog { kind, result }
    }

    pub fn restore(restored: RestoredState) -> Self {
        ScanAction::RestoreState(Box::new(restored))
    }

    /// Wire name of the action, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ScanAction::StartSingle(_) => "START_SINGLE",
            ScanAction::StartBatch(_) => "START_BATCH",
            ScanAction::StartStatement(_) => "START_STATEMENT",
            ScanAction::AddImage { .. } => "ADD_IMAGE",
            ScanAction::RemoveImage { .. } => "REMOVE_IMAGE",
            ScanAction::SetImages { .. } => "SET_IMAGES",
            ScanAction::SetStoreType { .. } => "SET_STORE_TYPE",
            ScanAction::SetCurrency { .. } => "SET_CURRENCY",
            ScanAction::ProcessStart { .. } => "PROCESS_START",
            ScanAction::ProcessSuccess { .. } => "PROCESS_SUCCESS",
            ScanAction::ProcessError { .. } => "PROCESS_ERROR",
            ScanAction::BatchItemStart { .. } => "BATCH_ITEM_START",
            ScanAction::BatchItemSuccess { .. } => "BATCH_ITEM_SUCCESS",
            ScanAction::BatchItemError { .. } => "BATCH_ITEM_ERROR",
            ScanAction::BatchComplete { .. } => "BATCH_COMPLETE",
            ScanAction::SetBatchReceipts { .. } => "SET_BATCH_RECEIPTS",
            ScanAction::UpdateBatchReceipt { .. } => "UPDATE_BATCH_RECEIPT",
            ScanAction::DiscardBatchReceipt { .. } => "DISCARD_BATCH_RECEIPT",
            ScanAction::ClearBatchReceipts => "CLEAR_BATCH_RECEIPTS",
            ScanAction::SetBatchEditingIndex { .. } => "SET_BATCH_EDITING_INDEX",
            ScanAction::UpdateResult { .. } => "UPDATE_RESULT",
            ScanAction::SetActiveResult { .. } => "SET_ACTIVE_RESULT",
            ScanAction::ShowDialog(_) => "SHOW_DIALOG",
            ScanAction::ResolveDialog { .. } => "RESOLVE_DIALOG",
            ScanAction::DismissDialog => "DISMISS_DIALOG",
            ScanAction::SaveStart => "SAVE_START",
            ScanAction::SaveSuccess => "SAVE_SUCCESS",
            ScanAction::SaveError { .. } => "SAVE_ERROR",
            ScanAction::Cancel => "CANCEL",
            ScanAction::Reset => "RESET",
            ScanAction::RestoreState(_) => "RESTORE_STATE",
            ScanAction::RefundCredit => "REFUND_CREDIT",
        }
    }
}
