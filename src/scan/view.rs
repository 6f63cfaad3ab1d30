//! Values derived from [`ScanState`] that the UI reads to decide what to render.

use serde::{Deserialize, Serialize};

use super::state::{ScanKind, ScanPhase, ScanState};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScanView {
    None,
    SingleCapture,
    BatchCapture,
    StatementCapture,
    Processing,
    SingleReview,
    BatchReview,
    StatementReview,
    Error,
}

impl ScanView {
    pub fn of(state: &ScanState) -> Self {
        let kind = state.mode.kind();
        match state.phase {
            ScanPhase::Idle => ScanView::None,
            ScanPhase::Capturing => match kind {
                ScanKind::Single => ScanView::SingleCapture,
                ScanKind::Batch => ScanView::BatchCapture,
                ScanKind::Statement => ScanView::StatementCapture,
            },
            ScanPhase::Scanning => ScanView::Processing,
            // Saving keeps the review screen up until the write settles.
            ScanPhase::Reviewing | ScanPhase::Saving => match kind {
                ScanKind::Single => ScanView::SingleReview,
                ScanKind::Batch => ScanView::BatchReview,
                ScanKind::Statement => ScanView::StatementReview,
            },
            ScanPhase::Error => ScanView::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanFlags {
    pub has_active_request: bool,
    pub is_processing: bool,
    /// Background navigation is blocked only while a session has a dialog open.
    pub is_blocking: bool,
    pub can_navigate_freely: bool,
    pub can_save: bool,
    pub current_view: ScanView,
}

impl ScanFlags {
    pub fn of(state: &ScanState) -> Self {
        let has_active_request = state.phase != ScanPhase::Idle;
        let has_dialog = state.active_dialog.is_some();
        let is_processing = matches!(state.phase, ScanPhase::Scanning | ScanPhase::Saving);
        let can_save = state.phase == ScanPhase::Reviewing
            && state.results.iter().any(|result| result.has_amount());

        Self {
            has_active_request,
            is_processing,
            is_blocking: has_active_request && has_dialog,
            can_navigate_freely: !has_dialog && !is_processing,
            can_save,
            current_view: ScanView::of(state),
        }
    }
}
