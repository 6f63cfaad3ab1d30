//! Pure transition function for the scan session.
//!
//! `transition(state, action)` returns the next state and whether the action
//! was applied. An action that is not valid for the current state is ignored:
//! the returned state is the input state, unchanged, and the outcome names the
//! reason. Nothing here performs I/O.

use std::fmt;

use super::action::{ScanAction, SessionStart};
use super::state::{
    BatchFailure, CreditState, CreditStatus, ScanKind, ScanMode, ScanPhase, ScanState,
};

/// Error surfaced when a snapshot claims a scan was still in flight.
pub const INTERRUPTED_SCAN_MESSAGE: &str = "Scan was interrupted. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    SessionActive { phase: ScanPhase },
    WrongPhase { expected: &'static [ScanPhase], actual: ScanPhase },
    NotBatchMode,
    NoImages,
    CreditAlreadyUsed { status: CreditStatus },
    CreditNotReserved { status: CreditStatus },
    IndexOutOfRange { index: usize, len: usize },
    ReceiptNotFound { id: String },
    NoBatchReceipts,
    DialogMismatch,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SessionActive { phase } => {
                write!(f, "a session is already active ({})", phase.as_str())
            }
            Rejection::WrongPhase { expected, actual } => {
                let expected: Vec<&str> = expected.iter().map(ScanPhase::as_str).collect();
                write!(
                    f,
                    "phase is {} but expected one of [{}]",
                    actual.as_str(),
                    expected.join(", ")
                )
            }
            Rejection::NotBatchMode => write!(f, "session is not a batch scan"),
            Rejection::NoImages => write!(f, "no images captured"),
            Rejection::CreditAlreadyUsed { status } => {
                write!(f, "credit already {} for this session", status.as_str())
            }
            Rejection::CreditNotReserved { status } => {
                write!(f, "credit is {}, not reserved", status.as_str())
            }
            Rejection::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for length {len}")
            }
            Rejection::ReceiptNotFound { id } => write!(f, "no batch receipt with id {id}"),
            Rejection::NoBatchReceipts => write!(f, "batch receipts are not set"),
            Rejection::DialogMismatch => write!(f, "active dialog does not match"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied,
    Ignored(Rejection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ScanState,
    pub outcome: Outcome,
}

impl Transition {
    fn applied(state: ScanState) -> Self {
        Self {
            state,
            outcome: Outcome::Applied,
        }
    }

    fn ignored(state: ScanState, reason: Rejection) -> Self {
        Self {
            state,
            outcome: Outcome::Ignored(reason),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == Outcome::Applied
    }
}

type Step = Result<(), Rejection>;

const CAPTURING: &[ScanPhase] = &[ScanPhase::Capturing];
const SCANNING: &[ScanPhase] = &[ScanPhase::Scanning];
const REVIEWING: &[ScanPhase] = &[ScanPhase::Reviewing];
const SAVING: &[ScanPhase] = &[ScanPhase::Saving];
const CANCELLABLE: &[ScanPhase] = &[
    ScanPhase::Capturing,
    ScanPhase::Scanning,
    ScanPhase::Reviewing,
    ScanPhase::Error,
];

fn require_phase(state: &ScanState, expected: &'static [ScanPhase]) -> Step {
    if expected.contains(&state.phase) {
        Ok(())
    } else {
        Err(Rejection::WrongPhase {
            expected,
            actual: state.phase,
        })
    }
}

fn require_batch(state: &ScanState) -> Step {
    if state.batch().is_some() {
        Ok(())
    } else {
        Err(Rejection::NotBatchMode)
    }
}

fn require_batch_review(state: &ScanState) -> Step {
    require_batch(state)?;
    require_phase(state, REVIEWING)
}

/// Applies `action` to `state`.
pub fn transition(state: ScanState, action: ScanAction) -> Transition {
    let mut next = state.clone();
    match apply(&mut next, action) {
        Ok(()) => Transition::applied(next),
        Err(reason) => Transition::ignored(state, reason),
    }
}

/// Convenience wrapper for callers that only need the next state.
pub fn reduce(state: ScanState, action: ScanAction) -> ScanState {
    transition(state, action).state
}

fn apply(state: &mut ScanState, action: ScanAction) -> Step {
    match action {
        ScanAction::StartSingle(start) => start_session(state, ScanKind::Single, start),
        ScanAction::StartBatch(start) => start_session(state, ScanKind::Batch, start),
        ScanAction::StartStatement(start) => start_session(state, ScanKind::Statement, start),

        ScanAction::AddImage { image } => {
            require_phase(state, CAPTURING)?;
            state.images.push(image);
            if let Some(batch) = state.batch_mut() {
                batch.progress.total += 1;
            }
            Ok(())
        }
        ScanAction::RemoveImage { index } => {
            let len = state.images.len();
            if index >= len {
                return Err(Rejection::IndexOutOfRange { index, len });
            }
            state.images.remove(index);
            let remaining = state.images.len();
            if state.phase == ScanPhase::Capturing {
                if let Some(batch) = state.batch_mut() {
                    batch.progress.total = remaining;
                }
            }
            Ok(())
        }
        ScanAction::SetImages { images } => {
            require_phase(state, CAPTURING)?;
            let count = images.len();
            state.images = images;
            if let Some(batch) = state.batch_mut() {
                batch.progress.total = count;
            }
            Ok(())
        }
        ScanAction::SetStoreType { store_type } => {
            require_phase(state, CAPTURING)?;
            state.store_type = store_type;
            Ok(())
        }
        ScanAction::SetCurrency { currency } => {
            require_phase(state, CAPTURING)?;
            state.currency = currency;
            Ok(())
        }

        ScanAction::ProcessStart {
            credit_type,
            credits_count,
        } => {
            require_phase(state, CAPTURING)?;
            if state.images.is_empty() {
                return Err(Rejection::NoImages);
            }
            if state.credit.status != CreditStatus::None {
                return Err(Rejection::CreditAlreadyUsed {
                    status: state.credit.status,
                });
            }
            state.phase = ScanPhase::Scanning;
            state.error = None;
            state.credit = CreditState {
                status: CreditStatus::Reserved,
                credit_type: Some(credit_type),
                credits_count,
            };
            Ok(())
        }
        ScanAction::ProcessSuccess { results } => {
            require_phase(state, SCANNING)?;
            state.phase = ScanPhase::Reviewing;
            state.credit.settle(CreditStatus::Confirmed);
            state.results = results;
            state.active_result_index = 0;
            state.error = None;
            Ok(())
        }
        ScanAction::ProcessError { error } => {
            require_phase(state, SCANNING)?;
            state.phase = ScanPhase::Error;
            state.credit.settle(CreditStatus::Refunded);
            state.error = Some(error);
            Ok(())
        }

        ScanAction::BatchItemStart { index } => {
            let batch = state.batch_mut().ok_or(Rejection::NotBatchMode)?;
            batch.progress.current = index;
            Ok(())
        }
        ScanAction::BatchItemSuccess { index, result } => {
            let batch = state.batch_mut().ok_or(Rejection::NotBatchMode)?;
            batch.progress.current = index;
            batch.progress.completed.push(result);
            Ok(())
        }
        ScanAction::BatchItemError { index, error } => {
            let batch = state.batch_mut().ok_or(Rejection::NotBatchMode)?;
            batch.progress.current = index;
            batch.progress.failed.push(BatchFailure { index, error });
            Ok(())
        }
        ScanAction::BatchComplete { batch_receipts } => {
            require_batch(state)?;
            require_phase(state, SCANNING)?;
            let completed = match state.batch_mut() {
                Some(batch) => {
                    if let Some(receipts) = batch_receipts {
                        batch.receipts = Some(receipts);
                    }
                    batch.progress.completed.clone()
                }
                None => return Err(Rejection::NotBatchMode),
            };
            state.phase = ScanPhase::Reviewing;
            state.credit.settle(CreditStatus::Confirmed);
            state.results = completed;
            state.active_result_index = 0;
            Ok(())
        }

        ScanAction::SetBatchReceipts { receipts } => {
            require_batch_review(state)?;
            if let Some(batch) = state.batch_mut() {
                batch.receipts = Some(receipts);
            }
            Ok(())
        }
        ScanAction::UpdateBatchReceipt { id, updates } => {
            require_batch_review(state)?;
            let receipts = state
                .batch_mut()
                .and_then(|batch| batch.receipts.as_mut())
                .ok_or(Rejection::NoBatchReceipts)?;
            let receipt = receipts
                .iter_mut()
                .find(|receipt| receipt.id == id)
                .ok_or(Rejection::ReceiptNotFound { id })?;
            receipt.apply(updates);
            Ok(())
        }
        ScanAction::DiscardBatchReceipt { id } => {
            require_batch_review(state)?;
            let batch = state.batch_mut().ok_or(Rejection::NotBatchMode)?;
            let receipts = batch.receipts.as_mut().ok_or(Rejection::NoBatchReceipts)?;
            let position = receipts
                .iter()
                .position(|receipt| receipt.id == id)
                .ok_or(Rejection::ReceiptNotFound { id })?;
            receipts.remove(position);
            batch.editing_index = match batch.editing_index {
                Some(editing) if editing == position => None,
                Some(editing) if editing > position => Some(editing - 1),
                other => other,
            };
            Ok(())
        }
        ScanAction::ClearBatchReceipts => {
            if let Some(batch) = state.batch_mut() {
                batch.receipts = None;
                batch.editing_index = None;
            }
            Ok(())
        }
        ScanAction::SetBatchEditingIndex { index: None } => {
            if let Some(batch) = state.batch_mut() {
                batch.editing_index = None;
            }
            Ok(())
        }
        ScanAction::SetBatchEditingIndex { index: Some(index) } => {
            require_batch_review(state)?;
            let batch = state.batch_mut().ok_or(Rejection::NotBatchMode)?;
            let len = batch.receipts.as_ref().map_or(0, Vec::len);
            if index >= len {
                return Err(Rejection::IndexOutOfRange { index, len });
            }
            batch.editing_index = Some(index);
            Ok(())
        }

        ScanAction::UpdateResult { index, updates } => {
            require_phase(state, REVIEWING)?;
            let len = state.results.len();
            let result = state
                .results
                .get_mut(index)
                .ok_or(Rejection::IndexOutOfRange { index, len })?;
            result.apply(updates);
            Ok(())
        }
        ScanAction::SetActiveResult { index } => {
            state.active_result_index = index;
            Ok(())
        }

        ScanAction::ShowDialog(dialog) => {
            state.active_dialog = Some(dialog);
            Ok(())
        }
        ScanAction::ResolveDialog { kind, .. } => {
            let matches = state
                .active_dialog
                .as_ref()
                .is_some_and(|dialog| dialog.kind == kind);
            if !matches {
                return Err(Rejection::DialogMismatch);
            }
            state.active_dialog = None;
            Ok(())
        }
        ScanAction::DismissDialog => {
            state.active_dialog = None;
            Ok(())
        }

        ScanAction::SaveStart => {
            require_phase(state, REVIEWING)?;
            state.phase = ScanPhase::Saving;
            state.error = None;
            Ok(())
        }
        ScanAction::SaveSuccess | ScanAction::Reset => {
            *state = ScanState::new();
            Ok(())
        }
        ScanAction::SaveError { error } => {
            require_phase(state, SAVING)?;
            state.phase = ScanPhase::Reviewing;
            state.error = Some(error);
            Ok(())
        }
        ScanAction::Cancel => {
            require_phase(state, CANCELLABLE)?;
            *state = ScanState::new();
            Ok(())
        }

        ScanAction::RestoreState(restored) => {
            state.merge(*restored);
            if state.phase == ScanPhase::Scanning {
                state.phase = ScanPhase::Error;
                state.credit.status = CreditStatus::Refunded;
                state.error = Some(INTERRUPTED_SCAN_MESSAGE.to_string());
            }
            Ok(())
        }
        ScanAction::RefundCredit => {
            if !state.credit.is_reserved() {
                return Err(Rejection::CreditNotReserved {
                    status: state.credit.status,
                });
            }
            state.credit.status = CreditStatus::Refunded;
            Ok(())
        }
    }
}

fn start_session(state: &mut ScanState, kind: ScanKind, start: SessionStart) -> Step {
    if state.phase != ScanPhase::Idle {
        return Err(Rejection::SessionActive { phase: state.phase });
    }
    *state = ScanState {
        phase: ScanPhase::Capturing,
        mode: ScanMode::fresh(kind),
        request_id: Some(start.request_id),
        user_id: Some(start.user_id),
        started_at: Some(start.started_at),
        ..ScanState::new()
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{Transaction, TransactionPatch};
    use crate::scan::state::{
        BatchReceipt, BatchReceiptPatch, BatchReceiptStatus, CreditType, DialogType,
        RestoredState,
    };

    fn tx(merchant: &str, total: f64) -> Transaction {
        Transaction {
            merchant: merchant.into(),
            total,
            ..Default::default()
        }
    }

    fn receipt(id: &str, index: usize) -> BatchReceipt {
        BatchReceipt {
            id: id.into(),
            index,
            transaction: tx(id, 1000.0),
            status: BatchReceiptStatus::Ready,
            confidence: 0.9,
            error: None,
        }
    }

    fn run(actions: Vec<ScanAction>) -> ScanState {
        actions.into_iter().fold(ScanState::new(), reduce)
    }

    fn capturing_single() -> ScanState {
        run(vec![
            ScanAction::start_single("u1"),
            ScanAction::add_image("img1"),
        ])
    }

    fn scanning_single() -> ScanState {
        reduce(
            capturing_single(),
            ScanAction::process_start(CreditType::Normal, 1),
        )
    }

    fn reviewing_single() -> ScanState {
        reduce(
            scanning_single(),
            ScanAction::ProcessSuccess {
                results: vec![tx("Lider", 12_990.0)],
            },
        )
    }

    fn scanning_batch() -> ScanState {
        run(vec![
            ScanAction::start_batch("u1"),
            ScanAction::add_image("img1"),
            ScanAction::add_image("img2"),
            ScanAction::process_start(CreditType::Super, 1),
            ScanAction::BatchItemStart { index: 0 },
            ScanAction::BatchItemSuccess {
                index: 0,
                result: tx("Jumbo", 4500.0),
            },
            ScanAction::BatchItemStart { index: 1 },
            ScanAction::BatchItemSuccess {
                index: 1,
                result: tx("Unimarc", 3200.0),
            },
        ])
    }

    fn reviewing_batch() -> ScanState {
        reduce(
            scanning_batch(),
            ScanAction::BatchComplete {
                batch_receipts: Some(vec![receipt("r1", 0), receipt("r2", 1)]),
            },
        )
    }

    #[test]
    fn test_start_single_enters_capturing() {
        let state = reduce(ScanState::new(), ScanAction::start_single("u1"));

        assert_eq!(state.phase, ScanPhase::Capturing);
        assert_eq!(state.mode, ScanMode::Single);
        assert_eq!(state.user_id.as_deref(), Some("u1"));
        assert!(state.request_id.is_some());
        assert!(state.started_at.is_some());
    }

    #[test]
    fn test_second_start_keeps_first_request() {
        let first = reduce(ScanState::new(), ScanAction::start_single("u1"));
        let result = transition(first.clone(), ScanAction::start_single("u2"));

        assert_eq!(result.state, first);
        assert_eq!(result.state.user_id.as_deref(), Some("u1"));
        assert_eq!(
            result.outcome,
            Outcome::Ignored(Rejection::SessionActive {
                phase: ScanPhase::Capturing
            })
        );
    }

    #[test]
    fn test_start_batch_counts_added_images() {
        let state = run(vec![
            ScanAction::start_batch("u1"),
            ScanAction::add_image("img1"),
            ScanAction::add_image("img2"),
        ]);

        assert_eq!(state.batch().unwrap().progress.total, 2);
        assert_eq!(state.images.len(), 2);
    }

    #[test]
    fn test_add_image_outside_capturing_is_ignored() {
        let state = scanning_single();
        let result = transition(state.clone(), ScanAction::add_image("late"));

        assert!(!result.is_applied());
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_remove_image_keeps_batch_total_in_step() {
        let state = run(vec![
            ScanAction::start_batch("u1"),
            ScanAction::add_image("img1"),
            ScanAction::add_image("img2"),
            ScanAction::RemoveImage { index: 0 },
        ]);

        assert_eq!(state.images, vec!["img2".to_string()]);
        assert_eq!(state.batch().unwrap().progress.total, 1);
    }

    #[test]
    fn test_remove_image_out_of_range_is_ignored() {
        let state = capturing_single();
        let result = transition(state.clone(), ScanAction::RemoveImage { index: 5 });

        assert_eq!(result.state, state);
    }

    #[test]
    fn test_set_images_replaces_and_resizes_batch() {
        let state = run(vec![
            ScanAction::start_batch("u1"),
            ScanAction::add_image("img1"),
            ScanAction::SetImages {
                images: vec!["a".into(), "b".into(), "c".into()],
            },
        ]);

        assert_eq!(state.images.len(), 3);
        assert_eq!(state.batch().unwrap().progress.total, 3);
    }

    #[test]
    fn test_hints_only_while_capturing() {
        let state = run(vec![
            ScanAction::start_single("u1"),
            ScanAction::SetStoreType {
                store_type: Some("supermarket".into()),
            },
            ScanAction::SetCurrency {
                currency: Some("CLP".into()),
            },
        ]);
        assert_eq!(state.store_type.as_deref(), Some("supermarket"));
        assert_eq!(state.currency.as_deref(), Some("CLP"));

        let idle = transition(
            ScanState::new(),
            ScanAction::SetCurrency {
                currency: Some("USD".into()),
            },
        );
        assert!(!idle.is_applied());
    }

    #[test]
    fn test_process_start_reserves_credit() {
        let state = scanning_single();

        assert_eq!(state.phase, ScanPhase::Scanning);
        assert_eq!(state.credit.status, CreditStatus::Reserved);
        assert_eq!(state.credit.credit_type, Some(CreditType::Normal));
        assert_eq!(state.credit.credits_count, 1);
    }

    #[test]
    fn test_process_start_requires_images() {
        let state = reduce(ScanState::new(), ScanAction::start_single("u1"));
        let result = transition(state.clone(), ScanAction::process_start(CreditType::Normal, 1));

        assert_eq!(result.outcome, Outcome::Ignored(Rejection::NoImages));
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_process_success_confirms_credit() {
        let state = reviewing_single();

        assert_eq!(state.phase, ScanPhase::Reviewing);
        assert_eq!(state.credit.status, CreditStatus::Confirmed);
        assert_eq!(state.results.len(), 1);
    }

    #[test]
    fn test_process_error_refunds_credit() {
        let state = reduce(scanning_single(), ScanAction::process_error("net down"));

        assert_eq!(state.phase, ScanPhase::Error);
        assert_eq!(state.credit.status, CreditStatus::Refunded);
        assert_eq!(state.error.as_deref(), Some("net down"));
    }

    #[test]
    fn test_credit_resolves_only_once() {
        let errored = reduce(scanning_single(), ScanAction::process_error("boom"));

        let late_success = transition(
            errored.clone(),
            ScanAction::ProcessSuccess {
                results: vec![tx("x", 1.0)],
            },
        );
        assert_eq!(late_success.state, errored);

        let refund_again = transition(errored.clone(), ScanAction::RefundCredit);
        assert_eq!(
            refund_again.outcome,
            Outcome::Ignored(Rejection::CreditNotReserved {
                status: CreditStatus::Refunded
            })
        );

        let refund_confirmed = transition(reviewing_single(), ScanAction::RefundCredit);
        assert!(!refund_confirmed.is_applied());
        assert_eq!(
            refund_confirmed.state.credit.status,
            CreditStatus::Confirmed
        );
    }

    #[test]
    fn test_refund_credit_from_reserved() {
        let state = reduce(scanning_single(), ScanAction::RefundCredit);
        assert_eq!(state.credit.status, CreditStatus::Refunded);
        assert_eq!(state.phase, ScanPhase::Scanning);
    }

    #[test]
    fn test_batch_items_track_progress() {
        let state = reduce(
            scanning_batch(),
            ScanAction::BatchItemError {
                index: 2,
                error: "blurry".into(),
            },
        );
        let progress = &state.batch().unwrap().progress;

        assert_eq!(progress.current, 2);
        assert_eq!(progress.completed.len(), 2);
        assert_eq!(
            progress.failed,
            vec![BatchFailure {
                index: 2,
                error: "blurry".into()
            }]
        );
    }

    #[test]
    fn test_batch_item_outside_batch_mode_is_ignored() {
        let result = transition(scanning_single(), ScanAction::BatchItemStart { index: 0 });
        assert_eq!(result.outcome, Outcome::Ignored(Rejection::NotBatchMode));
    }

    #[test]
    fn test_batch_complete_sets_results_and_receipts_together() {
        let before = scanning_batch();
        let completed = before.batch().unwrap().progress.completed.clone();
        let receipts = vec![receipt("r1", 0), receipt("r2", 1)];

        let state = reduce(
            before,
            ScanAction::BatchComplete {
                batch_receipts: Some(receipts.clone()),
            },
        );

        assert_eq!(state.phase, ScanPhase::Reviewing);
        assert_eq!(state.credit.status, CreditStatus::Confirmed);
        assert_eq!(state.results, completed);
        assert_eq!(state.batch().unwrap().receipts, Some(receipts));
    }

    #[test]
    fn test_batch_complete_without_receipts_preserves_existing() {
        let mut before = scanning_batch();
        before.batch_mut().unwrap().receipts = Some(vec![receipt("kept", 0)]);

        let state = reduce(
            before,
            ScanAction::BatchComplete {
                batch_receipts: None,
            },
        );

        assert_eq!(
            state.batch().unwrap().receipts,
            Some(vec![receipt("kept", 0)])
        );
    }

    #[test]
    fn test_batch_receipt_mutations_need_batch_review() {
        let state = scanning_batch();
        let result = transition(
            state.clone(),
            ScanAction::SetBatchReceipts {
                receipts: vec![receipt("r1", 0)],
            },
        );
        assert_eq!(result.state, state);

        let single = transition(
            reviewing_single(),
            ScanAction::SetBatchReceipts {
                receipts: vec![receipt("r1", 0)],
            },
        );
        assert_eq!(single.outcome, Outcome::Ignored(Rejection::NotBatchMode));
    }

    #[test]
    fn test_update_batch_receipt_by_id() {
        let state = reduce(
            reviewing_batch(),
            ScanAction::UpdateBatchReceipt {
                id: "r2".into(),
                updates: BatchReceiptPatch {
                    status: Some(BatchReceiptStatus::Edited),
                    transaction: Some(TransactionPatch {
                        total: Some(3500.0),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            },
        );
        let receipts = state.batch().unwrap().receipts.as_ref().unwrap();

        assert_eq!(receipts[1].status, BatchReceiptStatus::Edited);
        assert_eq!(receipts[1].transaction.total, 3500.0);
        assert_eq!(receipts[0], receipt("r1", 0));
    }

    #[test]
    fn test_update_unknown_receipt_is_ignored() {
        let state = reviewing_batch();
        let result = transition(
            state.clone(),
            ScanAction::UpdateBatchReceipt {
                id: "missing".into(),
                updates: BatchReceiptPatch::default(),
            },
        );

        assert_eq!(result.state, state);
        assert_eq!(
            result.outcome,
            Outcome::Ignored(Rejection::ReceiptNotFound {
                id: "missing".into()
            })
        );
    }

    #[test]
    fn test_update_receipt_without_receipts_is_ignored() {
        let state = reduce(
            scanning_batch(),
            ScanAction::BatchComplete {
                batch_receipts: None,
            },
        );
        let result = transition(
            state.clone(),
            ScanAction::DiscardBatchReceipt { id: "r1".into() },
        );

        assert_eq!(result.outcome, Outcome::Ignored(Rejection::NoBatchReceipts));
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_discard_batch_receipt_shifts_editing_index() {
        let state = run_from(
            reviewing_batch(),
            vec![
                ScanAction::SetBatchEditingIndex { index: Some(1) },
                ScanAction::DiscardBatchReceipt { id: "r1".into() },
            ],
        );
        let batch = state.batch().unwrap();

        assert_eq!(batch.receipts.as_ref().unwrap().len(), 1);
        assert_eq!(batch.editing_index, Some(0));
    }

    #[test]
    fn test_discarding_edited_receipt_clears_editing_index() {
        let state = run_from(
            reviewing_batch(),
            vec![
                ScanAction::SetBatchEditingIndex { index: Some(0) },
                ScanAction::DiscardBatchReceipt { id: "r1".into() },
            ],
        );

        assert_eq!(state.batch().unwrap().editing_index, None);
    }

    #[test]
    fn test_clear_batch_receipts_in_any_phase() {
        let mut state = scanning_batch();
        state.batch_mut().unwrap().receipts = Some(vec![receipt("r1", 0)]);

        let state = reduce(state, ScanAction::ClearBatchReceipts);
        assert_eq!(state.batch().unwrap().receipts, None);
    }

    #[test]
    fn test_editing_index_rules() {
        let reviewing = reviewing_batch();

        let set = reduce(
            reviewing.clone(),
            ScanAction::SetBatchEditingIndex { index: Some(1) },
        );
        assert_eq!(set.batch().unwrap().editing_index, Some(1));

        let out_of_range = transition(
            reviewing.clone(),
            ScanAction::SetBatchEditingIndex { index: Some(2) },
        );
        assert_eq!(out_of_range.state.batch().unwrap().editing_index, None);
        assert_eq!(
            out_of_range.outcome,
            Outcome::Ignored(Rejection::IndexOutOfRange { index: 2, len: 2 })
        );

        let mut scanning = scanning_batch();
        scanning.batch_mut().unwrap().editing_index = Some(0);
        let cleared = transition(scanning, ScanAction::SetBatchEditingIndex { index: None });
        assert!(cleared.is_applied());
        assert_eq!(cleared.state.batch().unwrap().editing_index, None);

        let idle = transition(
            ScanState::new(),
            ScanAction::SetBatchEditingIndex { index: None },
        );
        assert!(idle.is_applied());
        assert_eq!(idle.state, ScanState::new());
    }

    #[test]
    fn test_update_result_patches_one_entry() {
        let state = reduce(
            reviewing_single(),
            ScanAction::UpdateResult {
                index: 0,
                updates: TransactionPatch {
                    merchant: Some("Lider Express".into()),
                    ..Default::default()
                },
            },
        );
        assert_eq!(state.results[0].merchant, "Lider Express");
        assert_eq!(state.results[0].total, 12_990.0);

        let result = transition(
            state.clone(),
            ScanAction::UpdateResult {
                index: 3,
                updates: TransactionPatch::default(),
            },
        );
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_dialog_resolution_requires_matching_type() {
        let state = reduce(
            reviewing_single(),
            ScanAction::show_dialog(DialogType::CurrencyMismatch, json!({"detected": "USD"})),
        );

        let wrong = transition(
            state.clone(),
            ScanAction::resolve_dialog(DialogType::TotalMismatch, None),
        );
        assert_eq!(wrong.outcome, Outcome::Ignored(Rejection::DialogMismatch));
        assert!(wrong.state.active_dialog.is_some());

        let resolved = reduce(
            state.clone(),
            ScanAction::resolve_dialog(DialogType::CurrencyMismatch, Some(json!("CLP"))),
        );
        assert!(resolved.active_dialog.is_none());

        let dismissed = reduce(state, ScanAction::DismissDialog);
        assert!(dismissed.active_dialog.is_none());
    }

    #[test]
    fn test_save_success_returns_initial_state() {
        let state = run_from(
            reviewing_single(),
            vec![ScanAction::SaveStart, ScanAction::SaveSuccess],
        );
        assert_eq!(state, ScanState::new());

        let from_error = reduce(
            reduce(scanning_single(), ScanAction::process_error("x")),
            ScanAction::SaveSuccess,
        );
        assert_eq!(from_error, ScanState::new());
    }

    #[test]
    fn test_save_error_keeps_edits() {
        let edited = reduce(
            reviewing_single(),
            ScanAction::UpdateResult {
                index: 0,
                updates: TransactionPatch {
                    total: Some(9990.0),
                    ..Default::default()
                },
            },
        );
        let state = run_from(
            edited,
            vec![ScanAction::SaveStart, ScanAction::save_error("offline")],
        );

        assert_eq!(state.phase, ScanPhase::Reviewing);
        assert_eq!(state.error.as_deref(), Some("offline"));
        assert_eq!(state.results[0].total, 9990.0);
    }

    #[test]
    fn test_cancel_not_allowed_while_saving() {
        let saving = reduce(reviewing_single(), ScanAction::SaveStart);
        let result = transition(saving.clone(), ScanAction::Cancel);

        assert_eq!(result.state, saving);
        assert!(!result.is_applied());

        let reset = reduce(saving, ScanAction::Reset);
        assert_eq!(reset, ScanState::new());
    }

    #[test]
    fn test_cancel_from_active_phases() {
        let failed = reduce(reviewing_single(), ScanAction::process_error("late"));
        assert_eq!(failed.phase, ScanPhase::Reviewing);

        let error = reduce(scanning_single(), ScanAction::process_error("timeout"));
        for state in [
            capturing_single(),
            scanning_single(),
            reviewing_single(),
            failed,
            error,
        ] {
            let result = transition(state, ScanAction::Cancel);
            assert!(result.is_applied());
            assert_eq!(result.state, ScanState::new());
        }
    }

    #[test]
    fn test_cancel_when_idle_is_ignored() {
        let result = transition(ScanState::new(), ScanAction::Cancel);

        assert!(!result.is_applied());
        assert_eq!(result.state, ScanState::new());
    }

    fn single_mode_phases() -> Vec<ScanState> {
        let saving = reduce(reviewing_single(), ScanAction::SaveStart);
        let error = reduce(scanning_single(), ScanAction::process_error("timeout"));
        vec![
            ScanState::new(),
            capturing_single(),
            scanning_single(),
            reviewing_single(),
            saving,
            error,
        ]
    }

    fn batch_mode_phases() -> Vec<ScanState> {
        let capturing = run(vec![
            ScanAction::start_batch("u1"),
            ScanAction::add_image("img1"),
        ]);
        let error = reduce(scanning_batch(), ScanAction::process_error("timeout"));
        vec![capturing, scanning_batch(), reviewing_batch(), error]
    }

    #[test]
    fn test_gated_actions_outside_their_phases_leave_state_unchanged() {
        let gated: Vec<(ScanAction, &[ScanPhase])> = vec![
            (
                ScanAction::SetImages {
                    images: vec!["img9".into()],
                },
                CAPTURING,
            ),
            (
                ScanAction::SetCurrency {
                    currency: Some("USD".into()),
                },
                CAPTURING,
            ),
            (ScanAction::process_start(CreditType::Normal, 1), CAPTURING),
            (
                ScanAction::ProcessSuccess {
                    results: vec![tx("Lider", 1990.0)],
                },
                SCANNING,
            ),
            (ScanAction::process_error("timeout"), SCANNING),
            (ScanAction::SaveStart, REVIEWING),
            (ScanAction::save_error("offline"), SAVING),
            (ScanAction::Cancel, CANCELLABLE),
        ];

        for state in single_mode_phases() {
            let phase = state.phase.as_str();
            for (action, allowed) in &gated {
                let name = action.name();
                let result = transition(state.clone(), action.clone());
                if allowed.contains(&state.phase) {
                    assert!(result.is_applied(), "{name} should apply in {phase}");
                } else {
                    assert!(!result.is_applied(), "{name} should be ignored in {phase}");
                    assert_eq!(result.state, state, "{name} changed state in {phase}");
                }
            }
        }
    }

    #[test]
    fn test_batch_complete_only_while_scanning_a_batch() {
        let complete = ScanAction::BatchComplete {
            batch_receipts: Some(vec![receipt("r1", 0)]),
        };

        for state in batch_mode_phases() {
            let result = transition(state.clone(), complete.clone());
            if state.phase == ScanPhase::Scanning {
                assert!(result.is_applied());
            } else {
                assert!(!result.is_applied(), "applied in {}", state.phase.as_str());
                assert_eq!(result.state, state);
            }
        }

        for state in single_mode_phases() {
            let result = transition(state.clone(), complete.clone());
            assert!(!result.is_applied());
            assert_eq!(result.state, state);
        }
    }

    #[test]
    fn test_process_start_with_settled_credit_is_ignored() {
        let mut state = capturing_single();
        state.credit.status = CreditStatus::Confirmed;

        let result = transition(state.clone(), ScanAction::process_start(CreditType::Normal, 1));

        assert_eq!(
            result.outcome,
            Outcome::Ignored(Rejection::CreditAlreadyUsed {
                status: CreditStatus::Confirmed
            })
        );
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_restore_scanning_snapshot_becomes_refunded_error() {
        let snapshot = RestoredState::from(scanning_single());
        let state = reduce(ScanState::new(), ScanAction::restore(snapshot));

        assert_eq!(state.phase, ScanPhase::Error);
        assert_eq!(state.credit.status, CreditStatus::Refunded);
        assert_eq!(state.error.as_deref(), Some(INTERRUPTED_SCAN_MESSAGE));
        assert_eq!(state.images, vec!["img1".to_string()]);
    }

    #[test]
    fn test_restore_reviewing_snapshot_resumes() {
        let reviewing = reviewing_single();
        let state = reduce(
            ScanState::new(),
            ScanAction::restore(RestoredState::from(reviewing.clone())),
        );

        assert_eq!(state, reviewing);
    }

    #[test]
    fn test_restore_partial_scanning_snapshot() {
        let restored = RestoredState {
            phase: Some(ScanPhase::Scanning),
            ..Default::default()
        };
        let state = reduce(ScanState::new(), ScanAction::restore(restored));

        assert_eq!(state.phase, ScanPhase::Error);
        assert_eq!(state.credit.status, CreditStatus::Refunded);
    }

    fn run_from(state: ScanState, actions: Vec<ScanAction>) -> ScanState {
        actions.into_iter().fold(state, reduce)
    }
}
