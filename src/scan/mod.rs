//! Receipt scan session state machine.
//!
//! The session is a single [`ScanState`] value changed only by dispatching a
//! [`ScanAction`] through the pure [`transition`] function. [`ScanFlags`]
//! derives what the UI may show or allow, and [`ScanController`] owns the
//! state for one UI instance and handles persistence around it.

pub mod action;
pub mod commands;
pub mod controller;
pub mod reducer;
pub mod state;
pub mod view;

pub use action::{ScanAction, SessionStart};
pub use controller::{ScanController, ScanSnapshot};
pub use reducer::{reduce, transition, Outcome, Rejection, Transition, INTERRUPTED_SCAN_MESSAGE};
pub use state::{
    BatchFailure, BatchProgress, BatchReceipt, BatchReceiptPatch, BatchReceiptStatus,
    BatchSession, CreditState, CreditStatus, CreditType, DialogType, RestoredState, ScanDialog,
    ScanKind, ScanMode, ScanPhase, ScanState,
};
pub use view::{ScanFlags, ScanView};
