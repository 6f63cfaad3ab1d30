pub mod scan_session;
pub mod transaction;

pub use scan_session::{ScanSessionRecord, SessionOutcome};
pub use transaction::{Transaction, TransactionItem, TransactionPatch};
