pub mod notify;
pub mod pending;
pub mod projection;
mod retry;
pub mod synchronizer;

pub use notify::{NotificationSink, Severity, TracingSink};
pub use pending::{OpKey, OpKind, PendingOperation, SequenceLedger};
pub use projection::{CartProjection, CartView};
pub use synchronizer::{CartSynchronizer, SyncOutcome};
