pub mod gate;
pub mod ledger;

pub use gate::{QuotaGate, QuotaGrant};
pub use ledger::QuotaLedger;
