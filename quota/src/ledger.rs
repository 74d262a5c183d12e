use async_trait::async_trait;

use billing::plan::Plan;
use common::error::Res;

/// Persisted monthly usage counter, one entry per user. The entry is
/// created on first consumption and rewritten on each one after that;
/// a stored month older than the current key counts as zero usage
/// (rollover is lazy, nothing resets counters on a schedule).
///
/// Implementations must make `try_consume` an atomic read-check-write:
/// with `n` concurrent calls and `m` slots left, exactly `m` commit. The
/// Postgres implementation takes a row lock; no in-process locking is
/// assumed anywhere above this trait.
#[async_trait]
pub trait QuotaLedger: Send + Sync {
    /// Upserts month/plan metadata for an unlimited plan. Never reads the
    /// counter and never rejects; an existing `count` value is left as-is.
    async fn record_unlimited(&self, user_id: &str, month: &str, plan: Plan) -> Res<()>;

    /// Consumes one slot of a bounded allowance, or fails with
    /// `AppError::LimitExceeded` without writing when the month's count
    /// has already reached `max`.
    async fn try_consume(&self, user_id: &str, month: &str, plan: Plan, max: u64) -> Res<()>;
}
