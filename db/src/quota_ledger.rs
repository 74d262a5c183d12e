use common::error::{AppError, Res};
use sqlx::{FromRow, PgPool};

#[derive(Debug, FromRow)]
struct LedgerState {
    month: String,
    count: i64,
}

/// Upserts month/plan/max metadata for an unlimited plan. The counter
/// column is left untouched; unlimited plans are never blocked on it.
pub async fn record_unlimited(pool: &PgPool, user_id: &str, month: &str, plan: &str) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO quota_ledger (user_id, month, count, max_allowed, plan)
        VALUES ($1, $2, 0, NULL, $3)
        ON CONFLICT (user_id)
        DO UPDATE SET month = EXCLUDED.month, max_allowed = NULL,
                      plan = EXCLUDED.plan, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(month)
    .bind(plan)
    .execute(pool)
    .await
    .map(|_| ())
    .map_err(AppError::from)
}

/// Spends one slot of a bounded monthly allowance.
///
/// The read-check-write runs in one transaction under a row lock, so
/// concurrent calls for the same user are linearized: with `max - count`
/// slots left, exactly that many callers commit and the rest fail with
/// `LimitExceeded` and no write. A stored month older than `month` counts
/// as zero usage.
pub async fn try_consume(
    pool: &PgPool,
    user_id: &str,
    month: &str,
    plan: &str,
    max: i64,
) -> Res<()> {
    let mut tx = pool.begin().await?;

    // Seed the row so the lock below has something to grab on first use.
    sqlx::query(
        r#"
        INSERT INTO quota_ledger (user_id, month, count, max_allowed, plan)
        VALUES ($1, $2, 0, $3, $4)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(month)
    .bind(max)
    .bind(plan)
    .execute(&mut *tx)
    .await?;

    let state: LedgerState =
        sqlx::query_as("SELECT month, count FROM quota_ledger WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    let used = if state.month == month { state.count } else { 0 };
    if used >= max {
        // Dropping the transaction rolls back; the seed row (if any) goes too.
        return Err(AppError::LimitExceeded {
            plan: plan.to_string(),
            max: max as u64,
        });
    }

    sqlx::query(
        r#"
        UPDATE quota_ledger
        SET month = $2, count = $3, max_allowed = $4, plan = $5, updated_at = now()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(month)
    .bind(used + 1)
    .bind(max)
    .bind(plan)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
