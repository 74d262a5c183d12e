use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};

pub async fn get_stripe_customer_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: &str,
) -> Res<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>("SELECT stripe_customer_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map(|row| row.flatten())
        .map_err(AppError::from)
}

pub async fn set_stripe_customer_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: &str,
    customer_id: &str,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, stripe_customer_id)
        VALUES ($1, $2)
        ON CONFLICT (id)
        DO UPDATE SET stripe_customer_id = EXCLUDED.stripe_customer_id, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(customer_id)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(AppError::from)
}

pub async fn get_user_email<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: &str,
) -> Res<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
        .map(|row| row.flatten())
        .map_err(AppError::from)
}
