use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use billing::customer::CustomerCache;
use billing::identity::IdentityProvider;
use billing::plan::Plan;
use common::error::Res;
use quota::ledger::QuotaLedger;

use crate::{quota_ledger, user};

/// Postgres-backed implementation of the customer-id cache, the email
/// lookup and the quota ledger, all over one shared pool.
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl CustomerCache for PgStore {
    async fn customer_id(&self, user_id: &str) -> Res<Option<String>> {
        user::get_stripe_customer_id(&*self.pool, user_id).await
    }

    async fn remember_customer_id(&self, user_id: &str, customer_id: &str) -> Res<()> {
        user::set_stripe_customer_id(&*self.pool, user_id, customer_id).await
    }
}

#[async_trait]
impl IdentityProvider for PgStore {
    async fn user_email(&self, user_id: &str) -> Res<Option<String>> {
        user::get_user_email(&*self.pool, user_id).await
    }
}

#[async_trait]
impl QuotaLedger for PgStore {
    async fn record_unlimited(&self, user_id: &str, month: &str, plan: Plan) -> Res<()> {
        quota_ledger::record_unlimited(&self.pool, user_id, month, &plan.to_string()).await
    }

    async fn try_consume(&self, user_id: &str, month: &str, plan: Plan, max: u64) -> Res<()> {
        quota_ledger::try_consume(&self.pool, user_id, month, &plan.to_string(), max as i64).await
    }
}
