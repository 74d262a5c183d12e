use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use billing::client::BillingClient;
use billing::customer::{CustomerCache, CustomerResolver};
use billing::identity::IdentityProvider;
use billing::plan::{Allowance, Plan, PlanCatalog, month_key, monthly_allowance};
use billing::subs::resolve_plan;
use common::error::{AppError, Res};

use crate::ledger::QuotaLedger;

/// What a successful consumption grants.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaGrant {
    pub user_id: String,
    pub plan: Plan,
    pub max: Allowance,
}

/// The quota-consuming entry point: resolves the caller's billing customer
/// and plan, then atomically spends one slot of this month's allowance.
///
/// All collaborators are injected; the gate holds no global state and is
/// shared across request tasks behind an `Arc`.
pub struct QuotaGate {
    billing: Arc<dyn BillingClient>,
    resolver: CustomerResolver,
    catalog: PlanCatalog,
    ledger: Arc<dyn QuotaLedger>,
}

impl QuotaGate {
    pub fn new(
        billing: Arc<dyn BillingClient>,
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<dyn CustomerCache>,
        ledger: Arc<dyn QuotaLedger>,
        catalog: PlanCatalog,
    ) -> Self {
        let resolver = CustomerResolver::new(billing.clone(), identity, cache);
        QuotaGate {
            billing,
            resolver,
            catalog,
            ledger,
        }
    }

    /// Checks the caller's plan and consumes one slot of this month's
    /// allowance. Fails with `AppError::NoPlan` when there is no usable
    /// plan and `AppError::LimitExceeded` when the month is spent.
    pub async fn check_and_consume(&self, user_id: &str) -> Res<QuotaGrant> {
        self.check_and_consume_at(user_id, Utc::now()).await
    }

    /// Same as [`check_and_consume`](Self::check_and_consume) with the
    /// current instant supplied by the caller.
    pub async fn check_and_consume_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Res<QuotaGrant> {
        if user_id.is_empty() {
            return Err(AppError::NoPlan("Missing user id".to_string()));
        }

        let customer_id = self.resolver.resolve(user_id).await?;

        let plan = resolve_plan(self.billing.as_ref(), &self.catalog, &customer_id)
            .await?
            .ok_or_else(|| {
                AppError::NoPlan("No active subscription found on Stripe.".to_string())
            })?;

        let max = monthly_allowance(plan);
        if !max.grants_access() {
            return Err(AppError::NoPlan(
                "No active plan. Please buy a plan first.".to_string(),
            ));
        }

        let month = month_key(now);
        match max {
            // Unlimited plans only record metadata; they are never blocked.
            Allowance::Unlimited => self.ledger.record_unlimited(user_id, &month, plan).await?,
            Allowance::Limited(limit) => {
                self.ledger.try_consume(user_id, &month, plan, limit).await?
            }
        }

        log::debug!("Quota consumed by {} on plan {}", user_id, plan);
        Ok(QuotaGrant {
            user_id: user_id.to_string(),
            plan,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use futures::future::join_all;
    use tokio::sync::Mutex;

    use billing::model::{BillingCustomer, BillingSubscription, PricePoint};

    use super::*;

    /// Billing provider with one known customer and a fixed set of
    /// subscriptions for it.
    struct FakeBilling {
        subscriptions: Vec<BillingSubscription>,
    }

    impl FakeBilling {
        fn with_plan(lookup_key: &str) -> Self {
            FakeBilling {
                subscriptions: vec![BillingSubscription {
                    id: "sub_1".to_string(),
                    status: "active".to_string(),
                    cancel_at_period_end: false,
                    current_period_end: 4_102_444_800, // 2100-01-01
                    price: Some(PricePoint {
                        id: "price_1".to_string(),
                        nickname: None,
                        lookup_key: Some(lookup_key.to_string()),
                    }),
                }],
            }
        }

        fn without_subscription() -> Self {
            FakeBilling {
                subscriptions: vec![],
            }
        }
    }

    #[async_trait]
    impl BillingClient for FakeBilling {
        async fn search_customers_by_user_id(&self, user_id: &str) -> Res<Vec<BillingCustomer>> {
            Ok(vec![BillingCustomer {
                id: format!("cus_{}", user_id),
                created: 1,
            }])
        }

        async fn search_customers_by_email(&self, _email: &str) -> Res<Vec<BillingCustomer>> {
            Ok(vec![])
        }

        async fn list_customers_by_email(&self, _email: &str) -> Res<Vec<BillingCustomer>> {
            Ok(vec![])
        }

        async fn create_customer(
            &self,
            user_id: &str,
            _email: Option<&str>,
        ) -> Res<BillingCustomer> {
            Ok(BillingCustomer {
                id: format!("cus_{}", user_id),
                created: 1,
            })
        }

        async fn list_subscriptions(&self, _customer_id: &str) -> Res<Vec<BillingSubscription>> {
            Ok(self.subscriptions.clone())
        }
    }

    struct NoIdentity;

    #[async_trait]
    impl IdentityProvider for NoIdentity {
        async fn user_email(&self, _user_id: &str) -> Res<Option<String>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        inner: std::sync::Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CustomerCache for MemoryCache {
        async fn customer_id(&self, user_id: &str) -> Res<Option<String>> {
            Ok(self.inner.lock().unwrap().get(user_id).cloned())
        }

        async fn remember_customer_id(&self, user_id: &str, customer_id: &str) -> Res<()> {
            self.inner
                .lock()
                .unwrap()
                .insert(user_id.to_string(), customer_id.to_string());
            Ok(())
        }
    }

    #[derive(Debug, Clone)]
    struct Entry {
        month: String,
        count: u64,
        max: Option<u64>,
        plan: Plan,
    }

    /// In-memory ledger with the same merge and rollover semantics as the
    /// Postgres one; the mutex stands in for the row lock.
    #[derive(Default)]
    struct MemoryLedger {
        entries: Mutex<HashMap<String, Entry>>,
    }

    impl MemoryLedger {
        async fn count_for(&self, user_id: &str) -> Option<u64> {
            self.entries.lock().await.get(user_id).map(|e| e.count)
        }

        async fn is_empty(&self) -> bool {
            self.entries.lock().await.is_empty()
        }
    }

    #[async_trait]
    impl QuotaLedger for MemoryLedger {
        async fn record_unlimited(&self, user_id: &str, month: &str, plan: Plan) -> Res<()> {
            let mut entries = self.entries.lock().await;
            let count = entries.get(user_id).map(|e| e.count).unwrap_or(0);
            entries.insert(
                user_id.to_string(),
                Entry {
                    month: month.to_string(),
                    count,
                    max: None,
                    plan,
                },
            );
            Ok(())
        }

        async fn try_consume(&self, user_id: &str, month: &str, plan: Plan, max: u64) -> Res<()> {
            let mut entries = self.entries.lock().await;
            let used = match entries.get(user_id) {
                Some(entry) if entry.month == month => entry.count,
                _ => 0,
            };
            if used >= max {
                return Err(AppError::LimitExceeded {
                    plan: plan.to_string(),
                    max,
                });
            }
            entries.insert(
                user_id.to_string(),
                Entry {
                    month: month.to_string(),
                    count: used + 1,
                    max: Some(max),
                    plan,
                },
            );
            Ok(())
        }
    }

    fn gate_with(billing: FakeBilling) -> (Arc<QuotaGate>, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::default());
        let gate = QuotaGate::new(
            Arc::new(billing),
            Arc::new(NoIdentity),
            Arc::new(MemoryCache::default()),
            ledger.clone(),
            PlanCatalog::default(),
        );
        (Arc::new(gate), ledger)
    }

    fn mid_september() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn basic_plan_grants_exactly_its_allowance() {
        let (gate, ledger) = gate_with(FakeBilling::with_plan("basic"));
        let now = mid_september();

        for _ in 0..100 {
            let grant = gate.check_and_consume_at("u1", now).await.unwrap();
            assert_eq!(grant.plan, Plan::Basic);
            assert_eq!(grant.max, Allowance::Limited(100));
        }

        let err = gate.check_and_consume_at("u1", now).await.unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded { max: 100, .. }));
        assert_eq!(ledger.count_for("u1").await, Some(100));
    }

    #[tokio::test]
    async fn pro_plan_grants_a_thousand_calls() {
        let (gate, _) = gate_with(FakeBilling::with_plan("pro"));
        let now = mid_september();

        for _ in 0..1000 {
            let grant = gate.check_and_consume_at("u1", now).await.unwrap();
            assert_eq!(grant.max, Allowance::Limited(1000));
        }

        let err = gate.check_and_consume_at("u1", now).await.unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded { max: 1000, .. }));
    }

    #[tokio::test]
    async fn elite_plan_never_blocks() {
        let (gate, ledger) = gate_with(FakeBilling::with_plan("elite"));
        let now = mid_september();

        for _ in 0..10_000 {
            let grant = gate.check_and_consume_at("u1", now).await.unwrap();
            assert_eq!(grant.max, Allowance::Unlimited);
        }

        // Metadata is recorded, but nothing was counted.
        assert_eq!(ledger.count_for("u1").await, Some(0));
    }

    #[tokio::test]
    async fn no_subscription_fails_without_a_ledger_write() {
        let (gate, ledger) = gate_with(FakeBilling::without_subscription());

        let err = gate
            .check_and_consume_at("u2", mid_september())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoPlan(_)));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn empty_user_id_is_rejected_up_front() {
        let (gate, ledger) = gate_with(FakeBilling::with_plan("pro"));

        let err = gate.check_and_consume("").await.unwrap_err();
        assert!(matches!(err, AppError::NoPlan(_)));
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn month_rollover_resets_the_effective_count() {
        let (gate, ledger) = gate_with(FakeBilling::with_plan("basic"));
        let september = mid_september();

        for _ in 0..100 {
            gate.check_and_consume_at("u1", september).await.unwrap();
        }
        let err = gate.check_and_consume_at("u1", september).await.unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded { .. }));

        let october = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        gate.check_and_consume_at("u1", october).await.unwrap();
        assert_eq!(ledger.count_for("u1").await, Some(1));
    }

    #[tokio::test]
    async fn concurrent_consumption_never_overgrants() {
        let (gate, ledger) = gate_with(FakeBilling::with_plan("basic"));
        let now = mid_september();

        let calls = (0..150).map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.check_and_consume_at("u1", now).await })
        });
        let outcomes = join_all(calls).await;

        let mut granted = 0;
        let mut rejected = 0;
        for outcome in outcomes {
            match outcome.unwrap() {
                Ok(_) => granted += 1,
                Err(AppError::LimitExceeded { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(granted, 100);
        assert_eq!(rejected, 50);
        assert_eq!(ledger.count_for("u1").await, Some(100));
    }
}
