use std::sync::Arc;

use async_trait::async_trait;

use common::error::Res;

use crate::client::BillingClient;
use crate::identity::IdentityProvider;
use crate::model::BillingCustomer;

/// Persisted user -> billing-customer mapping. Written at most once per
/// user under normal operation; overwriting with a re-derived value is
/// idempotent.
#[async_trait]
pub trait CustomerCache: Send + Sync {
    async fn customer_id(&self, user_id: &str) -> Res<Option<String>>;

    async fn remember_customer_id(&self, user_id: &str, customer_id: &str) -> Res<()>;
}

/// Resolves the billing-customer id for an app user. Strategies run in
/// order: cached mapping, provider search by uid metadata, provider search
/// by email (with a plain-list fallback), and finally customer creation.
/// Provider errors in the lookup strategies count as "no match"; only a
/// creation failure propagates.
pub struct CustomerResolver {
    billing: Arc<dyn BillingClient>,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn CustomerCache>,
}

impl CustomerResolver {
    pub fn new(
        billing: Arc<dyn BillingClient>,
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<dyn CustomerCache>,
    ) -> Self {
        CustomerResolver {
            billing,
            identity,
            cache,
        }
    }

    pub async fn resolve(&self, user_id: &str) -> Res<String> {
        if let Some(customer_id) = self.cache.customer_id(user_id).await? {
            return Ok(customer_id);
        }

        if let Some(customer_id) = self.find_by_user_id(user_id).await {
            self.cache
                .remember_customer_id(user_id, &customer_id)
                .await?;
            return Ok(customer_id);
        }

        // Email lookup failures just mean we create the customer without one.
        let email = self.identity.user_email(user_id).await.ok().flatten();

        if let Some(email) = email.as_deref() {
            if let Some(customer_id) = self.find_by_email(email).await {
                self.cache
                    .remember_customer_id(user_id, &customer_id)
                    .await?;
                return Ok(customer_id);
            }
        }

        let created = self
            .billing
            .create_customer(user_id, email.as_deref())
            .await?;
        self.cache
            .remember_customer_id(user_id, &created.id)
            .await?;
        log::debug!("Created billing customer {} for user {}", created.id, user_id);
        Ok(created.id)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Option<String> {
        match self.billing.search_customers_by_user_id(user_id).await {
            Ok(matches) => most_recently_created(matches),
            Err(e) => {
                log::warn!("Customer search by uid failed for {}: {}", user_id, e);
                None
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Option<String> {
        match self.billing.search_customers_by_email(email).await {
            Ok(matches) => most_recently_created(matches),
            Err(e) => {
                log::warn!("Customer search by email failed, trying list: {}", e);
                match self.billing.list_customers_by_email(email).await {
                    Ok(matches) => most_recently_created(matches),
                    Err(e) => {
                        log::warn!("Customer list by email failed: {}", e);
                        None
                    }
                }
            }
        }
    }
}

fn most_recently_created(mut customers: Vec<BillingCustomer>) -> Option<String> {
    customers.sort_by(|a, b| b.created.cmp(&a.created));
    customers.into_iter().next().map(|c| c.id)
}
