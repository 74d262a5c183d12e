use async_trait::async_trait;
use stripe::{
    Client, CreateCustomer, Customer, CustomerId, CustomerSearchParams, ListCustomers,
    ListSubscriptions, Subscription, SubscriptionStatusFilter,
};

use common::error::{AppError, Res};

use crate::client::BillingClient;
use crate::model::{BillingCustomer, BillingSubscription, PricePoint};

/// Bounded page size for customer and subscription queries.
const PAGE_LIMIT: u64 = 10;

pub struct StripeBilling {
    client: Client,
}

impl StripeBilling {
    pub fn new(secret_key: &str) -> Self {
        StripeBilling {
            client: Client::new(secret_key),
        }
    }
}

fn to_customer(customer: Customer) -> BillingCustomer {
    BillingCustomer {
        id: customer.id.to_string(),
        created: customer.created.unwrap_or(0),
    }
}

fn to_subscription(sub: Subscription) -> BillingSubscription {
    let price = sub
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())
        .map(|price| PricePoint {
            id: price.id.to_string(),
            nickname: price.nickname.clone(),
            lookup_key: price.lookup_key.clone(),
        });

    BillingSubscription {
        id: sub.id.to_string(),
        status: sub.status.to_string(),
        cancel_at_period_end: sub.cancel_at_period_end,
        current_period_end: sub.current_period_end,
        price,
    }
}

/// Single quotes terminate a Stripe search string literal.
fn escape_query_value(value: &str) -> String {
    value.replace('\'', "\\'")
}

#[async_trait]
impl BillingClient for StripeBilling {
    async fn search_customers_by_user_id(&self, user_id: &str) -> Res<Vec<BillingCustomer>> {
        let params = CustomerSearchParams {
            query: format!("metadata['uid']:'{}'", escape_query_value(user_id)),
            limit: Some(PAGE_LIMIT),
            ..Default::default()
        };

        let found = Customer::search(&self.client, params)
            .await
            .map_err(AppError::from)?;

        Ok(found.data.into_iter().map(to_customer).collect())
    }

    async fn search_customers_by_email(&self, email: &str) -> Res<Vec<BillingCustomer>> {
        let params = CustomerSearchParams {
            query: format!("email:'{}'", escape_query_value(email)),
            limit: Some(PAGE_LIMIT),
            ..Default::default()
        };

        let found = Customer::search(&self.client, params)
            .await
            .map_err(AppError::from)?;

        Ok(found.data.into_iter().map(to_customer).collect())
    }

    async fn list_customers_by_email(&self, email: &str) -> Res<Vec<BillingCustomer>> {
        let listed = Customer::list(
            &self.client,
            &ListCustomers {
                email: Some(email),
                limit: Some(PAGE_LIMIT),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(listed.data.into_iter().map(to_customer).collect())
    }

    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Res<BillingCustomer> {
        let description = format!("App user {}", user_id);
        let metadata = [("uid".to_string(), user_id.to_string())]
            .into_iter()
            .collect();

        let created = Customer::create(
            &self.client,
            CreateCustomer {
                email,
                description: Some(&description),
                metadata: Some(metadata),
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(to_customer(created))
    }

    async fn list_subscriptions(&self, customer_id: &str) -> Res<Vec<BillingSubscription>> {
        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| AppError::Internal(format!("Invalid customer ID: {}", e)))?;

        let subscriptions = Subscription::list(
            &self.client,
            &ListSubscriptions {
                customer: Some(customer_id),
                status: Some(SubscriptionStatusFilter::All),
                limit: Some(PAGE_LIMIT),
                expand: &["data.items.data.price"],
                ..Default::default()
            },
        )
        .await
        .map_err(AppError::from)?;

        Ok(subscriptions.data.into_iter().map(to_subscription).collect())
    }
}
