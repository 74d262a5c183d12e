mod stripe_client;

use async_trait::async_trait;

use common::error::Res;

use crate::model::{BillingCustomer, BillingSubscription};

pub use stripe_client::StripeBilling;

/// The billing provider, behind a trait so that the resolvers and the quota
/// gate can be driven by fakes in tests. The real implementation wraps the
/// Stripe client; lifecycle is owned by the process bootstrap and the handle
/// is injected, never held as ambient global state.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// Customers tagged with this app user id in their metadata.
    async fn search_customers_by_user_id(&self, user_id: &str) -> Res<Vec<BillingCustomer>>;

    /// Customers matching an email via the provider's search endpoint.
    async fn search_customers_by_email(&self, email: &str) -> Res<Vec<BillingCustomer>>;

    /// Customers matching an email via the plain list endpoint. Fallback for
    /// providers/accounts where search is unavailable.
    async fn list_customers_by_email(&self, email: &str) -> Res<Vec<BillingCustomer>>;

    /// Creates a customer tagged with the app user id.
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Res<BillingCustomer>;

    /// Up to a bounded page of the customer's subscriptions, any status,
    /// with prices expanded, in provider-returned order.
    async fn list_subscriptions(&self, customer_id: &str) -> Res<Vec<BillingSubscription>>;
}
