use chrono::Utc;

use common::error::Res;

use crate::client::BillingClient;
use crate::plan::{Plan, PlanCatalog};

/// Current plan for a billing customer, or `None` when no usable
/// subscription exists or its price maps to no known plan.
///
/// Takes the first usable subscription in provider-returned order; when a
/// customer somehow holds several usable subscriptions, that order is not
/// guaranteed stable provider-side.
pub async fn resolve_plan(
    billing: &dyn BillingClient,
    catalog: &PlanCatalog,
    customer_id: &str,
) -> Res<Option<Plan>> {
    let subscriptions = billing.list_subscriptions(customer_id).await?;

    let now = Utc::now();
    let plan = subscriptions
        .iter()
        .find(|sub| sub.is_usable(now))
        .and_then(|sub| sub.price.as_ref())
        .and_then(|price| catalog.plan_for_price(price));

    Ok(plan)
}
