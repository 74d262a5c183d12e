use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Billing-provider customer record, reduced to what identity resolution
/// needs: the opaque id and the provider-side creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCustomer {
    pub id: String,
    pub created: i64,
}

/// One subscription as returned by the billing provider, with its primary
/// line item's price expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSubscription {
    pub id: String,
    pub status: String,
    pub cancel_at_period_end: bool,
    pub current_period_end: i64,
    pub price: Option<PricePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub id: String,
    pub nickname: Option<String>,
    pub lookup_key: Option<String>,
}

impl BillingSubscription {
    /// A subscription counts if it's active/trialing and, when set to cancel
    /// at period end, the period has not yet ended.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        if self.status != "active" && self.status != "trialing" {
            return false;
        }
        if self.cancel_at_period_end {
            return self.current_period_end > now.timestamp();
        }
        true
    }
}
