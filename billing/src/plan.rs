use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::env_config::Config;

use crate::model::PricePoint;

/// The sold service tiers. Absence of a plan is `Option<Plan>::None`,
/// never a dedicated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Basic,
    Pro,
    Elite,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Elite => "elite",
        };
        f.write_str(label)
    }
}

/// Monthly allowance of a plan. `Limited(0)` means no access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Limited(u64),
    Unlimited,
}

impl Allowance {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Allowance::Unlimited)
    }

    pub fn grants_access(&self) -> bool {
        !matches!(self, Allowance::Limited(0))
    }
}

// Unlimited serializes as null, mirroring the ledger's NULL max column.
impl Serialize for Allowance {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Allowance::Limited(n) => serializer.serialize_some(n),
            Allowance::Unlimited => serializer.serialize_none(),
        }
    }
}

/// Per-month limits by plan.
pub fn monthly_allowance(plan: Plan) -> Allowance {
    match plan {
        Plan::Basic => Allowance::Limited(100),
        Plan::Pro => Allowance::Limited(1000),
        Plan::Elite => Allowance::Unlimited,
    }
}

/// Allowance for a possibly-absent plan; no plan means no access.
pub fn allowance_for(plan: Option<Plan>) -> Allowance {
    plan.map(monthly_allowance).unwrap_or(Allowance::Limited(0))
}

/// UTC month bucket, e.g. "2025-09". Counters reset when this changes.
pub fn month_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// Maps billing-provider prices onto plans. Exact price-id matches win;
/// otherwise the plan name is matched case-insensitively against the
/// price's lookup key or nickname.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    by_price_id: HashMap<String, Plan>,
}

impl PlanCatalog {
    pub fn new(pairs: impl IntoIterator<Item = (String, Plan)>) -> Self {
        PlanCatalog {
            by_price_id: pairs
                .into_iter()
                .filter(|(id, _)| !id.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new([
            (config.stripe_prices.basic.clone(), Plan::Basic),
            (config.stripe_prices.pro.clone(), Plan::Pro),
            (config.stripe_prices.elite.clone(), Plan::Elite),
        ])
    }

    pub fn plan_for_price(&self, price: &PricePoint) -> Option<Plan> {
        if let Some(plan) = self.by_price_id.get(&price.id) {
            return Some(*plan);
        }

        let lookup_key = price.lookup_key.as_deref().unwrap_or("").to_lowercase();
        let nickname = price.nickname.as_deref().unwrap_or("").to_lowercase();

        for (needle, plan) in [
            ("basic", Plan::Basic),
            ("pro", Plan::Pro),
            ("elite", Plan::Elite),
        ] {
            if lookup_key.contains(needle) || nickname.contains(needle) {
                return Some(plan);
            }
        }
        None
    }
}
