use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Trial,
    Monthly,
    Yearly,
    Lifetime,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Trial => "trial",
            SubscriptionPlan::Monthly => "monthly",
            SubscriptionPlan::Yearly => "yearly",
            SubscriptionPlan::Lifetime => "lifetime",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "trial" => Some(SubscriptionPlan::Trial),
            "monthly" => Some(SubscriptionPlan::Monthly),
            "yearly" => Some(SubscriptionPlan::Yearly),
            "lifetime" => Some(SubscriptionPlan::Lifetime),
            _ => None,
        }
    }

    /// Plans a user can actually buy. `trial` is only ever granted at sign-up.
    pub fn is_purchasable(&self) -> bool {
        !matches!(self, SubscriptionPlan::Trial)
    }
}

impl Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
