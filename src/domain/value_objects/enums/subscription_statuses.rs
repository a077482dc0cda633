use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    ActiveCanceling,
    Expired,
    None,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::ActiveCanceling => "active_canceling",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::None => "none",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "trial" => Some(SubscriptionStatus::Trial),
            "active" => Some(SubscriptionStatus::Active),
            "active_canceling" => Some(SubscriptionStatus::ActiveCanceling),
            "expired" => Some(SubscriptionStatus::Expired),
            "none" => Some(SubscriptionStatus::None),
            _ => None,
        }
    }
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
