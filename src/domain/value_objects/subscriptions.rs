use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::{
    subscription_plans::SubscriptionPlan, subscription_statuses::SubscriptionStatus,
};

/// The per-user subscription sub-document. Writes always replace the whole
/// struct; fields are never patched individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub status: SubscriptionStatus,
    pub plan: SubscriptionPlan,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provider_subscription_id: Option<String>,
}

impl SubscriptionState {
    /// The 24-hour grant created at first sign-in.
    pub fn trial(now: DateTime<Utc>) -> Self {
        Self {
            status: SubscriptionStatus::Trial,
            plan: SubscriptionPlan::Trial,
            start_date: Some(now),
            end_date: Some(now + chrono::Duration::hours(24)),
            canceled_at: None,
            provider_subscription_id: None,
        }
    }

    /// Lifetime purchases carry no end date and no recurring subscription.
    pub fn lifetime(now: DateTime<Utc>) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            plan: SubscriptionPlan::Lifetime,
            start_date: Some(now),
            end_date: None,
            canceled_at: None,
            provider_subscription_id: None,
        }
    }
}

/// Answer to a status query, shaped for the extension poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusDto {
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SubscriptionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl SubscriptionStatusDto {
    pub fn none() -> Self {
        Self {
            status: SubscriptionStatus::None,
            plan: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub session_url: String,
}
