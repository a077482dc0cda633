use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::subscriptions::SubscriptionState;
use crate::infrastructure::postgres::schema::users;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct UserRecordEntity {
    pub id: Uuid,
    pub provider_uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_email: Option<String>,
    pub stripe_default_payment_method: Option<String>,
    pub subscription: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

impl UserRecordEntity {
    /// Parses the stored subscription sub-document. A missing or unreadable
    /// document reads as "no subscription".
    pub fn subscription_state(&self) -> Option<SubscriptionState> {
        self.subscription
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRecordEntity {
    pub id: Uuid,
    pub provider_uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub subscription: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Payment-provider customer fields persisted after a completed checkout.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub struct PaymentCustomerDetails {
    pub stripe_customer_id: Option<String>,
    pub stripe_email: Option<String>,
    pub stripe_default_payment_method: Option<String>,
}
