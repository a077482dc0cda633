use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::{
    NewUserRecordEntity, PaymentCustomerDetails, UserRecordEntity,
};
use crate::domain::value_objects::subscriptions::SubscriptionState;

#[async_trait]
#[automock]
pub trait UserRecordRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecordEntity>>;

    async fn find_by_provider_uid(&self, provider_uid: &str)
    -> Result<Option<UserRecordEntity>>;

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserRecordEntity>>;

    async fn create(&self, new_user: NewUserRecordEntity) -> Result<Uuid>;

    async fn touch_last_login(&self, user_id: Uuid) -> Result<()>;

    async fn upsert_customer_details(
        &self,
        user_id: Uuid,
        details: PaymentCustomerDetails,
    ) -> Result<()>;

    /// Replaces the subscription sub-document wholesale. This is the only
    /// subscription write primitive; there is no field-level patching.
    async fn replace_subscription(&self, user_id: Uuid, state: SubscriptionState) -> Result<()>;
}
