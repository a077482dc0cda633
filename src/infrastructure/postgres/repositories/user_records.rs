use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    entities::users::{NewUserRecordEntity, PaymentCustomerDetails, UserRecordEntity},
    repositories::user_records::UserRecordRepository,
    value_objects::subscriptions::SubscriptionState,
};
use crate::infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::users};

pub struct UserRecordPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserRecordPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRecordRepository for UserRecordPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecordEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::id.eq(user_id))
            .select(UserRecordEntity::as_select())
            .first::<UserRecordEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_provider_uid(
        &self,
        provider_uid: &str,
    ) -> Result<Option<UserRecordEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::provider_uid.eq(provider_uid))
            .select(UserRecordEntity::as_select())
            .first::<UserRecordEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<UserRecordEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::stripe_customer_id.eq(stripe_customer_id))
            .select(UserRecordEntity::as_select())
            .first::<UserRecordEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, new_user: NewUserRecordEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(users::table)
            .values(&new_user)
            .returning(users::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn touch_last_login(&self, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table)
            .filter(users::id.eq(user_id))
            .set(users::last_login_at.eq(Utc::now()))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn upsert_customer_details(
        &self,
        user_id: Uuid,
        details: PaymentCustomerDetails,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table)
            .filter(users::id.eq(user_id))
            .set(&details)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn replace_subscription(&self, user_id: Uuid, state: SubscriptionState) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(users::table)
            .filter(users::id.eq(user_id))
            .set(users::subscription.eq(Some(serde_json::to_value(&state)?)))
            .execute(&mut conn)?;

        Ok(())
    }
}
