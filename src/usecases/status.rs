use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{
    repositories::user_records::UserRecordRepository,
    value_objects::{
        enums::{
            subscription_plans::SubscriptionPlan, subscription_statuses::SubscriptionStatus,
        },
        subscriptions::{SubscriptionState, SubscriptionStatusDto},
    },
};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StatusError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Answers "what is this user's subscription state", performing the lazy
/// expiry transition on read. Every read path must go through here; that is
/// what lets the system skip a background expiry sweeper.
pub struct StatusQueryUseCase<R>
where
    R: UserRecordRepository + Send + Sync + 'static,
{
    user_repo: Arc<R>,
}

impl<R> StatusQueryUseCase<R>
where
    R: UserRecordRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<R>) -> Self {
        Self { user_repo }
    }

    pub async fn get_status(&self, user_id: Uuid) -> Result<SubscriptionStatusDto, StatusError> {
        let record = match self.user_repo.find_by_id(user_id).await? {
            Some(record) => record,
            None => {
                debug!(%user_id, "status: no user record");
                return Ok(SubscriptionStatusDto::none());
            }
        };

        let state = match record.subscription_state() {
            Some(state) => state,
            None => {
                debug!(%user_id, "status: no subscription sub-document");
                return Ok(SubscriptionStatusDto::none());
            }
        };

        // Lifetime never expires, whatever endDate may say.
        if state.plan == SubscriptionPlan::Lifetime {
            return Ok(SubscriptionStatusDto {
                status: SubscriptionStatus::Active,
                plan: Some(SubscriptionPlan::Lifetime),
                end_date: None,
            });
        }

        if state.status == SubscriptionStatus::ActiveCanceling {
            if let Some(end_date) = state.end_date {
                if Utc::now() > end_date {
                    let expired = SubscriptionState {
                        status: SubscriptionStatus::Expired,
                        plan: state.plan,
                        start_date: None,
                        end_date: Some(end_date),
                        canceled_at: None,
                        provider_subscription_id: None,
                    };
                    self.user_repo
                        .replace_subscription(user_id, expired)
                        .await?;
                    info!(
                        %user_id,
                        plan = %state.plan,
                        "status: canceling subscription passed its end date, marked expired"
                    );
                    return Ok(SubscriptionStatusDto {
                        status: SubscriptionStatus::Expired,
                        plan: Some(state.plan),
                        end_date: None,
                    });
                }
            }
        }

        Ok(SubscriptionStatusDto {
            status: state.status,
            plan: Some(state.plan),
            end_date: state.end_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::users::UserRecordEntity;
    use crate::domain::repositories::user_records::MockUserRecordRepository;
    use chrono::{DateTime, Duration};
    use mockall::predicate::eq;

    fn record_with_state(user_id: Uuid, state: Option<SubscriptionState>) -> UserRecordEntity {
        let now = Utc::now();
        UserRecordEntity {
            id: user_id,
            provider_uid: "provider-uid-1".to_string(),
            display_name: None,
            email: None,
            photo_url: None,
            stripe_customer_id: None,
            stripe_email: None,
            stripe_default_payment_method: None,
            subscription: state.map(|s| serde_json::to_value(s).unwrap()),
            created_at: now,
            last_login_at: now,
        }
    }

    fn state(
        status: SubscriptionStatus,
        plan: SubscriptionPlan,
        end_date: Option<DateTime<Utc>>,
    ) -> SubscriptionState {
        SubscriptionState {
            status,
            plan,
            start_date: None,
            end_date,
            canceled_at: None,
            provider_subscription_id: None,
        }
    }

    #[tokio::test]
    async fn missing_user_reads_as_none() {
        let user_id = Uuid::new_v4();
        let mut user_repo = MockUserRecordRepository::new();
        user_repo
            .expect_find_by_id()
            .with(eq(user_id))
            .returning(|_| Box::pin(async { Ok(None) }));

        let usecase = StatusQueryUseCase::new(Arc::new(user_repo));
        let dto = usecase.get_status(user_id).await.unwrap();

        assert_eq!(dto.status, SubscriptionStatus::None);
        assert!(dto.plan.is_none());
    }

    #[tokio::test]
    async fn missing_sub_document_reads_as_none() {
        let user_id = Uuid::new_v4();
        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let record = record_with_state(user_id, None);
            Box::pin(async move { Ok(Some(record)) })
        });

        let usecase = StatusQueryUseCase::new(Arc::new(user_repo));
        let dto = usecase.get_status(user_id).await.unwrap();

        assert_eq!(dto.status, SubscriptionStatus::None);
    }

    #[tokio::test]
    async fn lifetime_is_active_regardless_of_end_date() {
        let user_id = Uuid::new_v4();
        let stale_end = Utc::now() - Duration::days(400);

        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let record = record_with_state(
                user_id,
                Some(state(
                    SubscriptionStatus::Active,
                    SubscriptionPlan::Lifetime,
                    Some(stale_end),
                )),
            );
            Box::pin(async move { Ok(Some(record)) })
        });
        user_repo.expect_replace_subscription().times(0);

        let usecase = StatusQueryUseCase::new(Arc::new(user_repo));
        let dto = usecase.get_status(user_id).await.unwrap();

        assert_eq!(dto.status, SubscriptionStatus::Active);
        assert_eq!(dto.plan, Some(SubscriptionPlan::Lifetime));
        assert!(dto.end_date.is_none());
    }

    #[tokio::test]
    async fn canceling_past_end_date_expires_and_persists() {
        let user_id = Uuid::new_v4();
        let end_date = Utc::now() - Duration::hours(1);

        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let record = record_with_state(
                user_id,
                Some(state(
                    SubscriptionStatus::ActiveCanceling,
                    SubscriptionPlan::Monthly,
                    Some(end_date),
                )),
            );
            Box::pin(async move { Ok(Some(record)) })
        });
        user_repo
            .expect_replace_subscription()
            .withf(move |id, state| {
                *id == user_id
                    && state.status == SubscriptionStatus::Expired
                    && state.plan == SubscriptionPlan::Monthly
                    && state.end_date == Some(end_date)
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let usecase = StatusQueryUseCase::new(Arc::new(user_repo));
        let dto = usecase.get_status(user_id).await.unwrap();

        assert_eq!(dto.status, SubscriptionStatus::Expired);
        assert_eq!(dto.plan, Some(SubscriptionPlan::Monthly));
    }

    #[tokio::test]
    async fn canceling_before_end_date_reads_verbatim() {
        let user_id = Uuid::new_v4();
        let end_date = Utc::now() + Duration::days(10);

        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_id().returning(move |_| {
            let record = record_with_state(
                user_id,
                Some(state(
                    SubscriptionStatus::ActiveCanceling,
                    SubscriptionPlan::Yearly,
                    Some(end_date),
                )),
            );
            Box::pin(async move { Ok(Some(record)) })
        });
        user_repo.expect_replace_subscription().times(0);

        let usecase = StatusQueryUseCase::new(Arc::new(user_repo));
        let dto = usecase.get_status(user_id).await.unwrap();

        assert_eq!(dto.status, SubscriptionStatus::ActiveCanceling);
        assert_eq!(dto.end_date, Some(end_date));
    }
}
