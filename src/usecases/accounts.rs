use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::users::NewUserRecordEntity,
    repositories::user_records::UserRecordRepository,
    value_objects::{extension_messages::UserProfile, subscriptions::SubscriptionState},
};
use crate::usecases::gateways::IdentityGateway;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("sign-in failed: {0}")]
    SignInFailed(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AccountError::SignInFailed(_) => StatusCode::UNAUTHORIZED,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AccountError>;

/// Maps a provider credential to a user record, provisioning the trial
/// window on first sign-in.
pub struct AccountUseCase<R, Id>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Id: IdentityGateway + Send + Sync + 'static,
{
    user_repo: Arc<R>,
    identity_client: Arc<Id>,
}

impl<R, Id> AccountUseCase<R, Id>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Id: IdentityGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<R>, identity_client: Arc<Id>) -> Self {
        Self {
            user_repo,
            identity_client,
        }
    }

    pub async fn sign_in(&self, credential: &str) -> UseCaseResult<UserProfile> {
        let identity = self
            .identity_client
            .sign_in_with_credential(credential)
            .await
            .map_err(|err| {
                warn!(error = %err, "accounts: credential exchange failed");
                AccountError::SignInFailed(err.to_string())
            })?;

        let existing = self
            .user_repo
            .find_by_provider_uid(&identity.provider_uid)
            .await
            .map_err(AccountError::Internal)?;

        let user_id = match existing {
            Some(record) => {
                self.user_repo
                    .touch_last_login(record.id)
                    .await
                    .map_err(AccountError::Internal)?;
                info!(user_id = %record.id, "accounts: returning user signed in");
                record.id
            }
            None => {
                let now = Utc::now();
                let new_user = NewUserRecordEntity {
                    id: Uuid::new_v4(),
                    provider_uid: identity.provider_uid.clone(),
                    display_name: identity.display_name.clone(),
                    email: identity.email.clone(),
                    photo_url: identity.photo_url.clone(),
                    subscription: Some(
                        serde_json::to_value(SubscriptionState::trial(now))
                            .map_err(|err| AccountError::Internal(err.into()))?,
                    ),
                    created_at: now,
                    last_login_at: now,
                };

                let user_id = self
                    .user_repo
                    .create(new_user)
                    .await
                    .map_err(AccountError::Internal)?;
                info!(%user_id, "accounts: provisioned new user with trial window");
                user_id
            }
        };

        Ok(UserProfile {
            uid: user_id,
            display_name: identity.display_name,
            email: identity.email,
            photo_url: identity.photo_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::users::UserRecordEntity;
    use crate::domain::repositories::user_records::MockUserRecordRepository;
    use crate::domain::value_objects::enums::{
        subscription_plans::SubscriptionPlan, subscription_statuses::SubscriptionStatus,
    };
    use crate::identity::identity_client::SignedInIdentity;
    use crate::usecases::gateways::MockIdentityGateway;
    use chrono::Duration;
    use mockall::predicate::eq;

    fn sample_identity() -> SignedInIdentity {
        SignedInIdentity {
            provider_uid: "provider-uid-1".to_string(),
            display_name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            photo_url: None,
        }
    }

    fn sample_record(user_id: Uuid) -> UserRecordEntity {
        let now = Utc::now();
        UserRecordEntity {
            id: user_id,
            provider_uid: "provider-uid-1".to_string(),
            display_name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            photo_url: None,
            stripe_customer_id: None,
            stripe_email: None,
            stripe_default_payment_method: None,
            subscription: None,
            created_at: now,
            last_login_at: now,
        }
    }

    #[tokio::test]
    async fn first_sign_in_provisions_trial_record() {
        let mut identity = MockIdentityGateway::new();
        identity
            .expect_sign_in_with_credential()
            .with(eq("token"))
            .returning(|_| {
                let identity = sample_identity();
                Box::pin(async move { Ok(identity) })
            });

        let mut user_repo = MockUserRecordRepository::new();
        user_repo
            .expect_find_by_provider_uid()
            .with(eq("provider-uid-1"))
            .returning(|_| Box::pin(async { Ok(None) }));
        user_repo
            .expect_create()
            .withf(|new_user| {
                let state: SubscriptionState =
                    serde_json::from_value(new_user.subscription.clone().unwrap()).unwrap();
                let window = state.end_date.unwrap() - state.start_date.unwrap();
                state.status == SubscriptionStatus::Trial
                    && state.plan == SubscriptionPlan::Trial
                    && window == Duration::hours(24)
            })
            .returning(|new_user| {
                let id = new_user.id;
                Box::pin(async move { Ok(id) })
            });

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(identity));
        let profile = usecase.sign_in("token").await.unwrap();

        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn returning_user_only_touches_last_login() {
        let user_id = Uuid::new_v4();

        let mut identity = MockIdentityGateway::new();
        identity.expect_sign_in_with_credential().returning(|_| {
            let identity = sample_identity();
            Box::pin(async move { Ok(identity) })
        });

        let mut user_repo = MockUserRecordRepository::new();
        let record = sample_record(user_id);
        user_repo
            .expect_find_by_provider_uid()
            .returning(move |_| {
                let record = record.clone();
                Box::pin(async move { Ok(Some(record)) })
            });
        user_repo
            .expect_touch_last_login()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        user_repo.expect_create().times(0);
        user_repo.expect_replace_subscription().times(0);

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(identity));
        let profile = usecase.sign_in("token").await.unwrap();

        assert_eq!(profile.uid, user_id);
    }

    #[tokio::test]
    async fn credential_exchange_failure_creates_nothing() {
        let mut identity = MockIdentityGateway::new();
        identity
            .expect_sign_in_with_credential()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("bad token")) }));

        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_provider_uid().times(0);
        user_repo.expect_create().times(0);

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(identity));
        let err = usecase.sign_in("token").await.unwrap_err();

        assert!(matches!(err, AccountError::SignInFailed(_)));
    }
}
