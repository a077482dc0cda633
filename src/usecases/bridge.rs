use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{
    repositories::user_records::UserRecordRepository,
    value_objects::extension_messages::{ExtensionEvent, ExtensionRequest, UserProfile},
};
use crate::usecases::{
    accounts::AccountUseCase,
    checkout::{CheckoutError, CheckoutUseCase},
    gateways::{IdentityGateway, PaymentGateway},
    status::StatusQueryUseCase,
};

/// Attempts for a checkout started right after sign-in, when the user record
/// may not have landed yet.
const PROVISIONING_RETRY_ATTEMPTS: u32 = 3;
const PROVISIONING_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Background-side dispatcher for the popup message contract. The popup is a
/// pure consumer of the result events; everything else routes through the
/// usecases.
pub struct ExtensionBridge<R, Id, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Id: IdentityGateway + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    accounts: Arc<AccountUseCase<R, Id>>,
    checkout: Arc<CheckoutUseCase<R, Pay>>,
    status: Arc<StatusQueryUseCase<R>>,
    session: RwLock<Option<UserProfile>>,
}

impl<R, Id, Pay> ExtensionBridge<R, Id, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Id: IdentityGateway + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        accounts: Arc<AccountUseCase<R, Id>>,
        checkout: Arc<CheckoutUseCase<R, Pay>>,
        status: Arc<StatusQueryUseCase<R>>,
    ) -> Self {
        Self {
            accounts,
            checkout,
            status,
            session: RwLock::new(None),
        }
    }

    pub async fn dispatch(&self, request: ExtensionRequest) -> ExtensionEvent {
        match request {
            ExtensionRequest::SignIn { credential } => self.sign_in(&credential).await,
            ExtensionRequest::SignOut => {
                self.session.write().await.take();
                ExtensionEvent::SignOutResult {
                    success: true,
                    error: None,
                }
            }
            ExtensionRequest::GetAuthState => match self.session.read().await.clone() {
                Some(user) => ExtensionEvent::sign_in_ok(user),
                None => ExtensionEvent::SignOutResult {
                    success: true,
                    error: None,
                },
            },
            ExtensionRequest::InitiateSubscription { plan } => {
                self.initiate_subscription(&plan).await
            }
            ExtensionRequest::CheckSubscription { uid } => {
                match self.status.get_status(uid).await {
                    Ok(status) => ExtensionEvent::SubscriptionStatus { status },
                    Err(err) => ExtensionEvent::SubscriptionError {
                        error: err.to_string(),
                    },
                }
            }
            ExtensionRequest::OpenCustomerPortal { uid } => {
                match self.checkout.create_portal_session(uid).await {
                    Ok(url) => ExtensionEvent::CustomerPortalResult {
                        success: true,
                        url: Some(url),
                        error: None,
                    },
                    Err(err) => ExtensionEvent::CustomerPortalResult {
                        success: false,
                        url: None,
                        error: Some(err.to_string()),
                    },
                }
            }
        }
    }

    async fn sign_in(&self, credential: &str) -> ExtensionEvent {
        match self.accounts.sign_in(credential).await {
            Ok(user) => {
                *self.session.write().await = Some(user.clone());
                ExtensionEvent::sign_in_ok(user)
            }
            Err(err) => ExtensionEvent::sign_in_failed(err.to_string()),
        }
    }

    /// Starts a checkout for the signed-in user. Record provisioning races
    /// the first checkout right after sign-in, so "user not found" is
    /// retried a bounded number of times before it is terminal.
    async fn initiate_subscription(&self, plan: &str) -> ExtensionEvent {
        let Some(user) = self.session.read().await.clone() else {
            return ExtensionEvent::SubscriptionError {
                error: "User not signed in".to_string(),
            };
        };

        let mut attempt = 1;
        loop {
            match self.checkout.create_checkout_session(user.uid, plan).await {
                Ok(session) => {
                    info!(
                        uid = %user.uid,
                        attempt,
                        "bridge: checkout session ready"
                    );
                    return ExtensionEvent::CheckoutSessionReady {
                        session_url: session.session_url,
                    };
                }
                Err(CheckoutError::UserNotFound) if attempt < PROVISIONING_RETRY_ATTEMPTS => {
                    warn!(
                        uid = %user.uid,
                        attempt,
                        "bridge: record not provisioned yet, retrying checkout"
                    );
                    tokio::time::sleep(PROVISIONING_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(err) => {
                    return ExtensionEvent::SubscriptionError {
                        error: err.to_string(),
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_model::StripePrices;
    use crate::domain::entities::users::UserRecordEntity;
    use crate::domain::repositories::user_records::MockUserRecordRepository;
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
    use crate::identity::identity_client::SignedInIdentity;
    use crate::payments::stripe_client::StripeCheckoutSessionCreated;
    use crate::usecases::gateways::{MockIdentityGateway, MockPaymentGateway};
    use chrono::Utc;
    use uuid::Uuid;

    fn build_bridge(
        user_repo: MockUserRecordRepository,
        identity: MockIdentityGateway,
        stripe: MockPaymentGateway,
    ) -> ExtensionBridge<MockUserRecordRepository, MockIdentityGateway, MockPaymentGateway> {
        let user_repo = Arc::new(user_repo);
        let accounts = Arc::new(AccountUseCase::new(
            Arc::clone(&user_repo),
            Arc::new(identity),
        ));
        let checkout = Arc::new(CheckoutUseCase::new(
            Arc::clone(&user_repo),
            Arc::new(stripe),
            StripePrices {
                monthly: "price_monthly".to_string(),
                yearly: "price_yearly".to_string(),
                lifetime: "price_lifetime".to_string(),
            },
            "https://extension.example".to_string(),
        ));
        let status = Arc::new(StatusQueryUseCase::new(Arc::clone(&user_repo)));
        ExtensionBridge::new(accounts, checkout, status)
    }

    fn sample_record(user_id: Uuid) -> UserRecordEntity {
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
            subscription: None,
            created_at: now,
            last_login_at: now,
        }
    }

    fn identity_for(user_id: Uuid) -> (MockIdentityGateway, MockUserRecordRepository) {
        let mut identity = MockIdentityGateway::new();
        identity.expect_sign_in_with_credential().returning(|_| {
            Box::pin(async {
                Ok(SignedInIdentity {
                    provider_uid: "provider-uid-1".to_string(),
                    display_name: None,
                    email: None,
                    photo_url: None,
                })
            })
        });

        let mut user_repo = MockUserRecordRepository::new();
        user_repo.expect_find_by_provider_uid().returning(move |_| {
            let record = sample_record(user_id);
            Box::pin(async move { Ok(Some(record)) })
        });
        user_repo
            .expect_touch_last_login()
            .returning(|_| Box::pin(async { Ok(()) }));

        (identity, user_repo)
    }

    #[tokio::test]
    async fn auth_state_replays_the_signed_in_user() {
        let user_id = Uuid::new_v4();
        let (identity, user_repo) = identity_for(user_id);
        let bridge = build_bridge(user_repo, identity, MockPaymentGateway::new());

        let event = bridge.dispatch(ExtensionRequest::GetAuthState).await;
        assert!(matches!(event, ExtensionEvent::SignOutResult { .. }));

        bridge
            .dispatch(ExtensionRequest::SignIn {
                credential: "token".to_string(),
            })
            .await;

        let event = bridge.dispatch(ExtensionRequest::GetAuthState).await;
        match event {
            ExtensionEvent::SignInResult { success, user, .. } => {
                assert!(success);
                assert_eq!(user.unwrap().uid, user_id);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        bridge.dispatch(ExtensionRequest::SignOut).await;
        let event = bridge.dispatch(ExtensionRequest::GetAuthState).await;
        assert!(matches!(event, ExtensionEvent::SignOutResult { .. }));
    }

    #[tokio::test]
    async fn initiate_subscription_requires_sign_in() {
        let bridge = build_bridge(
            MockUserRecordRepository::new(),
            MockIdentityGateway::new(),
            MockPaymentGateway::new(),
        );

        let event = bridge
            .dispatch(ExtensionRequest::InitiateSubscription {
                plan: "monthly".to_string(),
            })
            .await;
        match event {
            ExtensionEvent::SubscriptionError { error } => {
                assert_eq!(error, "User not signed in");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_race_is_retried_then_succeeds() {
        let user_id = Uuid::new_v4();
        let (identity, mut user_repo) = identity_for(user_id);

        // First lookup misses (record still provisioning), second hits.
        let mut lookups = 0;
        user_repo.expect_find_by_id().returning(move |_| {
            lookups += 1;
            if lookups == 1 {
                Box::pin(async { Ok(None) })
            } else {
                let record = sample_record(user_id);
                Box::pin(async move { Ok(Some(record)) })
            }
        });

        let mut stripe = MockPaymentGateway::new();
        stripe
            .expect_create_checkout_session()
            .times(1)
            .returning(|_, _, _, _| {
                Box::pin(async {
                    Ok(StripeCheckoutSessionCreated {
                        id: "cs_1".to_string(),
                        url: Some("https://checkout.stripe.com/cs_1".to_string()),
                    })
                })
            });

        let bridge = build_bridge(user_repo, identity, stripe);
        bridge
            .dispatch(ExtensionRequest::SignIn {
                credential: "token".to_string(),
            })
            .await;

        let event = bridge
            .dispatch(ExtensionRequest::InitiateSubscription {
                plan: "monthly".to_string(),
            })
            .await;
        match event {
            ExtensionEvent::CheckoutSessionReady { session_url } => {
                assert_eq!(session_url, "https://checkout.stripe.com/cs_1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn provisioning_race_is_terminal_after_three_attempts() {
        let user_id = Uuid::new_v4();
        let (identity, mut user_repo) = identity_for(user_id);

        user_repo
            .expect_find_by_id()
            .times(3)
            .returning(|_| Box::pin(async { Ok(None) }));

        let mut stripe = MockPaymentGateway::new();
        stripe.expect_create_checkout_session().times(0);

        let bridge = build_bridge(user_repo, identity, stripe);
        bridge
            .dispatch(ExtensionRequest::SignIn {
                credential: "token".to_string(),
            })
            .await;

        let event = bridge
            .dispatch(ExtensionRequest::InitiateSubscription {
                plan: "monthly".to_string(),
            })
            .await;
        assert!(matches!(event, ExtensionEvent::SubscriptionError { .. }));
    }

    #[tokio::test]
    async fn check_subscription_reports_status() {
        let user_id = Uuid::new_v4();
        let mut user_repo = MockUserRecordRepository::new();
        user_repo
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let bridge = build_bridge(
            user_repo,
            MockIdentityGateway::new(),
            MockPaymentGateway::new(),
        );

        let event = bridge
            .dispatch(ExtensionRequest::CheckSubscription { uid: user_id })
            .await;
        match event {
            ExtensionEvent::SubscriptionStatus { status } => {
                assert_eq!(status.status, SubscriptionStatus::None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
