use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::config_model::StripePrices;
use crate::domain::{
    repositories::user_records::UserRecordRepository,
    value_objects::{
        enums::subscription_plans::SubscriptionPlan, subscriptions::CheckoutSessionDto,
    },
};
use crate::usecases::gateways::PaymentGateway;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error("user not found")]
    UserNotFound,
    #[error("user has no payment customer")]
    NoCustomer,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::UnknownPlan(_) | CheckoutError::NoCustomer => StatusCode::BAD_REQUEST,
            CheckoutError::UserNotFound => StatusCode::NOT_FOUND,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

/// Starts provider checkouts and self-service portal sessions. Every created
/// session is stamped with the user identifier twice (primary correlation
/// field and metadata) so asynchronous events can always be mapped back.
pub struct CheckoutUseCase<R, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    user_repo: Arc<R>,
    stripe_client: Arc<Pay>,
    prices: StripePrices,
    return_url: String,
}

impl<R, Pay> CheckoutUseCase<R, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<R>,
        stripe_client: Arc<Pay>,
        prices: StripePrices,
        return_url: String,
    ) -> Self {
        Self {
            user_repo,
            stripe_client,
            prices,
            return_url,
        }
    }

    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        plan: &str,
    ) -> UseCaseResult<CheckoutSessionDto> {
        let plan = SubscriptionPlan::from_str(plan)
            .filter(SubscriptionPlan::is_purchasable)
            .ok_or_else(|| {
                let err = CheckoutError::UnknownPlan(plan.to_string());
                warn!(
                    %user_id,
                    plan,
                    status = err.status_code().as_u16(),
                    "checkout: unknown plan requested"
                );
                err
            })?;

        if self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(CheckoutError::Internal)?
            .is_none()
        {
            let err = CheckoutError::UserNotFound;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "checkout: no record for user, caller may retry after provisioning"
            );
            return Err(err);
        }

        let price_id = self.price_id_for(plan);
        // One-time payment for lifetime, recurring subscription otherwise.
        let mode = match plan {
            SubscriptionPlan::Lifetime => "payment",
            _ => "subscription",
        };

        let metadata = HashMap::from([
            ("unique_user_id".to_string(), user_id.to_string()),
            ("plan".to_string(), plan.to_string()),
        ]);

        info!(
            %user_id,
            plan = %plan,
            mode,
            price_id = %price_id,
            "checkout: creating checkout session"
        );

        let session = self
            .stripe_client
            .create_checkout_session(price_id, mode, user_id, metadata)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan = %plan,
                    price_id = %price_id,
                    error = ?err,
                    "checkout: stripe checkout session creation failed"
                );
                CheckoutError::Internal(err)
            })?;

        let session_url = session
            .url
            .ok_or_else(|| CheckoutError::Internal(anyhow::anyhow!("checkout session has no URL")))?;

        info!(
            %user_id,
            session_id = %session.id,
            "checkout: checkout session created"
        );

        Ok(CheckoutSessionDto {
            session_id: session.id,
            session_url,
        })
    }

    pub async fn create_portal_session(&self, user_id: Uuid) -> UseCaseResult<String> {
        let record = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(CheckoutError::Internal)?
            .ok_or_else(|| {
                let err = CheckoutError::UserNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "checkout: portal requested for unknown user"
                );
                err
            })?;

        let customer_id = record.stripe_customer_id.ok_or_else(|| {
            let err = CheckoutError::NoCustomer;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "checkout: portal requested without a payment customer"
            );
            err
        })?;

        let url = self
            .stripe_client
            .create_billing_portal_session(&customer_id, &self.return_url)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    customer_id = %customer_id,
                    error = ?err,
                    "checkout: billing portal session creation failed"
                );
                CheckoutError::Internal(err)
            })?;

        Ok(url)
    }

    fn price_id_for(&self, plan: SubscriptionPlan) -> &str {
        match plan {
            SubscriptionPlan::Monthly => &self.prices.monthly,
            SubscriptionPlan::Yearly => &self.prices.yearly,
            SubscriptionPlan::Lifetime => &self.prices.lifetime,
            // Guarded by is_purchasable above; trial never reaches checkout.
            SubscriptionPlan::Trial => &self.prices.monthly,
        }
    }
}
