use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    entities::users::PaymentCustomerDetails,
    repositories::user_records::UserRecordRepository,
    value_objects::{
        enums::{
            subscription_plans::SubscriptionPlan, subscription_statuses::SubscriptionStatus,
        },
        subscriptions::SubscriptionState,
    },
};
use crate::payments::stripe_client::{StripeCheckoutSession, StripeClient, StripeSubscription};
use crate::usecases::gateways::PaymentGateway;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReconcileError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ReconcileError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            ReconcileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ReconcileError>;

/// Folds provider notifications into the per-user subscription record.
///
/// Every mutation replaces the whole subscription sub-document, so replaying
/// an event converges to the same stored state. Events that cannot be mapped
/// back to a user are dropped with a diagnostic; mutating the wrong record
/// is worse than missing an update.
pub struct EventReconciler<R, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    user_repo: Arc<R>,
    stripe_client: Arc<Pay>,
}

impl<R, Pay> EventReconciler<R, Pay>
where
    R: UserRecordRepository + Send + Sync + 'static,
    Pay: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<R>, stripe_client: Arc<Pay>) -> Self {
        Self {
            user_repo,
            stripe_client,
        }
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "reconciler: webhook signature verification failed");
                ReconcileError::InvalidWebhook("signature verification failed".to_string())
            })?;

        let event_type = event.type_.clone();
        info!(event_type = %event_type, "reconciler: webhook verified");

        match event_type.as_str() {
            "checkout.session.completed" => {
                let session = StripeClient::extract_checkout_session(&event).ok_or_else(|| {
                    ReconcileError::InvalidWebhook("missing checkout session".to_string())
                })?;
                self.handle_checkout_completed(session).await?;
            }
            "customer.subscription.created"
            | "customer.subscription.updated"
            | "customer.subscription.deleted"
            | "customer.subscription.trial_will_end" => {
                let subscription = StripeClient::extract_subscription(&event).ok_or_else(|| {
                    ReconcileError::InvalidWebhook("missing subscription object".to_string())
                })?;
                self.handle_subscription_lifecycle(subscription).await?;
            }
            "invoice.payment_succeeded" | "invoice.payment_failed" => {
                let invoice = StripeClient::extract_invoice(&event).ok_or_else(|| {
                    ReconcileError::InvalidWebhook("missing invoice object".to_string())
                })?;
                self.handle_invoice_payment(invoice.subscription).await?;
            }
            _ => {
                debug!(event_type = %event_type, "reconciler: unhandled event type");
            }
        }

        Ok(())
    }

    /// Success-landing path: retrieve the session by id and fold it in
    /// eagerly instead of waiting for the webhook to arrive.
    pub async fn handle_checkout_by_session_id(&self, session_id: &str) -> UseCaseResult<()> {
        let session = self
            .stripe_client
            .retrieve_checkout_session(session_id)
            .await
            .map_err(|err| {
                error!(
                    session_id,
                    error = ?err,
                    "reconciler: failed to retrieve checkout session"
                );
                ReconcileError::Internal(err)
            })?;

        self.handle_checkout_completed(session).await
    }

    /// Fires once per successful purchase, for both one-time and recurring
    /// plans.
    pub async fn handle_checkout_completed(
        &self,
        session: StripeCheckoutSession,
    ) -> UseCaseResult<()> {
        let user_id = match session
            .client_reference_id
            .as_deref()
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            Some(user_id) => user_id,
            None => {
                warn!(
                    session_id = ?session.id,
                    "reconciler: checkout session carries no correlation identifier, dropping"
                );
                return Ok(());
            }
        };

        let Some(record) = self.user_repo.find_by_id(user_id).await? else {
            warn!(
                %user_id,
                session_id = ?session.id,
                "reconciler: no user record for checkout session, dropping"
            );
            return Ok(());
        };

        if let Some(customer_id) = session.customer.as_deref() {
            self.enrich_customer(record.id, customer_id).await;
        }

        let plan = match session
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("plan"))
            .and_then(|value| SubscriptionPlan::from_str(value))
        {
            Some(plan) => plan,
            None => {
                warn!(
                    %user_id,
                    session_id = ?session.id,
                    "reconciler: checkout session carries no recognizable plan, dropping"
                );
                return Ok(());
            }
        };

        if plan == SubscriptionPlan::Lifetime {
            self.user_repo
                .replace_subscription(user_id, SubscriptionState::lifetime(Utc::now()))
                .await?;
            info!(%user_id, "reconciler: lifetime purchase recorded");
            return Ok(());
        }

        let state = match session.subscription.as_deref() {
            Some(subscription_id) => {
                self.recurring_state_after_checkout(user_id, plan, subscription_id)
                    .await
            }
            None => None,
        };

        // The purchase succeeded; incomplete bookkeeping must not lose it.
        let state = state.unwrap_or(SubscriptionState {
            status: SubscriptionStatus::Active,
            plan,
            start_date: Some(Utc::now()),
            end_date: None,
            canceled_at: None,
            provider_subscription_id: None,
        });

        self.user_repo.replace_subscription(user_id, state).await?;
        info!(%user_id, plan = %plan, "reconciler: checkout completion recorded");

        Ok(())
    }

    /// Applies a provider subscription lifecycle change (created / updated /
    /// deleted / trial_will_end) to the correlated user record.
    pub async fn handle_subscription_lifecycle(
        &self,
        subscription: StripeSubscription,
    ) -> UseCaseResult<()> {
        let Some(user_id) = self.resolve_correlation_id(&subscription).await? else {
            return Ok(());
        };

        let Some(record) = self.user_repo.find_by_id(user_id).await? else {
            warn!(
                %user_id,
                subscription_id = ?subscription.id,
                "reconciler: no user record for lifecycle event, dropping"
            );
            return Ok(());
        };

        let existing = record.subscription_state();
        let now = Utc::now();

        if subscription.cancel_at_period_end {
            let Some(end_date) = subscription.period_end().and_then(ts_to_datetime) else {
                warn!(
                    %user_id,
                    subscription_id = ?subscription.id,
                    "reconciler: cancellation event without period end, dropping"
                );
                return Ok(());
            };

            // The provider's line-item naming is not a reliable plan source;
            // keep the plan already on record when there is one.
            let plan = match existing
                .as_ref()
                .map(|state| state.plan)
                .or_else(|| self.plan_from_line_item(&subscription, None))
            {
                Some(plan) => plan,
                None => {
                    warn!(
                        %user_id,
                        subscription_id = ?subscription.id,
                        "reconciler: cancellation event with no resolvable plan, dropping"
                    );
                    return Ok(());
                }
            };

            self.user_repo
                .replace_subscription(
                    user_id,
                    SubscriptionState {
                        status: SubscriptionStatus::ActiveCanceling,
                        plan,
                        start_date: None,
                        end_date: Some(end_date),
                        canceled_at: Some(now),
                        provider_subscription_id: subscription.id.clone(),
                    },
                )
                .await?;
            info!(
                %user_id,
                plan = %plan,
                end_date = %end_date,
                "reconciler: subscription marked canceling at period end"
            );
            return Ok(());
        }

        if subscription.status.as_deref() == Some("active") {
            let (Some(start_date), Some(end_date)) = (
                subscription.period_start().and_then(ts_to_datetime),
                subscription.period_end().and_then(ts_to_datetime),
            ) else {
                warn!(
                    %user_id,
                    subscription_id = ?subscription.id,
                    "reconciler: active lifecycle event without period bounds, dropping"
                );
                return Ok(());
            };

            let existing_plan = existing.as_ref().map(|state| state.plan);
            let Some(plan) = self.plan_from_line_item(&subscription, existing_plan) else {
                warn!(
                    %user_id,
                    subscription_id = ?subscription.id,
                    "reconciler: active lifecycle event with no resolvable plan, dropping"
                );
                return Ok(());
            };

            let was_canceling = existing
                .as_ref()
                .map(|state| state.status == SubscriptionStatus::ActiveCanceling)
                .unwrap_or(false);

            let canceled_at = if was_canceling {
                // Reactivation clears the pending cancellation.
                None
            } else {
                existing.as_ref().and_then(|state| state.canceled_at)
            };

            self.user_repo
                .replace_subscription(
                    user_id,
                    SubscriptionState {
                        status: SubscriptionStatus::Active,
                        plan,
                        start_date: Some(start_date),
                        end_date: Some(end_date),
                        canceled_at,
                        provider_subscription_id: subscription.id.clone(),
                    },
                )
                .await?;
            info!(
                %user_id,
                plan = %plan,
                reactivated = was_canceling,
                "reconciler: active subscription period recorded"
            );
            return Ok(());
        }

        // Statuses this state machine does not model (incomplete, past_due,
        // canceled, ...) are deliberately left alone rather than guessed at.
        debug!(
            %user_id,
            provider_status = ?subscription.status,
            "reconciler: ignoring unmodeled provider status"
        );
        Ok(())
    }

    /// Invoice events are only a trigger to re-derive subscription truth.
    pub async fn handle_invoice_payment(
        &self,
        subscription_id: Option<String>,
    ) -> UseCaseResult<()> {
        let Some(subscription_id) = subscription_id else {
            debug!("reconciler: invoice without subscription reference, nothing to do");
            return Ok(());
        };

        let subscription = self
            .stripe_client
            .retrieve_subscription(&subscription_id)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription_id,
                    error = ?err,
                    "reconciler: failed to re-fetch subscription for invoice event"
                );
                ReconcileError::Internal(err)
            })?;

        self.handle_subscription_lifecycle(subscription).await
    }

    /// Three-tier correlation recovery: subscription metadata, customer
    /// metadata, then reverse store lookup. The reverse-lookup path repairs
    /// the provider-side metadata so the earlier tiers succeed next time.
    async fn resolve_correlation_id(
        &self,
        subscription: &StripeSubscription,
    ) -> UseCaseResult<Option<Uuid>> {
        if let Some(user_id) = subscription
            .metadata
            .get("unique_user_id")
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            return Ok(Some(user_id));
        }

        let Some(customer_id) = subscription.customer.as_deref() else {
            warn!(
                subscription_id = ?subscription.id,
                "reconciler: subscription carries neither correlation metadata nor customer, dropping"
            );
            return Ok(None);
        };

        let customer = match self.stripe_client.retrieve_customer(customer_id).await {
            Ok(customer) => customer,
            Err(err) => {
                warn!(
                    subscription_id = ?subscription.id,
                    customer_id,
                    error = %err,
                    "reconciler: customer fetch failed during correlation recovery, dropping"
                );
                return Ok(None);
            }
        };

        if let Some(user_id) = customer
            .metadata
            .get("unique_user_id")
            .and_then(|value| Uuid::parse_str(value).ok())
        {
            return Ok(Some(user_id));
        }

        let Some(record) = self.user_repo.find_by_stripe_customer_id(customer_id).await? else {
            warn!(
                subscription_id = ?subscription.id,
                customer_id,
                "reconciler: correlation recovery exhausted, dropping event"
            );
            return Ok(None);
        };

        info!(
            user_id = %record.id,
            customer_id,
            "reconciler: correlation recovered by reverse lookup, backfilling metadata"
        );
        self.backfill_metadata(record.id, customer_id, subscription.id.as_deref())
            .await;

        Ok(Some(record.id))
    }

    /// Self-healing step after a reverse lookup: push the identifier back
    /// onto the provider objects. Failures only cost a future fallback.
    async fn backfill_metadata(
        &self,
        user_id: Uuid,
        customer_id: &str,
        subscription_id: Option<&str>,
    ) {
        if let Err(err) = self
            .stripe_client
            .update_customer_metadata(customer_id, user_id)
            .await
        {
            warn!(
                %user_id,
                customer_id,
                error = %err,
                "reconciler: customer metadata backfill failed"
            );
        }

        if let Some(subscription_id) = subscription_id {
            if let Err(err) = self
                .stripe_client
                .update_subscription_metadata(subscription_id, user_id)
                .await
            {
                warn!(
                    %user_id,
                    subscription_id,
                    error = %err,
                    "reconciler: subscription metadata backfill failed"
                );
            }
        }
    }

    /// Persists provider customer details on the user record and stamps the
    /// correlation identifier onto the customer object. Failures here must
    /// not fail the checkout acknowledgment.
    async fn enrich_customer(&self, user_id: Uuid, customer_id: &str) {
        match self.stripe_client.retrieve_customer(customer_id).await {
            Ok(customer) => {
                let details = PaymentCustomerDetails {
                    stripe_customer_id: Some(customer.id.clone()),
                    stripe_email: customer.email.clone(),
                    stripe_default_payment_method: customer.default_payment_method(),
                };
                if let Err(err) = self.user_repo.upsert_customer_details(user_id, details).await {
                    warn!(
                        %user_id,
                        customer_id,
                        error = %err,
                        "reconciler: failed to persist customer details"
                    );
                }
                if let Err(err) = self
                    .stripe_client
                    .update_customer_metadata(customer_id, user_id)
                    .await
                {
                    warn!(
                        %user_id,
                        customer_id,
                        error = %err,
                        "reconciler: failed to stamp customer metadata"
                    );
                }
            }
            Err(err) => {
                warn!(
                    %user_id,
                    customer_id,
                    error = %err,
                    "reconciler: customer fetch failed during checkout enrichment"
                );
            }
        }
    }

    /// Fetches the recurring subscription behind a completed checkout and
    /// stamps the correlation identifier onto it. Returns None when the
    /// bookkeeping cannot be completed; the caller degrades gracefully.
    async fn recurring_state_after_checkout(
        &self,
        user_id: Uuid,
        plan: SubscriptionPlan,
        subscription_id: &str,
    ) -> Option<SubscriptionState> {
        let subscription = match self.stripe_client.retrieve_subscription(subscription_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(
                    %user_id,
                    subscription_id,
                    error = %err,
                    "reconciler: subscription fetch failed after checkout, degrading"
                );
                return None;
            }
        };

        if let Err(err) = self
            .stripe_client
            .update_subscription_metadata(subscription_id, user_id)
            .await
        {
            warn!(
                %user_id,
                subscription_id,
                error = %err,
                "reconciler: subscription metadata stamp failed after checkout, degrading"
            );
            return None;
        }

        let start_date = subscription.period_start().and_then(ts_to_datetime)?;
        let end_date = subscription.period_end().and_then(ts_to_datetime)?;

        Some(SubscriptionState {
            status: SubscriptionStatus::Active,
            plan,
            start_date: Some(start_date),
            end_date: Some(end_date),
            canceled_at: None,
            provider_subscription_id: Some(subscription_id.to_string()),
        })
    }

    /// Parses the provider's line-item nickname into a plan, keeping the
    /// stored plan when the nickname is unknown.
    fn plan_from_line_item(
        &self,
        subscription: &StripeSubscription,
        fallback: Option<SubscriptionPlan>,
    ) -> Option<SubscriptionPlan> {
        match subscription
            .line_item_nickname()
            .and_then(SubscriptionPlan::from_str)
        {
            Some(plan) => Some(plan),
            None => {
                if fallback.is_some() {
                    warn!(
                        subscription_id = ?subscription.id,
                        nickname = ?subscription.line_item_nickname(),
                        "reconciler: unknown line-item nickname, keeping stored plan"
                    );
                }
                fallback
            }
        }
    }
}

fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}
