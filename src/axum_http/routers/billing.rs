use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::axum_http::error_responses::error_response;
use crate::config::config_model::DotEnvyConfig;
use crate::infrastructure::postgres::{
    postgres_connection::PgPoolSquad, repositories::user_records::UserRecordPostgres,
};
use crate::payments::stripe_client::StripeClient;
use crate::usecases::{
    checkout::CheckoutUseCase, reconciler::EventReconciler, status::StatusQueryUseCase,
};

pub struct BillingState {
    checkout: Arc<CheckoutUseCase<UserRecordPostgres, StripeClient>>,
    reconciler: Arc<EventReconciler<UserRecordPostgres, StripeClient>>,
    status: Arc<StatusQueryUseCase<UserRecordPostgres>>,
    extension_url: Url,
}

pub fn routes(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Router {
    let success_url = format!(
        "{}payment-success?session_id={{CHECKOUT_SESSION_ID}}",
        config.urls.server_url
    );
    let stripe_client = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        success_url,
        config.urls.extension_url.to_string(),
    ));
    let user_repo = Arc::new(UserRecordPostgres::new(Arc::clone(&db_pool)));

    let state = BillingState {
        checkout: Arc::new(CheckoutUseCase::new(
            Arc::clone(&user_repo),
            Arc::clone(&stripe_client),
            config.stripe.prices.clone(),
            config.urls.extension_url.to_string(),
        )),
        reconciler: Arc::new(EventReconciler::new(
            Arc::clone(&user_repo),
            Arc::clone(&stripe_client),
        )),
        status: Arc::new(StatusQueryUseCase::new(user_repo)),
        extension_url: config.urls.extension_url.clone(),
    };

    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/payment-success", get(payment_success))
        .route("/webhook", post(webhook))
        .route("/check-subscription/:unique_user_id", get(check_subscription))
        .route(
            "/create-customer-portal-session",
            post(create_customer_portal_session),
        )
        .with_state(Arc::new(state))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutSessionRequest {
    pub unique_user_id: Uuid,
    pub plan: String,
}

pub async fn create_checkout_session(
    State(state): State<Arc<BillingState>>,
    Json(payload): Json<CreateCheckoutSessionRequest>,
) -> Response {
    info!(
        unique_user_id = %payload.unique_user_id,
        plan = %payload.plan,
        "billing: create checkout session requested"
    );
    match state
        .checkout
        .create_checkout_session(payload.unique_user_id, &payload.plan)
        .await
    {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => {
            error!(
                unique_user_id = %payload.unique_user_id,
                status = err.status_code().as_u16(),
                error = %err,
                "billing: create checkout session failed"
            );
            error_response(err.status_code(), err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessParams {
    pub session_id: String,
}

/// Landing page after checkout. Folds the session in eagerly, then bounces
/// the user back to the extension either way.
pub async fn payment_success(
    State(state): State<Arc<BillingState>>,
    Query(params): Query<PaymentSuccessParams>,
) -> Redirect {
    let outcome = match state
        .reconciler
        .handle_checkout_by_session_id(&params.session_id)
        .await
    {
        Ok(()) => "success",
        Err(err) => {
            error!(
                session_id = %params.session_id,
                error = %err,
                "billing: payment success handling failed"
            );
            "error"
        }
    };

    Redirect::to(&format!("{}?payment={}", state.extension_url, outcome))
}

pub async fn webhook(
    State(state): State<Arc<BillingState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
    else {
        warn!("billing: webhook without stripe-signature header");
        return error_response(StatusCode::BAD_REQUEST, "missing stripe-signature header");
    };

    match state.reconciler.handle_webhook(&body, signature).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "received": true }))).into_response(),
        Err(err) => {
            error!(
                status = err.status_code().as_u16(),
                error = %err,
                "billing: webhook handling failed"
            );
            error_response(err.status_code(), err.to_string())
        }
    }
}

pub async fn check_subscription(
    State(state): State<Arc<BillingState>>,
    Path(unique_user_id): Path<Uuid>,
) -> Response {
    match state.status.get_status(unique_user_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => {
            error!(
                %unique_user_id,
                error = %err,
                "billing: subscription status check failed"
            );
            error_response(err.status_code(), err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePortalSessionRequest {
    pub unique_user_id: Uuid,
}

pub async fn create_customer_portal_session(
    State(state): State<Arc<BillingState>>,
    Json(payload): Json<CreatePortalSessionRequest>,
) -> Response {
    match state
        .checkout
        .create_portal_session(payload.unique_user_id)
        .await
    {
        Ok(url) => (StatusCode::OK, Json(json!({ "url": url }))).into_response(),
        Err(err) => {
            error!(
                unique_user_id = %payload.unique_user_id,
                status = err.status_code().as_u16(),
                error = %err,
                "billing: customer portal session failed"
            );
            error_response(err.status_code(), err.to_string())
        }
    }
}
