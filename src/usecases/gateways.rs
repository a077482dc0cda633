use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use uuid::Uuid;

use crate::identity::identity_client::{IdentityClient, SignedInIdentity};
use crate::payments::stripe_client::{
    StripeCheckoutSession, StripeCheckoutSessionCreated, StripeClient, StripeCustomer,
    StripeEvent, StripeSubscription,
};

/// Payment-provider operations the usecases depend on. Concrete transport
/// lives in `payments::stripe_client`; tests mock this trait.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        client_reference_id: Uuid,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeCheckoutSessionCreated>;

    async fn retrieve_checkout_session(&self, session_id: &str)
    -> AnyResult<StripeCheckoutSession>;

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer>;

    async fn update_customer_metadata(
        &self,
        customer_id: &str,
        unique_user_id: Uuid,
    ) -> AnyResult<()>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        unique_user_id: Uuid,
    ) -> AnyResult<()>;

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        price_id: &str,
        mode: &str,
        client_reference_id: Uuid,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripeCheckoutSessionCreated> {
        self.create_checkout_session(price_id, mode, client_reference_id, metadata)
            .await
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    async fn retrieve_customer(&self, customer_id: &str) -> AnyResult<StripeCustomer> {
        self.retrieve_customer(customer_id).await
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &str,
        unique_user_id: Uuid,
    ) -> AnyResult<()> {
        self.update_customer_metadata(customer_id, unique_user_id)
            .await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn update_subscription_metadata(
        &self,
        subscription_id: &str,
        unique_user_id: Uuid,
    ) -> AnyResult<()> {
        self.update_subscription_metadata(subscription_id, unique_user_id)
            .await
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> AnyResult<String> {
        self.create_billing_portal_session(customer_id, return_url)
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}

/// Credential exchange against the federated identity provider.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait IdentityGateway: Send + Sync {
    async fn sign_in_with_credential(&self, access_token: &str) -> AnyResult<SignedInIdentity>;
}

#[async_trait]
impl IdentityGateway for IdentityClient {
    async fn sign_in_with_credential(&self, access_token: &str) -> AnyResult<SignedInIdentity> {
        self.sign_in_with_credential(access_token).await
    }
}
