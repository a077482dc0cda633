use anyhow::Result;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

/// Identity resolved from a federated credential exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedInIdentity {
    pub provider_uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Client for the identity provider's credential-exchange REST endpoint.
/// The interactive token acquisition happens in the extension; this client
/// only turns the acquired OAuth token into a signed-in identity.
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpResponse {
    local_id: String,
    display_name: Option<String>,
    email: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorEnvelope {
    error: IdentityErrorDetails,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorDetails {
    code: Option<i64>,
    message: Option<String>,
}

impl IdentityClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Exchanges a provider OAuth access token for a signed-in identity.
    /// https://firebase.google.com/docs/reference/rest/auth#section-sign-in-with-oauth-credential
    pub async fn sign_in_with_credential(&self, access_token: &str) -> Result<SignedInIdentity> {
        let body = json!({
            "postBody": format!("access_token={}&providerId=google.com", access_token),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });

        let resp = self
            .http
            .post(format!(
                "{}/v1/accounts:signInWithIdp?key={}",
                self.base_url, self.api_key
            ))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let (error_code, error_message) =
                match serde_json::from_str::<IdentityErrorEnvelope>(&body) {
                    Ok(envelope) => (envelope.error.code, envelope.error.message),
                    Err(_) => (None, None),
                };

            error!(
                status = %status,
                error_code = ?error_code,
                error_message = ?error_message,
                "identity credential exchange failed"
            );

            anyhow::bail!(
                "identity credential exchange failed (status {})",
                status
            );
        }

        let parsed: SignInWithIdpResponse = resp.json().await?;
        Ok(SignedInIdentity {
            provider_uid: parsed.local_id,
            display_name: parsed.display_name,
            email: parsed.email,
            photo_url: parsed.photo_url,
        })
    }
}
