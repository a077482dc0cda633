use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::subscriptions::SubscriptionStatusDto;

/// Profile fields surfaced to the popup after a successful sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub uid: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Messages the popup sends to the background bridge. The `action` tag and
/// field names are the wire contract with the extension UI.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionRequest {
    SignIn {
        credential: String,
    },
    SignOut,
    GetAuthState,
    InitiateSubscription {
        plan: String,
    },
    CheckSubscription {
        uid: Uuid,
    },
    OpenCustomerPortal {
        uid: Uuid,
    },
}

/// Result events the bridge emits back to the popup.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExtensionEvent {
    SignInResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        user: Option<UserProfile>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SignOutResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    CheckoutSessionReady {
        #[serde(rename = "sessionUrl")]
        session_url: String,
    },
    SubscriptionStatus {
        status: SubscriptionStatusDto,
    },
    SubscriptionError {
        error: String,
    },
    CustomerPortalResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ExtensionEvent {
    pub fn sign_in_ok(user: UserProfile) -> Self {
        ExtensionEvent::SignInResult {
            success: true,
            user: Some(user),
            error: None,
        }
    }

    pub fn sign_in_failed(error: String) -> Self {
        ExtensionEvent::SignInResult {
            success: false,
            user: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
    use crate::domain::value_objects::subscriptions::SubscriptionStatusDto;

    #[test]
    fn requests_deserialize_from_the_popup_wire_format() {
        let request: ExtensionRequest = serde_json::from_str(
            r#"{"action":"initiateSubscription","plan":"monthly"}"#,
        )
        .unwrap();
        assert_eq!(
            request,
            ExtensionRequest::InitiateSubscription {
                plan: "monthly".to_string()
            }
        );

        let request: ExtensionRequest =
            serde_json::from_str(r#"{"action":"signOut"}"#).unwrap();
        assert_eq!(request, ExtensionRequest::SignOut);

        let uid = uuid::Uuid::new_v4();
        let request: ExtensionRequest = serde_json::from_str(&format!(
            r#"{{"action":"checkSubscription","uid":"{uid}"}}"#
        ))
        .unwrap();
        assert_eq!(request, ExtensionRequest::CheckSubscription { uid });
    }

    #[test]
    fn events_serialize_with_action_tag_and_profile_field_names() {
        let uid = uuid::Uuid::new_v4();
        let event = ExtensionEvent::sign_in_ok(UserProfile {
            uid,
            display_name: Some("Ada".to_string()),
            email: None,
            photo_url: Some("https://example.com/a.png".to_string()),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "signInResult");
        assert_eq!(value["success"], true);
        assert_eq!(value["user"]["displayName"], "Ada");
        assert_eq!(value["user"]["photoURL"], "https://example.com/a.png");

        let event = ExtensionEvent::SubscriptionStatus {
            status: SubscriptionStatusDto {
                status: SubscriptionStatus::ActiveCanceling,
                plan: None,
                end_date: None,
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["action"], "subscriptionStatus");
        assert_eq!(value["status"]["status"], "active_canceling");
    }
}
