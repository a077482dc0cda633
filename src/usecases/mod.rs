pub mod accounts;
pub mod bridge;
pub mod checkout;
pub mod gateways;
pub mod reconciler;
pub mod status;
