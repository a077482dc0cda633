pub mod enums;
pub mod extension_messages;
pub mod subscriptions;
