pub mod axum_http;
pub mod config;
pub mod domain;
pub mod identity;
pub mod infrastructure;
pub mod observability;
pub mod payments;
pub mod usecases;
