use anyhow::Result;
use url::Url;

use super::config_model::{
    Database, DotEnvyConfig, Identity, Server, Stripe, StripePrices, Urls,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: std::env::var("SERVER_PORT")
            .expect("SERVER_PORT is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let stripe = Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
        prices: StripePrices {
            monthly: std::env::var("STRIPE_PRICE_MONTHLY")
                .expect("STRIPE_PRICE_MONTHLY is invalid"),
            yearly: std::env::var("STRIPE_PRICE_YEARLY").expect("STRIPE_PRICE_YEARLY is invalid"),
            lifetime: std::env::var("STRIPE_PRICE_LIFETIME")
                .expect("STRIPE_PRICE_LIFETIME is invalid"),
        },
    };

    let identity = Identity {
        base_url: std::env::var("IDENTITY_BASE_URL")
            .unwrap_or_else(|_| "https://identitytoolkit.googleapis.com".to_string()),
        api_key: std::env::var("IDENTITY_API_KEY").expect("IDENTITY_API_KEY is invalid"),
    };

    let urls = Urls {
        server_url: Url::parse(&std::env::var("SERVER_URL").expect("SERVER_URL is invalid"))?,
        extension_url: Url::parse(
            &std::env::var("EXTENSION_URL").expect("EXTENSION_URL is invalid"),
        )?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        stripe,
        identity,
        urls,
    })
}
