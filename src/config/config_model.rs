use url::Url;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub stripe: Stripe,
    pub identity: Identity,
    pub urls: Urls,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub prices: StripePrices,
}

/// Static plan-to-price mapping. One price id per purchasable plan.
#[derive(Debug, Clone)]
pub struct StripePrices {
    pub monthly: String,
    pub yearly: String,
    pub lifetime: String,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct Urls {
    /// Public base URL of this backend, used for the checkout success landing.
    pub server_url: Url,
    /// Extension landing page used for cancel/return redirects.
    pub extension_url: Url,
}
