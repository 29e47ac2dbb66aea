use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Where Stripe redirects users after checkout/onboarding.
    pub frontend_url: String,
    pub stripe_secret_key: String,
    /// Secret for the platform webhook endpoint (/webhooks/stripe).
    pub stripe_webhook_secret: String,
    /// Secret for the Connect webhook endpoint (/webhooks/stripe-connect).
    pub stripe_connect_webhook_secret: String,
    pub jwt_secret: String,
    /// When set, joining produces a `booked` participation pending host
    /// acceptance instead of confirming directly from the checkout webhook.
    pub require_host_approval: bool,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SUPPERCLUB_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "supperclub.db".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_connect_webhook_secret: env::var("STRIPE_CONNECT_WEBHOOK_SECRET")
                .unwrap_or_default(),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                if !dev_mode {
                    tracing::warn!("JWT_SECRET not set, using insecure default");
                }
                "supperclub-dev-secret".to_string()
            }),
            require_host_approval: env::var("REQUIRE_HOST_APPROVAL")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
