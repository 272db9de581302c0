use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub telegram_bot_token: String,
    pub telegram_webhook_secret: String,
    /// Flat price of the single 30-minute service, used for revenue rollups.
    pub fixed_service_price: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "navbat.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_webhook_secret: env::var("TELEGRAM_WEBHOOK_SECRET").unwrap_or_default(),
            fixed_service_price: env::var("FIXED_SERVICE_PRICE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50000.0),
        }
    }
}
