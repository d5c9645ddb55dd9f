use std::env;

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,

    /// Bearer token required on `/api` routes. `None` leaves them open,
    /// which is how local development runs.
    pub api_token: Option<String>,

    /// Account credited with platform fees (and rounding residue).
    pub platform_account_id: Uuid,

    /// Hours after `settled_at` during which a dispute is accepted.
    pub dispute_window_hours: i64,

    /// Starting balance granted to accounts the in-memory wallet has not
    /// seen before. 0 disables seeding (demo mode off).
    pub demo_wallet_seed: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),

            platform_account_id: match env::var("PLATFORM_ACCOUNT_ID") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PLATFORM_ACCOUNT_ID must be a UUID"))?,
                Err(_) => Uuid::new_v4(),
            },

            dispute_window_hours: env::var("DISPUTE_WINDOW_HOURS")
                .unwrap_or_else(|_| "48".into())
                .parse()
                .unwrap_or(48),

            demo_wallet_seed: env::var("DEMO_WALLET_SEED")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .unwrap_or(0),
        })
    }
}
