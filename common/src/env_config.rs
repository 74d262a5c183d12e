use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the quota service.
///
/// Holds the database connection string, Stripe credentials and the
/// price-id environment mappings used to resolve a customer's plan.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe price ids mapped to the app's plan labels.
    pub stripe_prices: StripePriceIds,
}

#[derive(Clone, Debug, Default)]
/// Stripe price ids for the three sold tiers. Any of these may be empty;
/// plan resolution then falls back to nickname/lookup-key matching.
pub struct StripePriceIds {
    pub basic: String,
    pub pro: String,
    pub elite: String,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: "development" or "production"
    /// - `DATABASE_URL`: Connection string for the database
    ///
    /// Optional (with defaults):
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `STRIPE_SECRET_KEY`, `STRIPE_PRICE_BASIC`, `STRIPE_PRICE_PRO`,
    ///   `STRIPE_PRICE_ELITE`: Stripe credentials and price mappings
    ///
    /// # Panics
    ///
    /// Panics if a required environment variable is missing.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_prices: StripePriceIds {
                basic: env::var("STRIPE_PRICE_BASIC").unwrap_or_default(),
                pro: env::var("STRIPE_PRICE_PRO").unwrap_or_default(),
                elite: env::var("STRIPE_PRICE_ELITE").unwrap_or_default(),
            },
        })
    }
}
