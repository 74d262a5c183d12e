use std::sync::Arc;

use billing::client::StripeBilling;
use billing::plan::PlanCatalog;
use common::env_config::Config;
use db::PgStore;
use quota::QuotaGate;

/// One-shot quota consumption for a user id, for wiring checks and ops:
/// `main <user-id>` prints the grant or exits non-zero on rejection.
#[tokio::main]
async fn main() {
    // get env vars
    let config = Config::from_env();
    let is_production = config.environment == "production";

    // init logger
    if config.console_logging_enabled {
        logger::setup().expect("Failed to set up logger");
    }

    // init db connection
    let pool = db::setup(&config.database_url, is_production)
        .await
        .expect("Failed to set up database");

    let store = Arc::new(PgStore::new(pool));
    let billing = Arc::new(StripeBilling::new(&config.stripe_secret_key));
    let gate = QuotaGate::new(
        billing,
        store.clone(),
        store.clone(),
        store,
        PlanCatalog::from_config(&config),
    );

    let user_id = std::env::args().nth(1).expect("usage: main <user-id>");

    match gate.check_and_consume(&user_id).await {
        Ok(grant) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&grant).expect("grant serializes")
            );
        }
        Err(e) => {
            log::error!("Quota rejected for {}: {}", user_id, e);
            std::process::exit(1);
        }
    }
}
