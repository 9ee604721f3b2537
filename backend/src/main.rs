use anyhow::Result;
use backend::{axum_http::http_serve, config::config_loader, wiring};
use practice_payments::infra::db::postgres::postgres_connection::{self, PoolSettings};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    practice_payments::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        &PoolSettings {
            max_size: dotenvy_env.database.max_pool_size,
            ..PoolSettings::default()
        },
    )?;
    info!("Postgres connection has been established");

    let usecases = wiring::build_usecases(
        Arc::new(postgres_pool),
        &dotenvy_env.stripe,
        &dotenvy_env.notifications,
        dotenvy_env.policies.booking,
    )?;
    info!(booking_policy = %dotenvy_env.policies.booking, "Use cases have been wired");

    http_serve::start(Arc::new(dotenvy_env), usecases).await?;

    Ok(())
}
