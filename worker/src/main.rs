use anyhow::{Context, Result};
use backend::{usecases::payment_lifecycle::capture_lead_time, wiring};
use practice_payments::infra::db::postgres::postgres_connection::{self, PoolSettings};
use std::sync::Arc;
use tracing::{error, info};
use worker::{
    axum_http, config,
    services::{capture_loop, no_show_loop},
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    practice_payments::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
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

    let policies = &dotenvy_env.policies;
    let schedule = &dotenvy_env.schedule;

    let no_show_loop = tokio::spawn(no_show_loop::run(
        Arc::clone(&usecases.no_shows),
        policies.no_show,
        schedule.no_show_scan_interval,
    ));

    let lead_time = capture_lead_time(policies.capture_lead_hours)
        .context("CAPTURE_LEAD_HOURS is out of range")?;
    let capture_loop = tokio::spawn(capture_loop::run(
        Arc::clone(&usecases.payments),
        lead_time,
        schedule.capture_interval,
    ));

    let server = tokio::spawn(axum_http::http_serve::start(
        Arc::clone(&dotenvy_env),
        Arc::clone(&usecases.no_shows),
        Arc::clone(&usecases.payments),
    ));

    tokio::select! {
        result = no_show_loop => result??,
        result = capture_loop => result??,
        result = server => result??,
    };
    Ok(())
}
