//! NATS message handlers

pub mod ping;
pub mod route;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::optimizer::RouteOptimizer;
use crate::services::routing::{create_matrix_provider_with_fallback, MatrixProvider};

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    // Create shared geocoder
    let geocoder: Arc<dyn Geocoder> = Arc::from(create_geocoder(&config.nominatim_url));
    info!("Geocoder initialized: {}", geocoder.name());

    // Create matrix provider with automatic Valhalla detection
    let matrix_provider: Arc<dyn MatrixProvider> = Arc::from(
        create_matrix_provider_with_fallback(config.valhalla_url.clone()).await
    );
    info!("Matrix provider initialized: {}", matrix_provider.name());

    let optimizer = Arc::new(RouteOptimizer::new(
        geocoder,
        matrix_provider,
        config.geocode_concurrency,
        config.matrix_max_locations,
    ));

    // Subscribe to all subjects
    let ping_sub = client.subscribe("fieldroute.ping").await?;
    let optimize_sub = client.subscribe("fieldroute.route.optimize").await?;
    let staff_day_sub = client.subscribe("fieldroute.route.staff_day").await?;
    let cancel_sub = client.subscribe("fieldroute.route.cancel").await?;

    info!("Subscribed to NATS subjects");

    // Clone for each handler
    let client_ping = client.clone();
    let client_optimize = client.clone();
    let client_staff_day = client.clone();
    let client_cancel = client.clone();

    let pool_staff_day = pool.clone();

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let optimize_handle = tokio::spawn(async move {
        route::handle_optimize(client_optimize, optimize_sub, optimizer).await
    });

    let staff_day_handle = tokio::spawn(async move {
        route::handle_staff_day(client_staff_day, staff_day_sub, pool_staff_day).await
    });

    let cancel_handle = tokio::spawn(async move {
        route::handle_cancel(client_cancel, cancel_sub).await
    });

    info!("All handlers started, waiting for messages...");

    // Wait for any handler to finish (which means an error occurred)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = optimize_handle => {
            error!("Route optimize handler finished: {:?}", result);
        }
        result = staff_day_handle => {
            error!("Staff day handler finished: {:?}", result);
        }
        result = cancel_handle => {
            error!("Route cancel handler finished: {:?}", result);
        }
    }

    Ok(())
}
