//! WMTS Overlay - reprojected WMTS tiles for web Mercator maps.
//!
//! This binary starts the HTTP server or prints tile plans.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wmts_overlay::{
    capabilities::JsonFileCapabilities,
    config::{Cli, Command, PlanConfig, ServeConfig},
    imagery::CheckerboardImagery,
    server::{create_router, RouterConfig},
    tile::{TileSource, ViewportTileKey, WebMercatorGrid},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::Plan(config) => run_plan(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let projector = match config.source.projector() {
        Ok(projector) => projector,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let imagery = match config.imagery() {
        Ok(imagery) => imagery,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("WMTS Overlay v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Capabilities: {}", config.source.capabilities.display());
    match (&config.imagery_root, config.checkerboard) {
        (_, true) => info!("  Imagery: checkerboard"),
        (Some(root), false) => info!("  Imagery root: {}", root.display()),
        (None, false) => {}
    }
    info!("  Projection: {}", projector.name());
    info!(
        "  Mesh: {} cells/side, bounds sampled {} times/edge, inset border {}",
        config.source.division, config.source.bounds_division, config.source.inset_border
    );
    info!(
        "  Display: {}px tiles, zoom 0..={}",
        config.source.tile_size, config.source.max_zoom
    );
    info!(
        "  Pool: {} surfaces, cache: {} plans",
        config.pool_size, config.cache_entries
    );

    let source = Arc::new(TileSource::new(
        Arc::new(JsonFileCapabilities::new(config.source.capabilities.clone())),
        imagery,
        projector,
        Arc::new(WebMercatorGrid::new(config.source.tile_size)),
        config.source_options(),
    ));

    // Initialization failures are not fatal: the source retries on the next request.
    match source.ready().await {
        Ok(()) => info!("  Capabilities loaded"),
        Err(e) => {
            warn!("  Capabilities not loaded: {}", e);
            warn!("  Tile requests return 503 until the capabilities file is readable");
        }
    }

    let router = create_router(source.clone(), build_router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);
    info!("  curl http://{}/source", addr);
    info!("  curl -o tile.png http://{}/tiles/0/0/0.png", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    source.close();

    if let Err(e) = result {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wmts_overlay=debug,tower_http=debug"
    } else {
        "wmts_overlay=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Plan Command
// =============================================================================

async fn run_plan(config: PlanConfig) -> ExitCode {
    init_logging(false);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let projector = match config.source.projector() {
        Ok(projector) => projector,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Planning never touches imagery.
    let source = TileSource::new(
        Arc::new(JsonFileCapabilities::new(config.source.capabilities.clone())),
        Arc::new(CheckerboardImagery),
        projector,
        Arc::new(WebMercatorGrid::new(config.source.tile_size)),
        config.source.source_options(),
    );

    let key = ViewportTileKey::new(config.x, config.y, config.z);
    let plan = match source.plan(key).await {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let output = if config.geojson {
        plan.debug_geojson(config.centers)
    } else {
        serde_json::json!({
            "tile": key,
            "matrix": plan.matrix,
            "source_tiles": plan.tiles.len(),
            "triangles": plan.triangle_count(),
            "tiles": plan.tiles,
        })
    };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
