use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use stderrlog::Timestamp;

use rabbit_forwarder::config::Config;
use rabbit_forwarder::handlers::health;
use rabbit_forwarder::mapping;
use rabbit_forwarder::supervisor::Supervisor;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    stderrlog::new()
        .verbosity(config.log_level)
        .timestamp(Timestamp::Millisecond)
        .show_module_names(true)
        .init()?;

    log::info!("rabbit-forwarder starting");

    let pairs = mapping::load()?;
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let supervisor = Arc::new(Supervisor::new(pairs, aws));
    supervisor.start().await?;

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/restart", get(health::restart).post(health::restart))
        .route("/stop", get(health::stop).post(health::stop))
        .with_state(supervisor);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    log::info!("Starting http server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
