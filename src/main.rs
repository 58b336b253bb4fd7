mod config;
mod error;
mod hub;
mod presence;
mod state;
mod utils {
    pub mod monitor;
    pub mod probe;
    pub mod shutdown;
}
mod routes;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    hub::ChatHub,
    presence::Presence,
    state::{AppMeta, StatusBoard},
    utils::{monitor, probe::HttpProbe, shutdown},
};
use error::AppErr;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg  = Config::from_env();
    let meta = AppMeta::default();
    info!(version = meta.version, "🚀 Stream Box API starting");
    info!(
        port = cfg.port,
        engine = %cfg.engine_url,
        interval = ?cfg.check_interval,
        "configuration loaded"
    );

    let board    = StatusBoard::default();
    let hub      = ChatHub::new(cfg.chat_history, cfg.chat_queue);
    let presence = Presence::new(cfg.viewer_ttl);
    let stop     = CancellationToken::new();

    let probe = HttpProbe::new(cfg.probe_url(), cfg.probe_timeout)?;
    info!(url = probe.url(), "🔍 starting stream monitor");
    let monitor = tokio::spawn(monitor::run(
        probe,
        board.clone(),
        cfg.check_interval,
        stop.child_token(),
    ));

    let app = routes::app(hub.clone(), presence, board, meta, cfg.body_limit);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port)).await?;
    info!(port = cfg.port, "🌐 API server listening");

    shutdown::serve_with_deadline(
        listener,
        app,
        shutdown::wait_for_signal(stop.clone(), hub),
        cfg.shutdown_grace,
    )
    .await;

    if let Err(e) = monitor.await {
        warn!(error = %e, "monitor task ended abnormally");
    }
    info!("✅ server stopped");
    Ok(())
}
