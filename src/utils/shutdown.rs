use std::{future::Future, time::Duration};
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use tokio::{
    net::{TcpListener, TcpStream},
    signal,
    task::JoinSet,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hub::ChatHub;

/// Waits for Ctrl-C / SIGTERM, then stops the monitor and closes the chat hub
/// so open SSE streams finish and connections can drain.
pub async fn wait_for_signal(stop: CancellationToken, hub: ChatHub) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }

    warn!("⚠️  shutting down server...");
    stop.cancel();
    info!(
        subscribers = hub.subscriber_count(),
        history = hub.history().len(),
        "closing chat hub"
    );
    hub.close();
}

/// Serves `app` until `shutdown` resolves, then lets open connections finish
/// for at most `grace`. Whatever is still open after that gets aborted.
pub async fn serve_with_deadline<F>(listener: TcpListener, app: Router, shutdown: F, grace: Duration)
where
    F: Future<Output = ()>,
{
    let drain = CancellationToken::new();
    let mut conns = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    conns.spawn(serve_conn(stream, app.clone(), drain.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
            // 收掉已結束的連線
            Some(_) = conns.join_next(), if !conns.is_empty() => {}
        }
    }

    drop(listener);
    drain.cancel();
    info!(open = conns.len(), "draining connections");

    let drained = time::timeout(grace, async {
        while conns.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(?grace, open = conns.len(), "❌ shutdown deadline reached, forcing close");
        conns.shutdown().await;
    }
}

async fn serve_conn(stream: TcpStream, app: Router, drain: CancellationToken) {
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let res = tokio::select! {
        res = conn.as_mut() => res,
        _ = drain.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = res {
        debug!(error = %e, "connection closed with error");
    }
}
