use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use backend::config::Config;
use backend::{app, AppState};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::from_config(&config);

    let mut rng = config
        .seed
        .map(ChaCha8Rng::seed_from_u64)
        .unwrap_or_else(ChaCha8Rng::from_entropy);
    match state.service().ensure_assignments(&mut rng).await {
        Ok(assignments) => info!(participants = assignments.len(), "assignments ready"),
        Err(err) => error!(%err, "no assignments available, lookups will return none"),
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "server listening");

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, app(state, &config.public_dir)).with_graceful_shutdown(
        async move {
            shutdown_signal().await;
            info!("shutdown signal received, draining connections");
            let _ = signalled_tx.send(());
        },
    );

    tokio::select! {
        res = server.into_future() => {
            res.context("server error")?;
            info!("server closed");
            Ok(())
        }
        () = force_exit_after(signalled_rx, config.shutdown_grace) => {
            error!(grace = ?config.shutdown_grace, "connections did not drain, forcing shutdown");
            std::process::exit(1);
        }
    }
}

/// Resolves `grace` after the shutdown signal fires; never resolves otherwise.
async fn force_exit_after(signalled: oneshot::Receiver<()>, grace: Duration) {
    if signalled.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
