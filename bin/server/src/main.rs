use std::net::SocketAddr;
use std::time::Duration;
use tollgate_server::{build_state, config::ServerConfig, load_tls, router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });
    tracing::info!(hostname = %config.hostname, "Loaded configuration");

    let state = build_state(&config).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to initialize gateway");
        std::process::exit(1);
    });

    // Cleanup expired flows on startup
    match state.flows.purge_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_flows = count, "Cleaned up expired flows on startup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired flows on startup");
        }
    }

    // Spawn periodic flow cleanup task
    let cleanup_flows = state.flows.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_flows.purge_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_flows = count, "Periodic flow cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired flows");
                }
            }
        }
    });

    let tls = load_tls(&config).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load TLS material");
        std::process::exit(1);
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    match tls {
        Some(tls) => {
            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            tracing::info!("listening on https://{}", addr);

            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("server error");
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("failed to bind to address");

            tracing::info!("listening on http://{}", addr);

            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("server error");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
