//! Dispatch relay: a stateless HTTP front for the backend's dispatch
//! procedures.
//!
//! The scanning station never holds the backend credential. It talks to this
//! relay, which validates required fields, makes exactly one RPC per inbound
//! request with the service key attached, and reshapes the result into the
//! `dispatch_core::wire` types. Nothing is cached or retried.
//!
//! | Route | Procedure |
//! |---|---|
//! | `GET /api/ping` | none |
//! | `POST /api/scan` | `scan_dispatch_item` |
//! | `POST /api/unscan` | `unscan_dispatch_item` |
//! | `POST /api/return` | `return_dispatch_item` |
//! | `GET /api/list?dispatch_id=` | `list_dispatch_scans` |
//! | `POST /api/finalize` | `finalize_dispatch` |
//! | `GET /api/dispatch/{id}/meta` | `get_dispatch_meta` |
//! | `GET /api/dispatch/{id}/items` | `list_dispatch_items` |

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod config;
pub mod cors;
pub mod error;
pub mod routes;
pub mod rpc;

pub use config::RelayConfig;
pub use cors::CorsPolicy;
pub use error::RelayError;
pub use routes::RelayState;
pub use rpc::{PostgrestClient, RpcBackend, RpcError};

/// Build the relay router. Unknown paths and methods answer like ping, and
/// every response carries the CORS headers of `cors`.
pub fn router(state: Arc<RelayState>, cors: CorsPolicy) -> Router {
    Router::new()
        .route("/api/ping", get(routes::ping))
        .route("/api/scan", post(routes::scan).fallback(routes::ping))
        .route("/api/unscan", post(routes::unscan).fallback(routes::ping))
        .route("/api/return", post(routes::return_item).fallback(routes::ping))
        .route("/api/list", get(routes::list).fallback(routes::ping))
        .route("/api/finalize", post(routes::finalize).fallback(routes::ping))
        .route("/api/dispatch/{id}/meta", get(routes::meta))
        .route("/api/dispatch/{id}/items", get(routes::items))
        .fallback(routes::ping)
        .layer(middleware::from_fn_with_state(cors, cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, serve until Ctrl+C or SIGTERM, then drain.
pub async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    info!(?config, "starting relay");

    let rpc = PostgrestClient::new(&config.remote_url, config.service_key.clone());
    let state = RelayState::new(Arc::new(rpc));
    let app = router(state, CorsPolicy::new(config.cors_origin.as_deref())?);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(bind = %config.bind, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving relay")?;

    info!("relay shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
