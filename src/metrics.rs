use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use cdp_adapter::metrics as cdp_metrics;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};
use vote_orchestrator::{metrics as loop_metrics, RunContext, StatusSnapshot};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        cdp_metrics::register_metrics(registry);
        loop_metrics::register_metrics(registry);
    });
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

#[derive(Clone)]
struct StatusState {
    registry: Registry,
    context: Arc<RunContext>,
}

/// `/metrics` in Prometheus text format and `/status` as JSON.
pub fn router(context: Arc<RunContext>) -> Router {
    register_metrics();
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(StatusState {
            registry: global_registry().clone(),
            context,
        })
}

/// Loopback address the status server listens on. Port 0 means disabled.
pub fn status_addr(port: u16) -> Option<SocketAddr> {
    (port != 0).then(|| SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}

/// Serves [`router`] on [`status_addr`].
pub fn spawn_status_server(port: u16, context: Arc<RunContext>) -> Option<JoinHandle<()>> {
    let addr = status_addr(port)?;
    let app = router(context);
    info!(%addr, "status server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "status server exited with error");
                }
            }
            Err(err) => {
                error!(?err, "failed to bind status listener");
            }
        }
    }))
}

async fn status_handler(State(state): State<StatusState>) -> Json<StatusSnapshot> {
    Json(state.context.snapshot())
}

async fn metrics_handler(State(state): State<StatusState>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&state.registry.gather(), &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response();
    }

    match (
        String::from_utf8(buffer),
        HeaderValue::from_str(encoder.format_type()),
    ) {
        (Ok(body), Ok(content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        _ => {
            error!("failed to render prometheus metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}
