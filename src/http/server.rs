//! HTTP application setup.
//!
//! # Responsibilities
//! - Create the Axum Router for the single meaningful route
//! - Wire the filter chain: bot filter → favicon → main route → catch-all deny
//! - Force `Connection: close` on every response
//! - Serve the payload page from the main route

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::http::request::{peer_addr, remote_host};
use crate::http::response::{Abort, RequestHandlingError, SecretPage};
use crate::payload::PayloadLoader;
use crate::routing::RouteToken;
use crate::security::{reject_bots, BotFilter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub payload: Arc<PayloadLoader>,
    pub stop_on_first_request: bool,
}

/// Build the router with the whole request filter chain.
pub fn build_router(route: &RouteToken, state: AppState, bots: Arc<BotFilter>) -> Router {
    Router::new()
        .route(&route.path(), get(serve_payload).fallback(deny_request))
        .route("/favicon.ico", get(favicon).fallback(deny_request))
        .fallback(deny_request)
        .with_state(state)
        .layer(middleware::from_fn_with_state(bots, reject_bots))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Main route: hand out the payload.
async fn serve_payload(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, RequestHandlingError> {
    // Link checkers probe with HEAD; that must not use up the link
    if request.method() == Method::HEAD {
        return Ok(StatusCode::OK.into_response());
    }

    let payload = state.payload.current().await?;
    tracing::debug!(origin = %payload.origin(), bytes = payload.len(), "Rendering payload");

    SecretPage {
        data: payload.content(),
        stop: state.stop_on_first_request,
    }
    .into_delivery()
}

/// Browsers ask for this on their own; answer without touching the main route.
async fn favicon() -> StatusCode {
    StatusCode::OK
}

/// Catch-all: log and drop the connection.
async fn deny_request(request: Request<Body>) -> Abort {
    let host = remote_host(request.headers(), peer_addr(request.extensions()));
    tracing::info!(
        method = %request.method(),
        path = %request.uri().path(),
        remote_host = %host,
        "Request denied"
    );
    Abort
}
