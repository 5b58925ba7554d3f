//! pwgate-api - HTTP surface for the gateway proxy
//!
//! Serves a static help page at `/` and forwards every other path through
//! the configured request handler, converting its buffered status + body
//! into an HTTP response.
//!
//! # Usage
//!
//! ```ignore
//! use pwgate_api::{create_router, AppState};
//!
//! let state = AppState::new(handler);
//! let router = create_router(state);
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use pwgate_core::{ProxyResponse, RequestHandler};

/// Static informational page served at the root path.
const HELP_PAGE: &str = r#"Please see <a href="https://github.com/vloschiavo/powerwall2">README.md</a> for API usage. Sample: <a href="/api/meters/aggregates">/api/meters/aggregates</a> and <a href="/api/system_status/soe">/api/system_status/soe</a>"#;

/// Application state: the handler every proxied request goes through.
///
/// Whether that handler is a single gateway session or a fan-out across
/// several is invisible at this layer.
#[derive(Clone)]
pub struct AppState {
    handler: Arc<dyn RequestHandler>,
}

impl AppState {
    pub fn new(handler: Arc<dyn RequestHandler>) -> Self {
        Self { handler }
    }
}

/// Build the proxy router with the given application state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(help_page))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn help_page() -> Html<&'static str> {
    Html(HELP_PAGE)
}

async fn proxy(State(state): State<AppState>, uri: Uri) -> Response {
    let response = state.handler.handle(uri.path()).await;
    into_http(response)
}

/// Successes are JSON payloads passed through verbatim; failures carry a
/// plain-text message.
fn into_http(response: ProxyResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = if response.is_success() {
        "application/json"
    } else {
        "text/plain; charset=utf-8"
    };

    (status, [(header::CONTENT_TYPE, content_type)], response.body).into_response()
}
