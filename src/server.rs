//! HTTP surface: `GET /search/?pattern=<p>[&page=<n>][&id=<record>]`.
//!
//! Every request does a live fetch (no cache) on the blocking pool, then
//! scans and paginates. Requests share nothing mutable.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::fetch::{Fetcher, Retriever};
use crate::format;
use crate::paginate::{self, InvalidPage};
use crate::scan::ScanOptions;

pub const SEARCH_ROUTE: &str = "/search/";
pub const MISSING_PATTERN: &str = "No search pattern provided.";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Fetcher<Arc<dyn Retriever>>,
    record_id: String,
    page_size: usize,
}

impl AppState {
    pub fn new(retriever: Arc<dyn Retriever>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher: Fetcher::new(retriever, config.eutils.database.clone()),
                record_id: config.service.record_id.clone(),
                page_size: config.service.page_size.max(1),
            }),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchParams {
    pub pattern: Option<String>,
    pub page: Option<String>,
    /// Overrides the configured record.
    pub id: Option<String>,
}

/// Status plus JSON body, independent of the HTTP stack.
#[derive(Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(SEARCH_ROUTE, get(search))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "nucsearch service listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<SearchParams>,
) -> Response {
    let request = request_url(&headers, &uri);
    tokio::task::spawn_blocking(move || handle_search(&state, &params, &request))
        .await
        .unwrap_or_else(|e| {
            Reply::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("search task failed: {e}"),
            )
        })
        .into_response()
}

/// The endpoint's whole policy. Blocking: fetch, scan, paginate.
/// `request` is the absolute request URL, used to build page links.
pub fn handle_search(state: &AppState, params: &SearchParams, request: &Url) -> Reply {
    let Some(pattern) = params.pattern.as_deref().filter(|p| !p.is_empty()) else {
        return Reply::error(StatusCode::BAD_REQUEST, MISSING_PATTERN);
    };
    let inner = &state.inner;
    let id = params.id.as_deref().unwrap_or(&inner.record_id);
    info!(id, pattern, "search request");

    let matches = match crate::run(&inner.fetcher, id, pattern, ScanOptions::default()) {
        Ok(matches) => matches,
        Err(e) => {
            let status = if e.kind() == ErrorKind::Input {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(id, pattern, kind = %e.kind(), error = %e, "search failed");
            return Reply {
                status,
                body: json!({ "error": e.to_string(), "kind": e.kind().as_str() }),
            };
        }
    };

    if matches.is_empty() {
        return Reply::ok(json!({ "message": format::no_matches_message(pattern) }));
    }

    match paginate::paginate(&matches, params.page.as_deref(), inner.page_size) {
        Ok(page) => Reply::ok(json!(page.to_response(request))),
        Err(InvalidPage) => Reply {
            status: StatusCode::NOT_FOUND,
            body: json!({ "detail": InvalidPage.to_string() }),
        },
    }
}

/// Set by TLS-terminating proxies in front of the service.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Absolute URL of the incoming request, as the client addressed it.
/// The scheme follows `X-Forwarded-Proto` when it names http or https.
fn request_url(headers: &HeaderMap, uri: &Uri) -> Url {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "http" || v == "https")
        .unwrap_or_else(|| "http".to_owned());
    let path = uri.path_and_query().map_or(SEARCH_ROUTE, |pq| pq.as_str());
    Url::parse(&format!("{scheme}://{host}{path}"))
        .or_else(|_| Url::parse(&format!("{scheme}://localhost{path}")))
        .unwrap_or_else(|_| {
            Url::parse("http://localhost/search/").expect("static URL is always valid")
        })
}
