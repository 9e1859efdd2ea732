//! HTTP routes: the resolve API and the image store itself.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tgimg_resolve::error::ErrorKind as ResolveErrorKind;
use tgimg_resolve::{Resolution, Resolver, Uploader};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Resolver,
    pub uploader: Option<Arc<dyn Uploader>>,
    /// URL path the store is served under; also the prefix of every returned
    /// endpoint.
    pub static_prefix: String,
    /// Fired on shutdown; in-flight resolutions give up with 503.
    pub shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    telegram_link: String,
    #[serde(default)]
    upload: bool,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    message: &'static str,
    endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

pub fn router(state: AppState, store: &Path) -> Router {
    let static_prefix = state.static_prefix.clone();
    Router::new()
        .route("/", get(alive).post(alive))
        .route("/api/tgimg", post(resolve_link))
        .nest_service(&static_prefix, ServeDir::new(store))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn alive() -> Json<serde_json::Value> {
    Json(json!({ "success": "true" }))
}

async fn resolve_link(State(state): State<AppState>, payload: Result<Json<ResolveRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(reason = %rejection.body_text(), "Rejected request body");
            return failure(StatusCode::BAD_REQUEST, "invalid request body");
        },
    };
    tracing::info!(link = %request.telegram_link, upload = request.upload, "Link received");

    let uploader = match (&state.uploader, request.upload) {
        (Some(uploader), true) => Some(uploader.clone()),
        (None, true) => return failure(StatusCode::BAD_REQUEST, "uploads are not configured"),
        (_, false) => None,
    };

    let resolution = match state.resolver.resolve_with_cancellation(&request.telegram_link, &state.shutdown).await {
        Ok(resolution) => resolution,
        Err(err) => {
            tracing::warn!(error = ?err, "Resolution failed");
            return failure(status_for(&err), (*err).to_string());
        },
    };
    let message = match &resolution {
        Resolution::Cached(_) => "Image already exists",
        Resolution::Downloaded { .. } => "Image downloaded",
        Resolution::Decoded { .. } => "Image decoded",
    };

    let url = match uploader {
        Some(uploader) => match state.resolver.publish(uploader.as_ref(), resolution.identifier()).await {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = ?err, "Upload failed");
                return failure(status_for(&err), (*err).to_string());
            },
        },
        None => None,
    };

    // The identifier is a decoded file name; the endpoint is a URL path.
    let endpoint = format!("{}/{}", state.static_prefix, urlencoding::encode(resolution.identifier().as_str()));
    Json(ResolveResponse { message, endpoint, url }).into_response()
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "error": error.into() }))).into_response()
}

/// HTTP status reported for a failed resolution.
pub fn status_for(kind: &ResolveErrorKind) -> StatusCode {
    match kind {
        ResolveErrorKind::InvalidLink(_) => StatusCode::BAD_REQUEST,
        ResolveErrorKind::Fetch { .. } | ResolveErrorKind::Status { .. } => StatusCode::BAD_GATEWAY,
        ResolveErrorKind::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ResolveErrorKind::Parse { .. }
        | ResolveErrorKind::Extraction { .. }
        | ResolveErrorKind::UnsupportedReference { .. }
        | ResolveErrorKind::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ResolveErrorKind::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        ResolveErrorKind::Client | ResolveErrorKind::Storage { .. } | ResolveErrorKind::Upload { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}
