use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::models::{AddLinkRequest, DeletedResponse, HealthResponse, LinkResponse, LinksResponse};
use crate::api::response;
use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::AppState;

/// Ceiling for a whole ingestion, on top of the fetch and summary timeouts.
const INGEST_TIMEOUT: Duration = Duration::from_secs(60);

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/links", get(list_links_handler).post(add_link_handler))
        .route("/api/links/:id", delete(delete_link_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> impl IntoResponse {
    response::success(HealthResponse { status: "healthy" })
}

async fn list_links_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    let links = state.store.list(&user.user_id).await?;
    tracing::debug!(user = %user.user_id, count = links.len(), "listed links");
    Ok(response::success(LinksResponse { links }))
}

async fn add_link_handler(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Option<Json<AddLinkRequest>>,
) -> Result<impl IntoResponse> {
    let url = payload.map(|Json(req)| req.url).unwrap_or_default();
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("URL required".to_string()));
    }

    tracing::info!(user = %user.user_id, url, "processing link");
    let start_time = Instant::now();

    let draft = tokio::time::timeout(INGEST_TIMEOUT, state.pipeline.ingest(url))
        .await
        .map_err(|_| {
            tracing::warn!(url, elapsed = ?start_time.elapsed(), "ingestion timed out");
            AppError::Timeout
        })??;

    let link = state.store.insert(&user.user_id, draft).await?;
    tracing::info!(id = %link.id, elapsed = ?start_time.elapsed(), "link saved");

    Ok(response::created(LinkResponse { link }))
}

async fn delete_link_handler(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state.store.delete(&user.user_id, &id).await? {
        return Err(AppError::NotFound("Link not found".to_string()));
    }
    tracing::info!(user = %user.user_id, id = %id, "link deleted");
    Ok(response::success(DeletedResponse { id }))
}
