//! Routes for case CRUD, lifecycle transitions, and the pending-case
//! read model (snapshot, manual refresh, SSE stream).

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{
        Json as ResponseJson,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::models::case::{Case, CaseStatus, CreateCase, UpdateCase};
use serde::{Deserialize, Serialize};
use services::services::{cases::CaseService, pending_cases::PendingCasesState};
use tokio_stream::{Stream, StreamExt, wrappers::WatchStream};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CaseListQuery {
    pub status: Option<CaseStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ScheduleCaseRequest {
    pub technician_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

/// GET /api/cases?status=requested
pub async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<CaseListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Case>>>, ApiError> {
    let cases = Case::find_all(&state.db.pool, query.status).await?;
    Ok(ResponseJson(ApiResponse::success(cases)))
}

/// POST /api/cases
pub async fn create_case(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateCase>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::create(&state.db.pool, &state.events, payload).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// GET /api/cases/{id}
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = Case::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// PUT /api/cases/{id}
pub async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateCase>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::update(&state.db.pool, &state.events, id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// DELETE /api/cases/{id}
pub async fn delete_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CaseService::delete(&state.db.pool, &state.events, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/cases/{id}/schedule
pub async fn schedule_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<ScheduleCaseRequest>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::schedule(
        &state.db.pool,
        &state.events,
        id,
        payload.technician_id,
        payload.scheduled_at,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// POST /api/cases/{id}/start
pub async fn start_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::start(&state.db.pool, &state.events, id).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// POST /api/cases/{id}/complete
pub async fn complete_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::complete(&state.db.pool, &state.events, id).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// POST /api/cases/{id}/cancel
pub async fn cancel_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::cancel(&state.db.pool, &state.events, id).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// POST /api/cases/{id}/reopen
pub async fn reopen_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Case>>, ApiError> {
    let case = CaseService::reopen(&state.db.pool, &state.events, id).await?;
    Ok(ResponseJson(ApiResponse::success(case)))
}

/// GET /api/cases/pending
pub async fn get_pending(
    State(state): State<AppState>,
) -> ResponseJson<ApiResponse<PendingCasesState>> {
    ResponseJson(ApiResponse::success(state.watcher.state()))
}

/// POST /api/cases/pending/refresh
pub async fn refresh_pending(
    State(state): State<AppState>,
) -> ResponseJson<ApiResponse<()>> {
    state.watcher.refresh();
    ResponseJson(ApiResponse::success(()))
}

/// GET /api/cases/pending/stream
///
/// One SSE event per published snapshot, starting with the current one.
pub async fn stream_pending(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.watcher.subscribe())
        .map(|snapshot| Event::default().event("snapshot").json_data(&snapshot));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/cases",
        Router::new()
            .route("/", get(list_cases).post(create_case))
            .route("/pending", get(get_pending))
            .route("/pending/refresh", post(refresh_pending))
            .route("/pending/stream", get(stream_pending))
            .route(
                "/{id}",
                get(get_case).put(update_case).delete(delete_case),
            )
            .route("/{id}/schedule", post(schedule_case))
            .route("/{id}/start", post(start_case))
            .route("/{id}/complete", post(complete_case))
            .route("/{id}/cancel", post(cancel_case))
            .route("/{id}/reopen", post(reopen_case)),
    )
}
