use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    case::Case,
    technician::{CreateTechnician, Technician, UpdateTechnician},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// GET /api/technicians
pub async fn list_technicians(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Technician>>>, ApiError> {
    let technicians = Technician::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(technicians)))
}

/// POST /api/technicians
pub async fn create_technician(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateTechnician>,
) -> Result<ResponseJson<ApiResponse<Technician>>, ApiError> {
    let technician = Technician::create(&state.db.pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(technician)))
}

/// GET /api/technicians/{id}
pub async fn get_technician(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Technician>>, ApiError> {
    let technician = Technician::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("technician"))?;
    Ok(ResponseJson(ApiResponse::success(technician)))
}

/// PUT /api/technicians/{id}
///
/// Fields left unset keep their current value; `active: false` retires a
/// technician without touching historical assignments.
pub async fn update_technician(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTechnician>,
) -> Result<ResponseJson<ApiResponse<Technician>>, ApiError> {
    let existing = Technician::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("technician"))?;

    let technician = Technician::update(
        &state.db.pool,
        id,
        payload.name.unwrap_or(existing.name),
        payload.email.or(existing.email),
        payload.phone.or(existing.phone),
        payload.active.unwrap_or(existing.active),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(technician)))
}

/// DELETE /api/technicians/{id}
pub async fn delete_technician(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let cases = Case::count_for_technician(&state.db.pool, id).await?;
    if cases > 0 {
        return Err(ApiError::Conflict(format!(
            "technician {id} is still assigned to {cases} case(s)"
        )));
    }

    let deleted = Technician::delete(&state.db.pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("technician"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/technicians",
        Router::new()
            .route("/", get(list_technicians).post(create_technician))
            .route(
                "/{id}",
                get(get_technician)
                    .put(update_technician)
                    .delete(delete_technician),
            ),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use db::DBService;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use services::services::{
        events::CaseEvents,
        pending_cases::{PendingCacheOptions, PendingCaseCache, SqlitePendingStore},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::app;

    async fn test_state() -> AppState {
        let db = DBService::new_in_memory().await.unwrap();
        let events = CaseEvents::new(16);
        let watcher = PendingCaseCache::new(
            Arc::new(SqlitePendingStore::new(db.pool.clone())),
            &events,
            PendingCacheOptions::default(),
        )
        .spawn();
        AppState {
            db,
            events,
            watcher: Arc::new(watcher),
        }
    }

    async fn request(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_retire_technician_keeps_record() {
        let state = test_state().await;
        let (_, body) = request(
            &state,
            "POST",
            "/api/technicians",
            Some(json!({
                "name": "Jonas Berg",
                "email": "jonas@example.no",
                "phone": null,
            })),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["active"], true);

        let (status, body) = request(
            &state,
            "PUT",
            &format!("/api/technicians/{id}"),
            Some(json!({
                "name": null,
                "email": null,
                "phone": null,
                "active": false,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["active"], false);
        assert_eq!(body["data"]["name"], "Jonas Berg");
        assert_eq!(body["data"]["email"], "jonas@example.no");
    }

    #[tokio::test]
    async fn test_delete_unknown_technician_returns_404() {
        let state = test_state().await;
        let (status, _) = request(
            &state,
            "DELETE",
            &format!("/api/technicians/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
