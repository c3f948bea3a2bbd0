use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    case::Case,
    customer::{CreateCustomer, Customer, UpdateCustomer},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// GET /api/customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Customer>>>, ApiError> {
    let customers = Customer::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(customers)))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = Customer::create(&state.db.pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// GET /api/customers/{id}
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = Customer::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// PUT /api/customers/{id}
///
/// Fields left unset keep their current value.
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let existing = Customer::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;

    let customer = Customer::update(
        &state.db.pool,
        id,
        payload.company_name.unwrap_or(existing.company_name),
        payload.contact_person.or(existing.contact_person),
        payload.contact_email.or(existing.contact_email),
        payload.contact_phone.or(existing.contact_phone),
        payload.organization_number.or(existing.organization_number),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// DELETE /api/customers/{id}
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let cases = Case::count_for_customer(&state.db.pool, id).await?;
    if cases > 0 {
        return Err(ApiError::Conflict(format!(
            "customer {id} still has {cases} case(s)"
        )));
    }

    let deleted = Customer::delete(&state.db.pool, id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("customer"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/customers",
        Router::new()
            .route("/", get(list_customers).post(create_customer))
            .route(
                "/{id}",
                get(get_customer).put(update_customer).delete(delete_customer),
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
    use db::{DBService, models::case::CreateCase};
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
    async fn test_customer_crud_round_trip() {
        let state = test_state().await;

        let (status, body) = request(
            &state,
            "POST",
            "/api/customers",
            Some(json!({
                "company_name": "Bergen Seafood AS",
                "contact_person": "Lene Aas",
                "contact_email": null,
                "contact_phone": null,
                "organization_number": "912 345 678",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = request(
            &state,
            "PUT",
            &format!("/api/customers/{id}"),
            Some(json!({
                "company_name": null,
                "contact_person": null,
                "contact_email": "post@bergenseafood.no",
                "contact_phone": null,
                "organization_number": null,
            })),
        )
        .await;
        assert_eq!(body["data"]["company_name"], "Bergen Seafood AS");
        assert_eq!(body["data"]["contact_email"], "post@bergenseafood.no");
        assert_eq!(body["data"]["contact_person"], "Lene Aas");

        let (status, _) = request(&state, "DELETE", &format!("/api/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = request(&state, "GET", &format!("/api/customers/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_customer_with_cases_conflicts() {
        let state = test_state().await;
        let customer = Customer::create(
            &state.db.pool,
            &CreateCustomer {
                company_name: "Oslo Offices AS".to_string(),
                contact_person: None,
                contact_email: None,
                contact_phone: None,
                organization_number: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Case::create(
            &state.db.pool,
            &CreateCase::from_title(customer.id, "Mice".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let (status, body) = request(
            &state,
            "DELETE",
            &format!("/api/customers/{}", customer.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }
}
