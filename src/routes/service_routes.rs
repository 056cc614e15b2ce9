// src/routes/service_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    authz,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ServiceRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_services).post(create_service))
        .route(
            "/{service_id}",
            get(get_service).put(update_service).delete(delete_service),
        )
}

pub async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<Vec<ServiceRow>>, ApiError> {
    let rows: Vec<ServiceRow> = sqlx::query_as(
        r#"
        SELECT service_id, name, description, provider_id, category
        FROM services
        ORDER BY category ASC, name ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> Result<Json<ServiceRow>, ApiError> {
    let row: ServiceRow = sqlx::query_as(
        r#"
        SELECT service_id, name, description, provider_id, category
        FROM services
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub description: String,
    pub provider_id: Uuid,
    pub category: String,
}

pub async fn create_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceRow>), ApiError> {
    authz::ensure_admin_or_provider(&auth, req.provider_id)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let row: ServiceRow = sqlx::query_as(
        r#"
        INSERT INTO services (name, description, provider_id, category)
        VALUES ($1, $2, $3, $4)
        RETURNING service_id, name, description, provider_id, category
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(req.provider_id)
    .bind(&req.category)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub service_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
}

pub async fn update_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(service_id): Path<Uuid>,
    Json(req): Json<UpdateServiceRequest>,
) -> Result<StatusCode, ApiError> {
    if req.service_id != service_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body service ids do not match".into(),
        ));
    }

    let existing: ServiceRow = sqlx::query_as(
        r#"
        SELECT service_id, name, description, provider_id, category
        FROM services
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    authz::ensure_admin_or_provider(&auth, existing.provider_id)?;

    sqlx::query(
        r#"
        UPDATE services
        SET name = $2,
            description = $3,
            category = $4
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.category)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_service(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(service_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existing: ServiceRow = sqlx::query_as(
        r#"
        SELECT service_id, name, description, provider_id, category
        FROM services
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("service"))?;

    authz::ensure_admin_or_provider(&auth, existing.provider_id)?;

    sqlx::query(
        r#"
        DELETE FROM services
        WHERE service_id = $1
        "#,
    )
    .bind(service_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}
