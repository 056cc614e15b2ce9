// src/routes/provider_routes.rs

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
    models::{AppState, ProviderRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_providers).post(create_provider))
        .route(
            "/{provider_id}",
            get(get_provider).put(update_provider).delete(delete_provider),
        )
}

// The public directory the marketplace frontend browses; no auth.
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderRow>>, ApiError> {
    let rows: Vec<ProviderRow> = sqlx::query_as(
        r#"
        SELECT
          provider_id, name, profession, rating, reviews, location, price,
          image, description, services, phone, email, certifications,
          coordinates, created_at
        FROM providers
        ORDER BY name ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<ProviderRow>, ApiError> {
    let row: ProviderRow = sqlx::query_as(
        r#"
        SELECT
          provider_id, name, profession, rating, reviews, location, price,
          image, description, services, phone, email, certifications,
          coordinates, created_at
        FROM providers
        WHERE provider_id = $1
        "#,
    )
    .bind(provider_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("provider"))?;

    Ok(Json(row))
}

/// Provider profiles are keyed by the provider account's user id so that
/// the JWT subject and appointments.provider_id line up directly.
#[derive(Debug, Deserialize)]
pub struct ProviderRequest {
    pub provider_id: Uuid,
    pub name: String,
    pub profession: String,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub location: String,
    pub price: String,
    pub image: String,
    pub description: String,
    pub services: Vec<String>,
    pub phone: String,
    pub email: String,
    pub certifications: String,
    pub coordinates: String,
}

pub async fn create_provider(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ProviderRequest>,
) -> Result<(StatusCode, Json<ProviderRow>), ApiError> {
    authz::ensure_admin(&auth)?;

    if req.name.trim().is_empty() || req.profession.trim().is_empty() {
        return Err(ApiError::validation("name and profession are required"));
    }

    let row: ProviderRow = sqlx::query_as(
        r#"
        INSERT INTO providers (
          provider_id, name, profession, rating, reviews, location, price,
          image, description, services, phone, email, certifications, coordinates
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        RETURNING
          provider_id, name, profession, rating, reviews, location, price,
          image, description, services, phone, email, certifications,
          coordinates, created_at
        "#,
    )
    .bind(req.provider_id)
    .bind(req.name.trim())
    .bind(req.profession.trim())
    .bind(req.rating.unwrap_or(0.0))
    .bind(req.reviews.unwrap_or(0))
    .bind(&req.location)
    .bind(&req.price)
    .bind(&req.image)
    .bind(&req.description)
    .bind(&req.services)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.certifications)
    .bind(&req.coordinates)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict(
            "PROVIDER_EXISTS",
            "a provider profile already exists for that id".into(),
        ),
        _ => ApiError::db(e),
    })?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(provider_id): Path<Uuid>,
    Json(req): Json<ProviderRequest>,
) -> Result<StatusCode, ApiError> {
    if req.provider_id != provider_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body provider ids do not match".into(),
        ));
    }
    authz::ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE providers
        SET name = $2,
            profession = $3,
            rating = COALESCE($4, rating),
            reviews = COALESCE($5, reviews),
            location = $6,
            price = $7,
            image = $8,
            description = $9,
            services = $10,
            phone = $11,
            email = $12,
            certifications = $13,
            coordinates = $14
        WHERE provider_id = $1
        "#,
    )
    .bind(provider_id)
    .bind(req.name.trim())
    .bind(req.profession.trim())
    .bind(req.rating)
    .bind(req.reviews)
    .bind(&req.location)
    .bind(&req.price)
    .bind(&req.image)
    .bind(&req.description)
    .bind(&req.services)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.certifications)
    .bind(&req.coordinates)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("provider"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_provider(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(provider_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authz::ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM providers
        WHERE provider_id = $1
        "#,
    )
    .bind(provider_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("provider"));
    }

    Ok(StatusCode::NO_CONTENT)
}
