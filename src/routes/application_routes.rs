// src/routes/application_routes.rs
//
// Provider onboarding forms. Submission is public; everything else is
// reserved for admin review.

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
    models::{AppState, ApplicationRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications).post(create_application))
        .route(
            "/{application_id}",
            get(get_application)
                .put(update_application)
                .delete(delete_application),
        )
}

pub async fn list_applications(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<ApplicationRow>>, ApiError> {
    authz::ensure_admin(&auth)?;

    let rows: Vec<ApplicationRow> = sqlx::query_as(
        r#"
        SELECT
          application_id, name, email, phone, profession, other_profession,
          city, other_city, experience, about, has_certifications, has_tools,
          accept_terms, status, created_at
        FROM applications
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_application(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(application_id): Path<Uuid>,
) -> Result<Json<ApplicationRow>, ApiError> {
    authz::ensure_admin(&auth)?;

    let row: ApplicationRow = sqlx::query_as(
        r#"
        SELECT
          application_id, name, email, phone, profession, other_profession,
          city, other_city, experience, about, has_certifications, has_tools,
          accept_terms, status, created_at
        FROM applications
        WHERE application_id = $1
        "#,
    )
    .bind(application_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("application"))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub profession: String,
    pub other_profession: Option<String>,
    pub city: String,
    pub other_city: Option<String>,
    pub experience: String,
    pub about: String,
    pub has_certifications: bool,
    pub has_tools: bool,
    pub accept_terms: bool,
}

pub async fn create_application(
    State(state): State<AppState>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationRow>), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::validation("name and email are required"));
    }
    if !req.accept_terms {
        return Err(ApiError::validation("terms must be accepted to apply"));
    }

    let row: ApplicationRow = sqlx::query_as(
        r#"
        INSERT INTO applications (
          name, email, phone, profession, other_profession, city, other_city,
          experience, about, has_certifications, has_tools, accept_terms, status
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,'pending')
        RETURNING
          application_id, name, email, phone, profession, other_profession,
          city, other_city, experience, about, has_certifications, has_tools,
          accept_terms, status, created_at
        "#,
    )
    .bind(req.name.trim())
    .bind(req.email.trim())
    .bind(&req.phone)
    .bind(&req.profession)
    .bind(req.other_profession.as_deref())
    .bind(&req.city)
    .bind(req.other_city.as_deref())
    .bind(&req.experience)
    .bind(&req.about)
    .bind(req.has_certifications)
    .bind(req.has_tools)
    .bind(req.accept_terms)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub application_id: Uuid,
    pub status: String,
}

pub async fn update_application(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(application_id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> Result<StatusCode, ApiError> {
    if req.application_id != application_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body application ids do not match".into(),
        ));
    }
    authz::ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        UPDATE applications
        SET status = $2
        WHERE application_id = $1
        "#,
    )
    .bind(application_id)
    .bind(req.status.trim())
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("application"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_application(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(application_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authz::ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM applications
        WHERE application_id = $1
        "#,
    )
    .bind(application_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("application"));
    }

    Ok(StatusCode::NO_CONTENT)
}
