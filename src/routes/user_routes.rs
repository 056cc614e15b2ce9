// src/routes/user_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    authz,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, UserPublicRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route(
            "/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub data: Vec<UserPublicRow>,
}

#[derive(Debug, Serialize)]
pub struct UserGetResponse {
    pub data: UserPublicRow,
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UsersListResponse>, ApiError> {
    authz::ensure_admin(&auth)?;

    let users: Vec<UserPublicRow> = sqlx::query_as(
        r#"
        SELECT user_id, name, email, role, profession, created_at
        FROM users
        ORDER BY created_at DESC
        LIMIT 200
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(UsersListResponse { data: users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserGetResponse>, ApiError> {
    authz::ensure_admin_or_self(&auth, user_id)?;

    let user: UserPublicRow = sqlx::query_as(
        r#"
        SELECT user_id, name, email, role, profession, created_at
        FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("user"))?;

    Ok(Json(UserGetResponse { data: user }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_id: Uuid,
    pub name: String,
    pub profession: Option<String>,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<StatusCode, ApiError> {
    if req.user_id != user_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body user ids do not match".into(),
        ));
    }
    authz::ensure_admin_or_self(&auth, user_id)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let res = sqlx::query(
        r#"
        UPDATE users
        SET name = $2,
            profession = $3
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(req.name.trim())
    .bind(req.profession.as_deref())
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("user"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authz::ensure_admin_or_self(&auth, user_id)?;

    let res = sqlx::query(
        r#"
        DELETE FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("user"));
    }

    Ok(StatusCode::NO_CONTENT)
}
