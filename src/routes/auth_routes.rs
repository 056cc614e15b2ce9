use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{hash_password, issue_token, verify_password},
    error::ApiError,
    models::{AppState, Role, UserPublicRow, UserRow},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/* ============================================================
   POST /api/auth/register
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// client or provider; admin accounts are seeded out of band.
    pub role: Role,
    pub profession: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub data: UserPublicRow,
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let e = email.trim();
    if e.is_empty() || !e.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    Ok(())
}

fn validate_password(pw: &str) -> Result<(), ApiError> {
    if pw.trim().len() < 8 {
        return Err(ApiError::validation(
            "password must be at least 8 characters",
        ));
    }
    Ok(())
}

fn validate_registration_role(role: Role) -> Result<(), ApiError> {
    if role == Role::Admin {
        return Err(ApiError::validation(
            "admin accounts cannot be self-registered",
        ));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate_name(&req.name)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    validate_registration_role(req.role)?;

    let pw_hash = hash_password(req.password.trim()).map_err(ApiError::Internal)?;

    let user: UserPublicRow = sqlx::query_as(
        r#"
        INSERT INTO users (name, email, password_hash, role, profession)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING user_id, name, email, role, profession, created_at
        "#,
    )
    .bind(req.name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(&pw_hash)
    .bind(req.role)
    .bind(req.profession.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict(
            "EMAIL_TAKEN",
            "an account with that email already exists".into(),
        ),
        _ => ApiError::db(e),
    })?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { data: user })))
}

/* ============================================================
   POST /api/auth/login
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub data: LoginResponseData,
}

#[derive(Debug, Serialize)]
pub struct LoginResponseData {
    pub token: String,
    pub user: UserPublicRow,
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user: UserRow = sqlx::query_as(
        r#"
        SELECT user_id, name, email, password_hash, role, profession, created_at
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let token = issue_token(
        &state.jwt_secret,
        user.user_id,
        &user.name,
        user.role,
        state.jwt_ttl_hours,
    )
    .map_err(|e| ApiError::Internal(format!("token error: {e}")))?;

    Ok(Json(LoginResponse {
        data: LoginResponseData {
            token,
            user: UserPublicRow {
                user_id: user.user_id,
                name: user.name,
                email: user.email,
                role: user.role,
                profession: user.profession,
                created_at: user.created_at,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("").is_err());
        assert!(validate_email("   ").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn registration_role_is_client_or_provider() {
        assert!(validate_registration_role(Role::Client).is_ok());
        assert!(validate_registration_role(Role::Provider).is_ok());
        assert!(validate_registration_role(Role::Admin).is_err());
    }
}
