// src/routes/review_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, ReviewRow, Role},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route("/{review_id}", get(get_review).delete(delete_review))
}

fn validate_rating(rating: i32) -> Result<(), ApiError> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListReviewsQuery {
    pub provider_id: Option<Uuid>,
}

// Ratings feed the public provider directory; no auth on reads.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(q): Query<ListReviewsQuery>,
) -> Result<Json<Vec<ReviewRow>>, ApiError> {
    let rows: Vec<ReviewRow> = sqlx::query_as(
        r#"
        SELECT review_id, appointment_id, provider_id, client_id, rating, comment, created_at
        FROM reviews
        WHERE ($1::uuid IS NULL OR provider_id = $1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(q.provider_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
) -> Result<Json<ReviewRow>, ApiError> {
    let row: ReviewRow = sqlx::query_as(
        r#"
        SELECT review_id, appointment_id, provider_id, client_id, rating, comment, created_at
        FROM reviews
        WHERE review_id = $1
        "#,
    )
    .bind(review_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("review"))?;

    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub appointment_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewRow>), ApiError> {
    if auth.role != Role::Client {
        return Err(ApiError::forbidden("Only clients can leave reviews"));
    }
    validate_rating(req.rating)?;

    // A review hangs off a finished booking; the provider id is taken
    // from the appointment, not the request.
    let appointment: Option<(Uuid, Uuid)> = sqlx::query_as(
        r#"
        SELECT provider_id, client_id
        FROM appointments
        WHERE appointment_id = $1
        "#,
    )
    .bind(req.appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some((provider_id, client_id)) = appointment else {
        return Err(ApiError::not_found("appointment"));
    };
    if client_id != auth.user_id {
        return Err(ApiError::forbidden(
            "You can only review your own appointments",
        ));
    }

    let row: ReviewRow = sqlx::query_as(
        r#"
        INSERT INTO reviews (appointment_id, provider_id, client_id, rating, comment)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING review_id, appointment_id, provider_id, client_id, rating, comment, created_at
        "#,
    )
    .bind(req.appointment_id)
    .bind(provider_id)
    .bind(auth.user_id)
    .bind(req.rating)
    .bind(req.comment.as_deref())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(review_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let row: ReviewRow = sqlx::query_as(
        r#"
        SELECT review_id, appointment_id, provider_id, client_id, rating, comment, created_at
        FROM reviews
        WHERE review_id = $1
        "#,
    )
    .bind(review_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("review"))?;

    if auth.role != Role::Admin && row.client_id != auth.user_id {
        return Err(ApiError::forbidden("You can only delete your own reviews"));
    }

    sqlx::query(
        r#"
        DELETE FROM reviews
        WHERE review_id = $1
        "#,
    )
    .bind(review_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(3).is_ok());
        assert!(validate_rating(5).is_ok());

        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-2).is_err());
    }
}
