// src/routes/availability_routes.rs
//
// A provider publishes one calendar row per day; the slots inside it are
// flipped by the appointment accept/cancel transitions, never deleted
// from here as part of the booking workflow.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::{
    authz,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AvailabilityRow, Slot},
    scheduling::{parse_date, parse_time_label},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_availability).post(create_availability))
        .route(
            "/{availability_id}",
            get(get_availability)
                .put(update_availability)
                .delete(delete_availability),
        )
        .route("/provider/{provider_id}", get(get_by_provider))
        .route(
            "/provider/{provider_id}/available-slots",
            get(get_available_slots),
        )
}

fn validate_slots(date: NaiveDate, slots: &[Slot]) -> Result<(), ApiError> {
    for slot in slots {
        parse_time_label(date, &slot.time)
            .map_err(|_| ApiError::validation(format!("slot time must be HH:MM, got {:?}", slot.time)))?;
    }
    Ok(())
}

pub async fn list_availability(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<AvailabilityRow>>, ApiError> {
    authz::ensure_admin(&auth)?;

    let rows: Vec<AvailabilityRow> = sqlx::query_as(
        r#"
        SELECT availability_id, provider_id, date, slots
        FROM availability
        ORDER BY date ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(rows))
}

pub async fn get_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(availability_id): Path<Uuid>,
) -> Result<Json<AvailabilityRow>, ApiError> {
    let row: AvailabilityRow = sqlx::query_as(
        r#"
        SELECT availability_id, provider_id, date, slots
        FROM availability
        WHERE availability_id = $1
        "#,
    )
    .bind(availability_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("availability"))?;

    authz::ensure_admin_or_provider(&auth, row.provider_id)?;

    Ok(Json(row))
}

// Public: the booking UI needs a provider's calendar before login.
pub async fn get_by_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Vec<AvailabilityRow>>, ApiError> {
    let rows: Vec<AvailabilityRow> = sqlx::query_as(
        r#"
        SELECT availability_id, provider_id, date, slots
        FROM availability
        WHERE provider_id = $1
        ORDER BY date ASC
        "#,
    )
    .bind(provider_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    if rows.is_empty() {
        return Err(ApiError::not_found("availability"));
    }

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: String, // yyyy-mm-dd
}

#[derive(Debug, Serialize)]
pub struct AvailableSlotsResponse {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub available_slots: Vec<String>,
}

pub async fn get_available_slots(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Query(q): Query<AvailableSlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, ApiError> {
    let date = parse_date(&q.date)?;

    let row: Option<AvailabilityRow> = sqlx::query_as(
        r#"
        SELECT availability_id, provider_id, date, slots
        FROM availability
        WHERE provider_id = $1
          AND date = $2
        "#,
    )
    .bind(provider_id)
    .bind(date)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some(row) = row else {
        return Err(ApiError::not_found("availability for that day"));
    };

    let available_slots = row
        .slots
        .0
        .iter()
        .filter(|s| !s.booked)
        .map(|s| s.time.clone())
        .collect();

    Ok(Json(AvailableSlotsResponse {
        provider_id,
        date,
        available_slots,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub provider_id: Uuid,
    pub date: String, // yyyy-mm-dd
    pub slots: Vec<Slot>,
}

pub async fn create_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<AvailabilityRow>), ApiError> {
    authz::ensure_admin_or_provider(&auth, req.provider_id)?;

    let date = parse_date(&req.date)?;
    validate_slots(date, &req.slots)?;

    let row: AvailabilityRow = sqlx::query_as(
        r#"
        INSERT INTO availability (provider_id, date, slots)
        VALUES ($1, $2, $3)
        RETURNING availability_id, provider_id, date, slots
        "#,
    )
    .bind(req.provider_id)
    .bind(date)
    .bind(SqlJson(req.slots))
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::Conflict(
            "CALENDAR_EXISTS",
            "a calendar already exists for that provider and day".into(),
        ),
        _ => ApiError::db(e),
    })?;

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability_id: Uuid,
    pub date: String, // yyyy-mm-dd
    pub slots: Vec<Slot>,
}

pub async fn update_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(availability_id): Path<Uuid>,
    Json(req): Json<UpdateAvailabilityRequest>,
) -> Result<StatusCode, ApiError> {
    if req.availability_id != availability_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body availability ids do not match".into(),
        ));
    }

    let existing: AvailabilityRow = sqlx::query_as(
        r#"
        SELECT availability_id, provider_id, date, slots
        FROM availability
        WHERE availability_id = $1
        "#,
    )
    .bind(availability_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("availability"))?;

    authz::ensure_admin_or_provider(&auth, existing.provider_id)?;

    let date = parse_date(&req.date)?;
    validate_slots(date, &req.slots)?;

    sqlx::query(
        r#"
        UPDATE availability
        SET date = $2,
            slots = $3
        WHERE availability_id = $1
        "#,
    )
    .bind(availability_id)
    .bind(date)
    .bind(SqlJson(req.slots))
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(availability_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authz::ensure_admin(&auth)?;

    let res = sqlx::query(
        r#"
        DELETE FROM availability
        WHERE availability_id = $1
        "#,
    )
    .bind(availability_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("availability"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(time: &str) -> Slot {
        Slot {
            time: time.into(),
            available: true,
            booked: false,
        }
    }

    #[test]
    fn slot_labels_must_parse() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(validate_slots(date, &[slot("09:00"), slot("09:30")]).is_ok());
        assert!(validate_slots(date, &[slot("morning")]).is_err());
        assert!(validate_slots(date, &[]).is_ok());
    }
}
