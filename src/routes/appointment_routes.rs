// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::{
    authz,
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{AppState, AppointmentRow, AppointmentStatus, ProviderResponse, Role, Slot},
    scheduling::{
        apply_booking, has_conflict, parse_time_label, slot_labels_between, BookingWindow,
        ScheduleError, SLOT_MINUTES,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_appointments).post(create_appointment))
        .route(
            "/{appointment_id}",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route(
            "/{appointment_id}/provider-response",
            patch(provider_response),
        )
        .route("/{appointment_id}/cancel", patch(cancel_appointment))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub provider_name: String,
    pub client_name: String,
    pub provider_profession: String,
    pub date: NaiveDate,
    pub time: String,
    pub end_time: Option<String>,
    pub status: AppointmentStatus,
    pub accepted_by_provider: Option<bool>,
    pub price: Option<f64>,
    pub service_description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for AppointmentDto {
    fn from(r: AppointmentRow) -> Self {
        AppointmentDto {
            appointment_id: r.appointment_id,
            provider_id: r.provider_id,
            client_id: r.client_id,
            provider_name: r.provider_name,
            client_name: r.client_name,
            provider_profession: r.provider_profession,
            date: r.date,
            time: r.start_at.format("%H:%M").to_string(),
            end_time: r.end_at.map(|e| e.format("%H:%M").to_string()),
            status: r.status,
            accepted_by_provider: r.accepted_by_provider,
            price: r.price,
            service_description: r.service_description,
            location: r.location,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/* ============================================================
   Transition guards (pure)
   ============================================================ */

fn ensure_unanswered(appt: &AppointmentRow) -> Result<(), ApiError> {
    if appt.response().is_pending() {
        Ok(())
    } else {
        Err(ApiError::Conflict(
            "ALREADY_RESPONDED",
            "provider has already responded to this appointment".into(),
        ))
    }
}

fn ensure_cancellable(status: AppointmentStatus) -> Result<(), ApiError> {
    if status.is_terminal() {
        Err(ApiError::BadRequest(
            "INVALID_STATE",
            format!("appointment is already {}", status.as_str()),
        ))
    } else {
        Ok(())
    }
}

fn ensure_future_start(start_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ApiError> {
    if start_at <= now {
        Err(ApiError::validation(
            "appointment start is already in the past",
        ))
    } else {
        Ok(())
    }
}

/* ============================================================
   Shared row access
   ============================================================ */

async fn fetch_appointment(
    db: &sqlx::PgPool,
    appointment_id: Uuid,
) -> Result<Option<AppointmentRow>, ApiError> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT
          appointment_id, provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status, accepted_by_provider,
          price, service_description, location, notes,
          created_at, updated_at
        FROM appointments
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(db)
    .await
    .map_err(ApiError::db)
}

async fn lock_appointment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    appointment_id: Uuid,
) -> Result<Option<AppointmentRow>, ApiError> {
    sqlx::query_as::<_, AppointmentRow>(
        r#"
        SELECT
          appointment_id, provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status, accepted_by_provider,
          price, service_description, location, notes,
          created_at, updated_at
        FROM appointments
        WHERE appointment_id = $1
        FOR UPDATE
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)
}

/// Lock the provider row so concurrent check-then-write sequences for the
/// same provider serialize. A missing row is surfaced by Create; the
/// response path tolerates it (the appointment already references the id).
async fn lock_provider(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_id: Uuid,
) -> Result<Option<(String, String)>, ApiError> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT name, profession
        FROM providers
        WHERE provider_id = $1
        FOR UPDATE
        "#,
    )
    .bind(provider_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)
}

/// Overlap check against the provider's accepted appointments on the
/// candidate's day. Must run inside the transaction that holds the
/// provider lock.
async fn ensure_no_overlap(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_id: Uuid,
    window: &BookingWindow,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    let accepted: Vec<(DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
        r#"
        SELECT start_at, end_at
        FROM appointments
        WHERE provider_id = $1
          AND date = $2
          AND accepted_by_provider = TRUE
          AND ($3::uuid IS NULL OR appointment_id <> $3)
        "#,
    )
    .bind(provider_id)
    .bind(window.date)
    .bind(exclude)
    .fetch_all(&mut **tx)
    .await
    .map_err(ApiError::db)?;

    // An accepted row always carries an end; rows predating that rule
    // fall back to the one-slot default.
    let windows = accepted
        .into_iter()
        .map(|(s, e)| (s, e.unwrap_or(s + chrono::Duration::minutes(SLOT_MINUTES))));

    if has_conflict(window, windows) {
        tracing::warn!(%provider_id, "booking rejected: window overlaps an accepted appointment");
        return Err(ApiError::Conflict(
            "SCHEDULE_CONFLICT",
            "provider already has an accepted appointment in that window".into(),
        ));
    }
    Ok(())
}

/// Reflect an accepted (or cancelled) window in the provider's day
/// calendar. A provider without a published calendar for that day is
/// fine; the appointment itself remains the source of truth.
async fn sync_slots(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    provider_id: Uuid,
    date: NaiveDate,
    labels: &[String],
    booked: bool,
) -> Result<(), ApiError> {
    let row: Option<(Uuid, SqlJson<Vec<Slot>>)> = sqlx::query_as(
        r#"
        SELECT availability_id, slots
        FROM availability
        WHERE provider_id = $1
          AND date = $2
        FOR UPDATE
        "#,
    )
    .bind(provider_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await
    .map_err(ApiError::db)?;

    let Some((availability_id, SqlJson(mut slots))) = row else {
        return Ok(());
    };

    apply_booking(&mut slots, labels, booked);

    sqlx::query(
        r#"
        UPDATE availability
        SET slots = $1
        WHERE availability_id = $2
        "#,
    )
    .bind(SqlJson(slots))
    .bind(availability_id)
    .execute(&mut **tx)
    .await
    .map_err(ApiError::db)?;

    Ok(())
}

/* ============================================================
   POST /api/appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub provider_id: Uuid,
    /// Only honored for admin callers booking on behalf of a client.
    pub client_id: Option<Uuid>,
    pub date: String, // yyyy-mm-dd
    pub time: String, // HH:MM
    pub end_time: Option<String>,
    pub price: Option<f64>,
    pub service_description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<AppointmentDto>>), ApiError> {
    let window = BookingWindow::new(&req.date, &req.time, req.end_time.as_deref())?;

    let client_id = match auth.role {
        Role::Client => auth.user_id,
        Role::Admin => req.client_id.ok_or_else(|| {
            ApiError::validation("client_id is required when booking on behalf of a client")
        })?,
        Role::Provider => {
            return Err(ApiError::forbidden(
                "Providers cannot book appointments with themselves or others",
            ));
        }
    };

    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let (provider_name, provider_profession) = lock_provider(&mut tx, req.provider_id)
        .await?
        .ok_or_else(|| ApiError::not_found("provider"))?;

    // Display fields are snapshots: copied here, never re-synchronized.
    let client_name: String = sqlx::query_scalar(
        r#"
        SELECT name
        FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(client_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(|| ApiError::not_found("client"))?;

    ensure_no_overlap(&mut tx, req.provider_id, &window, None).await?;

    // end_at stays NULL when the client left the end open; the provider
    // fixes it at accept time.
    let end_at = req.end_time.is_some().then_some(window.end);

    let row: AppointmentRow = sqlx::query_as(
        r#"
        INSERT INTO appointments (
          provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status,
          price, service_description, location, notes,
          created_at, updated_at
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13, now(), now())
        RETURNING
          appointment_id, provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status, accepted_by_provider,
          price, service_description, location, notes,
          created_at, updated_at
        "#,
    )
    .bind(req.provider_id)
    .bind(client_id)
    .bind(&provider_name)
    .bind(&client_name)
    .bind(&provider_profession)
    .bind(window.date)
    .bind(window.start)
    .bind(end_at)
    .bind(AppointmentStatus::Pending)
    .bind(req.price)
    .bind(req.service_description)
    .bind(req.location)
    .bind(req.notes)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    tx.commit().await.map_err(ApiError::db)?;

    Ok((StatusCode::CREATED, Json(ApiOk { data: row.into() })))
}

/* ============================================================
   GET /api/appointments (role-filtered list)
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let base = r#"
        SELECT
          appointment_id, provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status, accepted_by_provider,
          price, service_description, location, notes,
          created_at, updated_at
        FROM appointments
        "#;

    let rows: Vec<AppointmentRow> = match auth.role {
        Role::Admin => {
            sqlx::query_as(&format!("{base} ORDER BY start_at ASC"))
                .fetch_all(&state.db)
                .await
        }
        Role::Client => {
            sqlx::query_as(&format!("{base} WHERE client_id = $1 ORDER BY start_at ASC"))
                .bind(auth.user_id)
                .fetch_all(&state.db)
                .await
        }
        Role::Provider => {
            sqlx::query_as(&format!("{base} WHERE provider_id = $1 ORDER BY start_at ASC"))
                .bind(auth.user_id)
                .fetch_all(&state.db)
                .await
        }
    }
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: rows.into_iter().map(Into::into).collect(),
    }))
}

/* ============================================================
   GET /api/appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let appt = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    authz::ensure_appointment_party(&auth, &appt)?;

    Ok(Json(ApiOk { data: appt.into() }))
}

/* ============================================================
   PATCH /api/appointments/{id}/provider-response
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ProviderResponseRequest {
    pub accept: bool,
    /// "HH:MM"; required when accepting.
    pub end_time: Option<String>,
}

pub async fn provider_response(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<ProviderResponseRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let appt = lock_appointment(&mut tx, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    authz::ensure_responding_provider(&auth, &appt)?;
    ensure_unanswered(&appt)?;

    let updated = if req.accept {
        let Some(end_label) = req.end_time.as_deref() else {
            return Err(ApiError::validation("end_time is required when accepting"));
        };
        let end_at = parse_time_label(appt.date, end_label)?;
        if end_at <= appt.start_at {
            return Err(ScheduleError::EmptyWindow.into());
        }
        ensure_future_start(appt.start_at, Utc::now())?;

        // Pending requests never blocked each other at creation and the
        // final window is only fixed now, so the overlap check must run
        // again before this acceptance commits.
        lock_provider(&mut tx, appt.provider_id).await?;
        let window = BookingWindow {
            date: appt.date,
            start: appt.start_at,
            end: end_at,
        };
        ensure_no_overlap(&mut tx, appt.provider_id, &window, Some(appt.appointment_id)).await?;

        let updated: AppointmentRow = sqlx::query_as(
            r#"
            UPDATE appointments
            SET accepted_by_provider = TRUE,
                status = $2,
                end_at = $3,
                updated_at = now()
            WHERE appointment_id = $1
            RETURNING
              appointment_id, provider_id, client_id,
              provider_name, client_name, provider_profession,
              date, start_at, end_at, status, accepted_by_provider,
              price, service_description, location, notes,
              created_at, updated_at
            "#,
        )
        .bind(appointment_id)
        .bind(AppointmentStatus::Accepted)
        .bind(end_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::db)?;

        sync_slots(
            &mut tx,
            appt.provider_id,
            appt.date,
            &window.slot_labels(),
            true,
        )
        .await?;

        tracing::info!(%appointment_id, provider_id = %appt.provider_id, "appointment accepted");
        updated
    } else {
        let updated: AppointmentRow = sqlx::query_as(
            r#"
            UPDATE appointments
            SET accepted_by_provider = FALSE,
                status = $2,
                updated_at = now()
            WHERE appointment_id = $1
            RETURNING
              appointment_id, provider_id, client_id,
              provider_name, client_name, provider_profession,
              date, start_at, end_at, status, accepted_by_provider,
              price, service_description, location, notes,
              created_at, updated_at
            "#,
        )
        .bind(appointment_id)
        .bind(AppointmentStatus::Rejected)
        .fetch_one(&mut *tx)
        .await
        .map_err(ApiError::db)?;

        tracing::info!(%appointment_id, provider_id = %appt.provider_id, "appointment rejected");
        updated
    };

    tx.commit().await.map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: updated.into(),
    }))
}

/* ============================================================
   PATCH /api/appointments/{id}/cancel
   ============================================================ */

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let mut tx = state.db.begin().await.map_err(ApiError::db)?;

    let appt = lock_appointment(&mut tx, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    authz::ensure_appointment_party(&auth, &appt)?;
    ensure_cancellable(appt.status)?;

    let updated: AppointmentRow = sqlx::query_as(
        r#"
        UPDATE appointments
        SET status = $2,
            updated_at = now()
        WHERE appointment_id = $1
        RETURNING
          appointment_id, provider_id, client_id,
          provider_name, client_name, provider_profession,
          date, start_at, end_at, status, accepted_by_provider,
          price, service_description, location, notes,
          created_at, updated_at
        "#,
    )
    .bind(appointment_id)
    .bind(AppointmentStatus::Cancelled)
    .fetch_one(&mut *tx)
    .await
    .map_err(ApiError::db)?;

    // Only an accepted appointment ever reserved slots; undo exactly the
    // labels the acceptance marked.
    if appt.response() == ProviderResponse::Accepted {
        if let Some(end_at) = appt.end_at {
            let labels = slot_labels_between(appt.start_at, end_at);
            sync_slots(&mut tx, appt.provider_id, appt.date, &labels, false).await?;
        }
    }

    tx.commit().await.map_err(ApiError::db)?;

    tracing::info!(%appointment_id, "appointment cancelled");

    Ok(Json(ApiOk {
        data: updated.into(),
    }))
}

/* ============================================================
   PUT /api/appointments/{id} (descriptive fields)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_id: Uuid,
    pub price: Option<f64>,
    pub service_description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateAppointmentRequest>,
) -> Result<StatusCode, ApiError> {
    if req.appointment_id != appointment_id {
        return Err(ApiError::BadRequest(
            "ID_MISMATCH",
            "path and body appointment ids do not match".into(),
        ));
    }

    let appt = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    authz::ensure_appointment_party(&auth, &appt)?;

    sqlx::query(
        r#"
        UPDATE appointments
        SET price = $2,
            service_description = $3,
            location = $4,
            notes = $5,
            updated_at = now()
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .bind(req.price)
    .bind(req.service_description)
    .bind(req.location)
    .bind(req.notes)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   DELETE /api/appointments/{id}
   ============================================================ */

pub async fn delete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let appt = fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("appointment"))?;

    authz::ensure_appointment_party(&auth, &appt)?;

    sqlx::query(
        r#"
        DELETE FROM appointments
        WHERE appointment_id = $1
        "#,
    )
    .bind(appointment_id)
    .execute(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Tests
   ============================================================ */

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(status: AppointmentStatus, response: Option<bool>) -> AppointmentRow {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();
        AppointmentRow {
            appointment_id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            provider_name: "Lucía Fernández".into(),
            client_name: "Carlos Silva".into(),
            provider_profession: "Cerrajera".into(),
            date: start.date_naive(),
            start_at: start,
            end_at: Some(start + chrono::Duration::minutes(60)),
            status,
            accepted_by_provider: response,
            price: None,
            service_description: None,
            location: Some("Colonia".into()),
            notes: None,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn response_is_write_once() {
        assert!(ensure_unanswered(&sample(AppointmentStatus::Pending, None)).is_ok());
        // Both outcomes block a second response.
        assert!(ensure_unanswered(&sample(AppointmentStatus::Accepted, Some(true))).is_err());
        assert!(ensure_unanswered(&sample(AppointmentStatus::Rejected, Some(false))).is_err());
    }

    #[test]
    fn cancel_blocked_from_terminal_states() {
        assert!(ensure_cancellable(AppointmentStatus::Pending).is_ok());
        assert!(ensure_cancellable(AppointmentStatus::Accepted).is_ok());
        assert!(ensure_cancellable(AppointmentStatus::Rejected).is_ok());
        assert!(ensure_cancellable(AppointmentStatus::Cancelled).is_err());
        assert!(ensure_cancellable(AppointmentStatus::Completed).is_err());
    }

    #[test]
    fn accept_requires_future_start() {
        let start = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();
        assert!(ensure_future_start(start, start - chrono::Duration::hours(1)).is_ok());
        assert!(ensure_future_start(start, start).is_err());
        assert!(ensure_future_start(start, start + chrono::Duration::hours(1)).is_err());
    }

    #[test]
    fn dto_projects_wall_clock_labels() {
        let dto: AppointmentDto = sample(AppointmentStatus::Pending, None).into();
        assert_eq!(dto.time, "10:00");
        assert_eq!(dto.end_time.as_deref(), Some("11:00"));

        let mut open_ended = sample(AppointmentStatus::Pending, None);
        open_ended.end_at = None;
        let dto: AppointmentDto = open_ended.into();
        assert_eq!(dto.end_time, None);
    }
}
