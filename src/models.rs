use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
}

/* -------------------------
   Closed enumerations
--------------------------*/

/// The three principal kinds. Stored as text in users.role and carried
/// as the `role` claim in access tokens; anything else is rejected at
/// the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Client,
    Provider,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    /// Cancelled and completed appointments accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

/// The provider's write-once answer to a booking request. Persisted as a
/// nullable boolean (`accepted_by_provider`): NULL means no response yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderResponse {
    Pending,
    Accepted,
    Rejected,
}

impl ProviderResponse {
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => ProviderResponse::Pending,
            Some(true) => ProviderResponse::Accepted,
            Some(false) => ProviderResponse::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ProviderResponse::Pending)
    }
}

/* -------------------------
   DB Row Models
--------------------------*/

/// Everything about a user except the password hash; safe to return.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserPublicRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profession: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profession: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProviderRow {
    pub provider_id: Uuid,
    pub name: String,
    pub profession: String,
    pub rating: f64,
    pub reviews: i32,
    pub location: String,
    pub price: String,
    pub image: String,
    pub description: String,
    pub services: Vec<String>,
    pub phone: String,
    pub email: String,
    pub certifications: String,
    pub coordinates: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ServiceRow {
    pub service_id: Uuid,
    pub name: String,
    pub description: String,
    pub provider_id: Uuid,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub application_id: Uuid,
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
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewRow {
    pub review_id: Uuid,
    pub appointment_id: Uuid,
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One bookable half-hour window within a provider's day calendar.
/// `available` is what the provider published; `booked` flips when an
/// accepted appointment covers the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    pub available: bool,
    pub booked: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AvailabilityRow {
    pub availability_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub slots: Json<Vec<Slot>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub provider_id: Uuid,
    pub client_id: Uuid,
    pub provider_name: String,
    pub client_name: String,
    pub provider_profession: String,
    pub date: NaiveDate,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub accepted_by_provider: Option<bool>,
    pub price: Option<f64>,
    pub service_description: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppointmentRow {
    pub fn response(&self) -> ProviderResponse {
        ProviderResponse::from_flag(self.accepted_by_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_response_tri_state() {
        assert_eq!(ProviderResponse::from_flag(None), ProviderResponse::Pending);
        assert_eq!(ProviderResponse::from_flag(Some(true)), ProviderResponse::Accepted);
        assert_eq!(ProviderResponse::from_flag(Some(false)), ProviderResponse::Rejected);
        assert!(ProviderResponse::from_flag(None).is_pending());
        assert!(!ProviderResponse::from_flag(Some(false)).is_pending());
    }

    #[test]
    fn terminal_statuses() {
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(!AppointmentStatus::Pending.is_terminal());
        assert!(!AppointmentStatus::Accepted.is_terminal());
        assert!(!AppointmentStatus::Rejected.is_terminal());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Provider).unwrap(), "\"provider\"");
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"superuser\"").is_err());
    }
}
