// src/authz.rs
//
// Capability checks shared by every endpoint that touches an appointment
// or another owned resource. Handlers never compare role strings directly.

use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{AppointmentRow, Role};

pub fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only admin can perform this action"))
    }
}

pub fn ensure_admin_or_self(auth: &AuthContext, user_id: Uuid) -> Result<(), ApiError> {
    if auth.role == Role::Admin || auth.user_id == user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden("You can only manage your own account"))
    }
}

pub fn ensure_admin_or_provider(auth: &AuthContext, provider_id: Uuid) -> Result<(), ApiError> {
    if auth.role == Role::Admin || (auth.role == Role::Provider && auth.user_id == provider_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only admin or the owning provider can manage this calendar",
        ))
    }
}

/// Admin always; client when they booked it; provider when it is booked
/// with them. Everything else is denied.
pub fn ensure_appointment_party(auth: &AuthContext, appt: &AppointmentRow) -> Result<(), ApiError> {
    let allowed = match auth.role {
        Role::Admin => true,
        Role::Client => appt.client_id == auth.user_id,
        Role::Provider => appt.provider_id == auth.user_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "You are not a party to this appointment",
        ))
    }
}

/// The response transition is reserved for the provider the appointment
/// was booked with; not even admin may answer on their behalf.
pub fn ensure_responding_provider(
    auth: &AuthContext,
    appt: &AppointmentRow,
) -> Result<(), ApiError> {
    if auth.role == Role::Provider && appt.provider_id == auth.user_id {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Only the booked provider can respond to this appointment",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn ctx(role: Role, user_id: Uuid) -> AuthContext {
        AuthContext {
            user_id,
            name: "test".into(),
            role,
        }
    }

    fn appointment(provider_id: Uuid, client_id: Uuid) -> AppointmentRow {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();
        AppointmentRow {
            appointment_id: Uuid::new_v4(),
            provider_id,
            client_id,
            provider_name: "Juan Pérez".into(),
            client_name: "Pedro Gómez".into(),
            provider_profession: "Plomero".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            start_at: now,
            end_at: None,
            status: AppointmentStatus::Pending,
            accepted_by_provider: None,
            price: None,
            service_description: None,
            location: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn admin_is_always_a_party() {
        let appt = appointment(Uuid::new_v4(), Uuid::new_v4());
        let admin = ctx(Role::Admin, Uuid::new_v4());
        assert!(ensure_appointment_party(&admin, &appt).is_ok());
    }

    #[test]
    fn owners_are_parties_strangers_are_not() {
        let provider = Uuid::new_v4();
        let client = Uuid::new_v4();
        let appt = appointment(provider, client);

        assert!(ensure_appointment_party(&ctx(Role::Client, client), &appt).is_ok());
        assert!(ensure_appointment_party(&ctx(Role::Provider, provider), &appt).is_ok());

        assert!(ensure_appointment_party(&ctx(Role::Client, Uuid::new_v4()), &appt).is_err());
        assert!(ensure_appointment_party(&ctx(Role::Provider, Uuid::new_v4()), &appt).is_err());
        // A client id matching the provider side grants nothing.
        assert!(ensure_appointment_party(&ctx(Role::Client, provider), &appt).is_err());
    }

    #[test]
    fn respond_is_provider_owner_only() {
        let provider = Uuid::new_v4();
        let client = Uuid::new_v4();
        let appt = appointment(provider, client);

        assert!(ensure_responding_provider(&ctx(Role::Provider, provider), &appt).is_ok());
        assert!(ensure_responding_provider(&ctx(Role::Provider, Uuid::new_v4()), &appt).is_err());
        assert!(ensure_responding_provider(&ctx(Role::Admin, provider), &appt).is_err());
        assert!(ensure_responding_provider(&ctx(Role::Client, client), &appt).is_err());
    }

    #[test]
    fn admin_or_self() {
        let me = Uuid::new_v4();
        assert!(ensure_admin_or_self(&ctx(Role::Client, me), me).is_ok());
        assert!(ensure_admin_or_self(&ctx(Role::Admin, Uuid::new_v4()), me).is_ok());
        assert!(ensure_admin_or_self(&ctx(Role::Client, Uuid::new_v4()), me).is_err());
    }
}
