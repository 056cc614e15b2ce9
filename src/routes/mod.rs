use crate::models::AppState;
use axum::Router;

pub mod application_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod availability_routes;
pub mod provider_routes;
pub mod review_routes;
pub mod service_routes;
pub mod user_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes::router())
        .nest("/api/users", user_routes::router())
        .nest("/api/providers", provider_routes::router())
        .nest("/api/services", service_routes::router())
        .nest("/api/appointments", appointment_routes::router())
        .nest("/api/availability", availability_routes::router())
        .nest("/api/applications", application_routes::router())
        .nest("/api/reviews", review_routes::router())
        .with_state(state)
}
