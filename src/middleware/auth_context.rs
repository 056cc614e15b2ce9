use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::models::{AppState, Role};

/// The authenticated principal, rebuilt from the JWT on every request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::invalid_token())?;

            // Signature + expiry + role claim are all checked here; an
            // unknown role string never reaches a handler.
            let claims = decode_token(&state.jwt_secret, authz.token())
                .map_err(|_| ApiError::invalid_token())?;

            Ok(AuthContext {
                user_id: claims.sub,
                name: claims.name,
                role: claims.role,
            })
        }
    }
}
