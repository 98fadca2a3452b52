use crate::api::AppState;
use crate::domain::auth::{Caller, Claims};
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Authenticated caller, extracted from the bearer token the platform
/// identity service issued.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub caller: Caller,
    pub display_name: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

        let claims = Claims::decode(token, &state.config.auth.jwt_secret)?;

        let display_name = claims.name.unwrap_or_else(|| short_name(claims.sub));

        Ok(Self { caller: Caller { user_id: claims.sub, role: claims.role }, display_name })
    }
}

fn short_name(user_id: Uuid) -> String {
    let id = user_id.to_string();
    format!("user-{}", &id[..8])
}

/// Propagates an incoming `x-request-id` or generates a fresh UUID.
#[derive(Clone, Copy, Debug)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(incoming) = request.headers().get("x-request-id") {
            return Some(RequestId::new(incoming.clone()));
        }

        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
