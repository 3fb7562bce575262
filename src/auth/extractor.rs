use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{ready, Ready};

use super::claims::AuthenticatedUser;
use super::errors::AuthError;
use super::verifier::TokenVerifier;
use crate::http::ApiError;

/// Authenticates the request from its `Authorization` header. Handlers that
/// take an `AuthenticatedUser` argument never run for unauthenticated calls.
impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return Ok(user.clone());
    }

    let verifier = req.app_data::<web::Data<TokenVerifier>>().ok_or_else(|| {
        tracing::error!("TokenVerifier missing from application data");
        ApiError::Internal
    })?;

    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| AuthError::CredentialMalformed)?),
        None => None,
    };

    let user = verifier.verify_header(header).map_err(|e| {
        tracing::debug!(path = %req.path(), error = %e, "Rejected credential");
        e
    })?;

    tracing::debug!(user_id = %user.user_id, email = ?user.email, "Authenticated request");

    req.extensions_mut().insert(user.clone());
    Ok(user)
}
