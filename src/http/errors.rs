use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::auth::AuthError;
use crate::domain::order::OrderError;

// ============================================================================
// HTTP Error Boundary
// ============================================================================
//
// Every failure leaving the service goes through ApiError. Internal detail
// (store errors, token decode reasons) is logged upstream and never written
// to the response body.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Auth(AuthError::CredentialInvalid(_)) => "Invalid token".to_string(),
            ApiError::Auth(e) => e.to_string(),
            ApiError::Order(e) => match e {
                OrderError::Validation(msg) => msg.clone(),
                OrderError::Forbidden { .. } => "Access denied".to_string(),
                OrderError::NotFound(_) => "Order not found".to_string(),
                OrderError::InvalidTransition { .. } => e.to_string(),
                OrderError::Conflict { .. } => "Order was modified concurrently".to_string(),
                OrderError::RepositoryUnavailable { operation, .. } => {
                    format!("Failed to {}", operation)
                }
            },
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Internal => "Internal server error".to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Order(e) => match e {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::Forbidden { .. } => StatusCode::FORBIDDEN,
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::InvalidTransition { .. } | OrderError::Conflict { .. } => {
                    StatusCode::CONFLICT
                }
                OrderError::RepositoryUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.public_message() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::store::RepositoryError;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (AuthError::CredentialMissing.into(), StatusCode::UNAUTHORIZED),
            (AuthError::CredentialMalformed.into(), StatusCode::UNAUTHORIZED),
            (AuthError::CredentialInvalid("expired".into()).into(), StatusCode::UNAUTHORIZED),
            (OrderError::Validation("bad".into()).into(), StatusCode::BAD_REQUEST),
            (
                OrderError::Forbidden {
                    subject: "a".into(),
                    owner: "b".into(),
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (OrderError::NotFound(Uuid::new_v4()).into(), StatusCode::NOT_FOUND),
            (
                OrderError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (ApiError::BadRequest("Invalid order ID".into()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{:?}", error);
        }
    }

    #[test]
    fn test_repository_detail_is_not_exposed() {
        let error: ApiError = OrderError::RepositoryUnavailable {
            operation: "get orders",
            source: RepositoryError::Timeout {
                operation: "find_by_owner",
                timeout: Duration::from_secs(10),
            },
        }
        .into();

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "Failed to get orders");
    }

    #[test]
    fn test_token_detail_is_not_exposed() {
        let error: ApiError = AuthError::CredentialInvalid("InvalidSignature".into()).into();
        assert_eq!(error.public_message(), "Invalid token");
    }
}
