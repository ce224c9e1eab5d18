use poem::{error::ResponseError, http::StatusCode, Body, Response};
use quest_engine::{store::StoreError, Error, ErrorKind};
use serde::Serialize;

/// Error returned by the HTTP interface.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Engine error.
    #[error(transparent)]
    Engine(#[from] Error),
    /// Missing or wrong admin token.
    #[error("unauthorized")]
    Unauthorized,
    /// Admin endpoints are disabled.
    #[error("admin endpoints are disabled")]
    AdminDisabled,
    /// A record conflicts with an existing one.
    #[error("conflict: {0}")]
    Conflict(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) | StoreError::AlreadySet(_) => Self::Conflict(err),
            err => Self::Engine(err.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

fn code(err: &Error) -> &'static str {
    match err {
        Error::InvalidAddress => "invalid_address",
        Error::InvalidCode(_) => "invalid_code",
        Error::InvalidFormat(_) => "invalid_format",
        Error::InvalidArgument(_) => "invalid_argument",
        Error::UserNotFound => "user_not_found",
        Error::WalletNotFound => "wallet_not_found",
        Error::Banned => "banned",
        Error::NotEligible { .. } => "not_eligible",
        Error::AlreadyClaimed => "already_claimed",
        Error::ClaimNotFound => "claim_not_found",
        Error::ClaimFinalized(_) => "claim_finalized",
        Error::AlreadyReferred => "already_referred",
        Error::SelfReferral => "self_referral",
        Error::MutualReferral => "mutual_referral",
        Error::AlreadyHasCode => "already_has_code",
        Error::CodeTaken => "code_taken",
        Error::RateLimited { .. } => "rate_limited",
        Error::Unavailable => "unavailable",
        err => match err.kind() {
            ErrorKind::Collaborator => "upstream",
            _ => "internal",
        },
    }
}

impl ApiError {
    fn body(&self) -> ErrorBody<'static> {
        match self {
            Self::Engine(err) => ErrorBody {
                error: code(err),
                message: if err.is_user_facing() {
                    err.to_string()
                } else {
                    match err.kind() {
                        ErrorKind::Collaborator => "upstream service unavailable".to_string(),
                        _ => "internal error".to_string(),
                    }
                },
                retry_after: match err {
                    Error::RateLimited { retry_after } => Some(*retry_after),
                    _ => None,
                },
            },
            Self::Unauthorized => ErrorBody {
                error: "unauthorized",
                message: self.to_string(),
                retry_after: None,
            },
            Self::AdminDisabled => ErrorBody {
                error: "admin_disabled",
                message: self.to_string(),
                retry_after: None,
            },
            Self::Conflict(_) => ErrorBody {
                error: "conflict",
                message: self.to_string(),
                retry_after: None,
            },
        }
    }
}

impl ResponseError for ApiError {
    fn status(&self) -> StatusCode {
        let err = match self {
            Self::Engine(err) => err,
            Self::Unauthorized => return StatusCode::UNAUTHORIZED,
            Self::AdminDisabled => return StatusCode::FORBIDDEN,
            Self::Conflict(_) => return StatusCode::CONFLICT,
        };
        match err {
            Error::UserNotFound | Error::WalletNotFound | Error::ClaimNotFound => {
                StatusCode::NOT_FOUND
            }
            Error::Banned => StatusCode::FORBIDDEN,
            Error::NotEligible { .. } | Error::SelfReferral | Error::MutualReferral => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            err => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Precondition => StatusCode::CONFLICT,
                ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::Collaborator => StatusCode::BAD_GATEWAY,
                ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn as_response(&self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(err = %self, %status, "request failed");
        }
        let body = self.body();
        let mut response = Response::builder()
            .status(status)
            .content_type("application/json");
        if let Some(retry_after) = body.retry_after {
            response = response.header("Retry-After", retry_after.to_string());
        }
        let body = serde_json::to_vec(&body).unwrap_or_default();
        response.body(Body::from(body))
    }
}
