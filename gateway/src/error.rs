//! API error taxonomy and HTTP mapping
//!
//! Every user-visible failure carries the UETR (when known) and the
//! transaction reference for forensic lookup. Internal faults surface as a
//! generic 500 with a correlation id; the detail stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

/// Gateway API error
#[derive(Debug)]
pub struct ApiError {
    /// Error class driving the status code
    pub kind: ApiErrorKind,

    /// Human-readable message (sanitized for Internal)
    pub message: String,

    /// UETR, when the failing request carried one
    pub uetr: Option<String>,

    /// Transaction reference, when known
    pub transaction_reference: Option<String>,
}

/// Error classes of the public surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Malformed inputs; 400
    Validation,
    /// No matching configuration, UETR, payment, or repair; 404
    NotFound,
    /// Idempotency or concurrent-mutation collision; 409
    Conflict,
    /// Tenant not allowed to use the resource; 403
    Forbidden,
    /// Business rejection routed to repair; 422
    Business,
    /// Downstream unavailable after retries; 503
    DownstreamUnavailable,
    /// Bug or invariant violation; 500 with correlation id only
    Internal,
}

impl ApiError {
    /// Build an error with no payment context
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            uetr: None,
            transaction_reference: None,
        }
    }

    /// Attach payment context for forensic lookup
    pub fn with_context(
        mut self,
        uetr: Option<String>,
        transaction_reference: Option<String>,
    ) -> Self {
        self.uetr = uetr;
        self.transaction_reference = transaction_reference;
        self
    }

    /// 400 validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, message)
    }

    /// 404 not found
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    /// 500 internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.kind {
            ApiErrorKind::Validation => StatusCode::BAD_REQUEST,
            ApiErrorKind::NotFound => StatusCode::NOT_FOUND,
            ApiErrorKind::Conflict => StatusCode::CONFLICT,
            ApiErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorKind::Business => StatusCode::UNPROCESSABLE_ENTITY,
            ApiErrorKind::DownstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let correlation_id = Uuid::new_v4();
        let message = if self.kind == ApiErrorKind::Internal {
            tracing::error!(
                "Internal error [{}] (uetr {:?}, ref {:?}): {}",
                correlation_id,
                self.uetr,
                self.transaction_reference,
                self.message
            );
            "internal error".to_string()
        } else {
            self.message
        };

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "uetr": self.uetr,
                "transactionReference": self.transaction_reference,
                "correlationId": correlation_id,
                "timestamp": chrono::Utc::now(),
            })),
        )
            .into_response()
    }
}

impl From<orchestration::Error> for ApiError {
    fn from(error: orchestration::Error) -> Self {
        use orchestration::Error as E;
        match &error {
            E::Conflict {
                transaction_reference,
                ..
            } => Self::new(ApiErrorKind::Conflict, error.to_string())
                .with_context(None, Some(transaction_reference.clone())),
            E::UnknownPayment(reference) => Self::new(ApiErrorKind::NotFound, error.to_string())
                .with_context(None, Some(reference.clone())),
            E::UnexpectedCallback {
                transaction_reference,
                ..
            } => Self::new(ApiErrorKind::Conflict, error.to_string())
                .with_context(None, Some(transaction_reference.clone())),
            E::Validation(_) => Self::new(ApiErrorKind::Validation, error.to_string()),
            E::Routing(inner) => Self::from_routing(inner),
            E::Fraud(_) | E::Repair(_) | E::Internal(_) => {
                Self::new(ApiErrorKind::Internal, error.to_string())
            }
        }
    }
}

impl ApiError {
    fn from_routing(error: &routing::Error) -> Self {
        use routing::Error as E;
        match error {
            E::NoClearingSystemFound { .. } | E::NoRouteFound { .. } => {
                Self::new(ApiErrorKind::NotFound, error.to_string())
            }
            E::ClearingSystemInactive(_) | E::UnsupportedByClearingSystem { .. } => {
                Self::new(ApiErrorKind::Validation, error.to_string())
            }
            E::TenantNotAuthorizedForClearingSystem { .. } => {
                Self::new(ApiErrorKind::Forbidden, error.to_string())
            }
            E::BankLookup(_) => Self::new(ApiErrorKind::DownstreamUnavailable, error.to_string()),
        }
    }
}

impl From<routing::Error> for ApiError {
    fn from(error: routing::Error) -> Self {
        Self::from_routing(&error)
    }
}

impl From<repair::Error> for ApiError {
    fn from(error: repair::Error) -> Self {
        use repair::Error as E;
        match &error {
            E::UnknownRepair(_) => Self::new(ApiErrorKind::NotFound, error.to_string()),
            E::ConflictingRepair { .. } | E::TerminalState { .. } | E::InvalidTransition { .. } => {
                Self::new(ApiErrorKind::Conflict, error.to_string())
            }
            E::Adapter(inner) => match inner.kind() {
                banking::ErrorKind::Business => {
                    Self::new(ApiErrorKind::Business, error.to_string())
                }
                banking::ErrorKind::Transient => {
                    Self::new(ApiErrorKind::DownstreamUnavailable, error.to_string())
                }
                _ => Self::new(ApiErrorKind::Internal, error.to_string()),
            },
        }
    }
}

impl From<uetr::Error> for ApiError {
    fn from(error: uetr::Error) -> Self {
        match &error {
            uetr::Error::UnknownUetr(value) => Self::new(ApiErrorKind::NotFound, error.to_string())
                .with_context(Some(value.clone()), None),
            _ => Self::new(ApiErrorKind::Validation, error.to_string()),
        }
    }
}
