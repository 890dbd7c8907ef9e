//! Response status mapping.
//!
//! # Design Decisions
//! - Errors are JSON `{ "success": false, "error": "..." }`
//! - Missing versions are 404, bad rule input is 400, everything else is 500
//! - Proxied reads report a failing upstream as 502
//! - Apply outcomes choose their status from the terminal stage

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::ControlError;
use crate::orchestrator::{ApplyOutcome, ApplyStage};

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// For handlers that proxy a stack service: its failures are 502.
    pub fn upstream(error: ControlError) -> Self {
        if !error.is_external() {
            return error.into();
        }
        tracing::warn!(error = %error, "Upstream call failed");
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: error.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ControlError> for ApiError {
    fn from(error: ControlError) -> Self {
        let status = match &error {
            ControlError::InvalidRuleInput(_) => StatusCode::BAD_REQUEST,
            ControlError::NoSuccessfulVersion | ControlError::UnknownVersion(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %error, "Request failed");
        }
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

/// HTTP status for an apply outcome.
pub fn apply_status(outcome: &ApplyOutcome) -> StatusCode {
    match outcome.stage {
        ApplyStage::Committed => StatusCode::OK,
        ApplyStage::Rejected => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
