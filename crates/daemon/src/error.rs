// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the fleet daemon (spec.md §7), grounded in the
//! teacher's `MuxError` (`crates/mux/src/error.rs`).

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes surfaced over HTTP and logged on the observability channel.
///
/// `FatalConfigError` has no HTTP mapping — it aborts startup before the
/// transport exists (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetError {
    ValidationError,
    CapabilityError,
    TransportError,
    SceneRuntimeError,
    DeviceNotFound,
    Unauthorized,
    Internal,
}

impl FleetError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::CapabilityError => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TransportError => StatusCode::BAD_GATEWAY,
            Self::SceneRuntimeError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeviceNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::CapabilityError => "CAPABILITY_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::SceneRuntimeError => "SCENE_RUNTIME_ERROR",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn with_message(&self, message: impl Into<String>) -> FleetApiError {
        FleetApiError { kind: *self, message: message.into() }
    }
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error paired with a human-readable message, ready to become an HTTP
/// response via `IntoResponse`.
#[derive(Debug, Clone)]
pub struct FleetApiError {
    pub kind: FleetError,
    pub message: String,
}

impl fmt::Display for FleetApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FleetApiError {}

impl IntoResponse for FleetApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.kind.http_status();
        let body = ErrorResponse { error: self.kind.to_error_body(self.message) };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(FleetError::ValidationError.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(FleetError::DeviceNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(FleetError::TransportError.http_status(), StatusCode::BAD_GATEWAY);
    }
}
