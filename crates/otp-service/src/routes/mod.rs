//! HTTP route handlers for the OTP service.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use otp_common::OtpError;
use otp_common::constants::routes;
use serde::Serialize;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod health;
mod otp;

/// Create the main application router
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // OTP lifecycle
        .route(routes::GENERATE, post(otp::generate))
        .route(routes::VERIFY, post(otp::verify).get(otp::verify_link))
        .route(routes::RESEND, post(otp::resend).get(otp::resend_link))

        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}

/// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: &'static str,
    code: u16,
    message: String,
}

/// Transport wrapper turning an [`OtpError`] into an HTTP response
#[derive(Debug)]
pub struct ApiError(pub OtpError);

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Details of infrastructure and downstream failures stay in the logs
        let message = match &self.0 {
            OtpError::InvalidCode => "The provided OTP code is incorrect".to_string(),
            OtpError::NotFoundOrExpired => "The OTP code has expired or does not exist".to_string(),
            OtpError::ConfirmationFailed(_) => {
                "Unable to confirm transaction. Please try again later.".to_string()
            }
            OtpError::Internal(_) => "Internal error. Please try again later.".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: self.0.label(),
            code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
