//! Typed outcomes of OTP operations.
//!
//! Each lifecycle operation returns a subset of these variants. The HTTP
//! layer maps them to status codes through [`OtpError::status_code`], so no
//! caller ever needs to inspect an error message.

use thiserror::Error;

/// Failure outcomes of generate, verify and resend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// Malformed request input (bad UUID, empty offer, non 6-digit code)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Submitted code does not match; caller may retry
    #[error("Invalid OTP code")]
    InvalidCode,

    /// No live code for the pair (never issued, expired or consumed)
    #[error("OTP not found or expired")]
    NotFoundOrExpired,

    /// Code burned after too many wrong submissions; resend is still possible
    #[error(
        "Maximum attempts exceeded: the OTP code was entered incorrectly {max_retries} times, request a new code using resend"
    )]
    MaxAttemptsExceeded { max_retries: u32 },

    /// Attempts and resends both exhausted for the pair
    #[error(
        "Verification failed: maximum number of attempts and resends exceeded, offer purchase is no longer available"
    )]
    PermanentlyLocked,

    /// Resend budget for the current window is used up
    #[error("Maximum resend limit exceeded: {max_resends}")]
    ResendLimitExceeded { max_resends: u32 },

    /// Downstream confirmation failed; the code is still valid
    #[error("Transaction confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// Store or entropy failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OtpError {
    /// Returns the HTTP status code for this outcome
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::InvalidCode => 400,
            Self::NotFoundOrExpired => 404,
            Self::MaxAttemptsExceeded { .. } => 429,
            Self::PermanentlyLocked => 403,
            Self::ResendLimitExceeded { .. } => 429,
            Self::ConfirmationFailed(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Short machine-friendly label used as the `error` field of responses
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "Invalid request",
            Self::InvalidCode => "Invalid OTP code",
            Self::NotFoundOrExpired => "OTP not found or expired",
            Self::MaxAttemptsExceeded { .. } => "Too many attempts",
            Self::PermanentlyLocked => "Verification permanently failed",
            Self::ResendLimitExceeded { .. } => "Too many resend attempts",
            Self::ConfirmationFailed(_) => "Transaction confirmation failed",
            Self::Internal(_) => "Internal error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(OtpError::InvalidCode.status_code(), 400);
        assert_eq!(OtpError::NotFoundOrExpired.status_code(), 404);
        assert_eq!(OtpError::MaxAttemptsExceeded { max_retries: 5 }.status_code(), 429);
        assert_eq!(OtpError::PermanentlyLocked.status_code(), 403);
        assert_eq!(OtpError::ResendLimitExceeded { max_resends: 3 }.status_code(), 429);
        assert_eq!(OtpError::ConfirmationFailed("down".into()).status_code(), 503);
        assert_eq!(OtpError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_messages_carry_limits() {
        let err = OtpError::MaxAttemptsExceeded { max_retries: 3 };
        assert!(err.to_string().contains("3 times"));

        let err = OtpError::ResendLimitExceeded { max_resends: 2 };
        assert!(err.to_string().ends_with(": 2"));
    }
}
