//! Shared constants for OTP components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8100";

/// Base URL embedded in issued verification links
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8100";

/// Default transaction confirmation service
pub const DEFAULT_CONFIRMATION_URL: &str = "http://host.docker.internal:8006";

/// Number of digits in a passcode
pub const OTP_LENGTH: usize = 6;

/// OTP record lifetime in seconds
pub const DEFAULT_OTP_TTL_SECS: u64 = 60;

/// Wrong submissions allowed per issued code
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Resends allowed per resend window
pub const DEFAULT_MAX_RESENDS: u32 = 3;

/// Resend counter window in seconds (fixed, armed on first resend)
pub const RESEND_WINDOW_SECS: u64 = 60;

/// Confirmation call timeout in seconds
pub const CONFIRMATION_TIMEOUT_SECS: u64 = 30;

/// Per-call deadline for store operations (milliseconds)
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2_000;

/// Whole-request deadline; must stay above the confirmation timeout
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 35;

/// Redis key prefixes
pub mod redis_keys {
    /// OTP record: otp:user:{user_id}:offer:{offer_id}
    pub const OTP_PREFIX: &str = "otp:user:";

    /// Resend counter: otp:resend:user:{user_id}:offer:{offer_id}
    pub const RESEND_PREFIX: &str = "otp:resend:user:";

    /// Separator between the user and offer segments
    pub const OFFER_SEGMENT: &str = ":offer:";
}

/// HTTP paths
pub mod routes {
    pub const GENERATE: &str = "/api/v1/otp/generate";
    pub const VERIFY: &str = "/api/v1/otp/verify";
    pub const RESEND: &str = "/api/v1/otp/resend";

    /// Path on the confirmation service
    pub const CONFIRM_TRANSACTION: &str = "/api/v1/transactions/confirm";
}
