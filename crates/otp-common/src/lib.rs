//! # OTP Common
//!
//! Shared types and utilities used by the OTP service and its callers.
//!
//! ## Modules
//! - `types` - Core data structures (PairKey, OtpRecord, OtpCode)
//! - `error` - Typed operation outcomes
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::OtpError;
pub use types::*;
