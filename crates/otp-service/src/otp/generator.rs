//! Passcode generation.

use otp_common::OtpCode;
use otp_common::constants::OTP_LENGTH;
use rand::TryRngCore;
use rand::rngs::OsRng;
use thiserror::Error;

/// Largest multiple of 10 that fits in a byte; bytes at or above it are redrawn
const REJECTION_BOUND: u8 = 250;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

/// Draws passcodes straight from the operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a uniformly random 6-digit code
    pub fn generate(&self) -> Result<OtpCode, GeneratorError> {
        let mut digits = [0u8; OTP_LENGTH];
        let mut filled = 0;
        let mut buf = [0u8; 16];

        while filled < OTP_LENGTH {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| GeneratorError::Entropy(e.to_string()))?;

            for byte in buf.iter().copied().filter(|b| *b < REJECTION_BOUND) {
                digits[filled] = byte % 10;
                filled += 1;
                if filled == OTP_LENGTH {
                    break;
                }
            }
        }

        Ok(OtpCode::from_digits(digits))
    }
}
