//! Core types shared across OTP components.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{OTP_LENGTH, redis_keys};
use crate::error::OtpError;

/// The (user, offer) pair that scopes all OTP state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub user_id: Uuid,
    pub offer_id: String,
}

impl PairKey {
    pub fn new(user_id: Uuid, offer_id: impl Into<String>) -> Self {
        Self {
            user_id,
            offer_id: offer_id.into(),
        }
    }

    /// Build a pair from raw request values
    pub fn parse(user_id: &str, offer_id: &str) -> Result<Self, OtpError> {
        let user_id = Uuid::parse_str(user_id.trim())
            .map_err(|_| OtpError::InvalidInput("userId must be a valid UUID".to_string()))?;

        let offer_id = offer_id.trim();
        if user_id.is_nil() || offer_id.is_empty() {
            return Err(OtpError::InvalidInput(
                "Both userId and offerId are required".to_string(),
            ));
        }

        Ok(Self::new(user_id, offer_id))
    }

    /// Store key of the OTP record
    pub fn record_key(&self) -> String {
        format!(
            "{}{}{}{}",
            redis_keys::OTP_PREFIX,
            self.user_id,
            redis_keys::OFFER_SEGMENT,
            self.offer_id
        )
    }

    /// Store key of the resend counter
    pub fn resend_key(&self) -> String {
        format!(
            "{}{}{}{}",
            redis_keys::RESEND_PREFIX,
            self.user_id,
            redis_keys::OFFER_SEGMENT,
            self.offer_id
        )
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user={} offer={}", self.user_id, self.offer_id)
    }
}

/// A 6-digit numeric passcode
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    /// Parse a submitted code, accepting exactly six ASCII digits
    pub fn parse(raw: &str) -> Result<Self, OtpError> {
        if raw.len() != OTP_LENGTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidInput(format!(
                "OTP code must be exactly {} digits",
                OTP_LENGTH
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Build a code from digit values (each reduced modulo 10)
    pub fn from_digits(digits: [u8; OTP_LENGTH]) -> Self {
        Self(digits.iter().map(|d| (b'0' + d % 10) as char).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OtpCode {
    type Error = OtpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}

impl fmt::Display for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Codes are secrets; keep them out of `{:?}` output.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Live state for one pair while a code is outstanding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRecord {
    /// The issued code
    pub code: OtpCode,

    pub user_id: Uuid,

    pub offer_id: String,

    /// Wrong submissions since the code was issued
    pub attempts: u32,

    /// Resend counter at write time (informational, never authoritative)
    pub resends: u32,

    /// Issue timestamp (Unix epoch seconds)
    #[serde(default)]
    pub issued_at: i64,
}

impl OtpRecord {
    /// Fresh record for a newly drawn code
    pub fn issue(key: &PairKey, code: OtpCode, resends: u32) -> Self {
        Self {
            code,
            user_id: key.user_id,
            offer_id: key.offer_id.clone(),
            attempts: 0,
            resends,
            issued_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Check a submitted code against the issued one
    pub fn matches(&self, submitted: &OtpCode) -> bool {
        self.code == *submitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_parse() {
        assert!(OtpCode::parse("012345").is_ok());
        assert!(OtpCode::parse("12345").is_err());
        assert!(OtpCode::parse("1234567").is_err());
        assert!(OtpCode::parse("12a456").is_err());
        assert!(OtpCode::parse("").is_err());
        // Non-ASCII digits are rejected even when the char count is right
        assert!(OtpCode::parse("١٢٣٤٥٦").is_err());
    }

    #[test]
    fn test_code_from_digits() {
        let code = OtpCode::from_digits([0, 1, 2, 3, 4, 19]);
        assert_eq!(code.as_str(), "012349");
    }

    #[test]
    fn test_code_debug_is_masked() {
        let code = OtpCode::parse("987654").unwrap();
        assert!(!format!("{:?}", code).contains("987654"));
    }

    #[test]
    fn test_pair_keys() {
        let user = Uuid::parse_str("6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01").unwrap();
        let pair = PairKey::new(user, "offer-42");

        assert_eq!(
            pair.record_key(),
            "otp:user:6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01:offer:offer-42"
        );
        assert_eq!(
            pair.resend_key(),
            "otp:resend:user:6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01:offer:offer-42"
        );
    }

    #[test]
    fn test_pair_parse_rejects_bad_input() {
        assert!(matches!(
            PairKey::parse("not-a-uuid", "offer"),
            Err(OtpError::InvalidInput(_))
        ));
        assert!(matches!(
            PairKey::parse("6f1c2a9e-0d4b-4c55-9a1e-3f2b7c8d9e01", "  "),
            Err(OtpError::InvalidInput(_))
        ));
        assert!(matches!(
            PairKey::parse("00000000-0000-0000-0000-000000000000", "offer"),
            Err(OtpError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_record_json_shape() {
        let pair = PairKey::new(Uuid::new_v4(), "offer-1");
        let record = OtpRecord::issue(&pair, OtpCode::parse("123456").unwrap(), 2);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code"], "123456");
        assert_eq!(json["offerId"], "offer-1");
        assert_eq!(json["attempts"], 0);
        assert_eq!(json["resends"], 2);

        let parsed: OtpRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_rejects_corrupt_code() {
        let json = serde_json::json!({
            "code": "12ab56",
            "userId": Uuid::new_v4(),
            "offerId": "o",
            "attempts": 0,
            "resends": 0
        });
        assert!(serde_json::from_value::<OtpRecord>(json).is_err());
    }
}
