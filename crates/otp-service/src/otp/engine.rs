//! The OTP lifecycle engine.
//!
//! Per (user, offer) pair the engine moves between three states:
//!
//! ```text
//! NoCode --generate/resend--> Active(code, attempts)
//! Active --verify ok + confirmed--> NoCode
//! Active --verify wrong, attempts < max--> Active(code, attempts + 1)
//! Active --verify wrong, attempts = max--> NoCode     (resend still possible)
//!                                       \-> Locked -> NoCode  (resends exhausted)
//! ```
//!
//! All state lives in the injected [`OtpStore`]; the engine itself is
//! stateless and can be shared freely between request tasks. No operation
//! retries anything: a retried verify spends attempts, so that decision
//! stays with the caller.

use otp_common::constants::routes;
use otp_common::{OtpCode, OtpError, OtpRecord, PairKey};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::CodeGenerator;
use crate::gateway::ConfirmationGateway;
use crate::store::{OtpStore, StoreError};

/// Limits and lifetimes applied by the engine
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    /// Lifetime of an issued code
    pub ttl: Duration,
    /// Wrong submissions that burn a code
    pub max_retries: u32,
    /// Resends allowed within one resend window
    pub max_resends: u32,
    /// Fixed window of the resend counter, armed by the first resend
    pub resend_window: Duration,
}

/// Orchestrates the code generator, the record store and the confirmation gateway
pub struct OtpEngine {
    store: Arc<dyn OtpStore>,
    gateway: Arc<dyn ConfirmationGateway>,
    generator: CodeGenerator,
    policy: OtpPolicy,
    /// Base URL embedded in issued links
    link_base: String,
}

/// Log an infrastructure failure and wrap it with the pair it happened on
fn internal(key: &PairKey, what: &str, err: impl Display) -> OtpError {
    error!(
        user_id = %key.user_id,
        offer_id = %key.offer_id,
        error = %err,
        "{}", what
    );
    OtpError::Internal(format!("{} | {} | {}", what, key, err))
}

impl OtpEngine {
    pub fn new(
        store: Arc<dyn OtpStore>,
        gateway: Arc<dyn ConfirmationGateway>,
        policy: OtpPolicy,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            generator: CodeGenerator::new(),
            policy,
            link_base: link_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn store(&self) -> &Arc<dyn OtpStore> {
        &self.store
    }

    /// Issue a code for the pair, or hand back the one already outstanding
    ///
    /// The returned link embeds the code.
    pub async fn generate(&self, key: &PairKey) -> Result<String, OtpError> {
        let existing = self
            .store
            .get(key)
            .await
            .map_err(|e| internal(key, "OTP lookup failed", e))?;

        // Duplicate submissions must not rotate a code the user may already hold
        if let Some(record) = existing {
            info!(
                user_id = %key.user_id,
                offer_id = %key.offer_id,
                "OTP already exists, reusing existing code"
            );
            return Ok(self.verify_link(key, Some(&record.code)));
        }

        let code = self
            .generator
            .generate()
            .map_err(|e| internal(key, "OTP generation failed", e))?;

        let resends = self
            .store
            .resend_count(key)
            .await
            .map_err(|e| internal(key, "Resend counter lookup failed", e))?;

        let record = OtpRecord::issue(key, code, resends);
        let inserted = self
            .store
            .put_if_absent(key, &record, self.policy.ttl)
            .await
            .map_err(|e| internal(key, "OTP storage failed", e))?;

        // A concurrent generate for the same pair won; hand out its code
        if !inserted {
            let winner = self
                .store
                .get(key)
                .await
                .map_err(|e| internal(key, "OTP lookup failed", e))?;

            if let Some(winner) = winner {
                info!(
                    user_id = %key.user_id,
                    offer_id = %key.offer_id,
                    "OTP issued concurrently, reusing it"
                );
                return Ok(self.verify_link(key, Some(&winner.code)));
            }

            self.store
                .put(key, &record, self.policy.ttl)
                .await
                .map_err(|e| internal(key, "OTP storage failed", e))?;
        }

        info!(
            user_id = %key.user_id,
            offer_id = %key.offer_id,
            ttl_secs = self.policy.ttl.as_secs(),
            "New OTP generated"
        );
        debug!(user_id = %key.user_id, offer_id = %key.offer_id, otp = %record.code, "Issued code");

        Ok(self.verify_link(key, Some(&record.code)))
    }

    /// Check a submitted code and, if it matches, confirm the transaction
    pub async fn verify(&self, key: &PairKey, submitted: &OtpCode) -> Result<(), OtpError> {
        let record = self
            .store
            .get(key)
            .await
            .map_err(|e| internal(key, "OTP lookup failed", e))?;

        let Some(record) = record else {
            warn!(
                user_id = %key.user_id,
                offer_id = %key.offer_id,
                "No OTP found, possibly expired or deleted"
            );
            return Err(OtpError::NotFoundOrExpired);
        };

        if !record.matches(submitted) {
            return self.reject_wrong_code(key, &record).await;
        }

        // A matching code is not spent until the confirmation succeeds
        if let Err(e) = self.gateway.confirm(key.user_id, &key.offer_id).await {
            error!(
                user_id = %key.user_id,
                offer_id = %key.offer_id,
                error = %e,
                "Transaction confirmation failed, OTP left intact"
            );
            return Err(OtpError::ConfirmationFailed(format!("{} | {}", key, e)));
        }

        self.store
            .delete(key)
            .await
            .map_err(|e| internal(key, "Transaction confirmed but OTP cleanup failed", e))?;
        self.store
            .reset_resends(key)
            .await
            .map_err(|e| internal(key, "Transaction confirmed but resend reset failed", e))?;

        info!(
            user_id = %key.user_id,
            offer_id = %key.offer_id,
            "OTP verified and transaction confirmed"
        );

        Ok(())
    }

    /// Count a wrong submission; always returns the resulting failure
    async fn reject_wrong_code(&self, key: &PairKey, record: &OtpRecord) -> Result<(), OtpError> {
        let attempts = record.attempts + 1;

        warn!(
            user_id = %key.user_id,
            offer_id = %key.offer_id,
            attempts,
            max_retries = self.policy.max_retries,
            "Incorrect OTP entered"
        );

        // Read-modify-write: concurrent wrong guesses may race on the count
        match self.store.update_attempts(key, attempts).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(OtpError::NotFoundOrExpired),
            Err(e) => return Err(internal(key, "Attempt counter update failed", e)),
        }

        if attempts < self.policy.max_retries {
            return Err(OtpError::InvalidCode);
        }

        // The code is burned whatever happens next
        self.store
            .delete(key)
            .await
            .map_err(|e| internal(key, "OTP deletion failed", e))?;

        let resends = self
            .store
            .resend_count(key)
            .await
            .map_err(|e| internal(key, "Resend counter lookup failed", e))?;

        if resends >= self.policy.max_resends {
            error!(
                user_id = %key.user_id,
                offer_id = %key.offer_id,
                attempts,
                resends,
                "OTP permanently invalidated, max attempts and resends exceeded"
            );
            self.store
                .reset_resends(key)
                .await
                .map_err(|e| internal(key, "Resend counter reset failed", e))?;
            return Err(OtpError::PermanentlyLocked);
        }

        warn!(
            user_id = %key.user_id,
            offer_id = %key.offer_id,
            resends,
            "OTP blocked after max attempts, resend required"
        );

        Err(OtpError::MaxAttemptsExceeded {
            max_retries: self.policy.max_retries,
        })
    }

    /// Replace any outstanding code with a fresh one
    ///
    /// The returned link does not embed the code. A failure after the counter
    /// increment still consumes one resend.
    pub async fn resend(&self, key: &PairKey) -> Result<String, OtpError> {
        let current = self
            .store
            .resend_count(key)
            .await
            .map_err(|e| internal(key, "Resend counter lookup failed", e))?;

        if current >= self.policy.max_resends {
            warn!(
                user_id = %key.user_id,
                offer_id = %key.offer_id,
                resends = current,
                "Maximum resend limit exceeded"
            );
            return Err(OtpError::ResendLimitExceeded {
                max_resends: self.policy.max_resends,
            });
        }

        let resends = self
            .store
            .increment_resends(key, self.policy.resend_window)
            .await
            .map_err(|e| internal(key, "Resend counter update failed", e))?;

        self.store
            .delete(key)
            .await
            .map_err(|e| internal(key, "Previous OTP deletion failed", e))?;

        let code = self
            .generator
            .generate()
            .map_err(|e| internal(key, "OTP generation failed", e))?;

        let record = OtpRecord::issue(key, code, resends);
        self.store
            .put(key, &record, self.policy.ttl)
            .await
            .map_err(|e| internal(key, "Resent OTP storage failed", e))?;

        info!(
            user_id = %key.user_id,
            offer_id = %key.offer_id,
            resends,
            "Generated new OTP (resend)"
        );
        debug!(user_id = %key.user_id, offer_id = %key.offer_id, otp = %record.code, "Resent code");

        Ok(self.verify_link(key, None))
    }

    fn verify_link(&self, key: &PairKey, code: Option<&OtpCode>) -> String {
        let mut link = format!(
            "{}{}?userId={}&offerId={}",
            self.link_base,
            routes::VERIFY,
            key.user_id,
            urlencoding::encode(&key.offer_id)
        );
        if let Some(code) = code {
            link.push_str("&otp=");
            link.push_str(code.as_str());
        }
        link
    }
}
