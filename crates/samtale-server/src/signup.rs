//! OTP-gated signup state machine.
//!
//! Per email the states are `NoPending -> OtpSent -> Verified` (terminal).
//! Pending codes live only in process memory and are keyed by normalized
//! email; a resend overwrites the prior code and restarts the 5-minute
//! window. Deletion is asymmetric: expiry and successful verification evict
//! the entry, a mismatch keeps it so a typo never forces a fresh code.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use subtle::ConstantTimeEq;

use crate::ttl_cache::{Clock, SystemClock, TtlCache};

/// Validity window for a pending signup code.
pub const OTP_TTL: Duration = Duration::from_secs(5 * 60);

/// A pending, not yet verified signup.
#[derive(Debug, Clone)]
pub struct PendingSignup {
    pub code: String,
}

/// Outcome of a verification attempt against the pending store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Code matched; the entry has been consumed.
    Verified,
    /// No pending entry, or it expired (expired entries are evicted here).
    NotFoundOrExpired,
    /// Wrong code; the entry is kept for another attempt.
    Mismatch,
}

/// Generate a uniformly random 6-digit numeric code.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| char::from(b'0' + rng.gen_range(0..10)))
        .collect()
}

/// In-memory store of pending signups.
pub struct SignupStore {
    pending: TtlCache<String, PendingSignup>,
}

impl SignupStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            pending: TtlCache::with_clock(clock),
        }
    }

    /// Start (or restart) a pending signup for a normalized email.
    /// Returns the generated code for delivery to the user.
    pub fn begin(&self, email: &str) -> String {
        let code = generate_otp();
        self.pending
            .insert(email.to_string(), PendingSignup { code: code.clone() }, OTP_TTL);
        code
    }

    /// Check a supplied code against the pending entry.
    pub fn verify(&self, email: &str, code: &str) -> VerifyOutcome {
        let Some(pending) = self.pending.get_if_valid(&email.to_string()) else {
            return VerifyOutcome::NotFoundOrExpired;
        };
        let matches: bool = pending
            .code
            .as_bytes()
            .ct_eq(code.as_bytes())
            .into();
        if !matches {
            return VerifyOutcome::Mismatch;
        }
        // Single use
        self.pending.remove(&email.to_string());
        VerifyOutcome::Verified
    }

    /// Deferred-cleanup hook: evict the entry only if it still holds the
    /// given code, so a timer for a superseded code never deletes its
    /// replacement.
    pub fn evict_if_same(&self, email: &str, code: &str) -> bool {
        self.pending
            .remove_if(&email.to_string(), |p| p.code == code)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SignupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ttl_cache::test_clock::ManualClock;

    fn store_with_clock() -> (SignupStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (SignupStore::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_generate_otp_shape() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_correct_code_verifies_exactly_once() {
        let (store, _clock) = store_with_clock();
        let code = store.begin("anna@example.com");

        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::Verified
        );
        // The consumed code cannot be replayed
        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::NotFoundOrExpired
        );
    }

    #[test]
    fn test_mismatch_keeps_entry_for_retry() {
        let (store, _clock) = store_with_clock();
        let code = store.begin("anna@example.com");
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert_eq!(
            store.verify("anna@example.com", wrong),
            VerifyOutcome::Mismatch
        );
        // Entry survived the typo; the right code still works
        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::Verified
        );
    }

    #[test]
    fn test_expired_code_rejected_and_evicted() {
        let (store, clock) = store_with_clock();
        let code = store.begin("anna@example.com");

        clock.advance(OTP_TTL + Duration::from_secs(1));
        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::NotFoundOrExpired
        );
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_code_valid_just_inside_window() {
        let (store, clock) = store_with_clock();
        let code = store.begin("anna@example.com");

        clock.advance(OTP_TTL - Duration::from_secs(1));
        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::Verified
        );
    }

    #[test]
    fn test_resend_overwrites_and_restarts_window() {
        let (store, clock) = store_with_clock();
        let first = store.begin("anna@example.com");

        clock.advance(Duration::from_secs(4 * 60));
        let second = store.begin("anna@example.com");

        // Past the first window, inside the second
        clock.advance(Duration::from_secs(2 * 60));
        if first != second {
            assert_eq!(
                store.verify("anna@example.com", &first),
                VerifyOutcome::Mismatch
            );
        }
        assert_eq!(
            store.verify("anna@example.com", &second),
            VerifyOutcome::Verified
        );
    }

    #[test]
    fn test_stale_cleanup_timer_spares_resent_code() {
        let (store, _clock) = store_with_clock();
        let first = store.begin("anna@example.com");
        let second = store.begin("anna@example.com");

        if first != second {
            // The timer scheduled for the first code fires after the resend
            assert!(!store.evict_if_same("anna@example.com", &first));
            assert_eq!(
                store.verify("anna@example.com", &second),
                VerifyOutcome::Verified
            );
        }
    }

    #[test]
    fn test_cleanup_timer_evicts_own_code() {
        let (store, _clock) = store_with_clock();
        let code = store.begin("anna@example.com");

        assert!(store.evict_if_same("anna@example.com", &code));
        assert_eq!(
            store.verify("anna@example.com", &code),
            VerifyOutcome::NotFoundOrExpired
        );
    }

    #[test]
    fn test_emails_are_independent() {
        let (store, _clock) = store_with_clock();
        let code_a = store.begin("a@example.com");
        let _code_b = store.begin("b@example.com");

        assert_eq!(store.verify("a@example.com", &code_a), VerifyOutcome::Verified);
        assert_eq!(store.pending_count(), 1);
    }
}
