//! Permanent code registry
//!
//! Append-only record of every code the system has ever handed out: gift
//! card codes, referral codes, promotion codes. Issuing records the code
//! here in the same entry operation as the availability check, so a code
//! can never be produced twice, even after the gift card or promotion that
//! owned it is deactivated or deleted.

use crate::types::{CreditError, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;

/// Codes are drawn from this reduced alphabet, which drops the visually
/// ambiguous symbols `0/O` and `1/I/L`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Generation attempts before giving up with `CodeSpaceExhausted`
///
/// Unreachable in practice for 8+ character codes over a 31-symbol
/// alphabet; exists so generation is a bounded operation, not a loop that
/// can spin forever.
pub const MAX_GENERATION_ATTEMPTS: u32 = 100;

/// Why a code was entered into the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationReason {
    /// Produced by the engine's own generator at issuance time
    Generated,

    /// Claimed by an admin for a hand-picked code (marketing promotions)
    Reserved,

    /// Burned by an admin so it can never be issued
    Blocked,
}

/// One append-only registry row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRegistryEntry {
    /// The code itself
    pub code: String,

    /// Why it was registered
    pub reason: RegistrationReason,

    /// Owner at issuance time, when known
    pub owner: Option<UserId>,

    /// When the registration happened
    pub registered_at: DateTime<Utc>,
}

/// Permanent record of every issued code
///
/// Entries are only ever added. Deleting the owning gift card, promotion
/// or account leaves the registry row in place, which is the whole point.
#[derive(Debug, Default)]
pub struct CodeRegistry {
    entries: DashMap<String, CodeRegistryEntry>,
}

impl CodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        CodeRegistry {
            entries: DashMap::new(),
        }
    }

    /// Whether a code has never been registered
    pub fn is_available(&self, code: &str) -> bool {
        !self.entries.contains_key(code)
    }

    /// Claim a hand-picked code
    ///
    /// Check and insert happen in one entry operation, so two concurrent
    /// reservations of the same code resolve to exactly one winner.
    ///
    /// # Errors
    ///
    /// `AlreadyUsed` if the code is already registered for any reason.
    pub fn reserve(&self, code: &str, reason: RegistrationReason) -> Result<(), CreditError> {
        self.insert_new(code, reason, None)
    }

    /// Record a freshly generated code against its owner
    ///
    /// Called by the gift card vault and the referral state machine
    /// immediately after generating a code, inside the issuance path.
    ///
    /// # Errors
    ///
    /// `AlreadyUsed` if the code is already registered.
    pub fn register_on_issue(&self, code: &str, owner: UserId) -> Result<(), CreditError> {
        self.insert_new(code, RegistrationReason::Generated, Some(owner))
    }

    /// Permanently burn a code so no generator can ever produce it
    pub fn block(&self, code: &str) -> Result<(), CreditError> {
        self.insert_new(code, RegistrationReason::Blocked, None)
    }

    /// Generate, register and return a fresh code of `len` characters
    ///
    /// Draws random candidates from [`CODE_ALPHABET`] and registers the
    /// first available one. Bounded by [`MAX_GENERATION_ATTEMPTS`].
    ///
    /// # Errors
    ///
    /// `CodeSpaceExhausted` if every attempt collided with an existing
    /// registration.
    pub fn issue_code(&self, len: usize, owner: Option<UserId>) -> Result<String, CreditError> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let candidate = random_code(len);
            if self.insert_new(&candidate, RegistrationReason::Generated, owner).is_ok() {
                return Ok(candidate);
            }
        }
        Err(CreditError::CodeSpaceExhausted {
            attempts: MAX_GENERATION_ATTEMPTS,
        })
    }

    /// Look up a registration row
    pub fn lookup(&self, code: &str) -> Option<CodeRegistryEntry> {
        self.entries.get(code).map(|entry| entry.value().clone())
    }

    fn insert_new(
        &self,
        code: &str,
        reason: RegistrationReason,
        owner: Option<UserId>,
    ) -> Result<(), CreditError> {
        let mut inserted = false;
        self.entries.entry(code.to_string()).or_insert_with(|| {
            inserted = true;
            CodeRegistryEntry {
                code: code.to_string(),
                reason,
                owner,
                registered_at: Utc::now(),
            }
        });
        if inserted {
            Ok(())
        } else {
            Err(CreditError::already_used("code", code))
        }
    }
}

/// Draw a random code of `len` characters from the reduced alphabet
pub fn random_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_code_is_available() {
        let registry = CodeRegistry::new();
        assert!(registry.is_available("SUMMER25"));
    }

    #[test]
    fn test_reserve_marks_code_taken() {
        let registry = CodeRegistry::new();

        registry
            .reserve("SUMMER25", RegistrationReason::Reserved)
            .unwrap();

        assert!(!registry.is_available("SUMMER25"));
        let entry = registry.lookup("SUMMER25").unwrap();
        assert_eq!(entry.reason, RegistrationReason::Reserved);
        assert_eq!(entry.owner, None);
    }

    #[test]
    fn test_reserve_twice_rejects_second() {
        let registry = CodeRegistry::new();

        registry
            .reserve("SUMMER25", RegistrationReason::Reserved)
            .unwrap();
        let result = registry.reserve("SUMMER25", RegistrationReason::Reserved);

        assert!(matches!(
            result.unwrap_err(),
            CreditError::AlreadyUsed { .. }
        ));
    }

    #[test]
    fn test_register_on_issue_records_owner() {
        let registry = CodeRegistry::new();

        registry.register_on_issue("GCARDTEST234", 7).unwrap();

        let entry = registry.lookup("GCARDTEST234").unwrap();
        assert_eq!(entry.reason, RegistrationReason::Generated);
        assert_eq!(entry.owner, Some(7));
    }

    #[test]
    fn test_issue_code_registers_and_returns_unambiguous_code() {
        let registry = CodeRegistry::new();

        let code = registry.issue_code(8, Some(1)).unwrap();

        assert_eq!(code.len(), 8);
        assert!(code
            .bytes()
            .all(|b| CODE_ALPHABET.contains(&b)), "unexpected symbol in {code}");
        for ambiguous in ['0', 'O', '1', 'I', 'L'] {
            assert!(!code.contains(ambiguous));
        }
        assert!(!registry.is_available(&code));
    }

    #[test]
    fn test_issued_codes_are_distinct() {
        let registry = CodeRegistry::new();

        let a = registry.issue_code(8, Some(1)).unwrap();
        let b = registry.issue_code(8, Some(1)).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_issue_code_exhausts_when_space_is_full() {
        let registry = CodeRegistry::new();

        // Burn the entire length-1 code space.
        for &b in CODE_ALPHABET {
            registry.block(&(b as char).to_string()).unwrap();
        }

        let result = registry.issue_code(1, None);
        assert!(matches!(
            result.unwrap_err(),
            CreditError::CodeSpaceExhausted {
                attempts: MAX_GENERATION_ATTEMPTS
            }
        ));
    }

    #[test]
    fn test_blocked_code_is_never_reissued() {
        let registry = CodeRegistry::new();

        registry.block("ABCD2345").unwrap();

        assert!(!registry.is_available("ABCD2345"));
        assert!(registry.register_on_issue("ABCD2345", 2).is_err());
    }

    #[test]
    fn test_concurrent_reservations_have_one_winner() {
        use std::sync::Arc;

        let registry = Arc::new(CodeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .reserve("CONTESTED", RegistrationReason::Reserved)
                        .is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }
}
