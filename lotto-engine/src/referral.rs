use lotto_core::{AccountId, ReferralCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{LotteryError, Result};

/// Referral codes and their owners. First claim wins and is permanent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralRegistry {
    owners: BTreeMap<ReferralCode, AccountId>,
    codes: BTreeMap<AccountId, Vec<ReferralCode>>,
}

impl ReferralRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, code: ReferralCode, owner: &AccountId) -> Result<()> {
        if code.is_none() {
            return Err(LotteryError::InvalidReferralCode);
        }
        if self.owners.contains_key(&code) {
            return Err(LotteryError::ReferralCodeTaken);
        }

        self.owners.insert(code, owner.clone());
        self.codes.entry(owner.clone()).or_default().push(code);

        tracing::info!("Referral code {} claimed by {}", code, owner);
        Ok(())
    }

    pub fn owner_of(&self, code: &ReferralCode) -> Option<&AccountId> {
        self.owners.get(code)
    }

    /// The owner's `index`-th claimed code, in claim order.
    pub fn code_of(&self, owner: &AccountId, index: usize) -> Result<ReferralCode> {
        let codes = self.codes.get(owner).map(Vec::as_slice).unwrap_or(&[]);
        codes
            .get(index)
            .copied()
            .ok_or(LotteryError::IndexOutOfRange {
                index,
                len: codes.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_lookup() {
        let mut registry = ReferralRegistry::new();
        let alice = AccountId::from("alice");
        let code1 = ReferralCode::from_bytes([1; 32]);
        let code2 = ReferralCode::from_bytes([2; 32]);

        registry.claim(code1, &alice).unwrap();
        registry.claim(code2, &alice).unwrap();

        assert_eq!(registry.owner_of(&code1), Some(&alice));
        assert_eq!(registry.owner_of(&code2), Some(&alice));
        assert_eq!(registry.code_of(&alice, 0).unwrap(), code1);
        assert_eq!(registry.code_of(&alice, 1).unwrap(), code2);
        assert!(matches!(
            registry.code_of(&alice, 2),
            Err(LotteryError::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_first_claim_wins() {
        let mut registry = ReferralRegistry::new();
        let code = ReferralCode::from_bytes([7; 32]);
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        registry.claim(code, &alice).unwrap();
        assert!(matches!(
            registry.claim(code, &bob),
            Err(LotteryError::ReferralCodeTaken)
        ));
        assert_eq!(registry.owner_of(&code), Some(&alice));
        assert!(matches!(
            registry.code_of(&bob, 0),
            Err(LotteryError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_zero_code_is_reserved() {
        let mut registry = ReferralRegistry::new();
        assert!(matches!(
            registry.claim(ReferralCode::NONE, &AccountId::from("alice")),
            Err(LotteryError::InvalidReferralCode)
        ));
    }
}
