use lotto_core::{AccountId, Amount, PaymentRail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{LotteryError, Result};

/// Withdrawable balances owed to winners and referrers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevenueLedger {
    balances: BTreeMap<AccountId, Amount>,
    total_credited: Amount,
    total_withdrawn: Amount,
}

impl RevenueLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, account: &AccountId, amount: Amount) {
        if amount.is_zero() {
            return;
        }
        let entry = self.balances.entry(account.clone()).or_default();
        *entry = entry.saturating_add(amount);
        self.total_credited = self.total_credited.saturating_add(amount);
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Zeroes the entry, then pays it out. The entry is removed before the
    /// transfer so a re-entrant call sees nothing to withdraw; a failed
    /// transfer restores it.
    pub fn withdraw(&mut self, account: &AccountId, rail: &dyn PaymentRail) -> Result<Amount> {
        let amount = match self.balances.remove(account) {
            Some(amount) if !amount.is_zero() => amount,
            _ => return Err(LotteryError::NothingToWithdraw),
        };

        if let Err(e) = rail.transfer(account, amount) {
            tracing::warn!("Withdrawal of {} for {} failed, restoring balance", amount, account);
            self.balances.insert(account.clone(), amount);
            return Err(e.into());
        }

        self.total_withdrawn = self.total_withdrawn.saturating_add(amount);
        tracing::info!("Account {} withdrew {}", account, amount);
        Ok(amount)
    }

    /// Sum of all balances still owed.
    pub fn liabilities(&self) -> Amount {
        self.balances.values().copied().sum()
    }

    pub fn total_credited(&self) -> Amount {
        self.total_credited
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }
}
