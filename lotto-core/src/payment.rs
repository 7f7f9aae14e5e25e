use crate::error::{CoreError, Result};
use crate::types::{AccountId, Amount};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Outbound value transfers: overpayment refunds and revenue withdrawals.
pub trait PaymentRail: Send + Sync {
    fn transfer(&self, to: &AccountId, amount: Amount) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: AccountId,
    pub amount: Amount,
}

/// In-memory rail that records every transfer. It can be switched into a
/// failing mode to exercise rollback paths.
#[derive(Debug, Default)]
pub struct RecordingRail {
    transfers: Mutex<Vec<Transfer>>,
    failing: Mutex<bool>,
}

impl RecordingRail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().clone()
    }

    pub fn total_to(&self, account: &AccountId) -> Amount {
        self.transfers
            .lock()
            .iter()
            .filter(|t| &t.to == account)
            .map(|t| t.amount)
            .sum()
    }
}

impl PaymentRail for RecordingRail {
    fn transfer(&self, to: &AccountId, amount: Amount) -> Result<()> {
        if *self.failing.lock() {
            return Err(CoreError::Transfer {
                to: to.to_string(),
                amount: amount.to_units(),
                reason: "rail unavailable".to_string(),
            });
        }

        self.transfers.lock().push(Transfer {
            to: to.clone(),
            amount,
        });
        tracing::debug!("Transferred {} to {}", amount, to);
        Ok(())
    }
}
