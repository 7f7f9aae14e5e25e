use lotto_core::{AccountId, RequestId, RoundIndex, Seed};
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Parameters forwarded to the randomness oracle with each draw request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawParams {
    pub subscription_id: u64,
    pub key_hash: String,
}

/// Handle returned by a draw request; the seed arrives later through
/// `SettlementEngine::fulfill_draw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawHandle {
    pub round: RoundIndex,
    pub request_id: RequestId,
}

/// External source of unbiased 256-bit seeds.
pub trait RandomnessOracle: Send + Sync {
    /// Accepts a request and returns its id. The seed is delivered
    /// asynchronously by the oracle account.
    fn request_randomness(&self, params: &DrawParams) -> Result<RequestId>;

    /// Identity allowed to deliver seeds.
    fn account(&self) -> &AccountId;
}

/// Oracle stand-in: hands out sequential request ids starting at 1 and keeps
/// the requests it has seen.
#[derive(Debug)]
pub struct MockOracle {
    account: AccountId,
    next_id: Mutex<RequestId>,
    requests: Mutex<Vec<(RequestId, DrawParams)>>,
}

impl MockOracle {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            next_id: Mutex::new(1),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Skips past ids an earlier process already handed out, so a restored
    /// engine never sees a request id twice.
    pub fn resume_after(&self, last_id: RequestId) {
        let mut next_id = self.next_id.lock();
        if *next_id <= last_id {
            *next_id = last_id + 1;
        }
    }

    pub fn requests(&self) -> Vec<(RequestId, DrawParams)> {
        self.requests.lock().clone()
    }
}

impl RandomnessOracle for MockOracle {
    fn request_randomness(&self, params: &DrawParams) -> Result<RequestId> {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;

        self.requests.lock().push((id, params.clone()));
        tracing::debug!("Oracle accepted randomness request {}", id);
        Ok(id)
    }

    fn account(&self) -> &AccountId {
        &self.account
    }
}

/// Fresh seed from the thread RNG.
pub fn random_seed() -> Seed {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    Seed::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_request_ids() {
        let oracle = MockOracle::new(AccountId::from("oracle"));
        let params = DrawParams {
            subscription_id: 1,
            key_hash: "0xff".to_string(),
        };

        assert_eq!(oracle.request_randomness(&params).unwrap(), 1);
        assert_eq!(oracle.request_randomness(&params).unwrap(), 2);
        assert_eq!(oracle.requests().len(), 2);
        assert_eq!(oracle.requests()[1].0, 2);
    }

    #[test]
    fn test_resume_after_skips_used_ids() {
        let oracle = MockOracle::new(AccountId::from("oracle"));
        let params = DrawParams {
            subscription_id: 1,
            key_hash: "0xff".to_string(),
        };

        oracle.resume_after(9);
        assert_eq!(oracle.request_randomness(&params).unwrap(), 10);

        // never moves backwards
        oracle.resume_after(3);
        assert_eq!(oracle.request_randomness(&params).unwrap(), 11);
    }

    #[test]
    fn test_random_seeds_differ() {
        assert_ne!(random_seed(), random_seed());
    }
}
