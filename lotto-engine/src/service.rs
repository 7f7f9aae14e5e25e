use crate::engine::{EngineState, SettlementEngine};
use crate::oracle::{DrawHandle, DrawParams, RandomnessOracle};
use crate::{NumberSet, Result};
use lotto_core::{
    AccountId, Amount, Clock, LotteryConfig, PaymentRail, ReferralCode, RequestId, RoundIndex,
    Seed, SnapshotStore, Storage, TicketId,
};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Snapshots retained in the database; older rows are pruned on each commit.
pub const SNAPSHOTS_KEPT: u64 = 4;

/// Engine plus persistence. Each mutating call runs under the write lock and
/// then commits a snapshot of the new state to SQLite; queries only take the
/// read lock, so they keep working while a draw is pending.
///
/// Commits are serialized by `commit`: the newest snapshot row is always the
/// state produced by the most recent successful call.
pub struct LotteryService {
    storage: Arc<Storage>,
    engine: Arc<RwLock<SettlementEngine>>,
    commit: Mutex<()>,
}

impl LotteryService {
    pub async fn open(
        data_dir: &Path,
        config: LotteryConfig,
        clock: Arc<dyn Clock>,
        oracle: Arc<dyn RandomnessOracle>,
        rail: Arc<dyn PaymentRail>,
    ) -> Result<Self> {
        let db_path = data_dir.join("lotto.db");
        let storage = Arc::new(Storage::new(&db_path).await?);

        let latest = SnapshotStore::new(&storage).load_latest().await?;
        let engine = match latest {
            Some(snapshot) => {
                let state: EngineState = serde_json::from_str(&snapshot.state)?;
                tracing::info!(
                    "Restored lottery at round {} from snapshot {} ({})",
                    snapshot.round,
                    snapshot.id,
                    snapshot.saved_at
                );
                SettlementEngine::restore(config, state, clock, oracle, rail)?
            }
            None => {
                tracing::info!("Starting a new lottery in {:?}", data_dir);
                SettlementEngine::new(config, clock, oracle, rail)?
            }
        };

        Ok(Self {
            storage,
            engine: Arc::new(RwLock::new(engine)),
            commit: Mutex::new(()),
        })
    }

    /// Runs a mutating entry point and persists the resulting state. Nothing is
    /// written when the entry point fails.
    pub async fn apply<T>(
        &self,
        op: impl FnOnce(&mut SettlementEngine) -> Result<T>,
    ) -> Result<T> {
        let _commit = self.commit.lock().await;

        let (value, round, snapshot) = {
            let mut engine = self.engine.write();
            let value = op(&mut engine)?;
            (value, engine.current_round(), engine.snapshot()?)
        };

        let store = SnapshotStore::new(&self.storage);
        store.save_snapshot(round, &snapshot).await?;
        let pruned = store.prune(SNAPSHOTS_KEPT).await?;
        if pruned > 0 {
            tracing::debug!("Pruned {} old engine snapshots", pruned);
        }
        Ok(value)
    }

    pub fn read<T>(&self, query: impl FnOnce(&SettlementEngine) -> T) -> T {
        query(&self.engine.read())
    }

    pub async fn buy_ticket(
        &self,
        buyer: &AccountId,
        referral: Option<ReferralCode>,
        numbers: &[u8],
        payment: Amount,
    ) -> Result<TicketId> {
        self.apply(|engine| engine.buy_ticket(buyer, referral, numbers, payment))
            .await
    }

    pub async fn claim_referral_code(&self, code: ReferralCode, owner: &AccountId) -> Result<()> {
        self.apply(|engine| engine.claim_referral_code(code, owner))
            .await
    }

    pub async fn request_draw(&self, params: &DrawParams) -> Result<DrawHandle> {
        self.apply(|engine| engine.request_draw(params)).await
    }

    pub async fn fulfill_draw(
        &self,
        caller: &AccountId,
        request_id: RequestId,
        seed: &Seed,
    ) -> Result<NumberSet> {
        self.apply(|engine| engine.fulfill_draw(caller, request_id, seed))
            .await
    }

    /// Computes winners and closes the round in one commit.
    pub async fn settle(&self) -> Result<RoundIndex> {
        self.apply(|engine| {
            let closing = engine.current_round();
            engine.compute_winners()?;
            engine.close_round()?;
            Ok(closing)
        })
        .await
    }

    pub async fn withdraw(&self, account: &AccountId) -> Result<Amount> {
        self.apply(|engine| engine.withdraw(account)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.apply(|engine| {
            engine.pause();
            Ok(())
        })
        .await
    }

    pub async fn unpause(&self) -> Result<()> {
        self.apply(|engine| {
            engine.unpause();
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing;
    use crate::oracle::MockOracle;
    use crate::round::RoundState;
    use crate::LotteryError;
    use chrono::DateTime;
    use lotto_core::{ManualClock, RecordingRail};
    use tempfile::tempdir;

    struct Fixture {
        clock: Arc<ManualClock>,
        oracle: Arc<MockOracle>,
        rail: Arc<RecordingRail>,
    }

    impl Fixture {
        fn new() -> Self {
            let window = DateTime::from_timestamp(244_800 + 2_800 * 7 * 24 * 3600, 0).unwrap();
            Self {
                clock: Arc::new(ManualClock::new(window)),
                oracle: Arc::new(MockOracle::new(AccountId::from("oracle"))),
                rail: Arc::new(RecordingRail::new()),
            }
        }

        async fn open(&self, dir: &Path) -> LotteryService {
            LotteryService::open(
                dir,
                LotteryConfig::default(),
                self.clock.clone(),
                self.oracle.clone(),
                self.rail.clone(),
            )
            .await
            .unwrap()
        }
    }

    fn params() -> DrawParams {
        DrawParams {
            subscription_id: 1,
            key_hash: "0x01".to_string(),
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let fixture = Fixture::new();
        let alice = AccountId::from("alice");
        let seed = Seed::from_bytes([6; 32]);
        let drawn = drawing::draw(&seed).to_sorted_vec();

        {
            let service = fixture.open(temp_dir.path()).await;
            let price = service.read(|engine| engine.ticket_price(&drawn)).unwrap();
            service.buy_ticket(&alice, None, &drawn, price).await.unwrap();
            let handle = service.request_draw(&params()).await.unwrap();
            assert_eq!(
                service.read(|engine| engine.round_state()),
                RoundState::DrawPending
            );
            assert_eq!(handle.round, 0);
        }

        let service = fixture.open(temp_dir.path()).await;
        let request_id = service
            .read(|engine| engine.pending_request())
            .expect("draw should still be pending");
        service
            .fulfill_draw(&AccountId::from("oracle"), request_id, &seed)
            .await
            .unwrap();
        assert_eq!(service.settle().await.unwrap(), 0);

        let reopened = fixture.open(temp_dir.path()).await;
        reopened.read(|engine| {
            assert_eq!(engine.current_round(), 1);
            assert_eq!(engine.ticket(0).unwrap().owner, alice);
            assert_eq!(engine.round(0).unwrap().winners(6), &[0]);
            assert!(!engine.pending_balance(&alice).is_zero());
        });
    }

    #[tokio::test]
    async fn test_failed_entry_point_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let fixture = Fixture::new();
        let service = fixture.open(temp_dir.path()).await;

        let result = service
            .buy_ticket(&AccountId::from("alice"), None, &[1, 2, 3], Amount::ZERO)
            .await;
        assert!(matches!(result, Err(LotteryError::InvalidTicketSize { .. })));
        assert!(matches!(
            service.withdraw(&AccountId::from("alice")).await,
            Err(LotteryError::NothingToWithdraw)
        ));

        let count = SnapshotStore::new(&service.storage)
            .snapshot_count()
            .await
            .unwrap();
        assert_eq!(count, 0);

        service.pause().await.unwrap();
        let reopened = fixture.open(temp_dir.path()).await;
        assert!(reopened.read(|engine| engine.is_paused()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_purchases_survive_reopen() {
        let temp_dir = tempdir().unwrap();
        let fixture = Fixture::new();
        let service = Arc::new(fixture.open(temp_dir.path()).await);
        let numbers = [1, 2, 3, 4, 5, 6];
        let price = service.read(|engine| engine.ticket_price(&numbers)).unwrap();

        let mut tasks = Vec::new();
        for i in 0..32 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let buyer = AccountId::from(format!("buyer-{}", i).as_str());
                service.buy_ticket(&buyer, None, &numbers, price).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let live = service.read(|engine| engine.ticket_count());
        assert_eq!(live, 32);
        drop(service);

        let reopened = fixture.open(temp_dir.path()).await;
        reopened.read(|engine| {
            assert_eq!(engine.ticket_count(), live);
            assert_eq!(engine.total_received(), engine.prize_pool());
        });
    }

    #[tokio::test]
    async fn test_snapshot_history_is_bounded() {
        let temp_dir = tempdir().unwrap();
        let fixture = Fixture::new();
        let service = fixture.open(temp_dir.path()).await;
        let alice = AccountId::from("alice");
        let numbers = [10, 20, 30, 40, 50, 60];
        let price = service.read(|engine| engine.ticket_price(&numbers)).unwrap();

        for _ in 0..50 {
            service.buy_ticket(&alice, None, &numbers, price).await.unwrap();
        }

        let count = SnapshotStore::new(&service.storage)
            .snapshot_count()
            .await
            .unwrap();
        assert_eq!(count, SNAPSHOTS_KEPT);

        let reopened = fixture.open(temp_dir.path()).await;
        assert_eq!(reopened.read(|engine| engine.ticket_count()), 50);
    }
}
