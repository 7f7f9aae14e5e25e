use crate::error::Result;
use crate::storage::Storage;
use crate::types::RoundIndex;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone)]
pub struct SnapshotData {
    pub id: i64,
    pub round: RoundIndex,
    /// Serialized engine state (JSON).
    pub state: String,
    pub saved_at: DateTime<Utc>,
}

pub struct SnapshotStore<'a> {
    storage: &'a Storage,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_snapshot(&self, round: RoundIndex, state: &str) -> Result<i64> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT INTO engine_snapshots (round, state, saved_at) VALUES (?1, ?2, ?3)",
            params![round as i64, state, Utc::now().timestamp()],
        )?;

        let id = conn.last_insert_rowid();
        tracing::debug!("Saved engine snapshot {} for round {}", id, round);
        Ok(id)
    }

    pub async fn load_latest(&self) -> Result<Option<SnapshotData>> {
        let conn = self.storage.get_connection().await;

        let snapshot = conn
            .query_row(
                "SELECT id, round, state, saved_at FROM engine_snapshots
                 ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    let round: i64 = row.get(1)?;
                    Ok(SnapshotData {
                        id: row.get(0)?,
                        round: round as RoundIndex,
                        state: row.get(2)?,
                        saved_at: DateTime::from_timestamp(row.get(3)?, 0)
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(snapshot)
    }

    pub async fn snapshot_count(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM engine_snapshots", [], |row| row.get(0))?;

        Ok(count as u64)
    }

    /// Drops all but the newest `keep` snapshots.
    pub async fn prune(&self, keep: u64) -> Result<usize> {
        let conn = self.storage.get_connection().await;

        let removed = conn.execute(
            "DELETE FROM engine_snapshots WHERE id NOT IN (
                SELECT id FROM engine_snapshots ORDER BY id DESC LIMIT ?1
            )",
            params![keep as i64],
        )?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_latest_snapshot_wins() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("lotto.db")).await.unwrap();
        let store = SnapshotStore::new(&storage);

        assert!(store.load_latest().await.unwrap().is_none());

        store.save_snapshot(0, r#"{"round":0}"#).await.unwrap();
        store.save_snapshot(1, r#"{"round":1}"#).await.unwrap();

        let latest = store.load_latest().await.unwrap().unwrap();
        assert_eq!(latest.round, 1);
        assert_eq!(latest.state, r#"{"round":1}"#);
        assert_eq!(store.snapshot_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_prune_keeps_newest() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("nested").join("lotto.db"))
            .await
            .unwrap();
        let store = SnapshotStore::new(&storage);

        for round in 0..5 {
            store.save_snapshot(round, "{}").await.unwrap();
        }

        assert_eq!(store.prune(2).await.unwrap(), 3);
        assert_eq!(store.snapshot_count().await.unwrap(), 2);
        assert_eq!(store.load_latest().await.unwrap().unwrap().round, 4);
    }
}
