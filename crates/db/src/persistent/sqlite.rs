//! SQLite implementation of the persistent storage layer.
//!
//! Entities are stored as JSON documents next to the few columns the relayer queries by, so the
//! schema does not have to follow every change to the entity types.

use std::path::Path;

use async_trait::async_trait;
use chrono::DateTime;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tbtc_relayer_primitives::prelude::{
    BlockHeight, ChainName, Deposit, DepositId, DepositStatus, Redemption, RedemptionId,
    RedemptionStatus, Timestamp,
};
use tracing::info;

use super::{config::DbConfig, errors::StorageError};
use crate::{
    audit::{AuditEntry, AuditError, AuditEvent, AuditLog, EntityKind},
    deposits::DepositDb,
    errors::{DbError, DbResult},
    redemptions::RedemptionDb,
    tracker::BlockCursorDb,
};

/// Every storage trait on top of one SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Wraps an existing pool. Migrations are not applied, see [`Self::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database file inside `datadir` and applies migrations.
    pub async fn connect(datadir: impl AsRef<Path>, config: &DbConfig) -> DbResult<Self> {
        let datadir = datadir.as_ref();
        tokio::fs::create_dir_all(datadir)
            .await
            .map_err(StorageError::from)?;

        let db_path = config.db_path(datadir);
        info!(action = "opening database", ?db_path);

        let connect_options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections())
            .connect_with(connect_options)
            .await
            .map_err(StorageError::from)?;

        let db = Self::new(pool);
        db.migrate().await?;

        Ok(db)
    }

    /// Opens a private in-memory database with migrations applied.
    pub async fn in_memory() -> DbResult<Self> {
        // every connection to `:memory:` sees its own database, so the pool is pinned to one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(StorageError::from)?;

        let db = Self::new(pool);
        db.migrate().await?;

        Ok(db)
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> DbResult<()> {
        info!(action = "running migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    /// Gets the audit trail of a single entity, oldest first.
    pub async fn get_audit_entries(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> DbResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT data, recorded_at FROM audit_log
                WHERE entity_kind = $1 AND entity_id = $2
                ORDER BY seq",
        )
        .bind(kind.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        rows.into_iter()
            .map(|(data, recorded_at)| {
                let event: AuditEvent = decode(&data)?;
                let recorded_at = DateTime::from_timestamp_millis(recorded_at).ok_or_else(|| {
                    StorageError::MismatchedTypes(format!("invalid timestamp {recorded_at}"))
                })?;

                Ok::<_, DbError>(AuditEntry {
                    kind,
                    entity_id: entity_id.to_string(),
                    event,
                    recorded_at,
                })
            })
            .collect()
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T, StorageError> {
    Ok(serde_json::from_str(data)?)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<String>) -> DbResult<Vec<T>> {
    rows.iter()
        .map(|data| decode(data).map_err(DbError::from))
        .collect()
}

#[async_trait]
impl DepositDb for SqliteDb {
    async fn get_deposit(&self, id: &DepositId) -> DbResult<Option<Deposit>> {
        let row = sqlx::query_scalar::<_, String>("SELECT data FROM deposits WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|data| decode(&data)).transpose()?)
    }

    async fn create_deposit(&self, deposit: &Deposit) -> DbResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO deposits
                (id, chain, status, last_activity_at, data)
                VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(deposit.id.to_string())
        .bind(deposit.chain.as_str())
        .bind(deposit.status.as_str())
        .bind(deposit.dates.last_activity_at.timestamp_millis())
        .bind(encode(deposit)?)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::AlreadyExists {
                kind: "deposit",
                id: deposit.id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_deposit(&self, deposit: &Deposit, expected: DepositStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE deposits
                SET status = $1, last_activity_at = $2, data = $3
                WHERE id = $4 AND status = $5",
        )
        .bind(deposit.status.as_str())
        .bind(deposit.dates.last_activity_at.timestamp_millis())
        .bind(encode(deposit)?)
        .bind(deposit.id.to_string())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM deposits WHERE id = $1")
            .bind(deposit.id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let id = deposit.id.to_string();
        if exists == 0 {
            Err(DbError::NotFound {
                kind: "deposit",
                id,
            })
        } else {
            Err(DbError::StatusChanged {
                kind: "deposit",
                id,
                expected: expected.as_str(),
            })
        }
    }

    async fn get_deposits_by_status(
        &self,
        chain: &ChainName,
        status: DepositStatus,
    ) -> DbResult<Vec<Deposit>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT data FROM deposits
                WHERE chain = $1 AND status = $2
                ORDER BY last_activity_at",
        )
        .bind(chain.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        decode_all(rows)
    }
}

#[async_trait]
impl RedemptionDb for SqliteDb {
    async fn get_redemption(&self, id: &RedemptionId) -> DbResult<Option<Redemption>> {
        let row = sqlx::query_scalar::<_, String>("SELECT data FROM redemptions WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|data| decode(&data)).transpose()?)
    }

    async fn create_redemption(&self, redemption: &Redemption) -> DbResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO redemptions
                (id, chain, status, last_activity_at, data)
                VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(redemption.id.to_string())
        .bind(redemption.chain.as_str())
        .bind(redemption.status.as_str())
        .bind(redemption.dates.last_activity_at.timestamp_millis())
        .bind(encode(redemption)?)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::AlreadyExists {
                kind: "redemption",
                id: redemption.id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_redemption(&self, redemption: &Redemption) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE redemptions
                SET status = $1, last_activity_at = $2, data = $3
                WHERE id = $4",
        )
        .bind(redemption.status.as_str())
        .bind(redemption.dates.last_activity_at.timestamp_millis())
        .bind(encode(redemption)?)
        .bind(redemption.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                kind: "redemption",
                id: redemption.id.to_string(),
            });
        }

        Ok(())
    }

    async fn get_redemptions_by_status(
        &self,
        chain: &ChainName,
        status: RedemptionStatus,
    ) -> DbResult<Vec<Redemption>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT data FROM redemptions
                WHERE chain = $1 AND status = $2
                ORDER BY last_activity_at",
        )
        .bind(chain.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)?;

        decode_all(rows)
    }

    async fn delete_settled_redemptions_before(&self, cutoff: Timestamp) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM redemptions
                WHERE status IN ($1, $2) AND last_activity_at < $3",
        )
        .bind(RedemptionStatus::Completed.as_str())
        .bind(RedemptionStatus::Failed.as_str())
        .bind(cutoff.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditLog for SqliteDb {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let data = encode(&entry.event).map_err(DbError::from)?;

        sqlx::query(
            "INSERT INTO audit_log
                (entity_kind, entity_id, event, data, recorded_at)
                VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(entry.kind.as_str())
        .bind(entry.entity_id.as_str())
        .bind(entry.event.name())
        .bind(data)
        .bind(entry.recorded_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(StorageError::from(e)))?;

        Ok(())
    }
}

#[async_trait]
impl BlockCursorDb for SqliteDb {
    async fn get_last_scanned_block(&self, stream: &str) -> DbResult<Option<BlockHeight>> {
        let height = sqlx::query_scalar::<_, i64>(
            "SELECT block_height FROM block_cursors WHERE stream = $1",
        )
        .bind(stream)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from)?;

        height
            .map(|h| {
                BlockHeight::try_from(h).map_err(|_| {
                    DbError::from(StorageError::MismatchedTypes(format!(
                        "negative block height {h} for {stream}"
                    )))
                })
            })
            .transpose()
    }

    async fn set_last_scanned_block(&self, stream: &str, height: BlockHeight) -> DbResult<()> {
        let height = i64::try_from(height).map_err(|_| {
            StorageError::MismatchedTypes(format!("block height {height} does not fit in i64"))
        })?;

        sqlx::query(
            "INSERT INTO block_cursors (stream, block_height) VALUES ($1, $2)
                ON CONFLICT(stream) DO UPDATE SET block_height = excluded.block_height",
        )
        .bind(stream)
        .bind(height)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use chrono::{Duration, Utc};

    use super::*;
    use crate::test_utils::{test_deposit, test_redemption};

    #[tokio::test]
    async fn deposits_survive_a_round_trip_through_sqlite() {
        let db = SqliteDb::in_memory().await.unwrap();
        let mut deposit = test_deposit("arbitrum", 0);

        db.create_deposit(&deposit).await.unwrap();
        assert!(matches!(
            db.create_deposit(&deposit).await,
            Err(DbError::AlreadyExists { .. })
        ));

        deposit
            .record_initialized(B256::repeat_byte(0xab), Utc::now())
            .unwrap();
        db.update_deposit(&deposit, DepositStatus::Queued)
            .await
            .unwrap();

        let stored = db.get_deposit(&deposit.id).await.unwrap();
        assert_eq!(stored, Some(deposit.clone()));

        let chain = ChainName::from("arbitrum");
        let initialized = db
            .get_deposits_by_status(&chain, DepositStatus::Initialized)
            .await
            .unwrap();
        assert_eq!(initialized, vec![deposit]);
        assert!(db
            .get_deposits_by_status(&chain, DepositStatus::Queued)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_deposit_fails() {
        let db = SqliteDb::in_memory().await.unwrap();

        let err = db
            .update_deposit(&test_deposit("arbitrum", 9), DepositStatus::Queued)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_does_not_overwrite_a_newer_status() {
        let db = SqliteDb::in_memory().await.unwrap();
        let mut deposit = test_deposit("arbitrum", 5);
        db.create_deposit(&deposit).await.unwrap();

        let stale = deposit.clone();
        deposit
            .record_initialized(B256::repeat_byte(0xab), Utc::now())
            .unwrap();
        db.update_deposit(&deposit, DepositStatus::Queued)
            .await
            .unwrap();

        let mut regressed = stale;
        regressed.record_error("late writer", Utc::now());
        let err = db
            .update_deposit(&regressed, DepositStatus::Queued)
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::StatusChanged { .. }));
        assert_eq!(db.get_deposit(&deposit.id).await.unwrap(), Some(deposit));
    }

    #[tokio::test]
    async fn retention_sweep_keeps_active_redemptions() {
        let db = SqliteDb::in_memory().await.unwrap();
        let old = Utc::now() - Duration::days(10);

        let mut failed = test_redemption("base", 1, old);
        failed.record_vaa(vec![7u8].into(), old).unwrap();
        failed.record_failed("reverted", None, old).unwrap();
        let pending = test_redemption("base", 2, old);

        db.create_redemption(&failed).await.unwrap();
        db.create_redemption(&pending).await.unwrap();

        let deleted = db
            .delete_settled_redemptions_before(Utc::now() - Duration::days(1))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(db.get_redemption(&failed.id).await.unwrap().is_none());
        assert_eq!(
            db.get_redemptions_by_status(&ChainName::from("base"), RedemptionStatus::Pending)
                .await
                .unwrap(),
            vec![pending]
        );
    }

    #[tokio::test]
    async fn audit_entries_are_appended_in_order() {
        let db = SqliteDb::in_memory().await.unwrap();
        let now = Utc::now();

        let events = [
            AuditEvent::Created {
                status: "QUEUED".to_string(),
            },
            AuditEvent::StatusChanged {
                from: "QUEUED".to_string(),
                to: "INITIALIZED".to_string(),
            },
        ];
        for event in events.clone() {
            db.record(&AuditEntry {
                kind: EntityKind::Deposit,
                entity_id: "42".to_string(),
                event,
                recorded_at: now,
            })
            .await
            .unwrap();
        }

        let entries = db
            .get_audit_entries(EntityKind::Deposit, "42")
            .await
            .unwrap();
        let recorded: Vec<_> = entries.into_iter().map(|e| e.event).collect();
        assert_eq!(recorded, events.to_vec());
        assert!(db
            .get_audit_entries(EntityKind::Redemption, "42")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn database_file_persists_across_reopen() {
        let datadir = tempfile::tempdir().unwrap();
        let config = DbConfig::default();
        let deposit = test_deposit("starknet", 4);

        {
            let db = SqliteDb::connect(datadir.path(), &config).await.unwrap();
            db.create_deposit(&deposit).await.unwrap();
            db.set_last_scanned_block("starknet:bridge", 1_234)
                .await
                .unwrap();
        }

        let db = SqliteDb::connect(datadir.path(), &config).await.unwrap();
        assert_eq!(db.get_deposit(&deposit.id).await.unwrap(), Some(deposit));
        assert_eq!(
            db.get_last_scanned_block("starknet:bridge").await.unwrap(),
            Some(1_234)
        );
    }
}
