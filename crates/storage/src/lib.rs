use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use processor::{ContextError, StateReader, TransactionContext};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite, SqliteConnection, Transaction,
};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

use shared::{
    address::validate_address,
    domain::{SignerPublicKey, TransactionId, TransactionStatus},
    error::ApiError,
    protocol::TransactionReceipt,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One address written or removed by a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChange {
    pub address: String,
    pub data: Option<Vec<u8>>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool_options = if is_memory_url(database_url) {
            // One long-lived connection: the in-memory database lives and dies
            // with it, and state transactions queue instead of hitting locks.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Committed value at `address`, outside any transaction.
    pub async fn load_state(&self, address: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT data FROM state WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>(0)))
    }

    pub async fn count_state_entries(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM state")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Opens a state transaction that may only touch addresses under
    /// `namespaces`.
    pub async fn begin_state_transaction(&self, namespaces: &[String]) -> Result<StateTransaction> {
        let tx = self
            .pool
            .begin()
            .await
            .context("failed to begin state transaction")?;
        Ok(StateTransaction {
            tx,
            namespaces: namespaces.to_vec(),
            changes: BTreeMap::new(),
        })
    }

    pub async fn record_receipt(&self, receipt: &TransactionReceipt, payload: &[u8]) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_receipt(&mut conn, receipt, payload).await
    }

    pub async fn count_receipts(&self, status: TransactionStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn load_receipt(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<TransactionReceipt>> {
        let row = sqlx::query(
            "SELECT id, family_name, family_version, signer_public_key, status, error_json, created_at
             FROM transactions
             WHERE id = ?",
        )
        .bind(transaction_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        let error_json: Option<String> = row.try_get("error_json")?;
        let error = error_json
            .map(|raw| serde_json::from_str::<ApiError>(&raw))
            .transpose()
            .context("stored receipt has an unreadable error")?;

        Ok(Some(TransactionReceipt {
            transaction_id: TransactionId(Uuid::parse_str(&id)?),
            family_name: row.try_get("family_name")?,
            family_version: row.try_get("family_version")?,
            signer_public_key: SignerPublicKey(row.try_get("signer_public_key")?),
            status: TransactionStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown transaction status {status:?}"))?,
            error,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        }))
    }
}

/// State access for one ledger transaction, backed by a SQLite transaction.
///
/// Nothing is visible to other readers until [`StateTransaction::commit`];
/// dropping the value rolls everything back.
pub struct StateTransaction {
    tx: Transaction<'static, Sqlite>,
    namespaces: Vec<String>,
    changes: BTreeMap<String, Option<Vec<u8>>>,
}

impl StateTransaction {
    pub async fn record_receipt(
        &mut self,
        receipt: &TransactionReceipt,
        payload: &[u8],
    ) -> Result<()> {
        insert_receipt(&mut self.tx, receipt, payload).await
    }

    pub async fn commit(self) -> Result<Vec<StoredChange>> {
        self.tx
            .commit()
            .await
            .context("failed to commit state transaction")?;
        Ok(self
            .changes
            .into_iter()
            .map(|(address, data)| StoredChange { address, data })
            .collect())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("failed to roll back state transaction")
    }

    fn check_address(&self, address: &str) -> Result<(), ContextError> {
        validate_address(address).map_err(|_| ContextError::InvalidAddress(address.to_string()))?;
        if self
            .namespaces
            .iter()
            .any(|prefix| address.starts_with(prefix.as_str()))
        {
            Ok(())
        } else {
            Err(ContextError::OutsideNamespace(address.to_string()))
        }
    }
}

#[async_trait]
impl StateReader for StateTransaction {
    async fn get_state(
        &mut self,
        addresses: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, ContextError> {
        let mut found = HashMap::with_capacity(addresses.len());
        for address in addresses {
            self.check_address(address)?;
            let row = sqlx::query("SELECT data FROM state WHERE address = ?")
                .bind(address)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(backend)?;
            if let Some(row) = row {
                found.insert(address.clone(), row.get::<Vec<u8>, _>(0));
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl TransactionContext for StateTransaction {
    async fn set_state(
        &mut self,
        entries: HashMap<String, Vec<u8>>,
    ) -> Result<Vec<String>, ContextError> {
        let mut written = Vec::with_capacity(entries.len());
        for (address, data) in entries {
            self.check_address(&address)?;
            let affected = sqlx::query(
                "INSERT INTO state (address, data, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(address) DO UPDATE SET data=excluded.data, updated_at=excluded.updated_at",
            )
            .bind(&address)
            .bind(&data)
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?
            .rows_affected();
            if affected > 0 {
                debug!(%address, bytes = data.len(), "state entry written");
                self.changes.insert(address.clone(), Some(data));
                written.push(address);
            }
        }
        Ok(written)
    }

    async fn delete_state(&mut self, addresses: &[String]) -> Result<Vec<String>, ContextError> {
        let mut removed = Vec::with_capacity(addresses.len());
        for address in addresses {
            self.check_address(address)?;
            let affected = sqlx::query("DELETE FROM state WHERE address = ?")
                .bind(address)
                .execute(&mut *self.tx)
                .await
                .map_err(backend)?
                .rows_affected();
            if affected > 0 {
                debug!(%address, "state entry removed");
                self.changes.insert(address.clone(), None);
                removed.push(address.clone());
            }
        }
        Ok(removed)
    }
}

fn backend(err: sqlx::Error) -> ContextError {
    ContextError::Backend(err.to_string())
}

async fn insert_receipt(
    conn: &mut SqliteConnection,
    receipt: &TransactionReceipt,
    payload: &[u8],
) -> Result<()> {
    let error_json = receipt
        .error
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    sqlx::query(
        "INSERT INTO transactions
             (id, family_name, family_version, signer_public_key, payload, status, error_json, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(receipt.transaction_id.to_string())
    .bind(&receipt.family_name)
    .bind(&receipt.family_version)
    .bind(&receipt.signer_public_key.0)
    .bind(payload)
    .bind(receipt.status.as_str())
    .bind(error_json)
    .bind(receipt.created_at)
    .execute(conn)
    .await
    .with_context(|| format!("failed to record receipt {}", receipt.transaction_id))?;
    Ok(())
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
