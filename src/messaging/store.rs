//! Credential Store
//!
//! Durable record of this device's registered identity. The bridge handles
//! exactly one device, so the SQLite store keeps a single row.

use super::jid::Jid;
use super::traits::{BridgeError, BridgeResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Registered account of this device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub jid: Jid,
    /// Unix seconds when pairing completed
    pub paired_at: u64,
}

impl Identity {
    pub fn new(jid: Jid, paired_at: u64) -> Self {
        Self { jid, paired_at }
    }
}

/// Credential store abstraction
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the stored identity, if pairing has ever completed
    async fn load_identity(&self) -> BridgeResult<Option<Identity>>;

    /// Persist the identity (replacing any previous one)
    async fn save_identity(&self, identity: &Identity) -> BridgeResult<()>;

    /// Forget the stored identity
    async fn clear_identity(&self) -> BridgeResult<()>;

    async fn identity_exists(&self) -> BridgeResult<bool> {
        Ok(self.load_identity().await?.is_some())
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS device (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    jid TEXT NOT NULL,
    paired_at INTEGER NOT NULL
)";

/// SQLite-backed credential store
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Open (or create) the store database at `path`
    pub async fn open(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BridgeError::Store(format!(
                    "Failed to create store directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                BridgeError::Store(format!("Failed to open '{}': {}", path.display(), e))
            })?;

        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to create schema: {}", e)))?;

        tracing::debug!(path = %path.display(), "credential store opened");

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load_identity(&self) -> BridgeResult<Option<Identity>> {
        let row = sqlx::query("SELECT jid, paired_at FROM device WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to load identity: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw_jid: String = row
            .try_get("jid")
            .map_err(|e| BridgeError::Store(format!("Corrupt device row: {}", e)))?;
        let paired_at: i64 = row
            .try_get("paired_at")
            .map_err(|e| BridgeError::Store(format!("Corrupt device row: {}", e)))?;

        let jid = raw_jid
            .parse::<Jid>()
            .map_err(|e| BridgeError::Store(format!("Stored identity is invalid: {}", e)))?;

        let paired_at = u64::try_from(paired_at).map_err(|_| {
            BridgeError::Store(format!("Corrupt device row: negative paired_at {}", paired_at))
        })?;

        Ok(Some(Identity::new(jid, paired_at)))
    }

    async fn save_identity(&self, identity: &Identity) -> BridgeResult<()> {
        let paired_at = i64::try_from(identity.paired_at).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO device (id, jid, paired_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET jid = excluded.jid, paired_at = excluded.paired_at",
        )
        .bind(identity.jid.to_string())
        .bind(paired_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::Store(format!("Failed to save identity: {}", e)))?;

        Ok(())
    }

    async fn clear_identity(&self) -> BridgeResult<()> {
        sqlx::query("DELETE FROM device")
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::Store(format!("Failed to clear identity: {}", e)))?;
        Ok(())
    }
}

/// In-memory credential store (nothing survives the process)
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    identity: Mutex<Option<Identity>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load_identity(&self) -> BridgeResult<Option<Identity>> {
        Ok(self
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save_identity(&self, identity: &Identity) -> BridgeResult<()> {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());
        Ok(())
    }

    async fn clear_identity(&self) -> BridgeResult<()> {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
