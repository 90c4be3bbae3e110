//! Turso Embedded / libSQL storage layer (offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding the history of
//! generated briefs and where each one was delivered.
//!
//! **Access rules:**
//! - `run` and `cleanup`: read-write via [`Storage::open`]
//! - `history` and `show`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use morningbrief_shared::{BriefDocument, BriefError, Result};

/// Summary row for a stored brief.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BriefRecord {
    pub id: String,
    /// `YYYY-MM-DD`.
    pub brief_date: String,
    pub generated_at: String,
    pub complete: bool,
    pub section_count: u32,
    /// SHA-256 of the stored JSON document.
    pub content_hash: String,
    /// Most recent delivery, if any.
    pub delivered_at: Option<String>,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: libsql::Error) -> BriefError {
    BriefError::Storage(e.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BriefError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BriefError::Storage(format!(
                "no brief history at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        BriefError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(BriefError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Brief operations
    // -----------------------------------------------------------------------

    /// Store a generated brief. Returns its record.
    pub async fn insert_brief(&self, doc: &BriefDocument) -> Result<BriefRecord> {
        self.check_writable()?;
        let json = serde_json::to_string(doc)
            .map_err(|e| BriefError::validation(format!("JSON serialization failed: {e}")))?;

        let record = BriefRecord {
            id: doc.id.to_string(),
            brief_date: doc.date.format("%Y-%m-%d").to_string(),
            generated_at: timestamp(doc.generated_at),
            complete: doc.complete,
            section_count: doc.sections.len() as u32,
            content_hash: content_hash(&json),
            delivered_at: None,
        };

        self.conn
            .execute(
                "INSERT INTO briefs (id, brief_date, generated_at, complete, section_count, content_hash, document_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.as_str(),
                    record.brief_date.as_str(),
                    record.generated_at.as_str(),
                    record.complete as i64,
                    record.section_count as i64,
                    record.content_hash.as_str(),
                    json.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;

        debug!(id = %record.id, hash = %record.content_hash, "brief stored");
        Ok(record)
    }

    /// Record a delivery of brief `id` to `destination` (a path or "stdout").
    pub async fn mark_delivered(&self, id: &str, destination: &str) -> Result<()> {
        self.check_writable()?;
        let now = timestamp(Utc::now());
        let affected = self
            .conn
            .execute(
                "INSERT INTO deliveries (brief_id, destination, delivered_at)
                 SELECT id, ?2, ?3 FROM briefs WHERE id = ?1",
                params![id, destination, now.as_str()],
            )
            .await
            .map_err(storage_err)?;

        if affected == 0 {
            return Err(BriefError::NotFound(format!("brief {id}")));
        }
        Ok(())
    }

    /// Most recently generated briefs first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<BriefRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT b.id, b.brief_date, b.generated_at, b.complete, b.section_count, b.content_hash,
                        (SELECT MAX(d.delivered_at) FROM deliveries d WHERE d.brief_id = b.id)
                 FROM briefs b
                 ORDER BY b.generated_at DESC
                 LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(BriefRecord {
                id: row.get::<String>(0).map_err(storage_err)?,
                brief_date: row.get::<String>(1).map_err(storage_err)?,
                generated_at: row.get::<String>(2).map_err(storage_err)?,
                complete: row.get::<i64>(3).map_err(storage_err)? != 0,
                section_count: row.get::<i64>(4).map_err(storage_err)? as u32,
                content_hash: row.get::<String>(5).map_err(storage_err)?,
                delivered_at: row.get::<Option<String>>(6).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Fetch the full document for brief `id`.
    pub async fn get_brief(&self, id: &str) -> Result<Option<BriefDocument>> {
        let mut rows = self
            .conn
            .query(
                "SELECT document_json FROM briefs WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let json = row.get::<String>(0).map_err(storage_err)?;
                let doc = serde_json::from_str(&json)
                    .map_err(|e| BriefError::parse(format!("stored brief {id}: {e}")))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Delete briefs generated more than `days` days ago, with their
    /// deliveries. Returns the number of briefs removed.
    pub async fn delete_older_than(&self, days: u32) -> Result<u64> {
        self.check_writable()?;
        let cutoff = timestamp(Utc::now() - Duration::days(i64::from(days)));

        self.conn
            .execute(
                "DELETE FROM deliveries WHERE brief_id IN
                 (SELECT id FROM briefs WHERE generated_at < ?1)",
                params![cutoff.as_str()],
            )
            .await
            .map_err(storage_err)?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM briefs WHERE generated_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(storage_err)?;

        info!(removed, days, "old briefs deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use morningbrief_shared::BriefId;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn doc(generated_at: DateTime<Utc>, complete: bool) -> BriefDocument {
        BriefDocument {
            id: BriefId::new(),
            date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            generated_at,
            sections: vec![],
            complete,
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn brief_roundtrip_and_delivery() {
        let storage = test_storage().await;
        let original = doc(Utc::now(), true);

        let record = storage.insert_brief(&original).await.expect("insert");
        assert_eq!(record.brief_date, "2026-10-17");
        assert_eq!(record.content_hash.len(), 64);

        let loaded = storage
            .get_brief(&record.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(loaded.id, original.id);
        assert!(loaded.complete);

        storage
            .mark_delivered(&record.id, "/tmp/brief.md")
            .await
            .expect("deliver");
        let listed = storage.list_recent(10).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert!(listed[0].delivered_at.is_some());
    }

    #[tokio::test]
    async fn mark_delivered_unknown_brief() {
        let storage = test_storage().await;
        let err = storage.mark_delivered("nope", "stdout").await.unwrap_err();
        assert!(matches!(err, BriefError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_limited() {
        let storage = test_storage().await;
        let old = doc(Utc::now() - Duration::hours(2), false);
        let new = doc(Utc::now(), true);
        storage.insert_brief(&old).await.unwrap();
        storage.insert_brief(&new).await.unwrap();

        let listed = storage.list_recent(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, new.id.to_string());
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_briefs() {
        let storage = test_storage().await;
        let stale = doc(Utc::now() - Duration::days(45), true);
        let fresh = doc(Utc::now(), true);
        storage.insert_brief(&stale).await.unwrap();
        storage.insert_brief(&fresh).await.unwrap();
        storage
            .mark_delivered(&stale.id.to_string(), "stdout")
            .await
            .unwrap();

        let removed = storage.delete_older_than(30).await.unwrap();
        assert_eq!(removed, 1);
        assert!(storage.get_brief(&stale.id.to_string()).await.unwrap().is_none());
        assert!(storage.get_brief(&fresh.id.to_string()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("mb_test_{}.db", Uuid::now_v7()));
        drop(Storage::open(&tmp).await.unwrap());

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let err = ro.insert_brief(&doc(Utc::now(), true)).await.unwrap_err();
        assert!(matches!(err, BriefError::Storage(_)));
        assert!(ro.list_recent(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("mb_missing_{}.db", Uuid::now_v7()));
        assert!(Storage::open_readonly(&tmp).await.is_err());
    }
}
