mod models;

pub use models::*;

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a connection waits on another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const SELECT_RECORD: &str = r#"
    SELECT id, name, event, issue_date, COALESCE(number, printf('CERT-%04d', id)) AS number
    FROM certificates
"#;

/// Append-only table of issued certificates.
///
/// Every operation opens its own connection and closes it before returning,
/// so a store can be cloned freely and nothing is held between calls.
#[derive(Clone, Debug)]
pub struct CertificateStore {
    path: PathBuf,
}

impl CertificateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<SqliteConnection, sqlx::Error> {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .connect()
            .await
    }

    /// Creates the schema if needed. Safe to call on every startup.
    pub async fn initialize(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.connect().await?;
        MIGRATOR.run(&mut conn).await?;
        conn.close().await
    }

    /// Previews the number the next auto-numbered insert would receive.
    ///
    /// Read-only: two callers can see the same value. Issuance goes through
    /// [`CertificateStore::insert_then`], which numbers from the id it was
    /// actually assigned.
    pub async fn next_number(&self) -> Result<String, sqlx::Error> {
        let mut conn = self.connect().await?;
        let max_id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM certificates")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok(format_number(max_id.unwrap_or(0) + 1))
    }

    pub async fn insert(&self, new: &NewCertificate) -> Result<CertificateRecord, sqlx::Error> {
        let (record, ()) = self
            .insert_then(new, |_| Ok::<_, sqlx::Error>(()))
            .await?;
        Ok(record)
    }

    /// Inserts `new` and runs `finish` on the stored record inside the same
    /// transaction. The row is committed only when `finish` succeeds.
    pub async fn insert_then<T, E, F>(
        &self,
        new: &NewCertificate,
        finish: F,
    ) -> Result<(CertificateRecord, T), E>
    where
        F: FnOnce(&CertificateRecord) -> Result<T, E>,
        E: From<sqlx::Error>,
    {
        let mut conn = self.connect().await?;
        // IMMEDIATE takes the write lock up front, so concurrent issuers queue
        // on the busy timeout instead of failing a lock upgrade.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut conn).await?;

        let issue_date = new.issue_date.format("%Y-%m-%d").to_string();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO certificates (name, event, issue_date, number)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(&new.name)
        .bind(&new.event)
        .bind(&issue_date)
        .bind(new.number.as_deref())
        .fetch_one(&mut conn)
        .await?;

        let number = match &new.number {
            Some(number) => number.clone(),
            None => {
                let number = format_number(id);
                sqlx::query("UPDATE certificates SET number = ?1 WHERE id = ?2")
                    .bind(&number)
                    .bind(id)
                    .execute(&mut conn)
                    .await?;
                number
            }
        };

        let record = CertificateRecord {
            id,
            name: new.name.clone(),
            event: new.event.clone(),
            issue_date,
            number,
        };

        let finished = match finish(&record) {
            Ok(value) => value,
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut conn).await {
                    tracing::error!("Rollback after failed insert did not complete: {}", rollback);
                }
                if let Err(close) = conn.close().await {
                    tracing::warn!("Failed to close connection after rollback: {}", close);
                }
                return Err(e);
            }
        };

        sqlx::query("COMMIT").execute(&mut conn).await?;
        conn.close().await?;
        Ok((record, finished))
    }

    pub async fn get(&self, id: i64) -> Result<Option<CertificateRecord>, sqlx::Error> {
        let mut conn = self.connect().await?;
        let record = sqlx::query_as::<_, CertificateRecord>(&format!("{SELECT_RECORD} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;
        Ok(record)
    }

    /// Newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<CertificateRecord>, sqlx::Error> {
        let mut conn = self.connect().await?;
        let records = sqlx::query_as::<_, CertificateRecord>(&format!(
            "{SELECT_RECORD} ORDER BY id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;
        Ok(records)
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let mut conn = self.connect().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM certificates")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok(count)
    }
}
