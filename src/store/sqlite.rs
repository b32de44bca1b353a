use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;

use super::{AccountStore, LinkOutcome, LocalAccount, LocalUserId, NewAccount, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        real_name TEXT NOT NULL,
        email TEXT,
        email_authenticated_at TEXT,
        password_hash TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS external_user (
        external_id TEXT PRIMARY KEY NOT NULL,
        local_user_id INTEGER NOT NULL REFERENCES users(id)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` in WAL mode
    /// and apply the schema.
    #[tracing::instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        tracing::debug!("account store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_account(&self, account: NewAccount) -> Result<LocalAccount, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut *conn, account).await
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn find_link(&self, external_id: &str) -> Result<Option<LocalUserId>, StoreError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT local_user_id FROM external_user WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(LocalUserId))
    }

    async fn get_account(&self, id: LocalUserId) -> Result<Option<LocalAccount>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, real_name, email, email_authenticated_at, password_hash, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| account_from_row(&row)).transpose()
    }

    async fn is_name_taken(&self, name: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    #[tracing::instrument(skip(self, account), fields(name = %account.name))]
    async fn create_linked_account(
        &self,
        account: NewAccount,
        external_id: &str,
    ) -> Result<LinkOutcome, StoreError> {
        // Take the write lock up front so a concurrent writer waits on
        // busy_timeout instead of failing the deferred read-to-write upgrade.
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT local_user_id FROM external_user WHERE external_id = ?")
                .bind(external_id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(existing) = existing {
            tx.rollback().await?;
            return Ok(LinkOutcome::AlreadyLinked(LocalUserId(existing)));
        }

        let created = insert_user(&mut *tx, account).await?;

        let linked = sqlx::query(
            r#"
            INSERT INTO external_user (external_id, local_user_id)
            VALUES (?, ?)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(external_id)
        .bind(created.id.0)
        .execute(&mut *tx)
        .await?;

        if linked.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!("external id linked concurrently, discarding new account");
            return self
                .find_link(external_id)
                .await?
                .map(LinkOutcome::AlreadyLinked)
                .ok_or_else(|| StoreError::Corrupt(format!("link {external_id} vanished")));
        }

        tx.commit().await?;
        Ok(LinkOutcome::Created(created))
    }
}

async fn insert_user(
    conn: &mut sqlx::SqliteConnection,
    account: NewAccount,
) -> Result<LocalAccount, StoreError> {
    let created_at = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, real_name, email, email_authenticated_at, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&account.name)
    .bind(&account.real_name)
    .bind(&account.email)
    .bind(account.email_authenticated_at.map(|at| at.to_rfc3339()))
    .bind(&account.password_hash)
    .bind(created_at.to_rfc3339())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => Ok(account.into_account(LocalUserId(done.last_insert_rowid()), created_at)),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(StoreError::UsernameTaken(account.name))
        }
        Err(err) => Err(err.into()),
    }
}

fn account_from_row(row: &SqliteRow) -> Result<LocalAccount, StoreError> {
    let email_authenticated_at: Option<String> = row.try_get("email_authenticated_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(LocalAccount {
        id: LocalUserId(row.try_get("id")?),
        name: row.try_get("name")?,
        real_name: row.try_get("real_name")?,
        email: row.try_get("email")?,
        email_authenticated_at: email_authenticated_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp `{value}`: {err}")))
}
