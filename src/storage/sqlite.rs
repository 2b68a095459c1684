use anyhow::{Context, Result};
use log::{debug, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use super::{Collection, DocumentStore, DocumentWrite};

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Documents kept as rows of a single SQLite table.
///
/// A multi-document commit runs in one immediate transaction, so the version
/// check and the writes are not interleaved with another process's commit.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// `busy_timeout` bounds how long a connection waits on another writer
    pub fn open<P: AsRef<Path>>(database_path: P, busy_timeout: Duration) -> Result<Self> {
        let pool = create_pool(database_path.as_ref(), busy_timeout)?;
        let mut conn = get_connection(&pool)?;
        ensure_schema(&mut conn)?;

        info!("Opened SQLite store at {}", database_path.as_ref().display());
        Ok(Self { pool })
    }
}

impl DocumentStore for SqliteStore {
    fn load(&self, collection: Collection) -> Result<Option<String>> {
        let conn = get_connection(&self.pool)?;
        let sql = "SELECT body FROM documents WHERE name = ?1";

        let body = conn
            .query_row(sql, params![collection.name()], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to query {} document", collection))?;

        debug!("Loaded {} document from SQLite", collection);
        Ok(body)
    }

    fn commit(&self, writes: &[DocumentWrite]) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;

        let version_sql = "SELECT version FROM documents WHERE name = ?1";
        for write in writes {
            let stored: Option<i64> = tx
                .query_row(version_sql, params![write.collection.name()], |row| row.get(0))
                .optional()
                .with_context(|| format!("Failed to query {} version", write.collection))?;
            write.check(stored.unwrap_or(0) as u64)?;
        }

        let sql = "INSERT INTO documents (name, version, body) VALUES (?1, ?2, ?3) ON CONFLICT(name) DO UPDATE SET version = excluded.version, body = excluded.body, updated_at = CURRENT_TIMESTAMP";
        for write in writes {
            tx.execute(
                sql,
                params![write.collection.name(), write.version as i64, write.body],
            )
            .with_context(|| format!("Failed to store {} document", write.collection))?;
        }

        tx.commit().context("Failed to commit documents")?;

        for write in writes {
            info!("Saved {} document v{} to SQLite", write.collection, write.version);
        }
        Ok(())
    }
}

fn create_pool(database_path: &Path, busy_timeout: Duration) -> Result<DbPool> {
    let manager = build_manager(database_path, busy_timeout);
    build_pool(manager)
}

fn build_manager(path: &Path, busy_timeout: Duration) -> SqliteConnectionManager {
    SqliteConnectionManager::file(path).with_init(move |conn| conn.busy_timeout(busy_timeout))
}

fn build_pool(manager: SqliteConnectionManager) -> Result<DbPool> {
    r2d2::Pool::builder()
        .build(manager)
        .context("Failed to create database connection pool")
}

fn get_connection(pool: &DbPool) -> Result<DbConn> {
    pool.get()
        .context("Failed to get database connection from pool")
}

fn ensure_schema(conn: &mut DbConn) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    let statements = split_sql_statements(schema_sql);

    for (idx, statement) in statements.iter().enumerate() {
        conn.execute(statement, [])
            .with_context(|| format!("Failed to execute statement {}", idx + 1))?;
    }

    debug!("Database schema ensured");
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
