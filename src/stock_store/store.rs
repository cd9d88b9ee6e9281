use super::models::Stock;
use super::schema::STOCK_VERSIONED_SCHEMAS;
use super::trait_def::StockStore;
use crate::audit::{SqlValue, StatementAuditLog};
use crate::sqlite_persistence;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// SQLite-backed stock store.
///
/// Every statement, read or write, goes through the audit log; the log
/// itself decides that reads produce no entry. The bind values handed to
/// the logger are the exact values bound for execution.
pub struct SqliteStockStore {
    conn: Arc<Mutex<Connection>>,
    audit: Arc<StatementAuditLog>,
}

impl SqliteStockStore {
    pub fn new<P: AsRef<Path>>(db_path: P, audit: Arc<StatementAuditLog>) -> Result<Self> {
        let path = db_path.as_ref();
        if !path.exists() {
            info!("Creating new stock database at {:?}", path);
        }
        let conn = sqlite_persistence::open_versioned(path, STOCK_VERSIONED_SCHEMAS)
            .context("Failed to open stock database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            audit,
        })
    }

    pub fn in_memory(audit: Arc<StatementAuditLog>) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        sqlite_persistence::migrate(&mut conn, STOCK_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            audit,
        })
    }

    /// Run a mutating statement; the audit entry is produced before the
    /// statement executes, inside the logger's own critical section.
    fn execute(&self, sql: &str, values: &[SqlValue]) -> Result<usize> {
        self.audit.maybe_log(sql, values);
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(sql, params_from_iter(values.iter()))?;
        Ok(changed)
    }

    fn row_to_stock(row: &rusqlite::Row) -> rusqlite::Result<Stock> {
        let favorite: i64 = row.get("favorite")?;
        Ok(Stock {
            code: row.get("code")?,
            name: row.get("name")?,
            price: row.get("price")?,
            rsi: row.get("rsi")?,
            buy_price: row.get("buy_price")?,
            sell_price: row.get("sell_price")?,
            shares: row.get("shares")?,
            favorite: favorite != 0,
            updated_at: row.get("updated_at")?,
            created_at: row.get("created_at")?,
        })
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }
}

impl StockStore for SqliteStockStore {
    fn list_stocks(&self) -> Result<Vec<Stock>> {
        let sql = "SELECT * FROM stocks";
        self.audit.maybe_log(sql, &[]);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let stocks = stmt
            .query_map([], Self::row_to_stock)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stocks)
    }

    fn list_codes(&self) -> Result<Vec<String>> {
        let sql = "SELECT code FROM stocks";
        self.audit.maybe_log(sql, &[]);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let codes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(codes)
    }

    fn get_stock(&self, code: &str) -> Result<Option<Stock>> {
        let sql = "SELECT * FROM stocks WHERE code = ?";
        let values = [SqlValue::from(code)];
        self.audit.maybe_log(sql, &values);
        let conn = self.conn.lock().unwrap();
        let stock = conn
            .query_row(sql, params_from_iter(values.iter()), Self::row_to_stock)
            .optional()?;
        Ok(stock)
    }

    fn upsert_stock(&self, code: &str, name: &str) -> Result<()> {
        let now = Self::now();
        self.execute(
            "INSERT INTO stocks (code, name, updated_at, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(code) DO UPDATE SET name = excluded.name, updated_at = excluded.updated_at",
            &[code.into(), name.into(), now.into(), now.into()],
        )?;
        Ok(())
    }

    fn set_buy_price(&self, code: &str, price: f64) -> Result<bool> {
        let changed = self.execute(
            "UPDATE stocks SET buy_price = ?, updated_at = ? WHERE code = ?",
            &[price.into(), Self::now().into(), code.into()],
        )?;
        Ok(changed > 0)
    }

    fn set_sell_price(&self, code: &str, price: f64) -> Result<bool> {
        let changed = self.execute(
            "UPDATE stocks SET sell_price = ?, updated_at = ? WHERE code = ?",
            &[price.into(), Self::now().into(), code.into()],
        )?;
        Ok(changed > 0)
    }

    fn set_shares(&self, code: &str, shares: i64) -> Result<bool> {
        let changed = self.execute(
            "UPDATE stocks SET shares = ?, updated_at = ? WHERE code = ?",
            &[shares.into(), Self::now().into(), code.into()],
        )?;
        Ok(changed > 0)
    }

    fn set_favorite(&self, code: &str, favorite: bool) -> Result<bool> {
        let changed = self.execute(
            "UPDATE stocks SET favorite = ?, updated_at = ? WHERE code = ?",
            &[favorite.into(), Self::now().into(), code.into()],
        )?;
        Ok(changed > 0)
    }

    fn set_analysis(&self, code: &str, price: f64, rsi: Option<f64>) -> Result<bool> {
        let changed = self.execute(
            "UPDATE stocks SET price = ?, rsi = ?, updated_at = ? WHERE code = ?",
            &[price.into(), rsi.into(), Self::now().into(), code.into()],
        )?;
        Ok(changed > 0)
    }

    fn find_stale(&self, now: i64, threshold: Duration) -> Result<Vec<String>> {
        // Strict inequality: a record exactly `threshold` old is not stale.
        // Thresholds beyond the epoch range saturate instead of wrapping, so
        // an enormous threshold selects nothing by age.
        let threshold_secs = i64::try_from(threshold.as_secs()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(threshold_secs);
        let sql = "SELECT code FROM stocks WHERE updated_at < ? OR price IS NULL";
        let values = [SqlValue::from(cutoff)];
        self.audit.maybe_log(sql, &values);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let codes = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(codes)
    }
}
