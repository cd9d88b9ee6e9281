//! SQLite schema for the stock database.

use crate::sqlite_persistence::VersionedSchema;

pub const STOCK_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    statements: &[
        "CREATE TABLE stocks (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            price REAL,
            rsi REAL,
            buy_price REAL,
            sell_price REAL,
            shares INTEGER,
            favorite INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );",
        "CREATE INDEX idx_stocks_updated_at ON stocks(updated_at);",
    ],
}];
