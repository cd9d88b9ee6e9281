use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// One schema step. Version 1 is the initial DDL; later versions carry the
/// statements that migrate a database from the previous version.
pub struct VersionedSchema {
    pub version: i64,
    pub statements: &'static [&'static str],
}

impl VersionedSchema {
    fn apply(&self, conn: &Connection) -> Result<()> {
        for statement in self.statements {
            conn.execute(statement, [])
                .with_context(|| format!("Failed to apply schema v{}", self.version))?;
        }
        Ok(())
    }
}

/// Open (or create) a database file and bring it up to the latest schema
/// version.
pub fn open_versioned<P: AsRef<Path>>(path: P, schemas: &[VersionedSchema]) -> Result<Connection> {
    let mut conn = Connection::open(path.as_ref()).context("Failed to open database")?;
    migrate(&mut conn, schemas)?;
    Ok(conn)
}

/// Bring an already open connection up to the latest schema version. Steps
/// are applied in order inside a single transaction, so a failed migration
/// leaves the database untouched.
pub fn migrate(conn: &mut Connection, schemas: &[VersionedSchema]) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let current: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = schemas.last().map(|s| s.version).unwrap_or(0);

    if current > latest {
        bail!(
            "Database version {} is newer than this build supports ({})",
            current,
            latest
        );
    }

    if current < latest {
        if current > 0 {
            info!("Migrating database from version {} to {}", current, latest);
        }
        let tx = conn.transaction()?;
        for schema in schemas.iter().filter(|s| s.version > current) {
            schema.apply(&tx)?;
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", latest))?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const V1: VersionedSchema = VersionedSchema {
        version: 1,
        statements: &["CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT NOT NULL);"],
    };

    const V2: VersionedSchema = VersionedSchema {
        version: 2,
        statements: &["ALTER TABLE things ADD COLUMN color TEXT;"],
    };

    #[test]
    fn test_creates_fresh_database_at_latest_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        let conn = open_versioned(&path, &[V1, V2]).unwrap();
        let version: i64 = conn.query_row("PRAGMA user_version;", [], |r| r.get(0)).unwrap();
        assert_eq!(version, 2);

        conn.execute("INSERT INTO things (name, color) VALUES ('a', 'red')", [])
            .unwrap();
    }

    #[test]
    fn test_migrates_existing_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        drop(open_versioned(&path, &[V1]).unwrap());
        let conn = open_versioned(&path, &[V1, V2]).unwrap();

        let version: i64 = conn.query_row("PRAGMA user_version;", [], |r| r.get(0)).unwrap();
        assert_eq!(version, 2);
        conn.execute("INSERT INTO things (name, color) VALUES ('a', 'red')", [])
            .unwrap();
    }

    #[test]
    fn test_rejects_database_from_the_future() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");

        drop(open_versioned(&path, &[V1, V2]).unwrap());
        let result = open_versioned(&path, &[V1]);
        assert!(result.is_err());
    }
}
