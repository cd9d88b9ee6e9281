//! Shared SQLite plumbing: versioned schemas tracked via `PRAGMA user_version`.

mod versioned_schema;

pub use versioned_schema::{migrate, open_versioned, VersionedSchema};
