//! Audit trail for statements issued against the stock database.
//!
//! Every mutating SQL statement is reconstructed into literal text (bind
//! values substituted back in) and appended to a date-partitioned log file.
//! The reconstructed text is for auditing only and is never executed.

mod statement_log;

pub use statement_log::{SqlValue, StatementAuditLog};
