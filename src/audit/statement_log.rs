use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

/// Leading keywords of statements that are pure reads and produce no entry.
const READ_ONLY_KEYWORDS: &[&str] = &["select", "show", "describe", "explain"];

const MANIFEST_FILE_NAME: &str = "manifest.txt";

/// A bind value, carried alongside the statement text so the exact same
/// value is both bound for execution and substituted for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl SqlValue {
    /// Literal rendering used in reconstructed statements. Text is wrapped
    /// in single quotes with embedded quotes doubled; everything else is
    /// rendered as-is.
    fn render(&self) -> String {
        match self {
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Real(r) => r.to_string(),
            SqlValue::Null => "NULL".to_string(),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(r) => ToSqlOutput::Owned(Value::Real(*r)),
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(r: f64) -> Self {
        SqlValue::Real(r)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Integer(b as i64)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// True when the statement's leading keyword (leading whitespace ignored,
/// case-insensitive) marks it as read-only.
fn is_read_only(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("");
    READ_ONLY_KEYWORDS
        .iter()
        .any(|k| keyword.eq_ignore_ascii_case(k))
}

/// Substitute `?` placeholders left to right, consuming each value exactly
/// once. On a count mismatch the statement is still produced: unmatched
/// placeholders stay literal and surplus values are dropped.
fn reconstruct(sql: &str, values: &[SqlValue]) -> String {
    let mut out = String::with_capacity(sql.len() + values.len() * 8);
    let mut remaining = values.iter();
    for c in sql.chars() {
        if c == '?' {
            match remaining.next() {
                Some(value) => out.push_str(&value.render()),
                None => out.push('?'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// The currently open day partition.
struct OpenPartition {
    day: NaiveDate,
    file: File,
}

/// Append-only, date-partitioned log of mutating statements.
///
/// One file per calendar day (`YYYY-MM-DD.log`), with a manifest file
/// listing every partition ever created so retention tooling can enumerate
/// them without scanning the directory. Reconstruction and write happen
/// under one lock, so concurrent callers never interleave partial lines.
pub struct StatementAuditLog {
    log_dir: PathBuf,
    partition: Mutex<Option<OpenPartition>>,
}

impl StatementAuditLog {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create audit log directory {:?}", log_dir))?;
        Ok(Self {
            log_dir,
            partition: Mutex::new(None),
        })
    }

    /// Record a statement unless it is read-only. Failures to write are
    /// reported on the diagnostic channel and never returned: an audit
    /// problem must not abort the mutation being audited.
    pub fn maybe_log(&self, sql: &str, values: &[SqlValue]) {
        if is_read_only(sql) {
            return;
        }
        let line = reconstruct(sql, values);
        if let Err(e) = self.append_line(&line) {
            error!("Failed to write audit log entry: {:#}", e);
        }
    }

    fn append_line(&self, statement: &str) -> Result<()> {
        let today = Utc::now().date_naive();
        let mut guard = self
            .partition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let rotate = match guard.as_ref() {
            Some(open) => open.day != today,
            None => true,
        };
        if rotate {
            *guard = Some(self.open_partition(today)?);
        }

        let open = guard.as_mut().unwrap();
        writeln!(open.file, "[SQL]: {}", statement)
            .with_context(|| format!("Failed to append to {:?}", self.day_file_path(open.day)))?;
        Ok(())
    }

    fn open_partition(&self, day: NaiveDate) -> Result<OpenPartition> {
        let path = self.day_file_path(day);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit partition {:?}", path))?;
        self.register_partition(day)?;
        Ok(OpenPartition { day, file })
    }

    /// Add the partition file name to the manifest if it is not there yet.
    fn register_partition(&self, day: NaiveDate) -> Result<()> {
        let name = Self::partition_name(day);
        let mut known = self.manifest_entries()?;
        if known.insert(name) {
            let joined = known.into_iter().collect::<Vec<_>>().join("\n");
            std::fs::write(self.manifest_path(), joined + "\n")
                .context("Failed to update audit manifest")?;
        }
        Ok(())
    }

    /// Partition file names recorded in the manifest, oldest first.
    pub fn manifest_entries(&self) -> Result<BTreeSet<String>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(BTreeSet::new());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read audit manifest")?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Delete partitions older than `retention_days` and rewrite the
    /// manifest. Returns the number of files removed.
    pub fn prune_older_than(&self, retention_days: u64) -> Result<usize> {
        // The manifest rewrite must not race the read-modify-write that
        // `append_line` does when it registers a new day partition, so both
        // paths hold the partition lock.
        let _guard = self
            .partition
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days as i64);
        let entries = self.manifest_entries()?;

        let mut kept = BTreeSet::new();
        let mut removed = 0usize;
        for name in entries {
            let expired = Self::partition_day(&name).is_some_and(|day| day < cutoff);
            if expired {
                let path = self.log_dir.join(&name);
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => removed += 1,
                    Err(e) => {
                        error!("Failed to remove audit partition {:?}: {}", path, e);
                        kept.insert(name);
                        continue;
                    }
                }
            } else {
                kept.insert(name);
            }
        }

        if removed > 0 {
            let joined = kept.into_iter().collect::<Vec<_>>().join("\n");
            std::fs::write(self.manifest_path(), joined + "\n")
                .context("Failed to rewrite audit manifest")?;
            info!("Pruned {} audit log partitions", removed);
        }
        Ok(removed)
    }

    pub fn day_file_path(&self, day: NaiveDate) -> PathBuf {
        self.log_dir.join(Self::partition_name(day))
    }

    fn manifest_path(&self) -> PathBuf {
        self.log_dir.join(MANIFEST_FILE_NAME)
    }

    fn partition_name(day: NaiveDate) -> String {
        format!("{}.log", day.format("%Y-%m-%d"))
    }

    fn partition_day(name: &str) -> Option<NaiveDate> {
        let stem = name.strip_suffix(".log")?;
        NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
    }
}
