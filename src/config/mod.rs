mod file_config;

pub use file_config::{AnalyzerConfig, FileConfig, RefreshConfig};

use crate::analysis::AnalyzerSettings;
use crate::refresh::RefreshSettings;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub audit_log_dir: Option<PathBuf>,
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub audit_log_dir: PathBuf,
    pub audit_retention_days: u64,
    pub prune_interval_hours: u64,

    // Feature configs (with defaults)
    pub refresh: RefreshResolvedSettings,
    pub analyzer: AnalyzerSettings,
}

/// Resolved refresh settings, including the dispatcher's worker ceiling.
#[derive(Debug, Clone)]
pub struct RefreshResolvedSettings {
    pub staleness_threshold: Duration,
    pub stale_pace: Duration,
    pub max_concurrent_jobs: usize,
}

impl RefreshResolvedSettings {
    pub fn orchestrator_settings(&self) -> RefreshSettings {
        RefreshSettings {
            staleness_threshold: self.staleness_threshold,
            stale_pace: self.stale_pace,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let audit_log_dir = file
            .audit_log_dir
            .map(PathBuf::from)
            .or_else(|| cli.audit_log_dir.clone())
            .unwrap_or_else(|| db_dir.join("audit"));

        let audit_retention_days = file
            .audit_retention_days
            .unwrap_or(cli.audit_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        // Refresh settings - merge file config with defaults
        let refresh_file = file.refresh.unwrap_or_default();
        let refresh = RefreshResolvedSettings {
            staleness_threshold: Duration::from_secs(
                refresh_file.staleness_threshold_hours.unwrap_or(12) * 3600,
            ),
            stale_pace: Duration::from_millis(refresh_file.stale_pace_ms.unwrap_or(300)),
            max_concurrent_jobs: refresh_file.max_concurrent_jobs.unwrap_or(4),
        };

        let analyzer_file = file.analyzer.unwrap_or_default();
        let analyzer_defaults = AnalyzerSettings::default();
        let analyzer = AnalyzerSettings {
            program: analyzer_file.program.unwrap_or(analyzer_defaults.program),
            args: analyzer_file.args.unwrap_or(analyzer_defaults.args),
        };

        Ok(Self {
            db_dir,
            port,
            audit_log_dir,
            audit_retention_days,
            prune_interval_hours,
            refresh,
            analyzer,
        })
    }

    pub fn stock_db_path(&self) -> PathBuf {
        self.db_dir.join("stocks.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_with_dir(dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(dir.path().to_path_buf()),
            port: 3000,
            audit_log_dir: None,
            audit_retention_days: 90,
            prune_interval_hours: 24,
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3000);
        assert_eq!(config.audit_log_dir, temp_dir.path().join("audit"));
        assert_eq!(config.audit_retention_days, 90);
        assert_eq!(
            config.refresh.staleness_threshold,
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(config.refresh.stale_pace, Duration::from_millis(300));
        assert_eq!(config.refresh.max_concurrent_jobs, 4);
        assert_eq!(config.analyzer.program, "python3");
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            port: 3000,
            ..cli_with_dir(&temp_dir)
        };

        let file_config = FileConfig {
            port: Some(4000),
            audit_retention_days: Some(30),
            refresh: Some(RefreshConfig {
                staleness_threshold_hours: Some(6),
                stale_pace_ms: Some(500),
                max_concurrent_jobs: Some(2),
            }),
            analyzer: Some(AnalyzerConfig {
                program: Some("/usr/bin/analyzer".to_string()),
                args: Some(vec!["--fast".to_string()]),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.port, 4000);
        assert_eq!(config.audit_retention_days, 30);
        assert_eq!(
            config.refresh.staleness_threshold,
            Duration::from_secs(6 * 3600)
        );
        assert_eq!(config.refresh.stale_pace, Duration::from_millis(500));
        assert_eq!(config.refresh.max_concurrent_jobs, 2);
        assert_eq!(config.analyzer.program, "/usr/bin/analyzer");
        assert_eq!(config.analyzer.args, vec!["--fast"]);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.prune_interval_hours, 24);
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_file_config_parses_toml() {
        let toml_str = r#"
            port = 8080

            [refresh]
            staleness_threshold_hours = 24
            max_concurrent_jobs = 8

            [analyzer]
            program = "python3"
            args = ["tools/analyze.py", "--verbose"]
        "#;
        let file: FileConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(file.port, Some(8080));
        let refresh = file.refresh.unwrap();
        assert_eq!(refresh.staleness_threshold_hours, Some(24));
        assert_eq!(refresh.stale_pace_ms, None);
        assert_eq!(refresh.max_concurrent_jobs, Some(8));
        let analyzer = file.analyzer.unwrap();
        assert_eq!(analyzer.program.as_deref(), Some("python3"));
        assert_eq!(
            analyzer.args.unwrap(),
            vec!["tools/analyze.py", "--verbose"]
        );
    }

    #[test]
    fn test_stock_db_path() {
        let temp_dir = make_temp_db_dir();
        let config = AppConfig::resolve(&cli_with_dir(&temp_dir), None).unwrap();
        assert_eq!(config.stock_db_path(), temp_dir.path().join("stocks.db"));
    }
}
