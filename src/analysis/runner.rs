use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Errors from one analyzer invocation. Both variants are per-job failures:
/// in a batch they are journaled and the batch continues.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to spawn analyzer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("analyzer failed: {stderr}")]
    Failed { stderr: String },
}

impl AnalyzerError {
    /// The diagnostic text surfaced to a caller waiting on a single job.
    pub fn diagnostic(&self) -> String {
        match self {
            AnalyzerError::Spawn(e) => e.to_string(),
            AnalyzerError::Failed { stderr } => stderr.clone(),
        }
    }
}

/// How the external analyzer is invoked.
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Program to execute (e.g. `python3`).
    pub program: String,
    /// Fixed arguments placed before the stock code (e.g. the script path).
    pub args: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["scripts/analyze.py".to_string()],
        }
    }
}

/// Trait for running one analysis. The process implementation is the real
/// thing; tests substitute recording fakes.
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    /// Run the analyzer for `code`, resolving to captured stdout on
    /// success or the captured diagnostic on failure.
    async fn run(&self, code: &str) -> Result<String, AnalyzerError>;
}

/// Spawns the analyzer as a child process.
///
/// The code is passed as a plain argv element, never through a shell, so
/// codes containing shell metacharacters cannot inject commands.
pub struct ProcessAnalysisRunner {
    settings: AnalyzerSettings,
}

impl ProcessAnalysisRunner {
    pub fn new(settings: AnalyzerSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl AnalysisRunner for ProcessAnalysisRunner {
    async fn run(&self, code: &str) -> Result<String, AnalyzerError> {
        let output = Command::new(&self.settings.program)
            .args(&self.settings.args)
            .arg(code)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(AnalyzerError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Failed {
                stderr: stderr.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
