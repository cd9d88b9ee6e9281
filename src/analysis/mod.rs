//! External analysis pipeline.
//!
//! The analyzer is an opaque external program invoked once per stock code.
//! This module owns spawning it (`runner`), tracking each invocation's
//! lifecycle (`journal`), and the paced, bounded fire-and-forget dispatch
//! of whole batches (`dispatcher`).

mod dispatcher;
mod journal;
mod runner;

pub use dispatcher::JobDispatcher;
pub use journal::{JobJournal, JobRecord, JobState};
pub use runner::{AnalysisRunner, AnalyzerError, AnalyzerSettings, ProcessAnalysisRunner};
