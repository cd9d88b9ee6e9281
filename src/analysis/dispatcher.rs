use super::journal::JobJournal;
use super::runner::{AnalysisRunner, AnalyzerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One entry on the dispatch queue.
struct QueuedJob {
    id: Uuid,
    code: String,
    /// Delay the dispatch loop observes after starting this job, before
    /// starting the next one.
    pace: Duration,
}

/// Fire-and-forget dispatch of analysis jobs, plus a synchronous
/// single-job path.
///
/// `dispatch_batch` enqueues jobs and returns immediately; a single
/// dispatch loop drains the queue in order, sleeping each job's pace
/// between successive starts. Execution is capped by a semaphore of
/// `max_concurrent_jobs` permits, so even an unpaced "analyze everything"
/// flood has an explicit resource ceiling. Started jobs are never
/// cancelled; completions are journaled and logged, not returned.
pub struct JobDispatcher {
    runner: Arc<dyn AnalysisRunner>,
    journal: Arc<JobJournal>,
    queue_tx: mpsc::UnboundedSender<QueuedJob>,
}

impl JobDispatcher {
    /// Create the dispatcher and spawn its dispatch loop. The loop exits
    /// when `shutdown` fires; jobs already handed to the runner finish on
    /// their own.
    pub fn new(
        runner: Arc<dyn AnalysisRunner>,
        journal: Arc<JobJournal>,
        max_concurrent_jobs: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_loop(
            runner.clone(),
            journal.clone(),
            queue_rx,
            Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            shutdown,
        ));
        Self {
            runner,
            journal,
            queue_tx,
        }
    }

    /// Run one analysis and wait for it. The job's own failure, with its
    /// captured diagnostic text, goes back to the caller.
    pub async fn run_single(&self, code: &str) -> Result<String, AnalyzerError> {
        let id = self.journal.enqueued(code);
        self.journal.started(id);
        match self.runner.run(code).await {
            Ok(output) => {
                info!("Analysis completed for {}", code);
                self.journal.succeeded(id);
                Ok(output)
            }
            Err(e) => {
                warn!("Analysis failed for {}: {}", code, e.diagnostic());
                self.journal.failed(id, &e.diagnostic());
                Err(e)
            }
        }
    }

    /// Enqueue one job per code, in input order, and return once all are
    /// enqueued. No job outcome ever reaches the caller. Returns the
    /// number of jobs accepted.
    pub fn dispatch_batch(&self, codes: &[String], pace: Duration) -> usize {
        let mut accepted = 0;
        for code in codes {
            let id = self.journal.enqueued(code);
            let job = QueuedJob {
                id,
                code: code.clone(),
                pace,
            };
            if self.queue_tx.send(job).is_ok() {
                accepted += 1;
            } else {
                self.journal.failed(id, "dispatcher is shut down");
            }
        }
        debug!("Dispatched batch of {} jobs (pace {:?})", accepted, pace);
        accepted
    }
}

async fn dispatch_loop(
    runner: Arc<dyn AnalysisRunner>,
    journal: Arc<JobJournal>,
    mut queue_rx: mpsc::UnboundedReceiver<QueuedJob>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
) {
    debug!(
        "Dispatch loop starting ({} worker permits)",
        workers.available_permits()
    );
    loop {
        let job = tokio::select! {
            job = queue_rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        // Waiting for a permit here keeps start order equal to queue order.
        let permit = match workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let runner = runner.clone();
        let journal = journal.clone();
        tokio::spawn(async move {
            journal.started(job.id);
            match runner.run(&job.code).await {
                Ok(_) => {
                    info!("Analysis completed for {}", job.code);
                    journal.succeeded(job.id);
                }
                Err(e) => {
                    warn!("Analysis failed for {}: {}", job.code, e.diagnostic());
                    journal.failed(job.id, &e.diagnostic());
                }
            }
            drop(permit);
        });

        if !job.pace.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(job.pace) => {}
                _ = shutdown.cancelled() => break,
            }
        }
    }
    debug!("Dispatch loop stopped");
}
