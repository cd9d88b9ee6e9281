use chrono::Utc;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// How many finished jobs to retain for inspection.
const RETAINED_JOBS: usize = 1000;

/// Lifecycle of one analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// One analysis job as observed by the journal.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub code: String,
    pub state: JobState,
    pub enqueued_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub error: Option<String>,
}

/// In-memory table of analysis jobs with explicit state transitions, so
/// that completions can be queried instead of only showing up in logs.
/// Oldest finished jobs are evicted once the retention cap is reached.
#[derive(Default)]
pub struct JobJournal {
    jobs: Mutex<VecDeque<JobRecord>>,
}

impl JobJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending job and return its id.
    pub fn enqueued(&self, code: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push_back(JobRecord {
            id,
            code: code.to_string(),
            state: JobState::Pending,
            enqueued_at: Utc::now().timestamp(),
            started_at: None,
            finished_at: None,
            error: None,
        });

        // Evict oldest finished jobs beyond the cap; in-flight jobs are
        // never dropped.
        while jobs.len() > RETAINED_JOBS {
            let Some(idx) = jobs.iter().position(|j| j.state.is_terminal()) else {
                break;
            };
            jobs.remove(idx);
        }
        id
    }

    pub fn started(&self, id: Uuid) {
        self.update(id, |job| {
            job.state = JobState::Running;
            job.started_at = Some(Utc::now().timestamp());
        });
    }

    pub fn succeeded(&self, id: Uuid) {
        self.update(id, |job| {
            job.state = JobState::Succeeded;
            job.finished_at = Some(Utc::now().timestamp());
        });
    }

    pub fn failed(&self, id: Uuid, error: &str) {
        self.update(id, |job| {
            job.state = JobState::Failed;
            job.finished_at = Some(Utc::now().timestamp());
            job.error = Some(error.to_string());
        });
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }

    /// All retained jobs, oldest first.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.jobs.lock().unwrap().iter().cloned().collect()
    }

    /// Number of jobs currently in the given state.
    pub fn count_in_state(&self, state: JobState) -> usize {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter(|j| j.state == state)
            .count()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut JobRecord)) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            f(job);
        }
    }
}
