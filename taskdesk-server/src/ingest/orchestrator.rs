//! Upload orchestrator
//!
//! Drives one upload through
//! `Received → Parsing → Validating → CheckingAgents → Distributing → Persisting → Done`,
//! with `Failed(kind)` reachable from every state. A job's temp file is owned
//! by a [`TempFileGuard`] from the moment its path is reserved, before any
//! content is written, so every exit path (including timeout and a dropped job
//! future) removes it.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use taskdesk_common::config::DEFAULT_UPLOAD_TIMEOUT_SECS;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::distributor::{distribute, Distribution};
use super::format::FileFormat;
use super::parser::{parse_records, IngestError};
use super::storage::{TempFileGuard, TempStorage};
use super::store::{AgentStore, AgentWriteLocks};
use super::validator::validate_records;

/// Fewest registered agents an upload may be distributed across
pub const MIN_AGENTS: usize = 5;

/// Failure category recorded in the terminal job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoFileUploaded,
    UnsupportedFormat,
    ParseError,
    EmptyInput,
    EmptyOrInvalidInput,
    InsufficientAgents,
    PersistenceError,
    StorageError,
    Timeout,
    Internal,
}

/// Upload job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Received,
    Parsing,
    Validating,
    CheckingAgents,
    Distributing,
    Persisting,
    Done,
    Failed(FailureKind),
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Done | UploadState::Failed(_))
    }
}

/// Upload job failures
///
/// `Display` carries server-side detail for logs; clients only ever see
/// [`UploadError::user_message`].
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file attached to upload request")]
    NoFileUploaded,

    #[error("Unsupported upload (content type {content_type:?}, file {file_name:?})")]
    UnsupportedFormat {
        content_type: Option<String>,
        file_name: String,
    },

    #[error("Failed to parse upload: {0}")]
    ParseError(String),

    #[error("Workbook has no data rows")]
    EmptyInput,

    #[error("No rows with FirstName, Phone and Notes")]
    EmptyOrInvalidInput,

    #[error("Only {found} agents registered, at least {required} required")]
    InsufficientAgents { found: usize, required: usize },

    #[error("Persistence failed for {} agent(s): {detail}", .failed.len())]
    PersistenceError {
        detail: String,
        saved: Vec<Uuid>,
        failed: Vec<Uuid>,
    },

    #[error("Temp storage error: {0}")]
    StorageError(String),

    /// `saved` lists agents whose appends committed before the deadline
    #[error("Upload processing exceeded {after:?} ({} agent(s) already saved)", .saved.len())]
    Timeout { after: Duration, saved: Vec<Uuid> },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            UploadError::NoFileUploaded => FailureKind::NoFileUploaded,
            UploadError::UnsupportedFormat { .. } => FailureKind::UnsupportedFormat,
            UploadError::ParseError(_) => FailureKind::ParseError,
            UploadError::EmptyInput => FailureKind::EmptyInput,
            UploadError::EmptyOrInvalidInput => FailureKind::EmptyOrInvalidInput,
            UploadError::InsufficientAgents { .. } => FailureKind::InsufficientAgents,
            UploadError::PersistenceError { .. } => FailureKind::PersistenceError,
            UploadError::StorageError(_) => FailureKind::StorageError,
            UploadError::Timeout { .. } => FailureKind::Timeout,
            UploadError::Internal(_) => FailureKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            FailureKind::NoFileUploaded
            | FailureKind::UnsupportedFormat
            | FailureKind::EmptyInput
            | FailureKind::EmptyOrInvalidInput
            | FailureKind::InsufficientAgents => StatusCode::BAD_REQUEST,
            FailureKind::ParseError
            | FailureKind::PersistenceError
            | FailureKind::StorageError
            | FailureKind::Timeout
            | FailureKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            FailureKind::NoFileUploaded => "No file uploaded",
            FailureKind::UnsupportedFormat => "Only CSV, XLS, XLSX files are allowed",
            FailureKind::ParseError => "Failed to parse uploaded file",
            FailureKind::EmptyInput => "XLS/XLSX is empty or invalid format",
            FailureKind::EmptyOrInvalidInput => "File is empty or invalid format",
            FailureKind::InsufficientAgents => "Not enough agents to distribute tasks",
            FailureKind::PersistenceError => "Failed to save distributed tasks",
            FailureKind::Timeout => "Upload processing timed out",
            FailureKind::StorageError | FailureKind::Internal => "Server error",
        }
    }
}

impl From<IngestError> for UploadError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFormat {
                content_type,
                file_name,
            } => UploadError::UnsupportedFormat {
                content_type,
                file_name,
            },
            IngestError::Parse(detail) => UploadError::ParseError(detail),
            IngestError::EmptyInput => UploadError::EmptyInput,
        }
    }
}

/// A file attached to an upload request
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// State change record (kept in [`UploadJob::history`])
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_state: UploadState,
    pub new_state: UploadState,
    pub transitioned_at: DateTime<Utc>,
}

/// Book-keeping for one upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadJob {
    pub job_id: Uuid,
    pub file_name: Option<String>,
    pub format: Option<FileFormat>,
    pub state: UploadState,
    pub records_parsed: usize,
    pub records_valid: usize,
    pub agents_available: usize,
    /// Agents whose task appends committed, in commit order
    pub agents_saved: Vec<Uuid>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub history: Vec<StateTransition>,
}

impl UploadJob {
    pub fn new() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            file_name: None,
            format: None,
            state: UploadState::Received,
            records_parsed: 0,
            records_valid: 0,
            agents_available: 0,
            agents_saved: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            history: Vec::new(),
        }
    }

    /// Move to `new_state`, logging and recording the transition
    pub fn transition_to(&mut self, new_state: UploadState) {
        let transition = StateTransition {
            job_id: self.job_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        debug!(
            job_id = %self.job_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Upload state transition"
        );

        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }
        self.history.push(transition);
    }

    /// States visited so far, starting with `Received`
    pub fn visited_states(&self) -> Vec<UploadState> {
        std::iter::once(UploadState::Received)
            .chain(self.history.iter().map(|t| t.new_state))
            .collect()
    }
}

impl Default for UploadJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Successful upload outcome
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub job_id: Uuid,
    pub records_distributed: usize,
    pub agents_assigned: usize,
    /// New task count per agent, in distribution order
    pub per_agent: Vec<(Uuid, usize)>,
}

/// Sequences parse, validate, distribute and persist for each upload
pub struct UploadOrchestrator {
    store: Arc<dyn AgentStore>,
    storage: Arc<dyn TempStorage>,
    rng: Mutex<StdRng>,
    locks: AgentWriteLocks,
    timeout: Duration,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn AgentStore>, storage: Arc<dyn TempStorage>) -> Self {
        Self::with_rng(store, storage, StdRng::from_entropy())
    }

    /// Orchestrator with a caller-supplied shuffle source
    pub fn with_rng(store: Arc<dyn AgentStore>, storage: Arc<dyn TempStorage>, rng: StdRng) -> Self {
        Self {
            store,
            storage,
            rng: Mutex::new(rng),
            locks: AgentWriteLocks::new(),
            timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_locks(mut self, locks: AgentWriteLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Process one upload request
    pub async fn run(&self, upload: Option<IncomingFile>) -> Result<UploadSummary, UploadError> {
        self.run_job(upload).await.1
    }

    /// Process one upload, also returning the job record
    pub async fn run_job(
        &self,
        upload: Option<IncomingFile>,
    ) -> (UploadJob, Result<UploadSummary, UploadError>) {
        let mut job = UploadJob::new();
        let result = self.execute(&mut job, upload).await;

        match &result {
            Ok(summary) => {
                job.transition_to(UploadState::Done);
                info!(
                    job_id = %job.job_id,
                    file = job.file_name.as_deref().unwrap_or_default(),
                    records = summary.records_distributed,
                    agents = summary.agents_assigned,
                    "Tasks distributed"
                );
            }
            Err(e) => {
                job.transition_to(UploadState::Failed(e.kind()));
                if e.status_code().is_server_error() {
                    error!(job_id = %job.job_id, error = %e, "Upload failed");
                } else {
                    warn!(job_id = %job.job_id, error = %e, "Upload rejected");
                }
            }
        }

        (job, result)
    }

    async fn execute(
        &self,
        job: &mut UploadJob,
        upload: Option<IncomingFile>,
    ) -> Result<UploadSummary, UploadError> {
        let IncomingFile {
            file_name,
            content_type,
            bytes,
        } = upload.ok_or(UploadError::NoFileUploaded)?;
        job.file_name = Some(file_name.clone());

        let format = FileFormat::detect(content_type.as_deref(), &file_name)?;
        job.format = Some(format);

        let path = self
            .storage
            .reserve_temp(&file_name)
            .map_err(|e| UploadError::StorageError(e.to_string()))?;
        let guard = TempFileGuard::new(self.storage.clone(), path);
        let committed = Mutex::new(Vec::new());

        let outcome = tokio::time::timeout(
            self.timeout,
            self.stage_and_process(job, format, guard.path(), bytes, &committed),
        )
        .await;
        guard.release();
        job.agents_saved = committed.into_inner();

        outcome.unwrap_or_else(|_| {
            Err(UploadError::Timeout {
                after: self.timeout,
                saved: job.agents_saved.clone(),
            })
        })
    }

    async fn stage_and_process(
        &self,
        job: &mut UploadJob,
        format: FileFormat,
        path: &Path,
        bytes: Vec<u8>,
        committed: &Mutex<Vec<Uuid>>,
    ) -> Result<UploadSummary, UploadError> {
        self.storage
            .write_temp(path, &bytes)
            .await
            .map_err(|e| UploadError::StorageError(e.to_string()))?;
        drop(bytes);

        self.process(job, format, path, committed).await
    }

    async fn process(
        &self,
        job: &mut UploadJob,
        format: FileFormat,
        path: &Path,
        committed: &Mutex<Vec<Uuid>>,
    ) -> Result<UploadSummary, UploadError> {
        job.transition_to(UploadState::Parsing);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::ParseError(format!("Reading {}: {}", path.display(), e)))?;
        let raw = tokio::task::spawn_blocking(move || parse_records(format, &bytes))
            .await
            .map_err(|e| UploadError::Internal(format!("Parser task failed: {}", e)))??;
        job.records_parsed = raw.len();

        job.transition_to(UploadState::Validating);
        let records = validate_records(raw);
        job.records_valid = records.len();
        debug!(
            job_id = %job.job_id,
            parsed = job.records_parsed,
            valid = job.records_valid,
            "Records validated"
        );
        if records.is_empty() {
            return Err(UploadError::EmptyOrInvalidInput);
        }

        job.transition_to(UploadState::CheckingAgents);
        let agent_ids = self
            .store
            .find_agent_ids()
            .await
            .map_err(|e| UploadError::PersistenceError {
                detail: format!("Loading agents: {}", e),
                saved: Vec::new(),
                failed: Vec::new(),
            })?;
        job.agents_available = agent_ids.len();
        if agent_ids.len() < MIN_AGENTS {
            return Err(UploadError::InsufficientAgents {
                found: agent_ids.len(),
                required: MIN_AGENTS,
            });
        }

        job.transition_to(UploadState::Distributing);
        let distribution = {
            let mut rng = self.rng.lock().await;
            distribute(records, &agent_ids, &mut *rng)
        };

        job.transition_to(UploadState::Persisting);
        self.persist(job.job_id, &distribution, committed).await?;

        Ok(UploadSummary {
            job_id: job.job_id,
            records_distributed: distribution.total(),
            agents_assigned: distribution.non_empty().count(),
            per_agent: distribution
                .assignments
                .iter()
                .map(|a| (a.agent_id, a.tasks.len()))
                .collect(),
        })
    }

    /// Append every non-empty bucket; all writes run, failures are reported together
    ///
    /// Each committed agent is pushed to `committed` as soon as its append
    /// returns, so the list survives the job being cut short.
    async fn persist(
        &self,
        job_id: Uuid,
        distribution: &Distribution,
        committed: &Mutex<Vec<Uuid>>,
    ) -> Result<(), UploadError> {
        let writes = distribution.non_empty().map(|assignment| async move {
            let lock = self.locks.lock_for(assignment.agent_id).await;
            let _held = lock.lock().await;
            let result = self
                .store
                .append_tasks_and_save(assignment.agent_id, &assignment.tasks)
                .await;
            if result.is_ok() {
                info!(
                    job_id = %job_id,
                    agent_id = %assignment.agent_id,
                    tasks = assignment.tasks.len(),
                    "Tasks appended"
                );
                committed.lock().await.push(assignment.agent_id);
            }
            (assignment.agent_id, result)
        });

        let mut saved = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for (agent_id, result) in join_all(writes).await {
            match result {
                Ok(()) => saved.push(agent_id),
                Err(e) => {
                    error!(job_id = %job_id, agent_id = %agent_id, error = %e, "Failed to append tasks");
                    first_error.get_or_insert_with(|| e.to_string());
                    failed.push(agent_id);
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(detail) => Err(UploadError::PersistenceError {
                detail,
                saved,
                failed,
            }),
        }
    }
}
