//! Task file ingestion pipeline
//!
//! Upload → Parser → Validator → Distributor → persistence, sequenced by
//! [`UploadOrchestrator`]:
//!
//! - [`format`]: CSV/XLS/XLSX detection from MIME type and file name
//! - [`parser`]: format-specific decoding into uniform [`RawRecord`]s
//! - [`validator`]: keeps rows with `FirstName`, `Phone` and `Notes`
//! - [`distributor`]: shuffled round-robin assignment to agents
//! - [`orchestrator`]: the upload job state machine
//! - [`storage`]: temp-file storage and its scoped cleanup guard
//! - [`store`]: agent store seam and its SQLite implementation

pub mod distributor;
pub mod format;
pub mod orchestrator;
pub mod parser;
pub mod storage;
pub mod store;
pub mod validator;

pub use distributor::{distribute, Assignment, Distribution};
pub use format::FileFormat;
pub use orchestrator::{
    FailureKind, IncomingFile, UploadError, UploadJob, UploadOrchestrator, UploadState,
    UploadSummary, MIN_AGENTS,
};
pub use parser::{parse_records, IngestError, RawRecord};
pub use storage::{DiskTempStorage, TempFileGuard, TempStorage};
pub use store::{AgentStore, AgentWriteLocks, SqliteAgentStore};
pub use validator::{validate_records, FIELD_FIRST_NAME, FIELD_NOTES, FIELD_PHONE};
