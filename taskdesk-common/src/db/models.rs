//! Database models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of distributable work, as assigned to an agent
///
/// Serialized as `{ firstName, phone, notes }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub first_name: String,
    pub phone: String,
    pub notes: String,
}

impl TaskRecord {
    pub fn new(
        first_name: impl Into<String>,
        phone: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            phone: phone.into(),
            notes: notes.into(),
        }
    }
}

/// Agent with its ordered task list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub tasks: Vec<TaskRecord>,
}

/// Agent registration fields; `password_hash` is already hashed
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
}

/// Editable agent profile fields
#[derive(Debug, Clone)]
pub struct AgentUpdate {
    pub name: String,
    pub email: String,
    pub mobile: String,
}

/// Admin user
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub mobile: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}
