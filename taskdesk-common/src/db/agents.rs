//! Agent and agent task persistence
//!
//! Tasks live in `agent_tasks`, one row per task, ordered by insertion.
//! Appending never rewrites existing rows; only `clear_agent_tasks` removes them.

use crate::db::models::{Agent, AgentUpdate, NewAgent, TaskRecord};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

fn parse_agent_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Corrupt agent id {}: {}", raw, e)))
}

fn agent_from_row(row: &SqliteRow, tasks: Vec<TaskRecord>) -> Result<Agent> {
    let id_str: String = row.get("id");
    Ok(Agent {
        id: parse_agent_id(&id_str)?,
        name: row.get("name"),
        email: row.get("email"),
        mobile: row.get("mobile"),
        tasks,
    })
}

fn task_from_row(row: &SqliteRow) -> TaskRecord {
    TaskRecord {
        first_name: row.get("first_name"),
        phone: row.get("phone"),
        notes: row.get("notes"),
    }
}

fn map_unique_violation(err: sqlx::Error, email: &str) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::InvalidInput(format!("Email already registered: {}", email))
        }
        _ => Error::Database(err),
    }
}

/// Insert a new agent with an empty task list
pub async fn create_agent(pool: &SqlitePool, agent: &NewAgent) -> Result<Agent> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO agents (id, name, email, mobile, password_hash)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(&agent.name)
    .bind(&agent.email)
    .bind(&agent.mobile)
    .bind(&agent.password_hash)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, &agent.email))?;

    Ok(Agent {
        id,
        name: agent.name.clone(),
        email: agent.email.clone(),
        mobile: agent.mobile.clone(),
        tasks: Vec::new(),
    })
}

/// Whether an agent with this email is registered
pub async fn agent_email_exists(pool: &SqlitePool, email: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agents WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Load one agent with its tasks
pub async fn load_agent(pool: &SqlitePool, id: Uuid) -> Result<Option<Agent>> {
    let row = sqlx::query("SELECT id, name, email, mobile FROM agents WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tasks = sqlx::query(
        "SELECT first_name, phone, notes FROM agent_tasks WHERE agent_id = ? ORDER BY id",
    )
    .bind(id.to_string())
    .fetch_all(pool)
    .await?
    .iter()
    .map(task_from_row)
    .collect();

    Ok(Some(agent_from_row(&row, tasks)?))
}

/// Load every agent (registration order) with its tasks
pub async fn list_agents(pool: &SqlitePool) -> Result<Vec<Agent>> {
    let agent_rows = sqlx::query("SELECT id, name, email, mobile FROM agents ORDER BY rowid")
        .fetch_all(pool)
        .await?;

    let task_rows = sqlx::query(
        "SELECT agent_id, first_name, phone, notes FROM agent_tasks ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut tasks_by_agent: HashMap<String, Vec<TaskRecord>> = HashMap::new();
    for row in &task_rows {
        let agent_id: String = row.get("agent_id");
        tasks_by_agent
            .entry(agent_id)
            .or_default()
            .push(task_from_row(row));
    }

    agent_rows
        .iter()
        .map(|row| {
            let id: String = row.get("id");
            let tasks = tasks_by_agent.remove(&id).unwrap_or_default();
            agent_from_row(row, tasks)
        })
        .collect()
}

/// Ids of every agent in registration order, without loading tasks
pub async fn list_agent_ids(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM agents ORDER BY rowid")
        .fetch_all(pool)
        .await?;

    ids.iter().map(|id| parse_agent_id(id)).collect()
}

/// Update profile fields; returns `false` when the agent does not exist
pub async fn update_agent(pool: &SqlitePool, id: Uuid, update: &AgentUpdate) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE agents
        SET name = ?, email = ?, mobile = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(&update.name)
    .bind(&update.email)
    .bind(&update.mobile)
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, &update.email))?;

    Ok(result.rows_affected() > 0)
}

/// Delete an agent and (by cascade) its tasks; returns `false` when absent
pub async fn delete_agent(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM agents WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove all tasks from an agent; returns the number removed
pub async fn clear_agent_tasks(pool: &SqlitePool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM agent_tasks WHERE agent_id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Append tasks to the end of an agent's list in one transaction
///
/// Fails with `NotFound` (and writes nothing) when the agent no longer exists.
pub async fn append_agent_tasks(pool: &SqlitePool, id: Uuid, tasks: &[TaskRecord]) -> Result<()> {
    let mut tx = pool.begin().await?;

    // First statement must be a write so the transaction never upgrades a WAL read snapshot
    let touched = sqlx::query("UPDATE agents SET updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Agent {}", id)));
    }

    for task in tasks {
        sqlx::query(
            r#"
            INSERT INTO agent_tasks (agent_id, first_name, phone, notes)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&task.first_name)
        .bind(&task.phone)
        .bind(&task.notes)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
