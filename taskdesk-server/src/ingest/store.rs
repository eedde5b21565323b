//! Agent store seam
//!
//! The orchestrator only sees [`AgentStore`]; production wires in
//! [`SqliteAgentStore`], tests can substitute their own.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use taskdesk_common::db::{self, TaskRecord};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Agent persistence used by upload jobs
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Ids of the current agent roster
    async fn find_agent_ids(&self) -> taskdesk_common::Result<Vec<Uuid>>;

    /// Append `tasks` to the end of one agent's list and persist it
    async fn append_tasks_and_save(
        &self,
        agent_id: Uuid,
        tasks: &[TaskRecord],
    ) -> taskdesk_common::Result<()>;
}

/// [`AgentStore`] over the shared SQLite database
#[derive(Debug, Clone)]
pub struct SqliteAgentStore {
    pool: SqlitePool,
}

impl SqliteAgentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentStore for SqliteAgentStore {
    async fn find_agent_ids(&self) -> taskdesk_common::Result<Vec<Uuid>> {
        db::agents::list_agent_ids(&self.pool).await
    }

    async fn append_tasks_and_save(
        &self,
        agent_id: Uuid,
        tasks: &[TaskRecord],
    ) -> taskdesk_common::Result<()> {
        db::agents::append_agent_tasks(&self.pool, agent_id, tasks).await
    }
}

/// Per-agent async write locks shared by all upload jobs
///
/// Concurrent uploads that touch the same agent append one after the other.
/// Entries nobody holds are pruned on the next lookup, so the map stays as
/// small as the set of agents currently being written.
#[derive(Debug, Clone, Default)]
pub struct AgentWriteLocks {
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl AgentWriteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `agent_id`, created on first use
    pub async fn lock_for(&self, agent_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.retain(|id, lock| *id == agent_id || Arc::strong_count(lock) > 1);
        locks.entry(agent_id).or_default().clone()
    }

    /// Number of agents with a live lock entry
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdesk_common::db::{init_memory_database, NewAgent};

    #[tokio::test]
    async fn test_sqlite_store_appends() {
        let pool = init_memory_database().await.unwrap();
        let agent = db::agents::create_agent(
            &pool,
            &NewAgent {
                name: "A".to_string(),
                email: "a@example.com".to_string(),
                mobile: "1".to_string(),
                password_hash: "h".to_string(),
            },
        )
        .await
        .unwrap();
        let store = SqliteAgentStore::new(pool.clone());

        store
            .append_tasks_and_save(agent.id, &[TaskRecord::new("X", "1", "n")])
            .await
            .unwrap();

        assert_eq!(store.find_agent_ids().await.unwrap(), vec![agent.id]);
        let loaded = db::agents::load_agent(&pool, agent.id).await.unwrap().unwrap();
        assert_eq!(loaded.tasks, vec![TaskRecord::new("X", "1", "n")]);
    }

    #[tokio::test]
    async fn test_same_agent_shares_lock() {
        let locks = AgentWriteLocks::new();
        let id = Uuid::new_v4();

        let first = locks.lock_for(id).await;
        let second = locks.lock_for(id).await;
        let other = locks.lock_for(Uuid::new_v4()).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn test_unheld_locks_are_pruned() {
        let locks = AgentWriteLocks::new();
        let busy = Uuid::new_v4();

        let held = locks.lock_for(busy).await;
        for _ in 0..10 {
            drop(locks.lock_for(Uuid::new_v4()).await);
        }
        assert_eq!(locks.len().await, 2);

        let again = locks.lock_for(busy).await;
        assert!(Arc::ptr_eq(&held, &again));
        assert_eq!(locks.len().await, 1);

        drop(held);
        drop(again);
        drop(locks.lock_for(Uuid::new_v4()).await);
        assert_eq!(locks.len().await, 1);
        assert!(!locks.is_empty().await);
    }
}
