//! Database initialization tests
//!
//! - Database file and parent directories created on first run
//! - Re-opening an existing database keeps its data

use taskdesk_common::db::{agents, init_database, NewAgent, TaskRecord};
use tempfile::TempDir;

#[tokio::test]
async fn test_creates_database_in_missing_directory() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("taskdesk.db");

    let pool = init_database(&db_path).await.unwrap();

    assert!(db_path.exists());
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert!(tables.contains(&"users".to_string()));
    assert!(tables.contains(&"agents".to_string()));
    assert!(tables.contains(&"agent_tasks".to_string()));
}

#[tokio::test]
async fn test_reopen_is_idempotent_and_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("taskdesk.db");

    let agent_id = {
        let pool = init_database(&db_path).await.unwrap();
        let agent = agents::create_agent(
            &pool,
            &NewAgent {
                name: "Persisted".to_string(),
                email: "persisted@example.com".to_string(),
                mobile: "555".to_string(),
                password_hash: "hash".to_string(),
            },
        )
        .await
        .unwrap();
        agents::append_agent_tasks(&pool, agent.id, &[TaskRecord::new("A", "1", "n")])
            .await
            .unwrap();
        pool.close().await;
        agent.id
    };

    let pool = init_database(&db_path).await.unwrap();
    let agent = agents::load_agent(&pool, agent_id).await.unwrap().unwrap();
    assert_eq!(agent.tasks.len(), 1);
}

#[tokio::test]
async fn test_deleting_agent_cascades_to_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("taskdesk.db")).await.unwrap();

    let agent = agents::create_agent(
        &pool,
        &NewAgent {
            name: "Gone".to_string(),
            email: "gone@example.com".to_string(),
            mobile: "555".to_string(),
            password_hash: "hash".to_string(),
        },
    )
    .await
    .unwrap();
    agents::append_agent_tasks(&pool, agent.id, &[TaskRecord::new("A", "1", "n")])
        .await
        .unwrap();

    agents::delete_agent(&pool, agent.id).await.unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
