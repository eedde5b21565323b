//! Agent management endpoints
//!
//! All routes here sit behind [`require_admin`](super::auth::require_admin).
//! Unknown or malformed ids answer 404 `Agent not found`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use taskdesk_common::api::MessageResponse;
use taskdesk_common::db::{self, Agent, AgentUpdate, NewAgent};
use tracing::info;
use uuid::Uuid;

use super::auth::{hash_password_blocking, present};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateAgentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

fn agent_not_found() -> ApiError {
    ApiError::NotFound("Agent not found".to_string())
}

fn all_fields_required() -> ApiError {
    ApiError::BadRequest("All fields are required".to_string())
}

fn agent_exists(err: taskdesk_common::Error) -> ApiError {
    match err {
        taskdesk_common::Error::InvalidInput(_) => {
            ApiError::BadRequest("Agent already exists".to_string())
        }
        other => ApiError::from(other),
    }
}

fn parse_agent_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| agent_not_found())
}

/// GET /api/agents
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Json<Vec<Agent>>> {
    Ok(Json(db::agents::list_agents(&state.db).await?))
}

/// GET /api/agents/:id
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Agent>> {
    let id = parse_agent_id(&id)?;
    db::agents::load_agent(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(agent_not_found)
}

/// POST /api/agents
pub async fn create_agent(
    State(state): State<AppState>,
    body: Result<Json<CreateAgentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (Some(name), Some(email), Some(mobile), Some(password)) = (
        present(&req.name),
        present(&req.email),
        present(&req.mobile),
        present(&req.password),
    ) else {
        return Err(all_fields_required());
    };

    if db::agents::agent_email_exists(&state.db, email).await? {
        return Err(ApiError::BadRequest("Agent already exists".to_string()));
    }

    let new_agent = NewAgent {
        name: name.to_string(),
        email: email.to_string(),
        mobile: mobile.to_string(),
        password_hash: hash_password_blocking(password.to_string()).await?,
    };
    let agent = db::agents::create_agent(&state.db, &new_agent)
        .await
        .map_err(agent_exists)?;

    info!(agent_id = %agent.id, "Agent created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Agent created successfully")),
    ))
}

/// PUT /api/agents/:id
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateAgentRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_agent_id(&id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (Some(name), Some(email), Some(mobile)) = (
        present(&req.name),
        present(&req.email),
        present(&req.mobile),
    ) else {
        return Err(all_fields_required());
    };

    let update = AgentUpdate {
        name: name.to_string(),
        email: email.to_string(),
        mobile: mobile.to_string(),
    };
    let updated = db::agents::update_agent(&state.db, id, &update)
        .await
        .map_err(agent_exists)?;
    if !updated {
        return Err(agent_not_found());
    }

    info!(agent_id = %id, "Agent updated");
    Ok(Json(MessageResponse::new("Agent updated successfully")))
}

/// DELETE /api/agents/:id
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_agent_id(&id)?;
    if !db::agents::delete_agent(&state.db, id).await? {
        return Err(agent_not_found());
    }

    info!(agent_id = %id, "Agent deleted");
    Ok(Json(MessageResponse::new("Agent deleted successfully")))
}

/// DELETE /api/agents/:id/tasks
pub async fn clear_agent_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_agent_id(&id)?;
    if db::agents::load_agent(&state.db, id).await?.is_none() {
        return Err(agent_not_found());
    }

    let removed = db::agents::clear_agent_tasks(&state.db, id).await?;
    info!(agent_id = %id, removed, "Agent tasks cleared");
    Ok(Json(MessageResponse::new("All tasks removed successfully")))
}
