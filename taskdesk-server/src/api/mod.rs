//! HTTP API handlers for taskdesk-server

pub mod agents;
pub mod auth;
pub mod health;
pub mod upload;

pub use agents::{clear_agent_tasks, create_agent, delete_agent, get_agent, list_agents, update_agent};
pub use auth::{login, require_admin, signup};
pub use health::health_routes;
pub use upload::{upload_routes, upload_tasks};
