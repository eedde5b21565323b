//! Database models and queries

pub mod agents;
pub mod init;
pub mod models;
pub mod users;

pub use init::*;
pub use models::*;
