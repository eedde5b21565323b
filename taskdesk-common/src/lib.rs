//! # TaskDesk Common Library
//!
//! Shared code for the TaskDesk services including:
//! - Database models and queries (users, agents, agent tasks)
//! - Authentication primitives (password hashing, bearer tokens)
//! - API response types
//! - Configuration loading

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
