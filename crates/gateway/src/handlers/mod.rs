//! API handlers module

pub mod auth;
pub mod evaluation;
pub mod health;
pub mod maintenance;
pub mod notes;
pub mod query;
pub mod quiz;
