pub mod auth;
pub mod completions;
pub mod config;
pub mod notes;
pub mod session;
pub mod tasks;
pub mod workspaces;
