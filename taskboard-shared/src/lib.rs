//! # Taskboard Shared Library
//!
//! Data layer and domain rules used by the Taskboard API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and migrations
//! - `models`: users, projects, members, tasks and preferences
//! - `auth`: password hashing, JWT, bearer middleware and project scoping
//! - `transition`: backlog move and assignment rules
//! - `stats`: task statistics for projects and the dashboard

pub mod auth;
pub mod db;
pub mod models;
pub mod stats;
pub mod transition;

/// Current version of the Taskboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
