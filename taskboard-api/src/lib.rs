//! # Taskboard API Server Library
//!
//! HTTP surface of the taskboard backend: projects, tasks, members,
//! dashboard statistics and per-user preferences.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error envelope and HTTP status mapping
//! - `extract`: JSON extractors with validation
//! - `response`: Success envelope
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod response;
pub mod routes;
