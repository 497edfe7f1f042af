/// API route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh, current user
/// - `projects`: Project CRUD, backlog and statistics
/// - `members`: Project membership
/// - `tasks`: Task CRUD, status changes, backlog moves and search
/// - `dashboard`: Cross-project statistics and recent activity
/// - `preferences`: Per-user key/value settings

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod members;
pub mod preferences;
pub mod projects;
pub mod tasks;
