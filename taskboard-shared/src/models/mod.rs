/// Database models and their queries
///
/// # Models
///
/// - `user`: accounts and credentials
/// - `project`: projects addressed by UUID
/// - `member`: explicit project membership with roles
/// - `task`: project tasks, filtering, search and backlog ordering
/// - `preference`: per-user key/value settings
/// - `page`: offset pagination shared by listings
///
/// Queries that look projects up on behalf of a user go through
/// [`crate::auth::scope`] so the visibility predicate is applied uniformly.

pub mod member;
pub mod page;
pub mod preference;
pub mod project;
pub mod task;
pub mod user;
