/// Project visibility rules
///
/// Every project lookup by external UUID goes through one of the
/// [`ScopeRule`] predicates below, appended to a `QueryBuilder` so the same
/// SQL is used on read and write paths alike. A project that exists but fails
/// the predicate is indistinguishable from one that does not exist.
///
/// | Rule           | Who passes                                                    |
/// |----------------|---------------------------------------------------------------|
/// | `Visible`      | owner, or assignee of at least one live task in the project   |
/// | `Owner`        | owner only                                                    |
/// | `MemberRead`   | `Visible`, or any row in `project_members`                    |
/// | `MemberManage` | owner, or a member row with role `owner` or `admin`           |
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::scope::{resolve_project, Actor, ScopeRule};
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project_uuid: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let project = resolve_project(&pool, project_uuid, Actor(1), ScopeRule::Visible).await?;
/// println!("{}", project.name);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::project::{Project, PROJECT_COLUMNS};

/// The authenticated user on whose behalf a query runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(pub i64);

impl Actor {
    pub fn id(&self) -> i64 {
        self.0
    }

    pub fn is(&self, user_id: i64) -> bool {
        self.0 == user_id
    }
}

/// Which predicate a project lookup must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    Visible,
    Owner,
    MemberRead,
    MemberManage,
}

impl ScopeRule {
    /// Appends this rule's predicate for `actor` against the projects table aliased as `alias`
    ///
    /// The fragment is parenthesised so it can be joined with `AND`.
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>, alias: &str, actor: Actor) {
        match self {
            ScopeRule::Owner => {
                qb.push(format!("({alias}.owner_id = "));
                qb.push_bind(actor.id());
                qb.push(")");
            }
            ScopeRule::Visible => {
                qb.push("(");
                push_owner_or_assignee(qb, alias, actor);
                qb.push(")");
            }
            ScopeRule::MemberRead => {
                qb.push("(");
                push_owner_or_assignee(qb, alias, actor);
                qb.push(format!(
                    " OR EXISTS (SELECT 1 FROM project_members scope_m \
                     WHERE scope_m.project_id = {alias}.id AND scope_m.user_id = "
                ));
                qb.push_bind(actor.id());
                qb.push("))");
            }
            ScopeRule::MemberManage => {
                qb.push(format!("({alias}.owner_id = "));
                qb.push_bind(actor.id());
                qb.push(format!(
                    " OR EXISTS (SELECT 1 FROM project_members scope_m \
                     WHERE scope_m.project_id = {alias}.id AND scope_m.user_id = "
                ));
                qb.push_bind(actor.id());
                qb.push(" AND scope_m.role IN ('owner', 'admin')))");
            }
        }
    }
}

fn push_owner_or_assignee(qb: &mut QueryBuilder<'_, Postgres>, alias: &str, actor: Actor) {
    qb.push(format!("{alias}.owner_id = "));
    qb.push_bind(actor.id());
    qb.push(format!(
        " OR EXISTS (SELECT 1 FROM tasks scope_t \
         WHERE scope_t.project_id = {alias}.id AND scope_t.user_id = "
    ));
    qb.push_bind(actor.id());
    qb.push(" AND scope_t.deleted_at IS NULL)");
}

/// Error type for scoped lookups
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Missing, or present but outside the actor's scope
    #[error("Project not found")]
    NotFound,

    /// Visible to the actor but the action needs a stronger role
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Loads a project by UUID if `actor` passes `rule`
///
/// # Errors
///
/// `ScopeError::NotFound` when the project is missing or out of scope.
pub async fn resolve_project(
    pool: &PgPool,
    uuid: Uuid,
    actor: Actor,
    rule: ScopeRule,
) -> Result<Project, ScopeError> {
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.uuid = "));
    qb.push_bind(uuid);
    qb.push(" AND ");
    rule.push_predicate(&mut qb, "p", actor);

    let project = qb.build_query_as::<Project>().fetch_optional(pool).await?;

    match project {
        Some(project) => {
            debug!(project_id = project.id, user_id = actor.id(), ?rule, "Project resolved");
            Ok(project)
        }
        None => {
            warn!(%uuid, user_id = actor.id(), ?rule, "Project not in scope");
            Err(ScopeError::NotFound)
        }
    }
}

/// Resolves a project for member management
///
/// Returns 403-style `Forbidden` when the actor can see the project through
/// [`ScopeRule::MemberRead`] but lacks the owner/admin role, and `NotFound`
/// when the project is not visible at all.
pub async fn resolve_member_manager(
    pool: &PgPool,
    uuid: Uuid,
    actor: Actor,
) -> Result<Project, ScopeError> {
    match resolve_project(pool, uuid, actor, ScopeRule::MemberManage).await {
        Err(ScopeError::NotFound) => {
            resolve_project(pool, uuid, actor, ScopeRule::MemberRead).await?;
            Err(ScopeError::Forbidden("Only project owner or admin can add members"))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(rule: ScopeRule) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM projects p WHERE ");
        rule.push_predicate(&mut qb, "p", Actor(7));
        qb.sql().to_string()
    }

    #[test]
    fn test_owner_predicate() {
        assert_eq!(render(ScopeRule::Owner), "SELECT 1 FROM projects p WHERE (p.owner_id = $1)");
    }

    #[test]
    fn test_visible_predicate_includes_live_assignments() {
        let sql = render(ScopeRule::Visible);

        assert!(sql.contains("p.owner_id = $1"));
        assert!(sql.contains("scope_t.project_id = p.id AND scope_t.user_id = $2"));
        assert!(sql.contains("scope_t.deleted_at IS NULL"));
        assert!(!sql.contains("project_members"));
    }

    #[test]
    fn test_member_read_adds_any_membership() {
        let sql = render(ScopeRule::MemberRead);

        assert!(sql.contains("scope_t.user_id = $2"));
        assert!(sql.contains("scope_m.user_id = $3"));
        assert!(!sql.contains("scope_m.role"));
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
    }

    #[test]
    fn test_member_manage_requires_owner_or_admin_role() {
        let sql = render(ScopeRule::MemberManage);

        assert!(sql.contains("p.owner_id = $1"));
        assert!(sql.contains("scope_m.role IN ('owner', 'admin')"));
        assert!(!sql.contains("scope_t"));
        assert_eq!(sql.matches('(').count(), sql.matches(')').count());
    }

    #[test]
    fn test_alias_is_respected() {
        let mut qb = QueryBuilder::<Postgres>::new("");
        ScopeRule::Visible.push_predicate(&mut qb, "proj", Actor(1));

        assert!(qb.sql().contains("proj.owner_id"));
        assert!(qb.sql().contains("scope_t.project_id = proj.id"));
    }

    #[test]
    fn test_actor_identity() {
        let actor = Actor(3);
        assert_eq!(actor.id(), 3);
        assert!(actor.is(3));
        assert!(!actor.is(4));
    }
}
