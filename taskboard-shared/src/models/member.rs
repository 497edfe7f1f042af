/// Explicit project membership
///
/// Membership is independent of task assignment: a user can be a member
/// without holding any task, and an assignee need not be a member. The
/// project creator gets an `owner` row at creation time.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_role AS ENUM ('owner', 'admin', 'member');
///
/// CREATE TABLE project_members (
///     project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role project_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, user_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;

use crate::models::task::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    /// Created the project
    Owner,

    /// Can manage members
    Admin,

    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "owner",
            ProjectRole::Admin => "admin",
            ProjectRole::Member => "member",
        }
    }

    /// Roles a caller may hand out through the members endpoint
    pub fn is_assignable(&self) -> bool {
        !matches!(self, ProjectRole::Owner)
    }
}

impl FromStr for ProjectRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(ProjectRole::Owner),
            "admin" => Ok(ProjectRole::Admin),
            "member" => Ok(ProjectRole::Member),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// Member listing entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectMember {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: ProjectRole,
    pub joined_at: DateTime<Utc>,
}

impl ProjectMember {
    /// Members of a project, earliest first
    pub async fn list_by_project(pool: &PgPool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let members = sqlx::query_as::<_, ProjectMember>(
            r#"
            SELECT m.user_id, u.name, u.email, m.role, m.created_at AS joined_at
            FROM project_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.project_id = $1
            ORDER BY m.created_at ASC, m.user_id ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Adds each user with `role`, or updates the role of an existing member
    ///
    /// The `owner` row is never downgraded. Runs in one transaction.
    pub async fn upsert_many(
        pool: &PgPool,
        project_id: i64,
        user_ids: &[i64],
        role: ProjectRole,
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for user_id in user_ids {
            sqlx::query(
                r#"
                INSERT INTO project_members (project_id, user_id, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (project_id, user_id)
                DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()
                WHERE project_members.role <> 'owner'
                "#,
            )
            .bind(project_id)
            .bind(user_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(project_id, count = user_ids.len(), role = role.as_str(), "Project members upserted");
        Ok(())
    }

    pub async fn find_role(
        pool: &PgPool,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<ProjectRole>, sqlx::Error> {
        let role: Option<ProjectRole> = sqlx::query_scalar(
            "SELECT role FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(!ProjectRole::Owner.is_assignable());
        assert!(ProjectRole::Admin.is_assignable());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<ProjectRole>().unwrap(), ProjectRole::Admin);
        assert_eq!(ProjectRole::Member.as_str(), "member");
        assert!("viewer".parse::<ProjectRole>().is_err());
    }
}
