/// Projects
///
/// Projects are addressed externally by `uuid`. The owner holds exclusive
/// administrative rights; deleting a project removes its tasks and member
/// rows through `ON DELETE CASCADE`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE projects (
///     id BIGSERIAL PRIMARY KEY,
///     uuid UUID NOT NULL UNIQUE,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     owner_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::auth::scope::{Actor, ScopeRule};
use crate::models::member::ProjectRole;
use crate::models::user::UserSummary;

/// Column list for `projects` aliased as `p`
pub const PROJECT_COLUMNS: &str =
    "p.id, p.uuid, p.name, p.description, p.owner_id, p.created_at, p.updated_at";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update. `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl UpdateProject {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProjectListRow {
    #[sqlx(flatten)]
    project: Project,
    owner_name: String,
    tasks_count: i64,
    backlog_tasks_count: i64,
}

/// Index entry: the project with its owner and task counts
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: Project,
    pub owner: UserSummary,
    pub tasks_count: i64,
    pub backlog_tasks_count: i64,
}

impl From<ProjectListRow> for ProjectSummary {
    fn from(row: ProjectListRow) -> Self {
        Self {
            owner: UserSummary {
                id: row.project.owner_id,
                name: row.owner_name,
            },
            project: row.project,
            tasks_count: row.tasks_count,
            backlog_tasks_count: row.backlog_tasks_count,
        }
    }
}

impl Project {
    /// Creates a project owned by `actor` together with its `owner` membership row
    ///
    /// Both inserts share one transaction.
    pub async fn create(pool: &PgPool, actor: Actor, data: CreateProject) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(&format!(
            "WITH p AS (
                INSERT INTO projects (uuid, name, description, owner_id)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT {PROJECT_COLUMNS} FROM p"
        ))
        .bind(Uuid::new_v4())
        .bind(data.name)
        .bind(data.description)
        .bind(actor.id())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO project_members (project_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(project.id)
            .bind(actor.id())
            .bind(ProjectRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(project_id = project.id, owner_id = actor.id(), "Project created");
        Ok(project)
    }

    /// Every project visible to `actor`, newest first
    pub async fn list_visible(pool: &PgPool, actor: Actor) -> Result<Vec<ProjectSummary>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROJECT_COLUMNS},
                    u.name AS owner_name,
                    (SELECT COUNT(*) FROM tasks t
                     WHERE t.project_id = p.id AND t.deleted_at IS NULL) AS tasks_count,
                    (SELECT COUNT(*) FROM tasks t
                     WHERE t.project_id = p.id AND t.deleted_at IS NULL
                       AND t.status = 'backlog') AS backlog_tasks_count
             FROM projects p
             JOIN users u ON u.id = p.owner_id
             WHERE "
        ));
        ScopeRule::Visible.push_predicate(&mut qb, "p", actor);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC");

        let rows = qb.build_query_as::<ProjectListRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(ProjectSummary::from).collect())
    }

    /// Applies a partial update; callers skip the call when nothing changed
    pub async fn update(pool: &PgPool, id: i64, data: UpdateProject) -> Result<Self, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("WITH p AS (UPDATE projects SET updated_at = NOW()");

        if let Some(name) = data.name {
            qb.push(", name = ").push_bind(name);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(format!(" RETURNING *) SELECT {PROJECT_COLUMNS} FROM p"));

        let project = qb.build_query_as::<Project>().fetch_one(pool).await?;

        info!(project_id = id, "Project updated");
        Ok(project)
    }

    /// Hard delete; tasks and members go with it
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        info!(project_id = id, "Project deleted");
        Ok(result.rows_affected() > 0)
    }

    pub async fn owner(&self, pool: &PgPool) -> Result<UserSummary, sqlx::Error> {
        sqlx::query_as::<_, UserSummary>("SELECT id, name FROM users WHERE id = $1")
            .bind(self.owner_id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Project {
        Project {
            id: 1,
            uuid: Uuid::new_v4(),
            name: "Alpha".into(),
            description: None,
            owner_id: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_project_is_empty() {
        assert!(UpdateProject::default().is_empty());
        assert!(!UpdateProject {
            description: Some(None),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_summary_serializes_flat_with_owner() {
        let summary = ProjectSummary::from(ProjectListRow {
            project: sample(),
            owner_name: "Ada".into(),
            tasks_count: 3,
            backlog_tasks_count: 1,
        });

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "Alpha");
        assert_eq!(json["owner"]["id"], 10);
        assert_eq!(json["owner"]["name"], "Ada");
        assert_eq!(json["tasks_count"], 3);
        assert_eq!(json["backlog_tasks_count"], 1);
    }
}
