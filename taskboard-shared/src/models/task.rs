/// Tasks
///
/// A task belongs to one project and one assignee. Status, priority and type
/// are closed PostgreSQL enums. Deletion is soft: `deleted_at` is set and the
/// row disappears from every query in this module.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE task_status AS ENUM ('backlog', 'todo', 'in_progress', 'done');
/// CREATE TYPE task_priority AS ENUM ('low', 'medium', 'high', 'critical');
/// CREATE TYPE task_type AS ENUM ('feature', 'bug', 'chore', 'enhancement');
///
/// CREATE TABLE tasks (
///     id BIGSERIAL PRIMARY KEY,
///     uuid UUID NOT NULL UNIQUE,
///     project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status task_status NOT NULL DEFAULT 'backlog',
///     priority task_priority NOT NULL DEFAULT 'medium',
///     type task_type NOT NULL DEFAULT 'feature',
///     story_points INTEGER CHECK (story_points BETWEEN 1 AND 20),
///     due_date DATE,
///     deleted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::models::page::Page;
/// use taskboard_shared::models::task::{Task, TaskFilter, TaskSort, TaskStatus};
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool, project_id: i64) -> Result<(), sqlx::Error> {
/// let filter = TaskFilter {
///     status: Some(TaskStatus::Todo),
///     ..Default::default()
/// };
/// let page = Task::list(&pool, project_id, &filter, TaskSort::default(), Page::default()).await?;
/// println!("{} of {}", page.data.len(), page.total);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::scope::{Actor, ScopeRule};
use crate::models::page::{Page, Paginated};
use crate::models::user::UserSummary;
use crate::transition::MovePlan;

/// An enum value that is not part of the closed set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("The selected {field} is invalid.")]
pub struct ParseEnumError {
    pub field: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [
        TaskPriority::Low,
        TaskPriority::Medium,
        TaskPriority::High,
        TaskPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("priority", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Feature,
    Bug,
    Chore,
    Enhancement,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::Feature,
        TaskType::Bug,
        TaskType::Chore,
        TaskType::Enhancement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Feature => "feature",
            TaskType::Bug => "bug",
            TaskType::Chore => "chore",
            TaskType::Enhancement => "enhancement",
        }
    }
}

impl FromStr for TaskType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("type", s))
    }
}

/// critical, high, medium, low
pub const PRIORITY_RANK_SQL: &str =
    "CASE t.priority WHEN 'critical' THEN 0 WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END";

const TASK_COLUMNS: &str = "t.id, t.uuid, t.project_id, t.user_id, t.title, t.description, \
     t.status, t.priority, t.type, t.story_points, t.due_date, t.created_at, t.updated_at, \
     u.name AS assignee_name";

/// A live (not soft-deleted) task row with its assignee's name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub uuid: Uuid,
    pub project_id: i64,

    /// Assignee
    pub user_id: i64,

    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,

    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub story_points: Option<i32>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    pub assignee_name: String,
}

/// Response shape: the task plus `assignee {id, name}`
#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub assignee: UserSummary,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            assignee: UserSummary {
                id: task.user_id,
                name: task.assignee_name.clone(),
            },
            task,
        }
    }
}

/// How a `{task}` path segment refers to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRef {
    Id(i64),
    Uuid(Uuid),
}

impl FromStr for TaskRef {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(id) = s.parse::<i64>() {
            return Ok(TaskRef::Id(id));
        }
        Uuid::parse_str(s)
            .map(TaskRef::Uuid)
            .map_err(|_| ParseEnumError::new("task", s))
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRef::Id(id) => write!(f, "{}", id),
            TaskRef::Uuid(uuid) => write!(f, "{}", uuid),
        }
    }
}

/// Validated input for a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub story_points: Option<i32>,
    pub due_date: Option<NaiveDate>,
}

/// Partial update. Outer `None` leaves a field alone; `Some(None)` clears a nullable one.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub story_points: Option<Option<i32>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub user_id: Option<i64>,
}

/// Listing filters; `None` means no filter
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Status,
    Priority,
    Type,
    DueDate,
    StoryPoints,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "t.created_at",
            SortField::UpdatedAt => "t.updated_at",
            SortField::Title => "t.title",
            SortField::Status => "t.status",
            SortField::Priority => "t.priority",
            SortField::Type => "t.type",
            SortField::DueDate => "t.due_date",
            SortField::StoryPoints => "t.story_points",
        }
    }
}

impl FromStr for SortField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created_at" => SortField::CreatedAt,
            "updated_at" => SortField::UpdatedAt,
            "title" => SortField::Title,
            "status" => SortField::Status,
            "priority" => SortField::Priority,
            "type" => SortField::Type,
            "due_date" => SortField::DueDate,
            "story_points" => SortField::StoryPoints,
            other => return Err(ParseEnumError::new("sort_by", other)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ParseEnumError::new("sort_order", s)),
        }
    }
}

/// Defaults to `created_at DESC`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TaskSort {
    /// `ORDER BY` clause; ties broken by id in the same direction
    pub fn order_by(&self) -> String {
        let dir = self.direction.sql();
        format!(" ORDER BY {} {dir}, t.id {dir}", self.field.column())
    }
}

/// Escapes `%`, `_` and `\` so `term` matches literally inside `ILIKE ... ESCAPE '\'`
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn select_live(project_id: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {TASK_COLUMNS} FROM tasks t JOIN users u ON u.id = t.user_id \
         WHERE t.deleted_at IS NULL AND t.project_id = "
    ));
    qb.push_bind(project_id);
    qb
}

fn count_live(project_id: i64) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tasks t WHERE t.deleted_at IS NULL AND t.project_id = ");
    qb.push_bind(project_id);
    qb
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &TaskFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ").push_bind(status);
    }
    if let Some(task_type) = filter.task_type {
        qb.push(" AND t.type = ").push_bind(task_type);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND t.priority = ").push_bind(priority);
    }
    if let Some(assignee) = filter.assignee {
        qb.push(" AND t.user_id = ").push_bind(assignee);
    }
}

fn push_search(qb: &mut QueryBuilder<'static, Postgres>, term: &str) {
    if term.is_empty() {
        return;
    }
    let pattern = format!("%{}%", escape_like(term));
    qb.push(" AND (t.title ILIKE ")
        .push_bind(pattern.clone())
        .push(r" ESCAPE '\' OR t.description ILIKE ")
        .push_bind(pattern)
        .push(r" ESCAPE '\')");
}

/// Wraps a data-modifying statement (which must `RETURNING *`) so the
/// result comes back with the assignee name joined in
fn returning_view(statement: &str) -> String {
    format!("WITH t AS ({statement}) SELECT {TASK_COLUMNS} FROM t JOIN users u ON u.id = t.user_id")
}

impl Task {
    pub async fn create(pool: &PgPool, project_id: i64, data: NewTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&returning_view(
            "INSERT INTO tasks (uuid, project_id, user_id, title, description, status, priority, \
             type, story_points, due_date) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        ))
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.task_type)
        .bind(data.story_points)
        .bind(data.due_date)
        .fetch_one(pool)
        .await?;

        info!(task_id = task.id, project_id, status = task.status.as_str(), "Task created");
        Ok(task)
    }

    /// Looks up a live task inside `project_id`; `backlog_only` restricts to status `backlog`
    pub async fn find_in_project(
        pool: &PgPool,
        project_id: i64,
        task: TaskRef,
        backlog_only: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = select_live(project_id);
        match task {
            TaskRef::Id(id) => qb.push(" AND t.id = ").push_bind(id),
            TaskRef::Uuid(uuid) => qb.push(" AND t.uuid = ").push_bind(uuid),
        };
        if backlog_only {
            qb.push(" AND t.status = 'backlog'");
        }

        let found = qb.build_query_as::<Task>().fetch_optional(pool).await?;
        debug!(project_id, %task, found = found.is_some(), "Task lookup");
        Ok(found)
    }

    /// Filtered, sorted, paginated listing for one project
    pub async fn list(
        pool: &PgPool,
        project_id: i64,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let mut count = count_live(project_id);
        push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = select_live(project_id);
        push_filter(&mut qb, filter);
        qb.push(sort.order_by());
        qb.push(" LIMIT ").push_bind(page.per_page);
        qb.push(" OFFSET ").push_bind(page.offset());

        let tasks = qb.build_query_as::<Task>().fetch_all(pool).await?;
        Ok(Paginated::new(tasks, page, total))
    }

    /// Case-insensitive substring match on title or description, newest first
    pub async fn search(
        pool: &PgPool,
        project_id: i64,
        term: &str,
        page: Page,
    ) -> Result<Paginated<Self>, sqlx::Error> {
        let term = term.trim();

        let mut count = count_live(project_id);
        push_search(&mut count, term);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut qb = select_live(project_id);
        push_search(&mut qb, term);
        qb.push(TaskSort::default().order_by());
        qb.push(" LIMIT ").push_bind(page.per_page);
        qb.push(" OFFSET ").push_bind(page.offset());

        let tasks = qb.build_query_as::<Task>().fetch_all(pool).await?;
        Ok(Paginated::new(tasks, page, total))
    }

    /// Backlog tasks: critical first, then oldest first
    pub async fn backlog(pool: &PgPool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = select_live(project_id);
        qb.push(" AND t.status = 'backlog'");
        qb.push(format!(" ORDER BY {PRIORITY_RANK_SQL}, t.created_at ASC, t.id ASC"));

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// All live tasks of a project ordered by priority rank, for grouping by status
    pub async fn ranked_for_project(pool: &PgPool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = select_live(project_id);
        qb.push(format!(" ORDER BY {PRIORITY_RANK_SQL}, t.created_at ASC, t.id ASC"));

        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Applies a partial update to a live task
    pub async fn update(pool: &PgPool, id: i64, data: UpdateTask) -> Result<Self, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("WITH t AS (UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            qb.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            qb.push(", description = ").push_bind(description);
        }
        if let Some(task_type) = data.task_type {
            qb.push(", type = ").push_bind(task_type);
        }
        if let Some(status) = data.status {
            qb.push(", status = ").push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ").push_bind(priority);
        }
        if let Some(story_points) = data.story_points {
            qb.push(", story_points = ").push_bind(story_points);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ").push_bind(due_date);
        }
        if let Some(user_id) = data.user_id {
            qb.push(", user_id = ").push_bind(user_id);
        }

        qb.push(" WHERE deleted_at IS NULL AND id = ").push_bind(id);
        qb.push(format!(
            " RETURNING *) SELECT {TASK_COLUMNS} FROM t JOIN users u ON u.id = t.user_id"
        ));

        let task = qb.build_query_as::<Task>().fetch_one(pool).await?;

        info!(task_id = id, "Task updated");
        Ok(task)
    }

    /// Overwrites the status; last write wins
    pub async fn set_status(pool: &PgPool, id: i64, status: TaskStatus) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&returning_view(
            "UPDATE tasks SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        ))
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await?;

        info!(task_id = id, status = status.as_str(), "Task status changed");
        Ok(task)
    }

    /// Applies a validated backlog move
    ///
    /// Returns `None` if the task left the backlog between lookup and update.
    pub async fn apply_move(pool: &PgPool, id: i64, plan: &MovePlan) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(&returning_view(
            "UPDATE tasks SET status = $2, user_id = COALESCE($3, user_id), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL AND status = 'backlog' RETURNING *",
        ))
        .bind(id)
        .bind(plan.status)
        .bind(plan.assignee)
        .fetch_optional(pool)
        .await?;

        if let Some(ref task) = task {
            info!(task_id = id, status = task.status.as_str(), assignee = task.user_id, "Task moved from backlog");
        }
        Ok(task)
    }

    /// Marks the task deleted
    pub async fn soft_delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;

        info!(task_id = id, "Task soft-deleted");
        Ok(result.rows_affected() > 0)
    }
}

/// Tasks of a project split by status, each group in priority-rank order
#[derive(Debug, Clone, Default, Serialize)]
pub struct TasksByStatus {
    pub backlog: Vec<TaskView>,
    pub todo: Vec<TaskView>,
    pub in_progress: Vec<TaskView>,
    pub done: Vec<TaskView>,
}

impl TasksByStatus {
    /// Groups `tasks`, keeping their relative order
    pub fn group(tasks: Vec<Task>) -> Self {
        let mut grouped = Self::default();
        for task in tasks {
            let bucket = match task.status {
                TaskStatus::Backlog => &mut grouped.backlog,
                TaskStatus::Todo => &mut grouped.todo,
                TaskStatus::InProgress => &mut grouped.in_progress,
                TaskStatus::Done => &mut grouped.done,
            };
            bucket.push(TaskView::from(task));
        }
        grouped
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct RecentTaskRow {
    id: i64,
    uuid: Uuid,
    title: String,
    status: TaskStatus,
    priority: TaskPriority,
    project_name: String,
    project_uuid: Uuid,
    assignee_id: i64,
    assignee_name: String,
    updated_at: DateTime<Utc>,
}

/// Dashboard entry for a recently touched task
#[derive(Debug, Clone, Serialize)]
pub struct RecentTask {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub project_name: String,
    pub project_uuid: Uuid,
    pub assignee: UserSummary,
    pub updated_at: DateTime<Utc>,
}

impl From<RecentTaskRow> for RecentTask {
    fn from(row: RecentTaskRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            title: row.title,
            status: row.status,
            priority: row.priority,
            project_name: row.project_name,
            project_uuid: row.project_uuid,
            assignee: UserSummary {
                id: row.assignee_id,
                name: row.assignee_name,
            },
            updated_at: row.updated_at,
        }
    }
}

impl RecentTask {
    /// Most recently updated live tasks across every project visible to `actor`
    pub async fn for_actor(pool: &PgPool, actor: Actor, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT t.id, t.uuid, t.title, t.status, t.priority, \
                    p.name AS project_name, p.uuid AS project_uuid, \
                    t.user_id AS assignee_id, u.name AS assignee_name, t.updated_at \
             FROM tasks t \
             JOIN projects p ON p.id = t.project_id \
             JOIN users u ON u.id = t.user_id \
             WHERE t.deleted_at IS NULL AND ",
        );
        ScopeRule::Visible.push_predicate(&mut qb, "p", actor);
        qb.push(" ORDER BY t.updated_at DESC, t.id DESC LIMIT ").push_bind(limit);

        let rows = qb.build_query_as::<RecentTaskRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(RecentTask::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: i64, status: TaskStatus, priority: TaskPriority) -> Task {
        Task {
            id,
            uuid: Uuid::new_v4(),
            project_id: 1,
            user_id: 2,
            title: format!("Task {id}"),
            description: None,
            status,
            priority,
            task_type: TaskType::Feature,
            story_points: None,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            assignee_name: "Ada".into(),
        }
    }

    #[test]
    fn test_enum_parsing_is_closed() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("critical".parse::<TaskPriority>().unwrap(), TaskPriority::Critical);
        assert_eq!("enhancement".parse::<TaskType>().unwrap(), TaskType::Enhancement);

        let err = "urgent".parse::<TaskPriority>().unwrap_err();
        assert_eq!(err.field, "priority");
        assert_eq!(err.to_string(), "The selected priority is invalid.");
        assert!("In_Progress".parse::<TaskStatus>().is_err());
        assert!("all".parse::<TaskType>().is_err());
    }

    #[test]
    fn test_task_ref_parsing() {
        assert_eq!("42".parse::<TaskRef>().unwrap(), TaskRef::Id(42));

        let uuid = Uuid::new_v4();
        assert_eq!(uuid.to_string().parse::<TaskRef>().unwrap(), TaskRef::Uuid(uuid));
        assert!("not-a-task".parse::<TaskRef>().is_err());
    }

    #[test]
    fn test_sort_parsing_and_sql() {
        assert_eq!(TaskSort::default().order_by(), " ORDER BY t.created_at DESC, t.id DESC");

        let sort = TaskSort {
            field: "due_date".parse().unwrap(),
            direction: "ASC".parse().unwrap(),
        };
        assert_eq!(sort.order_by(), " ORDER BY t.due_date ASC, t.id ASC");

        assert!("password".parse::<SortField>().is_err());
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }

    #[test]
    fn test_filter_sql() {
        let mut qb = select_live(1);
        push_filter(
            &mut qb,
            &TaskFilter {
                status: Some(TaskStatus::Todo),
                assignee: Some(3),
                ..Default::default()
            },
        );

        let sql = qb.sql();
        assert!(sql.contains("t.deleted_at IS NULL AND t.project_id = $1"));
        assert!(sql.contains(" AND t.status = $2"));
        assert!(sql.contains(" AND t.user_id = $3"));
        assert!(!sql.contains("t.priority ="));
    }

    #[test]
    fn test_empty_search_adds_no_predicate() {
        let mut qb = count_live(1);
        push_search(&mut qb, "");
        assert!(!qb.sql().contains("ILIKE"));

        let mut qb = count_live(1);
        push_search(&mut qb, "bug");
        assert!(qb.sql().contains("t.title ILIKE $2"));
        assert!(qb.sql().contains("t.description ILIKE $3"));
    }

    #[test]
    fn test_task_view_serialization() {
        let json = serde_json::to_value(TaskView::from(task(9, TaskStatus::Todo, TaskPriority::High))).unwrap();

        assert_eq!(json["type"], "feature");
        assert_eq!(json["status"], "todo");
        assert_eq!(json["assignee"]["name"], "Ada");
        assert!(json.get("assignee_name").is_none());
        assert!(json.get("task_type").is_none());
    }

    #[test]
    fn test_group_by_status_keeps_order() {
        let grouped = TasksByStatus::group(vec![
            task(1, TaskStatus::Backlog, TaskPriority::Critical),
            task(2, TaskStatus::Done, TaskPriority::High),
            task(3, TaskStatus::Backlog, TaskPriority::Low),
        ]);

        let backlog: Vec<i64> = grouped.backlog.iter().map(|v| v.task.id).collect();
        assert_eq!(backlog, vec![1, 3]);
        assert_eq!(grouped.done.len(), 1);
        assert!(grouped.todo.is_empty());
        assert!(grouped.in_progress.is_empty());
    }
}
