/// Task statistics
///
/// One grouped query per scope returns `(status, type, priority, count,
/// overdue)` rows; [`TaskStats::fold`] turns them into zero-filled counters.
/// A task is overdue when its due date is before `now` and it is not `done`.
///
/// # Example
///
/// ```
/// use taskboard_shared::stats::completion_rate;
///
/// assert_eq!(completion_rate(2, 4), 50.0);
/// assert_eq!(completion_rate(0, 0), 0.0);
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::auth::scope::{Actor, ScopeRule};
use crate::models::task::{TaskPriority, TaskStatus, TaskType};

/// `done / total * 100` rounded to two decimals, 0 for an empty set
pub fn completion_rate(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = done as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub backlog: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub done: i64,
}

impl StatusCounts {
    pub fn get(&self, status: TaskStatus) -> i64 {
        match status {
            TaskStatus::Backlog => self.backlog,
            TaskStatus::Todo => self.todo,
            TaskStatus::InProgress => self.in_progress,
            TaskStatus::Done => self.done,
        }
    }

    fn add(&mut self, status: TaskStatus, n: i64) {
        match status {
            TaskStatus::Backlog => self.backlog += n,
            TaskStatus::Todo => self.todo += n,
            TaskStatus::InProgress => self.in_progress += n,
            TaskStatus::Done => self.done += n,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub feature: i64,
    pub bug: i64,
    pub chore: i64,
    pub enhancement: i64,
}

impl TypeCounts {
    fn add(&mut self, task_type: TaskType, n: i64) {
        match task_type {
            TaskType::Feature => self.feature += n,
            TaskType::Bug => self.bug += n,
            TaskType::Chore => self.chore += n,
            TaskType::Enhancement => self.enhancement += n,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

impl PriorityCounts {
    fn add(&mut self, priority: TaskPriority, n: i64) {
        match priority {
            TaskPriority::Low => self.low += n,
            TaskPriority::Medium => self.medium += n,
            TaskPriority::High => self.high += n,
            TaskPriority::Critical => self.critical += n,
        }
    }
}

/// One `GROUP BY status, type, priority` bucket
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct StatsRow {
    pub status: TaskStatus,
    #[sqlx(rename = "type")]
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub count: i64,
    pub overdue: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
    pub status_stats: StatusCounts,
    pub type_stats: TypeCounts,
    pub priority_stats: PriorityCounts,
    pub completion_rate: f64,
}

impl TaskStats {
    pub fn fold(rows: impl IntoIterator<Item = StatsRow>) -> Self {
        let mut stats = Self::default();

        for row in rows {
            stats.total_tasks += row.count;
            stats.overdue_tasks += row.overdue;
            stats.status_stats.add(row.status, row.count);
            stats.type_stats.add(row.task_type, row.count);
            stats.priority_stats.add(row.priority, row.count);
        }

        stats.completed_tasks = stats.status_stats.done;
        stats.completion_rate = completion_rate(stats.completed_tasks, stats.total_tasks);
        stats
    }

    /// Statistics over the live tasks of one project
    pub async fn for_project(pool: &PgPool, project_id: i64, now: DateTime<Utc>) -> Result<Self, sqlx::Error> {
        let mut qb = grouped_select(now);
        qb.push(" FROM tasks t WHERE t.deleted_at IS NULL AND t.project_id = ");
        qb.push_bind(project_id);
        qb.push(GROUP_BY);

        let rows = qb.build_query_as::<StatsRow>().fetch_all(pool).await?;
        debug!(project_id, buckets = rows.len(), "Project stats computed");
        Ok(Self::fold(rows))
    }

    /// Statistics over every project visible to `actor`
    pub async fn for_actor(pool: &PgPool, actor: Actor, now: DateTime<Utc>) -> Result<Self, sqlx::Error> {
        let mut qb = grouped_select(now);
        qb.push(" FROM tasks t JOIN projects p ON p.id = t.project_id WHERE t.deleted_at IS NULL AND ");
        ScopeRule::Visible.push_predicate(&mut qb, "p", actor);
        qb.push(GROUP_BY);

        let rows = qb.build_query_as::<StatsRow>().fetch_all(pool).await?;
        debug!(user_id = actor.id(), buckets = rows.len(), "Dashboard stats computed");
        Ok(Self::fold(rows))
    }
}

const GROUP_BY: &str = " GROUP BY t.status, t.type, t.priority";

fn grouped_select(now: DateTime<Utc>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(
        "SELECT t.status, t.type, t.priority, COUNT(*) AS count, \
         COUNT(*) FILTER (WHERE t.due_date IS NOT NULL AND t.due_date < ",
    );
    qb.push_bind(now);
    qb.push(" AND t.status <> 'done') AS overdue");
    qb
}

/// Per-status summary shown alongside a single project
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectOverview {
    pub total_tasks: i64,
    pub backlog_tasks: i64,
    pub todo_tasks: i64,
    pub in_progress_tasks: i64,
    pub done_tasks: i64,
    pub completion_rate: f64,
}

impl From<&StatusCounts> for ProjectOverview {
    fn from(counts: &StatusCounts) -> Self {
        let total = counts.backlog + counts.todo + counts.in_progress + counts.done;

        Self {
            total_tasks: total,
            backlog_tasks: counts.backlog,
            todo_tasks: counts.todo,
            in_progress_tasks: counts.in_progress,
            done_tasks: counts.done,
            completion_rate: completion_rate(counts.done, total),
        }
    }
}
