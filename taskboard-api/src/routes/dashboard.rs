/// Dashboard endpoints, aggregated over every project visible to the caller
///
/// - `GET /dashboard/stats`
/// - `GET /dashboard/recent-tasks?limit=5`

use crate::{
    app::AppState,
    error::{ApiResult, OrFail},
    extract::ApiQuery,
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::middleware::AuthContext,
    models::task::RecentTask,
    stats::{PriorityCounts, StatusCounts, TaskStats, TypeCounts},
};

pub const DEFAULT_RECENT_LIMIT: i64 = 5;
pub const MAX_RECENT_LIMIT: i64 = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_tasks: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub overdue: i64,
    pub status_stats: StatusCounts,
    pub type_stats: TypeCounts,
    pub priority_stats: PriorityCounts,
    pub completion_rate: f64,
}

impl From<TaskStats> for DashboardStats {
    fn from(stats: TaskStats) -> Self {
        Self {
            total_tasks: stats.total_tasks,
            completed: stats.completed_tasks,
            in_progress: stats.status_stats.in_progress,
            overdue: stats.overdue_tasks,
            status_stats: stats.status_stats,
            type_stats: stats.type_stats,
            priority_stats: stats.priority_stats,
            completion_rate: stats.completion_rate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentTasksQuery {
    pub limit: Option<i64>,
}

impl RecentTasksQuery {
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT)
    }
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<DashboardStats>> {
    let stats = TaskStats::for_actor(&state.db, auth.actor(), Utc::now())
        .await
        .or_fail("Failed to fetch dashboard statistics")?;

    Ok(ApiResponse::ok(DashboardStats::from(stats)))
}

pub async fn recent_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<RecentTasksQuery>,
) -> ApiResult<ApiResponse<Vec<RecentTask>>> {
    let tasks = RecentTask::for_actor(&state.db, auth.actor(), query.limit())
        .await
        .or_fail("Failed to fetch recent tasks")?;

    Ok(ApiResponse::ok(tasks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_limit_is_clamped() {
        assert_eq!(RecentTasksQuery::default().limit(), 5);
        assert_eq!(RecentTasksQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(RecentTasksQuery { limit: Some(500) }.limit(), 50);
        assert_eq!(RecentTasksQuery { limit: Some(12) }.limit(), 12);
    }

    #[test]
    fn test_no_visible_projects_is_all_zero() {
        let stats = DashboardStats::from(TaskStats::default());
        let json = serde_json::to_value(&stats).unwrap();

        for key in ["total_tasks", "completed", "in_progress", "overdue"] {
            assert_eq!(json[key], 0, "{key}");
        }
        assert_eq!(json["completion_rate"], 0.0);
        assert_eq!(json["status_stats"]["done"], 0);
    }
}
