/// Project endpoints
///
/// - `GET    /projects` - Projects visible to the caller
/// - `POST   /projects` - Create a project owned by the caller
/// - `GET    /projects/:project` - Project with tasks grouped by status
/// - `PUT    /projects/:project` - Partial update (owner only)
/// - `DELETE /projects/:project` - Hard delete with tasks and members (owner only)
/// - `GET    /projects/:project/backlog` - Backlog in priority order
/// - `POST   /projects/:project/backlog` - Add a backlog task
/// - `GET    /projects/:project/stats` - Task statistics
///
/// A project outside the caller's scope answers 404 whether or not it exists.

use crate::{
    app::AppState,
    error::{ApiResult, OrFail},
    extract::{double_option, project_uuid, required, ValidJson},
    response::ApiResponse,
    routes::tasks::{valid_priority, valid_task_type, ProjectBrief},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use taskboard_shared::{
    auth::{
        middleware::AuthContext,
        scope::{resolve_project, ScopeRule},
    },
    models::{
        project::{CreateProject, Project, ProjectSummary, UpdateProject},
        task::{NewTask, Task, TaskStatus, TaskView, TasksByStatus},
        user::UserSummary,
    },
    stats::{ProjectOverview, StatusCounts, TaskStats},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct StoreProjectRequest {
    #[validate(
        required(message = "The name field is required."),
        length(min = 1, max = 255, message = "The name may not be greater than 255 characters.")
    )]
    pub name: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "The name may not be greater than 255 characters."))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BacklogTaskRequest {
    #[validate(
        required(message = "The title field is required."),
        length(min = 1, max = 255, message = "The title may not be greater than 255 characters.")
    )]
    pub title: Option<String>,

    pub description: Option<String>,

    #[serde(rename = "type")]
    #[validate(
        required(message = "The type field is required."),
        custom(function = "valid_task_type")
    )]
    pub task_type: Option<String>,

    #[validate(
        required(message = "The priority field is required."),
        custom(function = "valid_priority")
    )]
    pub priority: Option<String>,

    #[validate(range(min = 1, max = 20, message = "The story points must be between 1 and 20."))]
    pub story_points: Option<i32>,
}

/// A project with its owner embedded
#[derive(Debug, Serialize)]
pub struct ProjectWithOwner {
    #[serde(flatten)]
    pub project: Project,
    pub owner: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    pub project: ProjectWithOwner,
    pub tasks_by_status: TasksByStatus,
    pub stats: ProjectOverview,
}

/// Backlog listing; `project` sits beside `data` in the envelope
#[derive(Debug, Serialize)]
pub struct BacklogListing {
    pub success: bool,
    pub data: Vec<TaskView>,
    pub project: ProjectBrief,
}

async fn with_owner(state: &AppState, project: Project) -> ApiResult<ProjectWithOwner> {
    let owner = project.owner(&state.db).await?;
    Ok(ProjectWithOwner { project, owner })
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<ProjectSummary>>> {
    let projects = Project::list_visible(&state.db, auth.actor())
        .await
        .or_fail("Failed to fetch projects")?;

    Ok(ApiResponse::ok(projects))
}

/// Create a project; the caller becomes owner and its first member
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<StoreProjectRequest>,
) -> ApiResult<ApiResponse<ProjectWithOwner>> {
    let data = CreateProject {
        name: required(req.name, "name")?,
        description: req.description,
    };

    let project = Project::create(&state.db, auth.actor(), data)
        .await
        .or_fail("Failed to create project")?;
    let project = with_owner(&state, project).await.or_fail("Failed to create project")?;

    Ok(ApiResponse::created(project).with_message("Project created successfully"))
}

/// Project with its tasks grouped by status and a per-status summary
///
/// Each group is ordered critical first.
pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
) -> ApiResult<ApiResponse<ProjectDetail>> {
    let actor = auth.actor();
    tracing::info!(project = %project, user_id = actor.id(), "Project show");

    let project = resolve_project(&state.db, project_uuid(&project)?, actor, ScopeRule::Visible).await?;

    let tasks = Task::ranked_for_project(&state.db, project.id)
        .await
        .or_fail("Failed to fetch project")?;
    let grouped = TasksByStatus::group(tasks);

    let counts = StatusCounts {
        backlog: grouped.backlog.len() as i64,
        todo: grouped.todo.len() as i64,
        in_progress: grouped.in_progress.len() as i64,
        done: grouped.done.len() as i64,
    };

    let project = with_owner(&state, project).await.or_fail("Failed to fetch project")?;

    Ok(ApiResponse::ok(ProjectDetail {
        project,
        tasks_by_status: grouped,
        stats: ProjectOverview::from(&counts),
    }))
}

/// Partial update of name and description
///
/// # Errors
///
/// - `404`: Not the owner, or no such project
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ValidJson(req): ValidJson<UpdateProjectRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Owner).await?;

    let data = UpdateProject {
        name: req.name,
        description: req.description,
    };
    if data.is_empty() {
        return Ok(ApiResponse::ok(project).with_message("Project updated successfully"));
    }

    let project = Project::update(&state.db, project.id, data)
        .await
        .or_fail("Failed to update project")?;

    Ok(ApiResponse::ok(project).with_message("Project updated successfully"))
}

pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Owner).await?;

    Project::delete(&state.db, project.id)
        .await
        .or_fail("Failed to delete project")?;

    Ok(ApiResponse::message("Project deleted successfully"))
}

/// Backlog tasks: critical, high, medium, low, then oldest first
pub async fn backlog(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
) -> ApiResult<Json<BacklogListing>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;

    let tasks = Task::backlog(&state.db, project.id)
        .await
        .or_fail("Failed to fetch backlog")?;

    Ok(Json(BacklogListing {
        success: true,
        data: tasks.into_iter().map(TaskView::from).collect(),
        project: ProjectBrief::from(&project),
    }))
}

/// Add a task straight to the backlog, assigned to the caller
pub async fn add_to_backlog(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ValidJson(req): ValidJson<BacklogTaskRequest>,
) -> ApiResult<ApiResponse<TaskView>> {
    let actor = auth.actor();
    let project = resolve_project(&state.db, project_uuid(&project)?, actor, ScopeRule::Visible).await?;

    let data = NewTask {
        user_id: actor.id(),
        title: required(req.title, "title")?,
        description: req.description,
        task_type: required(req.task_type, "type")?.parse()?,
        status: TaskStatus::Backlog,
        priority: required(req.priority, "priority")?.parse()?,
        story_points: req.story_points,
        due_date: None,
    };

    let task = Task::create(&state.db, project.id, data)
        .await
        .or_fail("Failed to add task to backlog")?;

    Ok(ApiResponse::created(TaskView::from(task)).with_message("Task added to backlog successfully"))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
) -> ApiResult<ApiResponse<TaskStats>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;

    let stats = TaskStats::for_project(&state.db, project.id, Utc::now())
        .await
        .or_fail("Failed to fetch project statistics")?;

    Ok(ApiResponse::ok(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldErrors;
    use serde_json::json;

    #[test]
    fn test_store_request_validation() {
        let req: StoreProjectRequest = serde_json::from_value(json!({"name": "Alpha"})).unwrap();
        assert!(req.validate().is_ok());

        let long: StoreProjectRequest = serde_json::from_value(json!({"name": "x".repeat(256)})).unwrap();
        let errors = FieldErrors::from(&long.validate().unwrap_err());
        assert_eq!(
            errors.get("name"),
            Some(&["The name may not be greater than 255 characters.".to_string()][..])
        );

        let missing: StoreProjectRequest = serde_json::from_value(json!({"description": "d"})).unwrap();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_update_request_is_partial() {
        let req: UpdateProjectRequest = serde_json::from_value(json!({"description": null})).unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.name, None);
        assert_eq!(req.description, Some(None));

        let empty_name: UpdateProjectRequest = serde_json::from_value(json!({"name": ""})).unwrap();
        assert!(empty_name.validate().is_err());
    }

    #[test]
    fn test_backlog_request_rejects_unknown_priority() {
        let req: BacklogTaskRequest = serde_json::from_value(json!({
            "title": "Fix bug",
            "type": "bug",
            "priority": "blocker"
        }))
        .unwrap();
        let errors = FieldErrors::from(&req.validate().unwrap_err());

        assert_eq!(
            errors.get("priority"),
            Some(&["The selected priority is invalid.".to_string()][..])
        );
    }
}
