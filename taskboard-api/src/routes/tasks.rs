/// Task endpoints, nested under a project
///
/// - `GET    /projects/:project/tasks` - Filtered, sorted, paginated list
/// - `POST   /projects/:project/tasks` - Create a task
/// - `GET    /projects/:project/tasks/:task` - Show a task
/// - `PUT    /projects/:project/tasks/:task` - Partial update
/// - `PATCH  /projects/:project/tasks/:task/status` - Change status only
/// - `PATCH  /projects/:project/tasks/:task/move` - Move out of the backlog
/// - `DELETE /projects/:project/tasks/:task` - Soft delete (owner only)
/// - `GET    /projects/:project/tasks-search?q=` - Search title and description
///
/// `:task` is either the numeric id or the task UUID. Lookups never leave the
/// scoped project, so a task of another project answers 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, FieldErrors, OrFail},
    extract::{double_option, project_uuid, required, ApiQuery, ValidJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use taskboard_shared::{
    auth::{
        middleware::AuthContext,
        scope::{resolve_project, ScopeRule},
    },
    models::{
        page::{Page, Paginated},
        project::Project,
        task::{
            NewTask, ParseEnumError, SortDirection, SortField, Task, TaskFilter, TaskPriority, TaskRef,
            TaskSort, TaskStatus, TaskType, TaskView, UpdateTask,
        },
        user::User,
    },
    transition::{self, is_move_target},
};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Field validators shared with the backlog endpoint

fn enum_error(err: ParseEnumError) -> ValidationError {
    ValidationError::new("in").with_message(Cow::Owned(err.to_string()))
}

pub(crate) fn valid_status(value: &str) -> Result<(), ValidationError> {
    TaskStatus::from_str(value).map(|_| ()).map_err(enum_error)
}

pub(crate) fn valid_priority(value: &str) -> Result<(), ValidationError> {
    TaskPriority::from_str(value).map(|_| ()).map_err(enum_error)
}

pub(crate) fn valid_task_type(value: &str) -> Result<(), ValidationError> {
    TaskType::from_str(value).map(|_| ()).map_err(enum_error)
}

fn valid_move_target(value: &str) -> Result<(), ValidationError> {
    match TaskStatus::from_str(value) {
        Ok(status) if is_move_target(status) => Ok(()),
        _ => Err(enum_error(ParseEnumError::new("status", value))),
    }
}

pub(crate) fn after_today(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Utc::now().date_naive() {
        Ok(())
    } else {
        Err(ValidationError::new("after")
            .with_message(Cow::Borrowed("The due date must be a date after today.")))
    }
}

/// `{uuid, name}` of the owning project, embedded in task responses
#[derive(Debug, Clone, Serialize)]
pub struct ProjectBrief {
    pub uuid: Uuid,
    pub name: String,
}

impl From<&Project> for ProjectBrief {
    fn from(project: &Project) -> Self {
        Self {
            uuid: project.uuid,
            name: project.name.clone(),
        }
    }
}

/// A task with its assignee and project
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: TaskView,
    pub project: ProjectBrief,
}

impl TaskDetail {
    fn new(task: Task, project: &Project) -> Self {
        Self {
            task: TaskView::from(task),
            project: ProjectBrief::from(project),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// `None`, empty and `all` mean "no filter"
fn filter_value<T>(raw: Option<&str>) -> Result<Option<T>, ParseEnumError>
where
    T: FromStr<Err = ParseEnumError>,
{
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

impl ListTasksQuery {
    fn filter(&self) -> ApiResult<TaskFilter> {
        let assignee = match self.assignee.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| ParseEnumError::new("assignee", raw))?,
            ),
        };

        Ok(TaskFilter {
            status: filter_value(self.status.as_deref())?,
            task_type: filter_value(self.task_type.as_deref())?,
            priority: filter_value(self.priority.as_deref())?,
            assignee,
        })
    }

    fn sort(&self) -> ApiResult<TaskSort> {
        let field = match self.sort_by.as_deref() {
            Some(raw) => raw.parse::<SortField>()?,
            None => SortField::default(),
        };
        let direction = match self.sort_order.as_deref() {
            Some(raw) => raw.parse::<SortDirection>()?,
            None => SortDirection::default(),
        };
        Ok(TaskSort { field, direction })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StoreTaskRequest {
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
        required(message = "The status field is required."),
        custom(function = "valid_status")
    )]
    pub status: Option<String>,

    #[validate(
        required(message = "The priority field is required."),
        custom(function = "valid_priority")
    )]
    pub priority: Option<String>,

    #[validate(range(min = 1, max = 20, message = "The story points must be between 1 and 20."))]
    pub story_points: Option<i32>,

    #[validate(custom(function = "after_today"))]
    pub due_date: Option<NaiveDate>,

    pub user_id: Option<i64>,
}

impl StoreTaskRequest {
    fn into_new_task(self, assignee: i64) -> ApiResult<NewTask> {
        Ok(NewTask {
            user_id: assignee,
            title: required(self.title, "title")?,
            description: self.description,
            task_type: required(self.task_type, "type")?.parse()?,
            status: required(self.status, "status")?.parse()?,
            priority: required(self.priority, "priority")?.parse()?,
            story_points: self.story_points,
            due_date: self.due_date,
        })
    }
}

/// Partial update; explicit `null` clears `description`, `story_points` and `due_date`
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 255, message = "The title may not be greater than 255 characters."))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(rename = "type")]
    #[validate(custom(function = "valid_task_type"))]
    pub task_type: Option<String>,

    #[validate(custom(function = "valid_status"))]
    pub status: Option<String>,

    #[validate(custom(function = "valid_priority"))]
    pub priority: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub story_points: Option<Option<i32>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,

    pub user_id: Option<i64>,
}

impl UpdateTaskRequest {
    /// Rules for the clearable fields, which the derive does not reach
    fn check_nullable(&self) -> ApiResult<()> {
        let mut errors = FieldErrors::new();

        if let Some(Some(points)) = self.story_points {
            if !(1..=20).contains(&points) {
                errors.add("story_points", "The story points must be between 1 and 20.");
            }
        }
        if let Some(Some(date)) = &self.due_date {
            if let Err(e) = after_today(date) {
                errors.add("due_date", e.message.unwrap_or_default());
            }
        }

        errors.into_result()
    }

    fn into_update(self) -> ApiResult<UpdateTask> {
        Ok(UpdateTask {
            title: self.title,
            description: self.description,
            task_type: self.task_type.as_deref().map(str::parse).transpose()?,
            status: self.status.as_deref().map(str::parse).transpose()?,
            priority: self.priority.as_deref().map(str::parse).transpose()?,
            story_points: self.story_points,
            due_date: self.due_date,
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(
        required(message = "The status field is required."),
        custom(function = "valid_status")
    )]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MoveTaskRequest {
    #[validate(
        required(message = "The status field is required."),
        custom(function = "valid_move_target")
    )]
    pub status: Option<String>,

    pub user_id: Option<i64>,
}

/// Resolves the `:task` segment; an unparseable reference cannot exist
fn task_ref(segment: &str) -> ApiResult<TaskRef> {
    segment
        .parse::<TaskRef>()
        .map_err(|_| ApiError::not_found("Task not found"))
}

/// 422 unless `user_id` belongs to an existing user
pub(crate) async fn ensure_user_exists(state: &AppState, user_id: i64) -> ApiResult<()> {
    if User::exists(&state.db, user_id).await? {
        Ok(())
    } else {
        Err(ApiError::invalid("user_id", "The selected user id is invalid."))
    }
}

async fn scoped_task(
    state: &AppState,
    project: &Project,
    task: &str,
    backlog_only: bool,
) -> ApiResult<Task> {
    let task_ref = task_ref(task)?;
    Task::find_in_project(&state.db, project.id, task_ref, backlog_only)
        .await?
        .ok_or_else(|| {
            if backlog_only {
                ApiError::not_found("Task not found in backlog")
            } else {
                ApiError::not_found("Task not found")
            }
        })
}

pub async fn index(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ApiQuery(query): ApiQuery<ListTasksQuery>,
) -> ApiResult<ApiResponse<Paginated<TaskView>>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;

    let filter = query.filter()?;
    let sort = query.sort()?;
    let page = Page::new(query.page, query.per_page);

    let tasks = Task::list(&state.db, project.id, &filter, sort, page)
        .await
        .or_fail("Failed to fetch tasks")?;

    Ok(ApiResponse::ok(tasks.map(TaskView::from)))
}

/// Create a task
///
/// The assignee defaults to the caller. Assigning someone else requires
/// project ownership.
///
/// # Errors
///
/// - `404`: Project not visible
/// - `422`: Validation failed or `user_id` does not exist
/// - `403`: Non-owner assigning to another user
pub async fn store(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ValidJson(req): ValidJson<StoreTaskRequest>,
) -> ApiResult<ApiResponse<TaskDetail>> {
    let actor = auth.actor();
    let project = resolve_project(&state.db, project_uuid(&project)?, actor, ScopeRule::Visible).await?;

    if let Some(user_id) = req.user_id {
        ensure_user_exists(&state, user_id).await?;
    }
    let assignee = transition::check_assignment(actor, project.owner_id, req.user_id)?;

    let task = Task::create(&state.db, project.id, req.into_new_task(assignee)?)
        .await
        .or_fail("Failed to create task")?;

    Ok(ApiResponse::created(TaskDetail::new(task, &project)).with_message("Task created successfully"))
}

pub async fn show(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project, task)): Path<(String, String)>,
) -> ApiResult<ApiResponse<TaskDetail>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;
    let task = scoped_task(&state, &project, &task, false).await?;

    Ok(ApiResponse::ok(TaskDetail::new(task, &project)))
}

/// Partial update
///
/// # Errors
///
/// - `403`: Non-owner changing the assignee
pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project, task)): Path<(String, String)>,
    ValidJson(req): ValidJson<UpdateTaskRequest>,
) -> ApiResult<ApiResponse<TaskDetail>> {
    let actor = auth.actor();
    let project = resolve_project(&state.db, project_uuid(&project)?, actor, ScopeRule::Visible).await?;
    let task = scoped_task(&state, &project, &task, false).await?;

    transition::check_reassignment(actor, project.owner_id, task.user_id, req.user_id)?;
    req.check_nullable()?;
    if let Some(user_id) = req.user_id {
        ensure_user_exists(&state, user_id).await?;
    }

    let task = Task::update(&state.db, task.id, req.into_update()?)
        .await
        .or_fail("Failed to update task")?;

    Ok(ApiResponse::ok(TaskDetail::new(task, &project)).with_message("Task updated successfully"))
}

/// Overwrite the status with any declared value; last write wins
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project, task)): Path<(String, String)>,
    ValidJson(req): ValidJson<UpdateStatusRequest>,
) -> ApiResult<ApiResponse<TaskView>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;
    let task = scoped_task(&state, &project, &task, false).await?;
    let status: TaskStatus = required(req.status, "status")?.parse()?;

    let task = Task::set_status(&state.db, task.id, status)
        .await
        .or_fail("Failed to update task status")?;

    Ok(ApiResponse::ok(TaskView::from(task)).with_message("Task status updated successfully"))
}

/// Move a backlog task to `todo` or `in_progress`
///
/// A requested reassignment is applied only for the project owner and is
/// otherwise ignored without error.
///
/// # Errors
///
/// - `404`: Task missing or not in the backlog
/// - `422`: Target status is not `todo`/`in_progress`, or `user_id` does not exist
pub async fn move_from_backlog(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project, task)): Path<(String, String)>,
    ValidJson(req): ValidJson<MoveTaskRequest>,
) -> ApiResult<ApiResponse<TaskView>> {
    let actor = auth.actor();
    let project = resolve_project(&state.db, project_uuid(&project)?, actor, ScopeRule::Visible).await?;
    let task = scoped_task(&state, &project, &task, true).await?;

    if let Some(user_id) = req.user_id {
        ensure_user_exists(&state, user_id).await?;
    }

    let target: TaskStatus = required(req.status, "status")?.parse()?;
    let plan = transition::plan_backlog_move(task.status, target, actor, project.owner_id, req.user_id)?;

    if req.user_id.is_some() && plan.assignee.is_none() {
        tracing::debug!(task_id = task.id, user_id = actor.id(), "Ignoring reassignment by non-owner");
    }

    let moved = Task::apply_move(&state.db, task.id, &plan)
        .await
        .or_fail("Failed to move task from backlog")?
        .ok_or_else(|| ApiError::not_found("Task not found in backlog"))?;

    Ok(ApiResponse::ok(TaskView::from(moved)).with_message("Task moved from backlog successfully"))
}

/// Soft delete; only the project owner may delete
pub async fn destroy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((project, task)): Path<(String, String)>,
) -> ApiResult<ApiResponse<()>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Owner).await?;
    let task = scoped_task(&state, &project, &task, false).await?;

    Task::soft_delete(&state.db, task.id)
        .await
        .or_fail("Failed to delete task")?;

    Ok(ApiResponse::message("Task deleted successfully"))
}

pub async fn search(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project): Path<String>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> ApiResult<ApiResponse<Paginated<TaskView>>> {
    let project = resolve_project(&state.db, project_uuid(&project)?, auth.actor(), ScopeRule::Visible).await?;
    let page = Page::new(query.page, query.per_page);

    let tasks = Task::search(&state.db, project.id, query.q.as_deref().unwrap_or(""), page)
        .await
        .or_fail("Failed to search tasks")?;

    Ok(ApiResponse::ok(tasks.map(TaskView::from)))
}
