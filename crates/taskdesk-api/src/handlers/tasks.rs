//! Task API handlers
//!
//! Every handler receives the caller's identity explicitly and resolves it to
//! a user record; a task is only visible to the user who owns it.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditEvent};
use crate::auth::AuthenticatedIdentity;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskdesk_core::{NewTask, Task, TaskSort};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Task representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            completed: task.completed,
            user_id: task.user_id,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Task listing filters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTasksQuery {
    /// Only tasks with this completion state (ordered by id)
    pub completed: Option<bool>,
    /// `title` or `id` (default); ignored when `completed` is given
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
}

/// New task
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Replacement title and description
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub description: Option<String>,
}

/// Completion state change
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdateRequest {
    pub completed: bool,
}

/// Resolve the caller to its user id
async fn current_user_id(
    state: &AppState,
    identity: &AuthenticatedIdentity,
) -> Result<i64, AppError> {
    state
        .users
        .find_user_by_username(&identity.username)
        .await?
        .map(|user| user.id)
        // A valid token for a user that no longer exists authenticates nobody
        .ok_or(AppError::Unauthorized)
}

/// Load a task and check that the caller owns it
async fn owned_task(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    id: i64,
) -> Result<Task, AppError> {
    let user_id = current_user_id(state, identity).await?;
    let task = state
        .tasks
        .get_task(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {id}")))?;

    if !task.is_owned_by(user_id) {
        audit_log(&AuditEvent::AccessDenied {
            username: identity.username.clone(),
            resource: format!("task:{id}"),
            ip_address: None,
        });
        return Err(AppError::Forbidden(format!(
            "Task {id} belongs to another user"
        )));
    }

    Ok(task)
}

/// List the caller's tasks
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "Caller's tasks", body = [TaskResponse]),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let user_id = current_user_id(&state, &identity).await?;

    let tasks = match query.completed {
        Some(completed) => {
            state
                .tasks
                .list_by_owner_and_completed(user_id, completed)
                .await?
        }
        None => {
            let sort = query
                .sort_by
                .as_deref()
                .map(TaskSort::from_param)
                .unwrap_or_default();
            state.tasks.list_by_owner(user_id, sort).await?
        }
    };

    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// Get one of the caller's tasks
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task", body = TaskResponse),
        (status = 403, description = "Task belongs to another user", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, AppError> {
    let task = owned_task(&state, &identity, id).await?;
    Ok(Json(task.into()))
}

/// Create a task owned by the caller
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 200, description = "Created task", body = TaskResponse),
        (status = 400, description = "Invalid task", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Json(request): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    request.validate()?;
    let user_id = current_user_id(&state, &identity).await?;

    let task = state
        .tasks
        .create_task(NewTask {
            title: request.title,
            description: request.description,
            completed: request.completed,
            user_id,
        })
        .await?;

    tracing::debug!(task_id = task.id, user_id, "Task created");
    Ok(Json(task.into()))
}

/// Replace a task's title and description
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 403, description = "Task belongs to another user", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    request.validate()?;
    let mut task = owned_task(&state, &identity, id).await?;

    task.title = request.title;
    task.description = request.description;

    let task = state.tasks.update_task(&task).await?;
    Ok(Json(task.into()))
}

/// Mark a task completed or not
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Updated task", body = TaskResponse),
        (status = 403, description = "Task belongs to another user", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_task_status(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(id): Path<i64>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let mut task = owned_task(&state, &identity, id).await?;
    task.completed = request.completed;

    let task = state.tasks.update_task(&task).await?;
    Ok(Json(task.into()))
}

/// Delete one of the caller's tasks
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 403, description = "Task belongs to another user", body = crate::error::ApiError),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    identity: AuthenticatedIdentity,
    Path(id): Path<i64>,
) -> Result<(), AppError> {
    let task = owned_task(&state, &identity, id).await?;
    state.tasks.delete_task(task.id).await?;
    Ok(())
}
