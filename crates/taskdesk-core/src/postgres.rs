//! PostgreSQL user and task store
//!
//! Provides credential and task persistence using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::{
    CoreError, Credential, NewCredential, NewTask, Result, Task, TaskSort, TaskStore, UserStore,
};

/// Schema statements, applied in order by [`PgStore::migrate`]
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS app_users (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id BIGSERIAL PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        completed BOOLEAN NOT NULL DEFAULT FALSE,
        user_id BIGINT NOT NULL REFERENCES app_users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS tasks_user_id_idx ON tasks (user_id)",
];

/// PostgreSQL store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::DatabaseError(format!("Migration failed: {e}")))?;
        }
        tracing::info!("Database schema is up to date");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password_hash: String,
}

impl From<UserRow> for Credential {
    fn from(row: UserRow) -> Self {
        Credential {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
        }
    }
}

/// Task row from database
#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    completed: bool,
    user_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const TASK_COLUMNS: &str = "id, title, description, completed, user_id, created_at, updated_at";

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> CoreError + '_ {
    move |e| CoreError::DatabaseError(format!("{context}: {e}"))
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<Credential>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash FROM app_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch user"))?;

        Ok(row.map(Credential::from))
    }

    async fn save_user(&self, credential: NewCredential) -> Result<Credential> {
        let result = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO app_users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash
            "#,
        )
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::AlreadyExists(credential.username))
            }
            Err(e) => Err(CoreError::DatabaseError(format!("Failed to create user: {e}"))),
        }
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn list_by_owner(&self, user_id: i64, sort: TaskSort) -> Result<Vec<Task>> {
        let order = match sort {
            TaskSort::Id => "id",
            // Byte order, matching the in-memory store regardless of database locale
            TaskSort::Title => r#"title COLLATE "C", id"#,
        };
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY {order}");

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list tasks"))?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn list_by_owner_and_completed(
        &self,
        user_id: i64,
        completed: bool,
    ) -> Result<Vec<Task>> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 AND completed = $2 ORDER BY id"
        );

        let rows = sqlx::query_as::<_, TaskRow>(&query)
            .bind(user_id)
            .bind(completed)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list tasks"))?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    async fn get_task(&self, id: i64) -> Result<Option<Task>> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch task"))?;

        Ok(row.map(Task::from))
    }

    async fn create_task(&self, task: NewTask) -> Result<Task> {
        let query = format!(
            "INSERT INTO tasks (title, description, completed, user_id) \
             VALUES ($1, $2, $3, $4) RETURNING {TASK_COLUMNS}"
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to create task"))?;

        Ok(row.into())
    }

    async fn update_task(&self, task: &Task) -> Result<Task> {
        let query = format!(
            "UPDATE tasks SET title = $1, description = $2, completed = $3, updated_at = NOW() \
             WHERE id = $4 RETURNING {TASK_COLUMNS}"
        );

        let row = sqlx::query_as::<_, TaskRow>(&query)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to update task"))?
            .ok_or_else(|| CoreError::NotFound(format!("task {}", task.id)))?;

        Ok(row.into())
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete task"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("task {id}")));
        }
        Ok(())
    }
}
