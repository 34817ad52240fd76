use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{LogEntry, LogLevel, StoredTask, TaskStatus};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS tasks (
  id TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
  repo_owner TEXT NOT NULL,
  repo_name TEXT NOT NULL,
  issue_number INTEGER NOT NULL,
  actor TEXT NOT NULL,
  created_at TEXT NOT NULL,
  updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS logs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
  timestamp TEXT NOT NULL,
  level TEXT NOT NULL CHECK (level IN ('info', 'error', 'success', 'hint')),
  message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_logs_task_id ON logs(task_id);
";

/// Single-writer task store.
///
/// One connection behind a mutex keeps embedded-store lock contention out of
/// the picture; composed multi-statement paths run as transactions under the
/// same lock.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// Open (creating parent directories and schema as needed).
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open task store at {}", path.display()))?;
        Self::bootstrap(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory task store")?;
        Self::bootstrap(conn)
    }

    fn bootstrap(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign key enforcement")?;
        conn.execute_batch(SCHEMA)
            .context("failed to bootstrap task store schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert the task row plus any pre-seeded logs in one transaction.
    pub fn create(&self, task: &StoredTask) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("failed to begin create transaction")?;
        tx.execute(
            "INSERT INTO tasks (id, title, status, repo_owner, repo_name, issue_number, actor, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.title,
                task.status.as_str(),
                task.repo_owner,
                task.repo_name,
                task.issue_number,
                task.actor,
                task.created_at,
                task.updated_at,
            ],
        )
        .with_context(|| format!("failed to insert task '{}'", task.id))?;
        for log in &task.logs {
            tx.execute(
                "INSERT INTO logs (task_id, timestamp, level, message) VALUES (?1, ?2, ?3, ?4)",
                params![task.id, log.timestamp, log.level.as_str(), log.message],
            )
            .with_context(|| format!("failed to seed log for task '{}'", task.id))?;
        }
        tx.commit().context("failed to commit create transaction")
    }

    /// Fetch one task with its logs hydrated in append order.
    pub fn get(&self, id: &str) -> Result<Option<StoredTask>> {
        let conn = self.lock()?;
        let task = conn
            .query_row(
                "SELECT id, title, status, repo_owner, repo_name, issue_number, actor, created_at, updated_at \
                 FROM tasks WHERE id = ?1",
                params![id],
                row_to_task,
            )
            .optional()
            .with_context(|| format!("failed to read task '{id}'"))?;
        let Some(mut task) = task else {
            return Ok(None);
        };

        let mut statement = conn
            .prepare(
                "SELECT timestamp, level, message FROM logs WHERE task_id = ?1 ORDER BY id ASC",
            )
            .context("failed to prepare log query")?;
        let logs = statement
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .with_context(|| format!("failed to read logs for task '{id}'"))?;
        for log in logs {
            let (timestamp, level, message) = log.context("failed to decode log row")?;
            task.logs.push(LogEntry {
                timestamp,
                level: LogLevel::parse(&level)?,
                message,
            });
        }
        Ok(Some(task))
    }

    /// List tasks newest-first. Logs are intentionally not hydrated here.
    pub fn list(&self) -> Result<Vec<StoredTask>> {
        let conn = self.lock()?;
        let mut statement = conn
            .prepare(
                "SELECT id, title, status, repo_owner, repo_name, issue_number, actor, created_at, updated_at \
                 FROM tasks ORDER BY created_at DESC",
            )
            .context("failed to prepare task list query")?;
        let rows = statement
            .query_map([], row_to_task)
            .context("failed to list tasks")?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.context("failed to decode task row")?);
        }
        Ok(tasks)
    }

    /// Update status along the monotone path and bump `updated_at`.
    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        let conn = self.lock()?;
        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read status for task '{id}'"))?;
        let Some(current) = current else {
            bail!("unknown task id '{id}'");
        };
        let current = TaskStatus::parse(&current)?;
        if !current.allows_transition_to(status) {
            bail!(
                "invalid status transition {} -> {} for task '{id}'",
                current.as_str(),
                status.as_str()
            );
        }
        conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), now_rfc3339()],
        )
        .with_context(|| format!("failed to update status for task '{id}'"))?;
        Ok(())
    }

    /// Append one log line and bump `updated_at` in the same transaction.
    pub fn add_log(&self, id: &str, level: LogLevel, message: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("failed to begin add_log transaction")?;
        let timestamp = now_rfc3339();
        let inserted = tx
            .execute(
                "INSERT INTO logs (task_id, timestamp, level, message) \
                 SELECT ?1, ?2, ?3, ?4 WHERE EXISTS (SELECT 1 FROM tasks WHERE id = ?1)",
                params![id, timestamp, level.as_str(), message],
            )
            .with_context(|| format!("failed to append log for task '{id}'"))?;
        if inserted == 0 {
            bail!("unknown task id '{id}'");
        }
        tx.execute(
            "UPDATE tasks SET updated_at = ?2 WHERE id = ?1",
            params![id, timestamp],
        )
        .with_context(|| format!("failed to bump updated_at for task '{id}'"))?;
        tx.commit().context("failed to commit add_log transaction")
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("task store mutex is poisoned"))
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredTask> {
    let status: String = row.get(2)?;
    let status = TaskStatus::parse(&status).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, error.into())
    })?;
    Ok(StoredTask {
        id: row.get(0)?,
        title: row.get(1)?,
        status,
        repo_owner: row.get(3)?,
        repo_name: row.get(4)?,
        issue_number: row.get(5)?,
        actor: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        logs: Vec::new(),
    })
}

/// RFC 3339 timestamp with nanosecond precision so consecutive mutations
/// keep `updated_at` strictly increasing.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}
