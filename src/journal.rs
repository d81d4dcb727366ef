use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::model::{NewTask, Task, TaskStore, TaskUpdate};

const TASK_COLUMNS: &str = "id, title, description, status, priority, time_horizon, due_date, category, created_at, updated_at";

/// Open the journal database, creating and initializing it if it does not
/// exist.
pub fn open_journal(journal_path: &Path) -> Result<Connection> {
    let journal_exists = journal_path.exists();
    if let Some(dir) = journal_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}.", dir.display()))?;
        }
    }
    let db = Connection::open(journal_path)
        .with_context(|| format!("Failed to open journal {}.", journal_path.display()))?;
    if !journal_exists {
        debug!(path = %journal_path.display(), "initializing new journal");
    }
    init_journal(&db)?;
    Ok(db)
}

/// Initialize the journal database. Safe to call on an existing journal.
pub fn init_journal(db: &Connection) -> Result<()> {
    db.execute(
        "CREATE TABLE IF NOT EXISTS task (
                  id              INTEGER PRIMARY KEY AUTOINCREMENT,
                  owner           TEXT NOT NULL,
                  title           TEXT NOT NULL,
                  description     TEXT,
                  status          INTEGER NOT NULL DEFAULT 0,
                  priority        INTEGER NOT NULL DEFAULT 1,
                  time_horizon    INTEGER NOT NULL DEFAULT 0,
                  due_date        TEXT,
                  category        TEXT,
                  created_at      TEXT NOT NULL,
                  updated_at      TEXT NOT NULL
                  )",
        [],
    )
    .context("Failed to create task table.")?;

    db.execute(
        "CREATE INDEX IF NOT EXISTS task_owner ON task (owner)",
        [],
    )
    .context("Failed to create owner index on task table.")?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS user (
                  id              TEXT PRIMARY KEY,
                  email           TEXT NOT NULL UNIQUE,
                  created_at      TEXT NOT NULL
                  )",
        [],
    )
    .context("Failed to create user table.")?;

    db.execute(
        "CREATE TABLE IF NOT EXISTS login_code (
                  id              INTEGER PRIMARY KEY AUTOINCREMENT,
                  code            TEXT NOT NULL,
                  email           TEXT NOT NULL,
                  expires_at      TEXT NOT NULL,
                  used            INTEGER NOT NULL DEFAULT 0
                  )",
        [],
    )
    .context("Failed to create login_code table.")?;

    Ok(())
}

/// The tasks of one owner, kept in the journal database.
pub struct Journal {
    db: Connection,
    owner: String,
}

impl Journal {
    pub fn new(db: Connection, owner: impl Into<String>) -> Journal {
        Journal {
            db,
            owner: owner.into(),
        }
    }
}

impl TaskStore for Journal {
    fn all(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .db
            .prepare(&format!(
                "SELECT {} FROM task WHERE owner = ?1 ORDER BY created_at DESC, id DESC",
                TASK_COLUMNS
            ))
            .context("Failed to fetch tasks from database.")?;
        let mapped_rows = stmt
            .query_map(params![self.owner], task_from_row)
            .context("Failed to fetch tasks from database.")?;

        let mut tasks = Vec::new();
        for task in mapped_rows {
            tasks.push(task.context("Failed to read task from database.")?);
        }
        Ok(tasks)
    }

    fn get(&self, id: i64) -> Result<Option<Task>> {
        let task = self
            .db
            .query_row(
                &format!("SELECT {} FROM task WHERE id = ?1 AND owner = ?2", TASK_COLUMNS),
                params![id, self.owner],
                task_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to get task {} from database.", id))?;
        Ok(task)
    }

    fn create(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        new.validate()?;
        let mut task = new.into_task(0, now);
        task.id = insert_task(&self.db, &self.owner, &task)?;
        debug!(id = task.id, owner = %self.owner, "created task");
        Ok(task)
    }

    fn create_many(&mut self, new: Vec<NewTask>, now: DateTime<Utc>) -> Result<Vec<Task>> {
        for item in &new {
            item.validate()?;
        }

        let tx = self
            .db
            .transaction()
            .context("Failed to start transaction.")?;
        let mut created = Vec::with_capacity(new.len());
        for item in new {
            let mut task = item.into_task(0, now);
            task.id = insert_task(&tx, &self.owner, &task)?;
            created.push(task);
        }
        tx.commit().context("Failed to commit new tasks.")?;

        debug!(count = created.len(), owner = %self.owner, "created tasks");
        Ok(created)
    }

    fn update(&mut self, id: i64, changes: TaskUpdate, now: DateTime<Utc>) -> Result<Option<Task>> {
        changes.validate()?;
        let mut task = match self.get(id)? {
            Some(task) => task,
            None => return Ok(None),
        };
        changes.apply(&mut task, now);

        self.db
            .execute(
                "UPDATE task SET title = ?1, description = ?2, status = ?3, priority = ?4,
                        time_horizon = ?5, due_date = ?6, category = ?7, updated_at = ?8
                 WHERE id = ?9 AND owner = ?10",
                params![
                    task.title,
                    task.description,
                    task.status,
                    task.priority,
                    task.time_horizon,
                    task.due_date,
                    task.category,
                    task.updated_at,
                    id,
                    self.owner
                ],
            )
            .with_context(|| format!("Failed to update task {} in the database.", id))?;

        debug!(id, owner = %self.owner, "updated task");
        Ok(Some(task))
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        let removed = self
            .db
            .execute(
                "DELETE FROM task WHERE id = ?1 AND owner = ?2",
                params![id, self.owner],
            )
            .with_context(|| format!("Failed to remove task {} from database.", id))?;
        Ok(removed > 0)
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self
            .db
            .execute("DELETE FROM task WHERE owner = ?1", params![self.owner])
            .context("Failed to remove tasks from database.")?;
        debug!(count = removed, owner = %self.owner, "cleared tasks");
        Ok(removed)
    }
}

fn insert_task(db: &Connection, owner: &str, task: &Task) -> Result<i64> {
    db.execute(
        "INSERT INTO task (owner, title, description, status, priority, time_horizon, due_date, category, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            owner,
            task.title,
            task.description,
            task.status,
            task.priority,
            task.time_horizon,
            task.due_date,
            task.category,
            task.created_at,
            task.updated_at
        ],
    )
    .context("Failed to insert task to database.")?;
    Ok(db.last_insert_rowid())
}

/// Return a task from a row in the order of `TASK_COLUMNS`.
fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        time_horizon: row.get(5)?,
        due_date: row.get::<_, Option<DateTime<Utc>>>(6)?,
        category: row.get(7)?,
        created_at: row.get::<_, DateTime<Utc>>(8)?,
        updated_at: row.get::<_, DateTime<Utc>>(9)?,
    })
}
