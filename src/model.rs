use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const CATEGORY_MAX_CHARS: usize = 100;

/// Errors raised by the task model itself: bad input, or a code that does
/// not map to any known variant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Unknown {kind} code {value}")]
    UnknownCode { kind: &'static str, value: i64 },

    #[error("Unknown {kind} '{value}'")]
    UnknownName { kind: &'static str, value: String },
}

/// Enumerations stored (and sent over the wire) as their integer code.
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $variant:ident = $code:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "i64", try_from = "i64")]
        pub enum $name {
            $( $variant = $code, )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                value as i64
            }
        }

        impl TryFrom<i64> for $name {
            type Error = TaskError;

            fn try_from(code: i64) -> Result<Self, TaskError> {
                match code {
                    $( $code => Ok(Self::$variant), )+
                    value => Err(TaskError::UnknownCode { kind: $kind, value }),
                }
            }
        }

        /// Accepts either the name (any case) or the integer code.
        impl FromStr for $name {
            type Err = TaskError;

            fn from_str(s: &str) -> Result<Self, TaskError> {
                let wanted = s.trim();
                if let Ok(code) = wanted.parse::<i64>() {
                    return Self::try_from(code);
                }
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| TaskError::UnknownName {
                        kind: $kind,
                        value: wanted.to_string(),
                    })
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(i64::from(*self)))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let code = value.as_i64()?;
                Self::try_from(code).map_err(|_| FromSqlError::OutOfRange(code))
            }
        }
    };
}

coded_enum! {
    /// Workflow status of a task. Completion is tracked only here.
    Status("status") {
        Pending = 0 => "pending",
        InProgress = 1 => "in_progress",
        Completed = 2 => "completed",
    }
}

coded_enum! {
    /// Only used to order tasks inside a bucket.
    Priority("priority") {
        Low = 0 => "low",
        Medium = 1 => "medium",
        High = 2 => "high",
    }
}

coded_enum! {
    /// The bucket a task was explicitly put in. Time never changes it; see
    /// `horizon::effective_horizon` for the bucket it is displayed in.
    TimeHorizon("time horizon") {
        Today = 0 => "today",
        Tomorrow = 1 => "tomorrow",
        Someday = 2 => "someday",
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Pending
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Default for TimeHorizon {
    fn default() -> Self {
        TimeHorizon::Today
    }
}

/// A single task, as stored and as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub time_horizon: TimeHorizon,
    pub due_date: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }
}

/// Fields accepted when creating a task. Missing priority and horizon take
/// their defaults (Medium, Today).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub time_horizon: Option<TimeHorizon>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..NewTask::default()
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        check_title(&self.title)?;
        check_length("description", self.description.as_deref(), DESCRIPTION_MAX_CHARS)?;
        check_length("category", self.category.as_deref(), CATEGORY_MAX_CHARS)?;
        Ok(())
    }

    /// Build the stored record. Both timestamps are set to `now`.
    pub fn into_task(self, id: i64, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            description: self.description.and_then(non_blank),
            status: Status::default(),
            priority: self.priority.unwrap_or_default(),
            time_horizon: self.time_horizon.unwrap_or_default(),
            due_date: self.due_date,
            category: self.category.and_then(non_blank),
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        NewTask {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: Some(task.priority),
            time_horizon: Some(task.time_horizon),
            due_date: task.due_date,
            category: task.category.clone(),
        }
    }
}

/// Partial update: `None` leaves a field unchanged. A blank description or
/// category clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub time_horizon: Option<TimeHorizon>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
}

impl TaskUpdate {
    pub fn status(status: Status) -> Self {
        TaskUpdate {
            status: Some(status),
            ..TaskUpdate::default()
        }
    }

    pub fn horizon(horizon: TimeHorizon) -> Self {
        TaskUpdate {
            time_horizon: Some(horizon),
            ..TaskUpdate::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if let Some(title) = &self.title {
            check_title(title)?;
        }
        check_length("description", self.description.as_deref(), DESCRIPTION_MAX_CHARS)?;
        check_length("category", self.category.as_deref(), CATEGORY_MAX_CHARS)?;
        Ok(())
    }

    /// Apply the provided fields and refresh `updated_at`, even when no field
    /// was provided. `updated_at` never goes below `created_at`.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = non_blank(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(horizon) = self.time_horizon {
            task.time_horizon = horizon;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(category) = &self.category {
            task.category = non_blank(category.clone());
        }
        task.updated_at = std::cmp::max(now, task.created_at);
    }
}

/// The persistence collaborator. Implementations only ever see the tasks of
/// a single owner; anything else is reported as absent.
pub trait TaskStore {
    /// Every task, most recently created first.
    fn all(&self) -> anyhow::Result<Vec<Task>>;

    fn get(&self, id: i64) -> anyhow::Result<Option<Task>>;

    fn create(&mut self, new: NewTask, now: DateTime<Utc>) -> anyhow::Result<Task>;

    /// Create several tasks at once. Either all of them are stored or none.
    fn create_many(&mut self, new: Vec<NewTask>, now: DateTime<Utc>) -> anyhow::Result<Vec<Task>>;

    fn update(
        &mut self,
        id: i64,
        changes: TaskUpdate,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Task>>;

    fn delete(&mut self, id: i64) -> anyhow::Result<bool>;

    /// Delete every task. Returns how many were removed.
    fn clear(&mut self) -> anyhow::Result<usize>;
}

/// Order used by `TaskStore::all`.
pub fn retrieval_order(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn check_title(title: &str) -> Result<(), TaskError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskError::Validation {
            field: "title",
            reason: "title cannot be empty".to_string(),
        });
    }
    check_length("title", Some(trimmed), TITLE_MAX_CHARS)
}

fn check_length(field: &'static str, value: Option<&str>, max: usize) -> Result<(), TaskError> {
    match value {
        Some(text) if text.chars().count() > max => Err(TaskError::Validation {
            field,
            reason: format!("must be {} characters or fewer", max),
        }),
        _ => Ok(()),
    }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
