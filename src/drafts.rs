//! Tasks kept on this machine while nobody is signed in.
//!
//! Drafts carry the same shape as stored tasks plus a client generated
//! `tempId`. Signing in moves them into the signed-in user's journal.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{retrieval_order, NewTask, Task, TaskStore, TaskUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub temp_id: Uuid,
    #[serde(flatten)]
    pub task: Task,
}

/// On-disk shape of the drafts file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftFile {
    /// Highest id ever handed out, so ids of deleted drafts are not reused.
    #[serde(default)]
    last_id: i64,
    #[serde(default)]
    drafts: Vec<Draft>,
}

/// A JSON file of drafts. Every change is written back immediately.
#[derive(Debug)]
pub struct Drafts {
    path: PathBuf,
    last_id: i64,
    drafts: Vec<Draft>,
}

impl Drafts {
    /// Load the drafts file. A missing file means no drafts.
    pub fn load(path: &Path) -> Result<Drafts> {
        let file: DraftFile = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read drafts from {}.", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse drafts in {}.", path.display()))?
        } else {
            DraftFile::default()
        };
        let highest = file.drafts.iter().map(|draft| draft.task.id).max().unwrap_or(0);
        Ok(Drafts {
            path: path.to_path_buf(),
            last_id: file.last_id.max(highest),
            drafts: file.drafts,
        })
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Move every draft into `store`. Returns how many tasks were transferred.
    ///
    /// If the transfer fails the drafts stay where they are, the failure is
    /// only logged and `Ok(0)` is returned. Once transferred, the drafts must
    /// be gone from disk or the next sign-in would send them again: failing
    /// to remove them is the only error.
    pub fn merge_into<S: TaskStore + ?Sized>(&mut self, store: &mut S, now: DateTime<Utc>) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let new: Vec<NewTask> = self.drafts.iter().map(|draft| NewTask::from(&draft.task)).collect();
        let created = match store.create_many(new, now) {
            Ok(created) => created,
            Err(error) => {
                warn!(error = %format!("{:#}", error), "failed to transfer local tasks, keeping them");
                return Ok(0);
            }
        };
        debug!(count = created.len(), "transferred local tasks");

        if let Err(error) = self.clear() {
            warn!(error = %format!("{:#}", error), "could not remove transferred local tasks, emptying the file");
            self.save().with_context(|| {
                format!(
                    "Transferred {} local task(s) but could not remove {}. Delete it, or they will be transferred again.",
                    created.len(),
                    self.path.display()
                )
            })?;
        }
        Ok(created.len())
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}.", dir.display()))?;
        }
        let file = DraftFile {
            last_id: self.last_id,
            drafts: self.drafts.clone(),
        };
        let raw = serde_json::to_string_pretty(&file).context("Failed to encode drafts.")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write drafts to {}.", self.path.display()))?;
        Ok(())
    }

    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.drafts.iter().position(|draft| draft.task.id == id)
    }
}

impl TaskStore for Drafts {
    fn all(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.drafts.iter().map(|draft| draft.task.clone()).collect();
        retrieval_order(&mut tasks);
        Ok(tasks)
    }

    fn get(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.position(id).map(|i| self.drafts[i].task.clone()))
    }

    fn create(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        new.validate()?;
        let id = self.next_id();
        let task = new.into_task(id, now);
        self.drafts.push(Draft {
            temp_id: Uuid::new_v4(),
            task: task.clone(),
        });
        self.save()?;
        Ok(task)
    }

    fn create_many(&mut self, new: Vec<NewTask>, now: DateTime<Utc>) -> Result<Vec<Task>> {
        for item in &new {
            item.validate()?;
        }
        let mut created = Vec::with_capacity(new.len());
        for item in new {
            let id = self.next_id();
            let task = item.into_task(id, now);
            self.drafts.push(Draft {
                temp_id: Uuid::new_v4(),
                task: task.clone(),
            });
            created.push(task);
        }
        self.save()?;
        Ok(created)
    }

    fn update(&mut self, id: i64, changes: TaskUpdate, now: DateTime<Utc>) -> Result<Option<Task>> {
        changes.validate()?;
        let index = match self.position(id) {
            Some(index) => index,
            None => return Ok(None),
        };
        changes.apply(&mut self.drafts[index].task, now);
        self.save()?;
        Ok(Some(self.drafts[index].task.clone()))
    }

    fn delete(&mut self, id: i64) -> Result<bool> {
        match self.position(id) {
            Some(index) => {
                self.drafts.remove(index);
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget every draft and remove the file. Ids start over.
    fn clear(&mut self) -> Result<usize> {
        let removed = self.drafts.len();
        self.drafts.clear();
        self.last_id = 0;
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}.", self.path.display()))?;
        }
        Ok(removed)
    }
}
