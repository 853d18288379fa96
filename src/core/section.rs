use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::task::Task;

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// A named, ordered collection of tasks. Each task belongs to exactly
/// one section; names are unique within a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default = "now")]
    pub created_at: NaiveDateTime,
    #[serde(default = "now")]
    pub updated_at: NaiveDateTime,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now();
        Self {
            name: name.into(),
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.push(task);
        self.touch();
    }

    /// Remove a task by identifier. No-op returning `None` when the id
    /// is not among the immediate tasks.
    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == task_id)?;
        let task = self.tasks.remove(pos);
        self.touch();
        Some(task)
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.iter().any(|t| t.id == task_id)
    }

    /// Immediate tasks with the completion flag set (non-recursive).
    pub fn completed_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.completed).collect()
    }

    /// Immediate tasks still pending (non-recursive).
    pub fn pending_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| !t.completed).collect()
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}
