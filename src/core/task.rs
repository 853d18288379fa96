use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Rejected entity mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task title must not be empty")]
    EmptyTitle,
}

/// Short task identifier: the first 8 hex characters of a v4 UUID.
fn new_task_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(default = "new_task_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Task>,
    #[serde(default = "now")]
    pub created_at: NaiveDateTime,
    #[serde(default = "now")]
    pub updated_at: NaiveDateTime,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_description(title, "")
    }

    pub fn with_description(
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let now = now();
        Ok(Self {
            id: new_task_id(),
            title,
            description: description.into(),
            completed: false,
            subtasks: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn complete(&mut self) -> &mut Self {
        self.completed = true;
        self.touch();
        self
    }

    pub fn incomplete(&mut self) -> &mut Self {
        self.completed = false;
        self.touch();
        self
    }

    pub fn update_title(
        &mut self,
        new_title: impl Into<String>,
    ) -> Result<&mut Self, ValidationError> {
        let new_title = new_title.into();
        if new_title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        self.title = new_title;
        self.touch();
        Ok(self)
    }

    pub fn add_subtask(&mut self, subtask: Task) {
        self.subtasks.push(subtask);
        self.touch();
    }

    /// True when this task and every subtask, at any depth, are completed.
    pub fn is_fully_complete(&self) -> bool {
        self.completed && self.subtasks.iter().all(Task::is_fully_complete)
    }

    /// Percent complete in [0, 100], counting immediate subtasks only.
    /// Without subtasks the task's own flag decides: 100 or 0.
    pub fn progress(&self) -> u8 {
        if self.subtasks.is_empty() {
            return if self.completed { 100 } else { 0 };
        }
        let done = self.subtasks.iter().filter(|t| t.completed).count();
        (done * 100 / self.subtasks.len()) as u8
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(title: &str) -> Task {
        let mut task = Task::new(title).unwrap();
        task.complete();
        task
    }

    #[test]
    fn new_task_gets_short_id_and_defaults() {
        let task = Task::new("Buy milk").unwrap();
        assert_eq!(task.id.len(), 8);
        assert!(!task.completed);
        assert!(task.description.is_empty());
        assert!(task.subtasks.is_empty());

        let other = Task::new("Buy bread").unwrap();
        assert_ne!(task.id, other.id);
    }

    #[test]
    fn blank_title_is_rejected() {
        assert_eq!(Task::new("   ").unwrap_err(), ValidationError::EmptyTitle);
        assert_eq!(Task::new("").unwrap_err(), ValidationError::EmptyTitle);
    }

    #[test]
    fn update_title_rejects_blank_and_keeps_old_value() {
        let mut task = Task::new("Buy milk").unwrap();
        assert!(task.update_title(" ").is_err());
        assert_eq!(task.title, "Buy milk");

        task.update_title("Buy oat milk").unwrap();
        assert_eq!(task.title, "Buy oat milk");
    }

    #[test]
    fn complete_and_incomplete_chain() {
        let mut task = Task::new("Buy milk").unwrap();
        task.complete().incomplete();
        assert!(!task.completed);
        task.complete();
        assert!(task.completed);
    }

    #[test]
    fn progress_without_subtasks_follows_own_flag() {
        let mut task = Task::new("Buy milk").unwrap();
        assert_eq!(task.progress(), 0);
        task.complete();
        assert_eq!(task.progress(), 100);
    }

    #[test]
    fn progress_floors_over_immediate_subtasks() {
        let mut task = Task::new("Errands").unwrap();
        task.add_subtask(done("Post office"));
        task.add_subtask(done("Pharmacy"));
        task.add_subtask(Task::new("Bank").unwrap());
        assert_eq!(task.progress(), 66);

        let mut one_of_three = Task::new("More errands").unwrap();
        one_of_three.add_subtask(done("A"));
        one_of_three.add_subtask(Task::new("B").unwrap());
        one_of_three.add_subtask(Task::new("C").unwrap());
        assert_eq!(one_of_three.progress(), 33);
    }

    #[test]
    fn progress_ignores_nested_levels() {
        let mut nested = done("Inner");
        nested.add_subtask(Task::new("Deep pending").unwrap());

        let mut task = Task::new("Outer").unwrap();
        task.add_subtask(nested);
        // Immediate child is completed; its pending subtask does not count.
        assert_eq!(task.progress(), 100);
    }

    #[test]
    fn fully_complete_is_recursive() {
        let mut grandchild = Task::new("Grandchild").unwrap();
        grandchild.complete();
        let mut child = done("Child");
        child.add_subtask(grandchild);
        let mut task = done("Parent");
        task.add_subtask(child);
        assert!(task.is_fully_complete());

        // A pending task at any depth breaks it.
        let mut half_done = done("Child");
        half_done.add_subtask(Task::new("Grandchild").unwrap());
        let mut broken = done("Parent");
        broken.add_subtask(half_done);
        assert!(!broken.is_fully_complete());
    }

    #[test]
    fn fully_complete_requires_own_flag() {
        let mut task = Task::new("Parent").unwrap();
        task.add_subtask(done("Child"));
        assert!(!task.is_fully_complete());
    }

    #[test]
    fn add_subtask_refreshes_updated_at() {
        let mut task = Task::new("Parent").unwrap();
        let before = task.updated_at;
        task.add_subtask(Task::new("Child").unwrap());
        assert_eq!(task.subtasks.len(), 1);
        assert!(task.updated_at >= before);
    }
}
