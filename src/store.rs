use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::section::Section;
use crate::core::task::{Task, ValidationError};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("task id `{0}` already exists")]
    DuplicateTaskId(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// The persisted root document: format version, timestamps, free-form
/// settings, and the ordered sections that own every task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRoot {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "now")]
    pub created_at: NaiveDateTime,
    #[serde(default = "now")]
    pub last_updated: NaiveDateTime,
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Default for StoreRoot {
    fn default() -> Self {
        let now = now();
        Self {
            version: default_version(),
            created_at: now,
            last_updated: now,
            settings: serde_json::Map::new(),
            sections: Vec::new(),
        }
    }
}

/// File-backed task store.
///
/// Every mutation writes the full tree to disk, reloads it, and rebuilds
/// the lookup indexes, so the indexes are always a faithful cache of the
/// last successfully written file. Index entries are working copies;
/// callers re-fetch after a mutating call.
pub struct Store {
    path: PathBuf,
    root: StoreRoot,
    task_index: HashMap<String, Task>,
    section_index: HashMap<String, Section>,
}

impl Store {
    /// Open the store at `path`, bootstrapping a default file when the
    /// target is missing, empty, or unreadable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            root: StoreRoot::default(),
            task_index: HashMap::new(),
            section_index: HashMap::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-run the load protocol: parse the file (or regenerate a default
    /// one) and rebuild both indexes.
    pub fn reload(&mut self) -> Result<()> {
        self.root = self.load_or_repair()?;
        self.build_indexes();
        Ok(())
    }

    /// Persist the full tree, then reload it from disk so the indexes
    /// mirror exactly what was written, then refresh `last_updated`.
    pub fn save(&mut self) -> Result<()> {
        self.write_root()?;
        self.reload()?;
        self.root.last_updated = now();
        Ok(())
    }

    /// Replace whatever is on disk with a fresh default document.
    pub fn reset_to_default(&mut self) -> Result<()> {
        self.root = self.repair()?;
        self.build_indexes();
        Ok(())
    }

    // ----- load protocol -----

    fn load_or_repair(&self) -> Result<StoreRoot> {
        if !self.path.exists() {
            log::info!("data file {} not found, creating it", self.path.display());
            return self.repair();
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "data file {} is unreadable ({err}), replacing it",
                    self.path.display()
                );
                return self.repair();
            }
        };
        if contents.trim().is_empty() {
            log::warn!("data file {} is empty, replacing it", self.path.display());
            return self.repair();
        }

        let value: serde_json::Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                log::warn!(
                    "data file {} is not valid JSON ({err}), replacing it",
                    self.path.display()
                );
                return self.repair();
            }
        };
        if value.is_null() || value.as_object().is_some_and(|obj| obj.is_empty()) {
            log::warn!(
                "data file {} holds no data, replacing it",
                self.path.display()
            );
            return self.repair();
        }

        match serde_json::from_value(value) {
            Ok(root) => Ok(root),
            Err(err) => {
                log::warn!(
                    "data file {} does not match the expected schema ({err}), replacing it",
                    self.path.display()
                );
                self.repair()
            }
        }
    }

    fn repair(&self) -> Result<StoreRoot> {
        let root = StoreRoot::default();
        self.write(&root)?;
        log::info!("created data file {}", self.path.display());
        Ok(root)
    }

    fn write_root(&self) -> Result<()> {
        self.write(&self.root)
    }

    fn write(&self, root: &StoreRoot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(root)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    // ----- indexes -----

    fn build_indexes(&mut self) {
        self.task_index.clear();
        self.section_index.clear();
        for section in &self.root.sections {
            self.section_index
                .insert(section.name.clone(), section.clone());
            for task in &section.tasks {
                Self::index_task(&mut self.task_index, task);
            }
        }
    }

    fn index_task(index: &mut HashMap<String, Task>, task: &Task) {
        index.insert(task.id.clone(), task.clone());
        for subtask in &task.subtasks {
            Self::index_task(index, subtask);
        }
    }

    /// Reject ids already present in the forest, including every nested
    /// subtask id of the incoming task.
    fn check_new_ids(&self, task: &Task) -> Result<()> {
        if self.task_index.contains_key(&task.id) {
            return Err(StoreError::DuplicateTaskId(task.id.clone()));
        }
        for subtask in &task.subtasks {
            self.check_new_ids(subtask)?;
        }
        Ok(())
    }

    fn find_task_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
        for task in tasks {
            if task.id == task_id {
                return Some(task);
            }
            if let Some(found) = Self::find_task_mut(&mut task.subtasks, task_id) {
                return Some(found);
            }
        }
        None
    }

    fn find_in_tree_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.root
            .sections
            .iter_mut()
            .find_map(|section| Self::find_task_mut(&mut section.tasks, task_id))
    }

    // ----- mutating operations -----

    /// Create a section, or return the existing one with that name.
    pub fn create_section(&mut self, name: &str) -> Result<Section> {
        if let Some(existing) = self.section_index.get(name) {
            log::info!("section `{name}` already exists");
            return Ok(existing.clone());
        }
        let section = Section::new(name);
        self.root.sections.push(section.clone());
        self.save()?;
        Ok(section)
    }

    /// Append a task to the named section, creating the section when the
    /// name is unknown.
    pub fn add_task_to_section(&mut self, task: Task, section_name: &str) -> Result<()> {
        self.check_new_ids(&task)?;
        match self
            .root
            .sections
            .iter_mut()
            .find(|s| s.name == section_name)
        {
            Some(section) => section.add_task(task),
            None => {
                let mut section = Section::new(section_name);
                section.add_task(task);
                self.root.sections.push(section);
            }
        }
        self.save()
    }

    /// Construct a task and file it under the named section. Returns a
    /// copy of the task as created.
    pub fn create_task(
        &mut self,
        title: &str,
        section_name: &str,
        description: &str,
    ) -> Result<Task> {
        let task = Task::with_description(title, description)?;
        let created = task.clone();
        self.add_task_to_section(task, section_name)?;
        Ok(created)
    }

    /// Remove a task by id from the first section whose immediate task
    /// sequence holds it. `Ok(false)` when the id is unknown; the file
    /// is not touched in that case.
    pub fn remove_task_by_id(&mut self, task_id: &str) -> Result<bool> {
        if !self.task_index.contains_key(task_id) {
            log::info!("task `{task_id}` not found");
            return Ok(false);
        }
        for section in &mut self.root.sections {
            if let Some(removed) = section.remove_task(task_id) {
                log::info!("removed task `{}`", removed.title);
                break;
            }
        }
        self.save()?;
        Ok(true)
    }

    /// Remove a section and all tasks it owns. `Ok(false)` when the name
    /// is unknown.
    pub fn remove_section_by_name(&mut self, name: &str) -> Result<bool> {
        if !self.section_index.contains_key(name) {
            log::info!("section `{name}` not found");
            return Ok(false);
        }
        self.root.sections.retain(|s| s.name != name);
        self.save()?;
        log::info!("removed section `{name}`");
        Ok(true)
    }

    /// Flip the completion flag of a task anywhere in the forest,
    /// subtasks included. `Ok(false)` when the id is unknown.
    pub fn set_task_completed(&mut self, task_id: &str, completed: bool) -> Result<bool> {
        match self.find_in_tree_mut(task_id) {
            Some(task) => {
                if completed {
                    task.complete();
                } else {
                    task.incomplete();
                }
            }
            None => {
                log::info!("task `{task_id}` not found");
                return Ok(false);
            }
        }
        self.save()?;
        Ok(true)
    }

    /// Append a subtask under an existing task anywhere in the forest.
    /// `Ok(false)` when the parent id is unknown.
    pub fn add_subtask(&mut self, parent_id: &str, task: Task) -> Result<bool> {
        self.check_new_ids(&task)?;
        match self.find_in_tree_mut(parent_id) {
            Some(parent) => parent.add_subtask(task),
            None => {
                log::info!("task `{parent_id}` not found");
                return Ok(false);
            }
        }
        self.save()?;
        Ok(true)
    }

    // ----- read-only operations -----

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.task_index.get(task_id)
    }

    pub fn get_section_by_name(&self, name: &str) -> Option<&Section> {
        self.section_index.get(name)
    }

    /// Every task in the store, nested subtasks included.
    pub fn get_all_tasks(&self) -> Vec<&Task> {
        self.task_index.values().collect()
    }

    pub fn get_all_sections(&self) -> Vec<&Section> {
        self.section_index.values().collect()
    }

    /// Every task with the completion flag set, nested subtasks included.
    pub fn get_completed_tasks(&self) -> Vec<&Task> {
        self.task_index.values().filter(|t| t.completed).collect()
    }

    /// Sections in insertion order, straight from the tree.
    pub fn sections(&self) -> &[Section] {
        &self.root.sections
    }

    pub fn version(&self) -> &str {
        &self.root.version
    }

    pub fn settings(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.root.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
