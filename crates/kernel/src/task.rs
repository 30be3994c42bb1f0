//! Proximity tasks and their dependency graph.
//!
//! A task unlocks once everything it requires is completed, and completes
//! when the player stands within its radius (and presses interact, for
//! interact-triggered tasks). Completion is permanent.

use arena_common::TaskId;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskTrigger {
    /// Completes as soon as the player is in range.
    #[default]
    Proximity,
    /// Completes when the player is in range and presses interact.
    Interact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Locked,
    Available,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
    pub trigger: TaskTrigger,
    pub requires: Vec<TaskId>,
    pub status: TaskStatus,
    pub completed_at: Option<u64>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, position: Vec3, radius: f32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            radius,
            trigger: TaskTrigger::Proximity,
            requires: Vec::new(),
            status: TaskStatus::Locked,
            completed_at: None,
        }
    }

    pub fn with_trigger(mut self, trigger: TaskTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn requiring<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.requires = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Horizontal distance to the task within `radius`, and the task point
    /// within `reach` vertically of the feet.
    pub fn in_range(&self, feet: Vec3, reach: f32) -> bool {
        let flat = Vec2::new(feet.x - self.position.x, feet.z - self.position.z);
        let dy = self.position.y - feet.y;
        flat.length() <= self.radius && (-reach..=reach).contains(&dy)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("duplicate task id {0}")]
    Duplicate(TaskId),
    #[error("task {task} requires unknown task {missing}")]
    UnknownDependency { task: TaskId, missing: TaskId },
    #[error("task dependency cycle through {0}")]
    Cycle(TaskId),
    #[error("task {0} has a non-positive radius")]
    InvalidRadius(TaskId),
    #[error("unknown task {0}")]
    Unknown(TaskId),
    #[error("task {0} is locked")]
    Locked(TaskId),
    #[error("task {0} is already completed")]
    AlreadyCompleted(TaskId),
}

/// Result of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub task: TaskId,
    pub unlocked: Vec<TaskId>,
}

/// Validated set of tasks with dependency tracking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskId, Task>,
    all_complete_reported: bool,
}

impl TaskGraph {
    /// Validate and build. Statuses are recomputed: tasks with no
    /// requirements start available, everything else locked.
    pub fn new(tasks: Vec<Task>) -> Result<Self, TaskError> {
        let mut map = BTreeMap::new();
        for mut task in tasks {
            if task.radius.is_nan() || task.radius <= 0.0 {
                return Err(TaskError::InvalidRadius(task.id));
            }
            task.status = TaskStatus::Locked;
            task.completed_at = None;
            let id = task.id.clone();
            if map.insert(id.clone(), task).is_some() {
                return Err(TaskError::Duplicate(id));
            }
        }

        for task in map.values() {
            for dep in &task.requires {
                if !map.contains_key(dep) {
                    return Err(TaskError::UnknownDependency {
                        task: task.id.clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        detect_cycle(&map)?;

        let mut graph = Self {
            tasks: map,
            all_complete_reported: false,
        };
        graph.refresh_unlocks();
        Ok(graph)
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Tasks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// `(completed, total)`.
    pub fn progress(&self) -> (usize, usize) {
        let done = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        (done, self.tasks.len())
    }

    pub fn all_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.values().all(|t| t.status == TaskStatus::Completed)
    }

    /// Complete an available task. Returns the tasks it unlocked.
    pub fn complete(&mut self, id: &TaskId, tick: u64) -> Result<Completion, TaskError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| TaskError::Unknown(id.clone()))?;
        match task.status {
            TaskStatus::Locked => return Err(TaskError::Locked(id.clone())),
            TaskStatus::Completed => return Err(TaskError::AlreadyCompleted(id.clone())),
            TaskStatus::Available => {}
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(tick);
        let unlocked = self.refresh_unlocks();
        Ok(Completion {
            task: id.clone(),
            unlocked,
        })
    }

    /// Complete every available task the player is in range of.
    pub fn evaluate(&mut self, tick: u64, feet: Vec3, reach: f32, interact: bool) -> Vec<Completion> {
        let ready: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Available)
            .filter(|t| t.trigger == TaskTrigger::Proximity || interact)
            .filter(|t| t.in_range(feet, reach))
            .map(|t| t.id.clone())
            .collect();

        ready
            .iter()
            .filter_map(|id| self.complete(id, tick).ok())
            .collect()
    }

    /// True exactly once: the first call after every task is complete.
    pub fn take_all_complete(&mut self) -> bool {
        if self.all_complete_reported || !self.all_complete() {
            return false;
        }
        self.all_complete_reported = true;
        true
    }

    /// Promote locked tasks whose requirements are all complete.
    fn refresh_unlocks(&mut self) -> Vec<TaskId> {
        let completed: BTreeSet<TaskId> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .map(|t| t.id.clone())
            .collect();
        let mut unlocked = Vec::new();
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Locked && task.requires.iter().all(|r| completed.contains(r)) {
                task.status = TaskStatus::Available;
                unlocked.push(task.id.clone());
            }
        }
        unlocked
    }
}

fn detect_cycle(tasks: &BTreeMap<TaskId, Task>) -> Result<(), TaskError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a TaskId,
        tasks: &'a BTreeMap<TaskId, Task>,
        marks: &mut BTreeMap<&'a TaskId, Mark>,
    ) -> Result<(), TaskError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(TaskError::Cycle(id.clone())),
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        if let Some(task) = tasks.get(id) {
            for dep in &task.requires {
                visit(dep, tasks, marks)?;
            }
        }
        marks.insert(id, Mark::Done);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    for id in tasks.keys() {
        visit(id, tasks, &mut marks)?;
    }
    Ok(())
}
