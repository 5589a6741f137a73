//! In-memory task repository with per-task locking.

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::ports::{TaskMutation, TaskRepository};
use async_trait::async_trait;
use jaro_rs_protocol::Task;
use log::debug;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Task store keeping every record in process memory.
///
/// The keyspace lock is held only to look up or insert a task slot; each
/// slot has its own mutex, so updates of different tasks never contend.
/// Memory grows with the number of tasks ever saved: nothing is evicted,
/// which bounds this store to tests and single-node development use.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Arc<Mutex<Task>>>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    fn slot(&self, task_id: &str) -> Option<Arc<Mutex<Task>>> {
        self.tasks.read().get(task_id).cloned()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn save_task(&self, ctx: &RequestContext, task: &Task) -> Result<(), CoreError> {
        ctx.check()?;
        if task.id.trim().is_empty() {
            return Err(CoreError::InvalidArgument("task id is required".to_string()));
        }
        let slot = match self.slot(&task.id) {
            Some(slot) => slot,
            None => self
                .tasks
                .write()
                .entry(task.id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(task.clone())))
                .clone(),
        };
        *slot.lock() = task.clone();
        debug!("task saved (task_id={}, status={})", task.id, task.status);
        Ok(())
    }

    async fn get_task(&self, ctx: &RequestContext, task_id: &str) -> Result<Task, CoreError> {
        ctx.check()?;
        let slot = self
            .slot(task_id)
            .ok_or_else(|| CoreError::task_not_found(task_id))?;
        let task = slot.lock().clone();
        Ok(task)
    }

    async fn update_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
        mutation: TaskMutation<'_>,
    ) -> Result<Task, CoreError> {
        ctx.check()?;
        let slot = self
            .slot(task_id)
            .ok_or_else(|| CoreError::task_not_found(task_id))?;
        let mut stored = slot.lock();
        let mut draft = stored.clone();
        mutation(&mut draft)?;
        if draft.id != stored.id {
            return Err(CoreError::Fatal("task id cannot change".to_string()));
        }
        *stored = draft.clone();
        Ok(draft)
    }
}
