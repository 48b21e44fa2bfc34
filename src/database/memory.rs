//! In-process task store backed by `DashMap`.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::store::{StoreError, StoreResult, TaskCount, TaskListQuery, TaskPage, TaskStore};
use crate::models::PublicationTask;

/// Task store for tests and single-process deployments.
///
/// The active-pair index is only locked by `insert` and by terminal
/// transitions in `compare_and_swap`, always before touching a map shard.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<Uuid, PublicationTask>,
    active: Mutex<HashMap<(i64, i64), Uuid>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn filtered(&self, query: &TaskListQuery) -> Vec<PublicationTask> {
        self.tasks
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: &PublicationTask) -> StoreResult<PublicationTask> {
        let mut active = self.active.lock();
        let key = (task.product_id, task.marketplace_id);

        if let Some(existing) = active.get(&key) {
            let still_active = self
                .tasks
                .get(existing)
                .is_some_and(|stored| !stored.is_terminal());
            if still_active {
                return Err(StoreError::ActiveTaskExists {
                    product_id: task.product_id,
                    marketplace_id: task.marketplace_id,
                    existing: *existing,
                });
            }
        }

        let stored = PublicationTask {
            version: 1,
            ..task.clone()
        };
        if !stored.is_terminal() {
            active.insert(key, stored.task_id);
        }
        self.tasks.insert(stored.task_id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, task_id: Uuid) -> StoreResult<Option<PublicationTask>> {
        Ok(self.tasks.get(&task_id).map(|entry| entry.value().clone()))
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        task: &PublicationTask,
    ) -> StoreResult<PublicationTask> {
        let stored = {
            let mut entry = self
                .tasks
                .get_mut(&task.task_id)
                .ok_or(StoreError::NotFound(task.task_id))?;

            if entry.version != expected_version {
                return Err(StoreError::VersionConflict {
                    task_id: task.task_id,
                    expected: expected_version,
                    actual: entry.version,
                });
            }

            let updated = PublicationTask {
                version: expected_version + 1,
                ..task.clone()
            };
            *entry = updated.clone();
            updated
        };

        if stored.is_terminal() {
            let mut active = self.active.lock();
            let key = (stored.product_id, stored.marketplace_id);
            if active.get(&key) == Some(&stored.task_id) {
                active.remove(&key);
            }
        }

        Ok(stored)
    }

    async fn list_tasks(&self, query: &TaskListQuery) -> StoreResult<TaskPage> {
        let mut tasks = self.filtered(query);
        let total = tasks.len() as u64;

        tasks.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b.task_id.cmp(&a.task_id))
        });

        let tasks = tasks
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();

        Ok(TaskPage { tasks, total })
    }

    async fn task_counts(&self, query: &TaskListQuery) -> StoreResult<Vec<TaskCount>> {
        let mut counts: BTreeMap<(_, i64), (String, u64)> = BTreeMap::new();
        for task in self.filtered(query) {
            let entry = counts
                .entry((task.status, task.marketplace_id))
                .or_insert_with(|| (task.marketplace_name.clone(), 0));
            entry.1 += 1;
        }

        Ok(counts
            .into_iter()
            .map(|((status, marketplace_id), (marketplace_name, count))| TaskCount {
                status,
                marketplace_id,
                marketplace_name,
                count,
            })
            .collect())
    }
}
