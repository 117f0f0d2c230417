use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::{JobConfig, JobContext, JobError, JobId, JobResult, JobSpec};

/// Concurrent map of live and finished jobs.
///
/// Jobs are created into the active set and moved to the completed set once
/// they reach a terminal status. The completed set keeps at most
/// `completed_retention` entries.
#[derive(Debug)]
pub struct JobRegistry {
    active: DashMap<JobId, Arc<JobContext>>,
    completed: DashMap<JobId, Arc<JobContext>>,
    completed_order: Mutex<VecDeque<JobId>>,
    max_chunks: u32,
    completed_retention: usize,
}

impl JobRegistry {
    pub fn new(config: &JobConfig) -> Self {
        Self {
            active: DashMap::new(),
            completed: DashMap::new(),
            completed_order: Mutex::new(VecDeque::new()),
            max_chunks: config.max_chunks,
            completed_retention: config.completed_retention,
        }
    }

    /// Validate `spec` and register a fresh job in `UPLOADING`
    pub fn create(&self, spec: JobSpec) -> JobResult<Arc<JobContext>> {
        if spec.file_name.trim().is_empty() {
            return Err(JobError::invalid("fileName must not be empty"));
        }
        if spec.total_chunks == 0 {
            return Err(JobError::invalid("totalChunks must be at least 1"));
        }
        if spec.total_chunks > self.max_chunks {
            return Err(JobError::invalid(format!(
                "totalChunks {} exceeds the limit of {}",
                spec.total_chunks, self.max_chunks
            )));
        }

        let job_id = JobId::new();
        let ctx = Arc::new(JobContext::new(job_id.clone(), spec));
        self.active.insert(job_id, ctx.clone());
        Ok(ctx)
    }

    /// Look up an active job
    pub fn get(&self, job_id: &JobId) -> JobResult<Arc<JobContext>> {
        self.active
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    /// Look up a job in the active set, then in the completed set
    pub fn find(&self, job_id: &JobId) -> JobResult<Arc<JobContext>> {
        if let Some(entry) = self.active.get(job_id) {
            return Ok(entry.value().clone());
        }
        self.completed
            .get(job_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| JobError::NotFound(job_id.clone()))
    }

    /// Move a job from the active to the completed set. Idempotent.
    pub fn promote_to_completed(&self, job_id: &JobId) {
        let ctx = match self.active.get(job_id) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        // Insert before removing so `find` always sees the job in one of the sets.
        self.completed.insert(job_id.clone(), ctx);
        if self.active.remove(job_id).is_none() {
            return;
        }

        let mut order = self.completed_order.lock();
        order.push_back(job_id.clone());
        while order.len() > self.completed_retention {
            if let Some(evicted) = order.pop_front() {
                self.completed.remove(&evicted);
                tracing::debug!(job_id = %evicted, "evicted finished job");
            }
        }
    }

    /// Drop an active job that never got going
    pub(crate) fn discard(&self, job_id: &JobId) {
        self.active.remove(job_id);
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }
}
