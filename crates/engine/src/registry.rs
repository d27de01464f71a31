//! Run registry — the one place that knows which pipelines are running.
//!
//! Start/stop transitions go through claim/attach/remove so only one caller
//! can ever observe a given pipeline id mid-transition; a second `start`
//! loses the claim race and fails fast instead of double-running.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::EngineError;

/// Tracking state for one in-flight run.
pub struct RunHandle {
    /// Cooperative cancellation flag, checked by the run loop between
    /// fetches and between records.
    pub cancel: Arc<AtomicBool>,
    /// The spawned run task. `None` between claim and attach.
    pub task: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct RunRegistry {
    inner: Mutex<HashMap<Uuid, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RunHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically claim a pipeline id for a new run.
    ///
    /// Returns the run's cancellation flag, or [`EngineError::AlreadyRunning`]
    /// if a run is already tracked for this id.
    pub fn claim(&self, pipeline_id: Uuid) -> Result<Arc<AtomicBool>, EngineError> {
        let mut inner = self.lock();
        if inner.contains_key(&pipeline_id) {
            return Err(EngineError::AlreadyRunning(pipeline_id));
        }
        let cancel = Arc::new(AtomicBool::new(false));
        inner.insert(
            pipeline_id,
            RunHandle {
                cancel: Arc::clone(&cancel),
                task: None,
            },
        );
        Ok(cancel)
    }

    /// Attach the spawned task to a claimed id.
    pub fn attach(&self, pipeline_id: Uuid, task: JoinHandle<()>) {
        if let Some(handle) = self.lock().get_mut(&pipeline_id) {
            handle.task = Some(task);
        }
    }

    /// Remove and return the handle for a pipeline, if one is tracked.
    pub fn remove(&self, pipeline_id: Uuid) -> Option<RunHandle> {
        self.lock().remove(&pipeline_id)
    }

    pub fn is_running(&self, pipeline_id: Uuid) -> bool {
        self.lock().contains_key(&pipeline_id)
    }
}
