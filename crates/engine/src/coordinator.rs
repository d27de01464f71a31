//! Execution coordinator — owns the lifecycle of pipeline runs.
//!
//! One coordinator per process. `start` claims the pipeline id, creates the
//! execution record, and spawns the run task; `stop` cancels cooperatively
//! and escalates to abort after a grace period. The coordinator is the sole
//! writer of run-status fields, and every path through a run — including
//! the failure paths — lands on a terminal status update, so no pipeline is
//! ever left `running` forever.
//!
//! Bookkeeping failures after the run's outcome is decided (a status write,
//! a notification) are logged and never override that outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use db::models::{ExecutionStatus, PipelineRow, PipelineStatus};
use db::repository::{executions as exec_repo, pipelines as pipeline_repo};
use db::DbPool;
use dom::{DocumentFetcher, HtmlDocument};
use notify::{ChannelRegistry, Event};

use crate::error::EngineError;
use crate::interpreter::interpret;
use crate::model::PipelineConfig;
use crate::registry::RunRegistry;

/// How long `stop` waits for the run task to exit on its own before
/// aborting it.
const STOP_GRACE: Duration = Duration::from_secs(5);

pub struct Coordinator {
    pool: DbPool,
    notifier: Arc<ChannelRegistry>,
    fetcher: Arc<dyn DocumentFetcher>,
    registry: RunRegistry,
}

/// Decode a stored pipeline row back into the domain config. The row's JSON
/// columns round-trip through the same serde shapes that wrote them.
fn decode_definition(row: &PipelineRow) -> Result<PipelineConfig, EngineError> {
    Ok(PipelineConfig {
        name: row.name.clone(),
        start_urls: serde_json::from_value(row.start_urls.clone())?,
        blocks: serde_json::from_value(row.blocks.clone())?,
        settings: row
            .settings
            .clone()
            .filter(|v| !v.is_null())
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default(),
    })
}

impl Coordinator {
    pub fn new(
        pool: DbPool,
        notifier: Arc<ChannelRegistry>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            notifier,
            fetcher,
            registry: RunRegistry::new(),
        })
    }

    pub fn is_running(&self, pipeline_id: Uuid) -> bool {
        self.registry.is_running(pipeline_id)
    }

    /// Begin a run for `pipeline_id`, returning the new execution id.
    ///
    /// Fails fast with [`EngineError::AlreadyRunning`] when a run is
    /// already tracked for this id.
    pub async fn start(self: &Arc<Self>, pipeline_id: Uuid) -> Result<Uuid, EngineError> {
        let cancel = self.registry.claim(pipeline_id)?;

        match self.start_claimed(pipeline_id, cancel).await {
            Ok(execution_id) => Ok(execution_id),
            Err(e) => {
                // Setup never reached the spawn; free the claim.
                self.registry.remove(pipeline_id);
                Err(e)
            }
        }
    }

    async fn start_claimed(
        self: &Arc<Self>,
        pipeline_id: Uuid,
        cancel: Arc<AtomicBool>,
    ) -> Result<Uuid, EngineError> {
        let row = pipeline_repo::get_pipeline(&self.pool, pipeline_id)
            .await
            .map_err(|e| match e {
                db::DbError::NotFound => EngineError::PipelineNotFound(pipeline_id),
                other => EngineError::Database(other),
            })?;
        let config = decode_definition(&row)?;

        let execution = exec_repo::create_execution(&self.pool, pipeline_id).await?;
        if let Err(e) =
            pipeline_repo::update_status(&self.pool, pipeline_id, PipelineStatus::Running).await
        {
            // Don't leave the fresh execution record dangling in `running`.
            let _ = exec_repo::finish_execution(
                &self.pool,
                execution.id,
                ExecutionStatus::Error,
                0,
                Some(e.to_string()),
            )
            .await;
            return Err(e.into());
        }

        self.notifier.publish(
            pipeline_id,
            Event {
                message: Some(format!("Pipeline {} started", config.name)),
                execution_id: Some(execution.id),
                timestamp: Some(execution.started_at),
                ..Event::with_status(ExecutionStatus::Running.to_string())
            },
        );

        let this = Arc::clone(self);
        let execution_id = execution.id;
        let task = tokio::spawn(async move {
            this.run(pipeline_id, config, execution_id, cancel).await;
        });
        self.registry.attach(pipeline_id, task);

        info!(%pipeline_id, %execution_id, "pipeline run started");
        Ok(execution_id)
    }

    /// The run loop: fetch every start URL, interpret, report, finalize.
    #[instrument(skip(self, config, cancel))]
    async fn run(
        &self,
        pipeline_id: Uuid,
        config: PipelineConfig,
        execution_id: Uuid,
        cancel: Arc<AtomicBool>,
    ) {
        let mut items_scraped: i32 = 0;
        // First fetch/interpret failure; decides the terminal status.
        let mut run_error: Option<String> = None;

        for url in &config.start_urls {
            if cancel.load(Ordering::SeqCst) {
                return; // stop() owns the bookkeeping from here
            }

            let page = match self.fetcher.fetch(url).await {
                Ok(page) => page,
                Err(e) => {
                    error!(%url, error = %e, "fetch failed");
                    self.notifier.publish(
                        pipeline_id,
                        Event {
                            error_message: Some(e.to_string()),
                            execution_id: Some(execution_id),
                            ..Event::with_status(ExecutionStatus::Running.to_string())
                        },
                    );
                    run_error.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };

            // The parsed document must not live across an await point, so
            // the whole interpret-and-report pass is synchronous; publish
            // is a non-blocking send.
            let document = HtmlDocument::parse(&page.body, Some(page.url.clone()));
            for record in interpret(&document, document.root(), &config.blocks) {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                items_scraped += 1;
                self.notifier.publish(
                    pipeline_id,
                    Event {
                        items_scraped: Some(items_scraped),
                        message: serde_json::to_string(&record).ok(),
                        execution_id: Some(execution_id),
                        ..Event::with_status(ExecutionStatus::Running.to_string())
                    },
                );
            }
        }

        if cancel.load(Ordering::SeqCst) {
            return;
        }
        self.registry.remove(pipeline_id);
        self.finalize(pipeline_id, execution_id, items_scraped, run_error)
            .await;
    }

    /// Terminal bookkeeping for a naturally-completed run. Failures here are
    /// logged only — the run outcome stands.
    async fn finalize(
        &self,
        pipeline_id: Uuid,
        execution_id: Uuid,
        items_scraped: i32,
        run_error: Option<String>,
    ) {
        let (exec_status, pipeline_status) = match run_error {
            Some(_) => (ExecutionStatus::Error, PipelineStatus::Error),
            None => (ExecutionStatus::Finished, PipelineStatus::Finished),
        };

        if let Err(e) = exec_repo::finish_execution(
            &self.pool,
            execution_id,
            exec_status,
            items_scraped,
            run_error.clone(),
        )
        .await
        {
            error!(error = %e, "failed to persist execution result");
        }
        if let Err(e) = pipeline_repo::update_status(&self.pool, pipeline_id, pipeline_status).await
        {
            error!(error = %e, "failed to update pipeline status");
        }

        let event = match run_error {
            Some(message) => Event {
                error_message: Some(message),
                items_scraped: Some(items_scraped),
                execution_id: Some(execution_id),
                timestamp: Some(Utc::now()),
                ..Event::with_status(exec_status.to_string())
            },
            None => Event {
                message: Some("Pipeline completed successfully".to_string()),
                items_scraped: Some(items_scraped),
                execution_id: Some(execution_id),
                timestamp: Some(Utc::now()),
                ..Event::with_status(exec_status.to_string())
            },
        };
        self.notifier.publish(pipeline_id, event);

        info!(%pipeline_id, %execution_id, items_scraped, status = %exec_status, "pipeline run finished");
    }

    /// Stop a running pipeline.
    ///
    /// Cancellation is cooperative: the flag is set, the task gets
    /// [`STOP_GRACE`] to observe it, then it is aborted. Fails with
    /// [`EngineError::NotRunning`] when no run is tracked.
    pub async fn stop(&self, pipeline_id: Uuid) -> Result<(), EngineError> {
        let Some(mut handle) = self.registry.remove(pipeline_id) else {
            return Err(EngineError::NotRunning(pipeline_id));
        };

        handle.cancel.store(true, Ordering::SeqCst);
        if let Some(mut task) = handle.task.take() {
            match tokio::time::timeout(STOP_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(%pipeline_id, error = %e, "run task failed while stopping"),
                Err(_) => {
                    warn!(%pipeline_id, "run task did not exit within the grace period; aborting");
                    task.abort();
                }
            }
        }

        // Stop bookkeeping is best-effort: the run is already dead.
        let mut execution_id = None;
        match exec_repo::latest_running(&self.pool, pipeline_id).await {
            Ok(Some(execution)) => {
                execution_id = Some(execution.id);
                if let Err(e) = exec_repo::mark_stopped(&self.pool, execution.id).await {
                    error!(error = %e, "failed to mark execution stopped");
                }
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "failed to look up the running execution"),
        }
        if let Err(e) =
            pipeline_repo::update_status(&self.pool, pipeline_id, PipelineStatus::Idle).await
        {
            error!(error = %e, "failed to update pipeline status");
        }

        self.notifier.publish(
            pipeline_id,
            Event {
                message: Some(format!("Pipeline {pipeline_id} stopped")),
                execution_id,
                timestamp: Some(Utc::now()),
                ..Event::with_status(ExecutionStatus::Stopped.to_string())
            },
        );

        info!(%pipeline_id, "pipeline run stopped");
        Ok(())
    }
}
