use std::ops::ControlFlow;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::cancel::CancelToken;
use super::grouping::TaskPlanner;
use crate::config::{default_parallelism, EngineConfig};
use crate::error::EngineError;
use crate::matcher::PathMatcher;
use crate::output::{AggregateReport, HandlerResult, Status};
use crate::registry::{CatalogSource, HandlerRegistry};
use crate::runner::{HandlerExecutor, Invocation, ProcessRunner};
use crate::scan::{WalkConfig, WalkEntry, Walker};

const WALK_CHANNEL_CAPACITY: usize = 256;

/// Walks a tree, plans handler tasks and runs them on a fixed worker pool.
pub struct DispatchEngine {
    registry: Arc<HandlerRegistry>,
    executor: Arc<dyn HandlerExecutor>,
    walk_config: WalkConfig,
    parallelism: usize,
}

impl DispatchEngine {
    pub fn new(registry: Arc<HandlerRegistry>, executor: Arc<dyn HandlerExecutor>) -> Self {
        Self {
            registry,
            executor,
            walk_config: WalkConfig::default(),
            parallelism: default_parallelism(),
        }
    }

    /// Validates `config`, loads the catalog and wires the process runner.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let registry = load_registry(config)?;
        let executor = Arc::new(ProcessRunner::new(config.runner_limits()));

        Ok(Self::new(Arc::new(registry), executor)
            .with_walk_config(config.walk_config())
            .with_parallelism(config.parallelism))
    }

    pub fn with_walk_config(mut self, walk_config: WalkConfig) -> Self {
        self.walk_config = walk_config;
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Produces the aggregate report for `root`.
    ///
    /// Handler failures are part of the report. Only an unusable root, a
    /// cancellation or an internal fault make this return an error.
    pub async fn run(
        &self,
        root: &Path,
        cancel: &CancelToken,
    ) -> Result<AggregateReport, EngineError> {
        let start = Instant::now();
        let walker = Walker::new(root, self.walk_config.clone())?;

        info!(
            root = %walker.root().display(),
            handlers = self.registry.len(),
            parallelism = self.parallelism,
            "Starting dispatch"
        );

        let planner = self.plan(walker, cancel).await?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let matched_files = planner.matched_files();
        let tasks = planner.finish();
        info!(matched_files, tasks = tasks.len(), "Tasks planned");

        let results = self.execute_all(tasks, cancel).await?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let report = AggregateReport::new(results);
        info!(
            results = report.len(),
            ok = report.count(Status::Ok),
            handler_failure = report.count(Status::HandlerFailure),
            timeout = report.count(Status::Timeout),
            unreadable_output = report.count(Status::UnreadableOutput),
            skipped = report.count(Status::Skipped),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dispatch completed"
        );

        Ok(report)
    }

    /// Runs the walker on a blocking thread and matches what it sends.
    async fn plan(&self, walker: Walker, cancel: &CancelToken) -> Result<TaskPlanner, EngineError> {
        let (tx, mut rx) = mpsc::channel::<WalkEntry>(WALK_CHANNEL_CAPACITY);
        let walk_cancel = cancel.clone();

        let producer = tokio::task::spawn_blocking(move || {
            walker.walk(|entry| {
                if walk_cancel.is_cancelled() {
                    return ControlFlow::Break(());
                }
                match tx.blocking_send(entry) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                }
            })
        });

        let matcher = PathMatcher::new(Arc::clone(&self.registry));
        let mut planner = TaskPlanner::new();

        while let Some(entry) = rx.recv().await {
            if let Some(descriptor) = matcher.match_file(&entry.relative) {
                trace!(
                    path = %entry.relative.display(),
                    ecosystem = descriptor.ecosystem(),
                    "File matched"
                );
                planner.add(descriptor, entry);
            }
        }

        let stats = producer
            .await
            .map_err(|err| EngineError::Internal(format!("walker task failed: {err}")))?;
        debug!(
            files_offered = stats.files_offered,
            entries_skipped = stats.entries_skipped,
            matched_files = planner.matched_files(),
            "Walk drained"
        );

        Ok(planner)
    }

    async fn execute_all(
        &self,
        tasks: Vec<Invocation>,
        cancel: &CancelToken,
    ) -> Result<Vec<HandlerResult>, EngineError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let workers = self.parallelism.min(tasks.len());
        let (task_tx, task_rx) = mpsc::channel::<Invocation>(workers);
        let task_rx = Arc::new(tokio::sync::Mutex::new(task_rx));
        let results = Arc::new(Mutex::new(Vec::with_capacity(tasks.len())));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let task_rx = Arc::clone(&task_rx);
            let results = Arc::clone(&results);
            let executor = Arc::clone(&self.executor);
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = task_rx.lock().await.recv().await;
                    let Some(invocation) = next else {
                        break;
                    };
                    if cancel.is_cancelled() {
                        break;
                    }

                    let result = executor.execute(&invocation, &cancel).await;
                    if cancel.is_cancelled() {
                        break;
                    }

                    debug!(
                        worker_id,
                        ecosystem = %result.ecosystem,
                        path = %result.path,
                        status = %result.status,
                        duration_ms = result.duration_ms,
                        "Task finished"
                    );
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(result);
                }
            }));
        }

        for task in tasks {
            tokio::select! {
                sent = task_tx.send(task) => {
                    if sent.is_err() {
                        warn!("All workers stopped before the task queue was drained");
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        drop(task_tx);

        for handle in handles {
            handle
                .await
                .map_err(|err| EngineError::Internal(format!("worker failed: {err}")))?;
        }

        let collected = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(collected)
    }
}

fn load_registry(config: &EngineConfig) -> Result<HandlerRegistry, EngineError> {
    let source = CatalogSource::resolve(config.config_path.as_deref())?;
    let registry = HandlerRegistry::load(&source)?;

    if config.disabled.is_empty() {
        return Ok(registry);
    }

    let (registry, unknown) = registry.without(&config.disabled);
    for name in unknown {
        warn!(ecosystem = %name, "Disabled ecosystem is not in the handler catalog");
    }
    Ok(registry)
}
