use crate::{
    classifier::{Classifier, ClassifyError},
    config::Config,
    record::RawRecord,
    report::{ProcessedRow, ResultSet},
    schema::{self, SchemaError},
    store::{KeyValueStore, ResultStore},
};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Validating,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Started { total: usize },
    /// Emitted before each row's classification call.
    Progress { processed: usize, total: usize },
    Completed { result: ResultSet, persisted: bool },
    Cancelled { processed: usize, total: usize },
    Failed { processed: usize, total: usize, error: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Classify(ClassifyError),

    #[error("a pipeline run is already in progress")]
    Busy,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed { result: ResultSet, persisted: bool },
    Cancelled { processed: usize, total: usize },
}

/// Where the dataset came from.
#[derive(Debug, Clone, Default)]
pub struct Source {
    pub name: String,
    pub digest: Option<String>,
}

impl Source {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            digest: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub processed: usize,
    pub total: usize,
    /// Terminal state of the most recent run.
    pub last_outcome: Option<PipelineState>,
}

/// In-flight batch. Dropped on every terminal transition.
struct PipelineRun {
    total: usize,
    processed: usize,
    cancel: CancellationToken,
}

struct Inner {
    state: PipelineState,
    run: Option<PipelineRun>,
    last_outcome: Option<PipelineState>,
}

pub struct Pipeline<C: Classifier, K: KeyValueStore> {
    cfg: Config,
    classifier: C,
    store: ResultStore<K>,
    events: Option<UnboundedSender<PipelineEvent>>,
    inner: Mutex<Inner>,
}

impl<C: Classifier, K: KeyValueStore> Pipeline<C, K> {
    pub fn new(cfg: &Config, classifier: C, store: ResultStore<K>) -> Self {
        Self {
            cfg: cfg.clone(),
            classifier,
            store,
            events: None,
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                run: None,
                last_outcome: None,
            }),
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn store(&self) -> &ResultStore<K> {
        &self.store
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn status(&self) -> PipelineStatus {
        let inner = self.lock();
        let (processed, total) = inner
            .run
            .as_ref()
            .map(|r| (r.processed, r.total))
            .unwrap_or((0, 0));
        PipelineStatus {
            state: inner.state,
            processed,
            total,
            last_outcome: inner.last_outcome,
        }
    }

    /// Signals the live run, if any. The loop stops at its next row boundary.
    pub fn cancel(&self) -> bool {
        match &self.lock().run {
            Some(run) => {
                run.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Validates, classifies every row in order and stores the result set.
    ///
    /// Nothing is stored unless every row was classified. A transport failure on any row fails
    /// the whole batch.
    pub async fn run(&self, source: &Source, records: &[RawRecord]) -> Result<RunOutcome, PipelineError> {
        let total = records.len();
        {
            let mut inner = self.lock();
            if inner.state != PipelineState::Idle {
                return Err(PipelineError::Busy);
            }
            inner.state = PipelineState::Validating;
        }
        let guard = RunGuard {
            inner: &self.inner,
            armed: true,
        };

        info!(name = %source.name, rows = total, "validating dataset");
        if let Err(err) = schema::validate(records, &schema::REQUIRED_FIELDS) {
            warn!(name = %source.name, "dataset rejected: {err}");
            guard.finish(PipelineState::Failed);
            self.emit(PipelineEvent::Failed {
                processed: 0,
                total,
                error: err.to_string(),
            });
            return Err(err.into());
        }

        let cancel = CancellationToken::new();
        {
            let mut inner = self.lock();
            inner.state = PipelineState::Running;
            inner.run = Some(PipelineRun {
                total,
                processed: 0,
                cancel: cancel.clone(),
            });
        }
        self.emit(PipelineEvent::Started { total });
        info!(name = %source.name, total, "classifying rows");

        let mut rows = Vec::with_capacity(total);
        for record in records {
            let processed = self.advance();
            self.emit(PipelineEvent::Progress { processed, total });
            self.pause().await;

            if cancel.is_cancelled() {
                return Ok(self.cancelled(guard, processed, total));
            }

            match self.classifier.classify(record, &cancel).await {
                Ok(result) => {
                    debug!(row = processed, label = result.label.as_str(), "row classified");
                    rows.push(ProcessedRow::new(record, result));
                }
                Err(ClassifyError::Cancelled) => {
                    return Ok(self.cancelled(guard, processed, total));
                }
                Err(err) => {
                    error!(name = %source.name, processed, total, "batch aborted: {err}");
                    guard.finish(PipelineState::Failed);
                    self.emit(PipelineEvent::Failed {
                        processed,
                        total,
                        error: err.to_string(),
                    });
                    return Err(PipelineError::Classify(err));
                }
            }
        }

        // A cancel that lands after the last call still discards the batch.
        if cancel.is_cancelled() {
            return Ok(self.cancelled(guard, total, total));
        }

        let mut result = ResultSet::new(&source.name, rows);
        result.source_digest = source.digest.clone();

        let persisted = match self.store.put(&result) {
            Ok(()) => true,
            Err(err) => {
                warn!(id = %result.id, "result set kept in memory only: {err}");
                false
            }
        };

        info!(
            id = %result.id,
            total = result.stats.total,
            fraudulent = result.stats.fraudulent,
            fraud_percent = result.stats.fraud_percent,
            persisted,
            "batch completed"
        );
        guard.finish(PipelineState::Completed);
        self.emit(PipelineEvent::Completed {
            result: result.clone(),
            persisted,
        });
        Ok(RunOutcome::Completed { result, persisted })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self) -> usize {
        let mut inner = self.lock();
        match inner.run.as_mut() {
            Some(run) => {
                run.processed += 1;
                run.processed
            }
            None => 0,
        }
    }

    async fn pause(&self) {
        if self.cfg.pipeline.row_yield_millis > 0 {
            tokio::time::sleep(Duration::from_millis(self.cfg.pipeline.row_yield_millis)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    fn cancelled(&self, guard: RunGuard<'_>, processed: usize, total: usize) -> RunOutcome {
        info!(processed, total, "batch cancelled; nothing stored");
        guard.finish(PipelineState::Cancelled);
        self.emit(PipelineEvent::Cancelled { processed, total });
        RunOutcome::Cancelled { processed, total }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Held by a live `run`. Records the terminal state, discards the run and returns to idle,
/// also when the run's future is dropped before it finishes.
struct RunGuard<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl RunGuard<'_> {
    fn finish(mut self, terminal: PipelineState) {
        self.settle(terminal);
    }

    fn settle(&mut self, terminal: PipelineState) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(?terminal, "pipeline finished");
        if let Some(run) = inner.run.take() {
            run.cancel.cancel();
        }
        inner.last_outcome = Some(terminal);
        inner.state = PipelineState::Idle;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("pipeline run dropped before finishing; nothing stored");
            self.settle(PipelineState::Cancelled);
        }
    }
}
