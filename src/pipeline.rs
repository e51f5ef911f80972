//! Load orchestration: timeline → events → steps → model.
//!
//! Each load runs as its own tokio task and reports back over a channel.
//! Starting a new load supersedes the previous one: its task is aborted and
//! anything it already queued is dropped on the receiving side by comparing
//! load generations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::data::fetch::{resource_name, Fetcher, ResourceKind};
use crate::data::filter::{decode_events, decode_timeline, filter_events, filter_timeline, MinSteps};
use crate::data::model::FilteredModel;
use crate::data::steps::build_step_index;
use crate::error::{LoadError, LoadErrorKind, ValidationError};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    LoadingTimeline,
    LoadingEvents,
    LoadingSteps,
    Assembling,
    Ready,
    Failed,
}

impl Stage {
    /// What the pipeline is doing while in this stage.
    pub fn activity(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::LoadingTimeline => "loading timeline data",
            Stage::LoadingEvents => "loading events data",
            Stage::LoadingSteps => "loading step communities data",
            Stage::Assembling => "initialising chart",
            Stage::Ready => "ready",
            Stage::Failed => "failed",
        }
    }

    pub fn is_loading(self) -> bool {
        matches!(
            self,
            Stage::LoadingTimeline | Stage::LoadingEvents | Stage::LoadingSteps | Stage::Assembling
        )
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, LoadError>;
}

impl<T, E: Into<LoadErrorKind>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, LoadError> {
        self.map_err(|e| LoadError::new(stage, e))
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub dataset: String,
    pub min_steps: MinSteps,
}

impl LoadRequest {
    /// Validate raw UI input. Nothing is fetched for a rejected request.
    pub fn parse(
        dataset: &str,
        min_steps: &str,
        available: &[String],
    ) -> Result<Self, ValidationError> {
        if !available.iter().any(|id| id == dataset) {
            return Err(ValidationError::UnknownDataset {
                id: dataset.to_string(),
            });
        }
        Ok(Self {
            dataset: dataset.to_string(),
            min_steps: MinSteps::parse(min_steps)?,
        })
    }

    pub fn status_line(&self) -> String {
        format!(
            "loading dataset \"{}\" with {} minimum steps",
            self.dataset,
            self.min_steps.get()
        )
    }
}

// ---------------------------------------------------------------------------
// A single load
// ---------------------------------------------------------------------------

/// Run one load to completion. `report` is called on entering each stage
/// with the status line for it. On error nothing partial is returned.
pub async fn run_load<F>(
    fetcher: &dyn Fetcher,
    request: &LoadRequest,
    mut report: F,
) -> Result<FilteredModel, LoadError>
where
    F: FnMut(Stage, String) + Send,
{
    let dataset = request.dataset.as_str();

    report(Stage::LoadingTimeline, request.status_line());
    let raw = fetcher
        .fetch(dataset, ResourceKind::Timeline)
        .await
        .at(Stage::LoadingTimeline)?;
    let timeline = decode_timeline(&resource_name(dataset, ResourceKind::Timeline), raw)
        .at(Stage::LoadingTimeline)?;
    let total = timeline.len();
    let (timeline, retained) = filter_timeline(timeline, request.min_steps);
    log::info!(
        "{dataset}: kept {} of {total} timeline entries with >= {} steps",
        timeline.len(),
        request.min_steps.threshold()
    );

    report(Stage::LoadingEvents, Stage::LoadingEvents.activity().to_string());
    let raw = fetcher
        .fetch(dataset, ResourceKind::Events)
        .await
        .at(Stage::LoadingEvents)?;
    let events = decode_events(&resource_name(dataset, ResourceKind::Events), raw)
        .at(Stage::LoadingEvents)?;
    let events = filter_events(events, &retained);

    report(Stage::LoadingSteps, Stage::LoadingSteps.activity().to_string());
    let raw = fetcher
        .fetch(dataset, ResourceKind::Steps)
        .await
        .at(Stage::LoadingSteps)?;
    let (steps, default_color_key) =
        build_step_index(&resource_name(dataset, ResourceKind::Steps), raw).at(Stage::LoadingSteps)?;

    report(Stage::Assembling, Stage::Assembling.activity().to_string());
    let model = FilteredModel {
        dataset: dataset.to_string(),
        timeline,
        events,
        steps,
        default_color_key,
    };
    log::info!(
        "{dataset}: {} events across {} kinds, {} steps",
        model.event_count(),
        model.events.len(),
        model.steps.len()
    );
    Ok(model)
}

// ---------------------------------------------------------------------------
// Session: owns in-flight loads and delivers only the latest one
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum LoadEvent {
    Stage { stage: Stage, status: String },
    Ready(Box<FilteredModel>),
    Failed(LoadError),
}

#[derive(Debug)]
pub struct LoadUpdate {
    pub generation: u64,
    pub event: LoadEvent,
}

type Notifier = Arc<dyn Fn() + Send + Sync>;

pub struct Session {
    runtime: Handle,
    fetcher: Arc<dyn Fetcher>,
    generation: Arc<AtomicU64>,
    updates_tx: mpsc::UnboundedSender<LoadUpdate>,
    updates_rx: mpsc::UnboundedReceiver<LoadUpdate>,
    in_flight: Option<JoinHandle<()>>,
    stage: Stage,
    notify: Option<Notifier>,
}

impl Session {
    pub fn new(runtime: Handle, fetcher: Arc<dyn Fetcher>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            fetcher,
            generation: Arc::new(AtomicU64::new(0)),
            updates_tx,
            updates_rx,
            in_flight: None,
            stage: Stage::Idle,
            notify: None,
        }
    }

    /// Called from the load task after every update it sends (e.g. to wake the UI).
    pub fn set_notifier(&mut self, notify: impl Fn() + Send + Sync + 'static) {
        self.notify = Some(Arc::new(notify));
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn source(&self) -> String {
        self.fetcher.describe()
    }

    /// Point the session at another data source. Any in-flight load is dropped.
    pub fn set_fetcher(&mut self, fetcher: Arc<dyn Fetcher>) {
        self.supersede();
        log::info!("Reading datasets from {}", fetcher.describe());
        self.fetcher = fetcher;
    }

    /// Bump the generation and cancel the in-flight task, if any.
    fn supersede(&mut self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.in_flight.take() {
            if !previous.is_finished() {
                log::debug!("Load #{} superseded by #{generation}", generation - 1);
            }
            previous.abort();
        }
        self.stage = Stage::Idle;
        generation
    }

    /// Start a load, superseding whatever was in flight. Returns its generation.
    pub fn load(&mut self, request: LoadRequest) -> u64 {
        let generation = self.supersede();

        let fetcher = Arc::clone(&self.fetcher);
        let current = Arc::clone(&self.generation);
        let tx = self.updates_tx.clone();
        let notify = self.notify.clone();

        let task = async move {
            let send = |event: LoadEvent| {
                if current.load(Ordering::SeqCst) != generation {
                    log::debug!("Dropping update from superseded load #{generation}");
                    return;
                }
                if tx.send(LoadUpdate { generation, event }).is_err() {
                    return;
                }
                if let Some(notify) = &notify {
                    notify();
                }
            };

            let result = run_load(fetcher.as_ref(), &request, |stage, status| {
                log::info!("[#{generation}] {status}");
                send(LoadEvent::Stage { stage, status });
            })
            .await;

            match result {
                Ok(model) => send(LoadEvent::Ready(Box::new(model))),
                Err(e) => {
                    log::error!("[#{generation}] {e}");
                    send(LoadEvent::Failed(e));
                }
            }
        };

        self.in_flight = Some(self.runtime.spawn(task));
        generation
    }

    fn accept(&mut self, update: LoadUpdate) -> Option<LoadEvent> {
        if update.generation != self.generation.load(Ordering::SeqCst) {
            return None;
        }
        self.stage = match &update.event {
            LoadEvent::Stage { stage, .. } => *stage,
            LoadEvent::Ready(_) => Stage::Ready,
            LoadEvent::Failed(_) => Stage::Failed,
        };
        Some(update.event)
    }

    /// Drain pending updates without blocking. Stale loads never show up here.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(update) = self.updates_rx.try_recv() {
            events.extend(self.accept(update));
        }
        events
    }
}
