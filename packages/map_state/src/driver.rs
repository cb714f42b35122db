//! Runs a [`Synchronizer`] on its own tokio task.
//!
//! Commands arrive over an mpsc channel. The debounce timer is a
//! `sleep_until` on the synchronizer's current deadline, recomputed on every
//! loop iteration, so a superseded deadline is simply never awaited again.

use std::sync::Arc;

use emotion_map_aggregation_models::AggregatedTable;
use emotion_map_survey_models::Metric;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::SyncError;
use crate::renderer::MapRenderer;
use crate::sync::{DetailUpdate, MapEvent, Synchronizer};

/// Capacity of the command channel.
const COMMAND_BUFFER: usize = 64;

enum Command {
    DataChanged(Arc<AggregatedTable>),
    MetricChanged {
        metric: Metric,
        reply: oneshot::Sender<DetailUpdate>,
    },
    Event {
        event: MapEvent,
        reply: oneshot::Sender<DetailUpdate>,
    },
    Teardown,
}

/// Handle to a running synchronizer task.
///
/// Dropping the handle tears the synchronizer down.
#[derive(Debug)]
pub struct SyncHandle<R> {
    tx: mpsc::Sender<Command>,
    task: JoinHandle<R>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataChanged(records) => write!(f, "DataChanged({} records)", records.len()),
            Self::MetricChanged { metric, .. } => write!(f, "MetricChanged({metric})"),
            Self::Event { event, .. } => write!(f, "Event({event:?})"),
            Self::Teardown => f.write_str("Teardown"),
        }
    }
}

/// Spawns `sync` onto the current tokio runtime.
pub fn spawn<R>(sync: Synchronizer<R>) -> SyncHandle<R>
where
    R: MapRenderer + Send + 'static,
{
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let task = tokio::spawn(run(sync, rx));
    SyncHandle { tx, task }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run<R: MapRenderer>(mut sync: Synchronizer<R>, mut rx: mpsc::Receiver<Command>) -> R {
    loop {
        let deadline = sync.deadline();

        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::DataChanged(records)) => {
                    sync.data_changed(records, Instant::now());
                }
                Some(Command::MetricChanged { metric, reply }) => {
                    let _ = reply.send(sync.metric_changed(metric));
                }
                Some(Command::Event { event, reply }) => {
                    let _ = reply.send(sync.handle_event(event));
                }
                Some(Command::Teardown) | None => {
                    sync.teardown();
                    break;
                }
            },
            () = sleep_until(deadline) => {
                sync.fire_due(Instant::now());
            }
        }
    }

    sync.into_renderer()
}

impl<R> SyncHandle<R> {
    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.tx.send(command).await.map_err(|_| SyncError::Closed)
    }

    /// Hands new records to the synchronizer; they are applied once the
    /// debounce window passes without a newer change.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Closed`] if the task has stopped.
    pub async fn data_changed(&self, records: Arc<AggregatedTable>) -> Result<(), SyncError> {
        self.send(Command::DataChanged(records)).await
    }

    /// Switches the color ramp to `metric` and reports whether the detail
    /// view has to close because the selection was cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Closed`] if the task has stopped.
    pub async fn metric_changed(&self, metric: Metric) -> Result<DetailUpdate, SyncError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::MetricChanged { metric, reply }).await?;
        response.await.map_err(|_| SyncError::Closed)
    }

    /// Forwards a renderer event and waits for the resulting detail update.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Closed`] if the task has stopped.
    pub async fn event(&self, event: MapEvent) -> Result<DetailUpdate, SyncError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Event { event, reply }).await?;
        response.await.map_err(|_| SyncError::Closed)
    }

    /// Tears the synchronizer down, cancelling any pending apply, and returns
    /// the renderer once the task has finished.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the task panicked.
    pub async fn teardown(self) -> Result<R, SyncError> {
        let _ = self.tx.send(Command::Teardown).await;
        Ok(self.task.await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use emotion_map_aggregation_models::AggregatedHexRecord;
    use emotion_map_config::AppConfig;
    use emotion_map_survey_models::HexId;

    use super::*;
    use crate::context::MapContext;
    use crate::memory::InMemoryRenderer;
    use crate::renderer::{FeatureStateKey, FeatureStateValue, FeatureTarget};

    const H1: &str = "8928308280fffff";
    const H2: &str = "8928308280bffff";

    fn records(value: f64) -> Arc<AggregatedTable> {
        Arc::new(
            [H1, H2]
                .into_iter()
                .map(|id| {
                    let record = AggregatedHexRecord {
                        hex_id: HexId::from(id),
                        value: Some(value),
                        participant_total: 5,
                        has_data: true,
                        passes_filter: true,
                        visible: true,
                        places: BTreeMap::new(),
                    };
                    (HexId::from(id), record)
                })
                .collect(),
        )
    }

    fn start() -> SyncHandle<InMemoryRenderer> {
        let config = AppConfig::embedded().map;
        let mut renderer = InMemoryRenderer::new();
        MapContext::new(config.clone())
            .mount(&mut renderer, Metric::Happy)
            .unwrap();
        for layer in ["h3", "h3_centroids"] {
            renderer.load_tile("h3", layer, [H1, H2]);
        }
        spawn(Synchronizer::new(renderer, config))
    }

    fn value_of(renderer: &InMemoryRenderer, id: &str) -> Option<FeatureStateValue> {
        renderer
            .feature_state(&FeatureTarget {
                source: "h3",
                source_layer: "h3",
                id,
            })
            .and_then(|state| state.get(&FeatureStateKey::Value).copied())
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_one_apply() {
        let handle = start();

        for value in [1.0, 2.0, 3.0, 4.0] {
            handle.data_changed(records(value)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let renderer = handle.teardown().await.unwrap();
        assert_eq!(renderer.feature_state_writes(), 4);
        assert_eq!(value_of(&renderer, H1), Some(FeatureStateValue::Number(4.0)));
        assert_eq!(value_of(&renderer, H2), Some(FeatureStateValue::Number(4.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn separate_changes_apply_separately() {
        let handle = start();

        handle.data_changed(records(1.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.data_changed(records(2.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let renderer = handle.teardown().await.unwrap();
        assert_eq!(renderer.feature_state_writes(), 8);
        assert_eq!(value_of(&renderer, H1), Some(FeatureStateValue::Number(2.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_apply() {
        let handle = start();

        handle.data_changed(records(1.0)).await.unwrap();
        let renderer = handle.teardown().await.unwrap();

        assert_eq!(renderer.feature_state_writes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn events_report_detail_updates() {
        let handle = start();
        handle.data_changed(records(3.0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let update = handle
            .event(MapEvent::Click {
                hex_id: HexId::from(H1),
            })
            .await
            .unwrap();
        assert_eq!(update, DetailUpdate::Show(HexId::from(H1)));
        assert_eq!(
            handle.event(MapEvent::EmptyClick).await.unwrap(),
            DetailUpdate::Hide
        );

        assert_eq!(
            handle.metric_changed(Metric::Stress).await.unwrap(),
            DetailUpdate::Unchanged
        );
        handle
            .event(MapEvent::Click {
                hex_id: HexId::from(H2),
            })
            .await
            .unwrap();
        assert_eq!(
            handle.metric_changed(Metric::Energy).await.unwrap(),
            DetailUpdate::Hide
        );
        let renderer = handle.teardown().await.unwrap();
        assert_eq!(
            renderer.layer("h3-fill").unwrap()["paint"]["fill-color"],
            crate::style::color_expression(Metric::Energy)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn closed_task_rejects_commands() {
        let handle = start();
        handle.tx.send(Command::Teardown).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(matches!(
            handle.data_changed(records(1.0)).await,
            Err(SyncError::Closed)
        ));
    }
}
