//! The map state synchronizer.
//!
//! Keeps the renderer's feature state consistent with the latest aggregated
//! records across the polygon and centroid layers. Modeled as a state
//! machine over [`Phase`]; time is passed in explicitly so the machine can
//! be driven by [`crate::driver`] or stepped directly.

use std::sync::Arc;

use emotion_map_aggregation_models::AggregatedTable;
use emotion_map_config::MapConfig;
use emotion_map_survey_models::{HexId, Metric};
use tokio::time::Instant;

use crate::encoding::{FeatureVisualState, selection_patch};
use crate::renderer::{FeatureStatePatch, FeatureTarget, MapRenderer, RendererError};
use crate::style::{self, FILL_LAYER_ID};

/// Lifecycle phase of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No records have been applied yet.
    Idle,
    /// Records changed; they are applied once `deadline` passes.
    PendingApply {
        /// When the pending apply is due.
        deadline: Instant,
    },
    /// The latest records have been written.
    Applied,
    /// Torn down; every later event is ignored.
    TornDown,
}

/// Interaction and loading events emitted by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// A hex feature was clicked.
    Click {
        /// Id of the clicked feature.
        hex_id: HexId,
    },
    /// A click hit no hex feature.
    EmptyClick,
    /// The detail popup was closed.
    PopupClosed,
    /// Tiles of a source changed.
    SourceData {
        /// Source the event concerns.
        source_id: String,
        /// Whether the source reports itself as loaded.
        is_source_loaded: bool,
    },
}

/// What the presentation layer should do with its detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailUpdate {
    /// Show details for this hex.
    Show(HexId),
    /// Hide the detail view.
    Hide,
    /// Nothing to change.
    Unchanged,
}

/// Outcome of one full apply pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Successful feature-state writes.
    pub written: usize,
    /// Writes the renderer rejected.
    pub failed: usize,
}

/// Pushes aggregated records and the selection into a [`MapRenderer`].
#[derive(Debug)]
pub struct Synchronizer<R> {
    renderer: R,
    config: MapConfig,
    phase: Phase,
    records: Arc<AggregatedTable>,
    selected: Option<HexId>,
    write_warning_shown: bool,
}

impl<R: MapRenderer> Synchronizer<R> {
    /// Creates an idle synchronizer writing into `renderer`.
    #[must_use]
    pub fn new(renderer: R, config: MapConfig) -> Self {
        Self {
            renderer,
            config,
            phase: Phase::Idle,
            records: Arc::new(AggregatedTable::new()),
            selected: None,
            write_warning_shown: false,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Deadline of the pending apply, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::PendingApply { deadline } => Some(deadline),
            Phase::Idle | Phase::Applied | Phase::TornDown => None,
        }
    }

    /// Currently selected hex.
    #[must_use]
    pub const fn selected(&self) -> Option<&HexId> {
        self.selected.as_ref()
    }

    /// Latest records received.
    #[must_use]
    pub fn records(&self) -> &AggregatedTable {
        &self.records
    }

    /// The wrapped renderer.
    #[must_use]
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Mutable access to the wrapped renderer, e.g. to feed it tiles.
    pub const fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Consumes the synchronizer and returns the renderer.
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    const fn is_torn_down(&self) -> bool {
        matches!(self.phase, Phase::TornDown)
    }

    /// Writes `records` into both layers right away, superseding any pending
    /// apply.
    pub fn apply_all(&mut self, records: Arc<AggregatedTable>) -> ApplyReport {
        if self.is_torn_down() {
            return ApplyReport::default();
        }
        self.records = records;
        self.phase = Phase::Applied;
        self.apply_current()
    }

    /// Records new data and (re)starts the debounce window at `now`. An
    /// earlier pending apply is superseded and never fires on its own.
    pub fn data_changed(&mut self, records: Arc<AggregatedTable>, now: Instant) {
        if self.is_torn_down() {
            return;
        }
        self.records = records;
        let deadline = now + self.config.debounce();
        self.phase = Phase::PendingApply { deadline };
        log::trace!("Feature state apply scheduled");
    }

    /// Applies the pending records if the debounce window has elapsed.
    /// Returns `None` when nothing was due.
    pub fn fire_due(&mut self, now: Instant) -> Option<ApplyReport> {
        match self.phase {
            Phase::PendingApply { deadline } if now >= deadline => {
                self.phase = Phase::Applied;
                Some(self.apply_current())
            }
            _ => None,
        }
    }

    /// Re-applies the latest records when tiles of the configured source
    /// finish loading, so writes lost before the tiles existed converge.
    pub fn tile_loaded(&mut self, source_id: &str, is_source_loaded: bool) -> Option<ApplyReport> {
        if self.is_torn_down() || source_id != self.config.source_id || !is_source_loaded {
            return None;
        }
        let report = self.apply_current();
        if matches!(self.phase, Phase::Idle) {
            self.phase = Phase::Applied;
        }
        Some(report)
    }

    /// Highlights `hex_id`, clearing any previous selection first. The hex
    /// is only highlighted when it is part of the current records.
    ///
    /// The selection is recorded as soon as one layer accepted the highlight,
    /// so [`Self::clear_selection`] can always reverse what was written.
    pub fn select(&mut self, hex_id: &HexId) -> bool {
        if self.is_torn_down() || !self.records.contains_key(hex_id) {
            return false;
        }
        self.clear_selection();

        let failed = self.write_both(hex_id.as_str(), &selection_patch(true));
        if failed == 2 {
            return false;
        }
        self.selected = Some(hex_id.clone());
        log::debug!("Selected hex {hex_id}");
        true
    }

    /// Removes the selection highlight, if any.
    pub fn clear_selection(&mut self) {
        if self.is_torn_down() {
            return;
        }
        if let Some(previous) = self.selected.take() {
            self.write_both(previous.as_str(), &selection_patch(false));
        }
    }

    /// Switches the fill color ramp to `metric` and clears the selection.
    ///
    /// Returns [`DetailUpdate::Hide`] when a selection was cleared.
    pub fn metric_changed(&mut self, metric: Metric) -> DetailUpdate {
        if self.is_torn_down() {
            return DetailUpdate::Unchanged;
        }
        if self.renderer.has_layer(FILL_LAYER_ID) {
            let result = self.renderer.set_paint_property(
                FILL_LAYER_ID,
                "fill-color",
                style::color_expression(metric),
            );
            if let Err(e) = result {
                self.warn_once("Fill color update failed", &e);
            }
        }
        if self.selected.is_none() {
            return DetailUpdate::Unchanged;
        }
        self.clear_selection();
        DetailUpdate::Hide
    }

    /// Handles a renderer event and tells the caller how the detail view
    /// should change.
    pub fn handle_event(&mut self, event: MapEvent) -> DetailUpdate {
        if self.is_torn_down() {
            return DetailUpdate::Unchanged;
        }
        match event {
            MapEvent::Click { hex_id } => {
                self.select(&hex_id);
                DetailUpdate::Show(hex_id)
            }
            MapEvent::EmptyClick | MapEvent::PopupClosed => {
                self.clear_selection();
                DetailUpdate::Hide
            }
            MapEvent::SourceData {
                source_id,
                is_source_loaded,
            } => {
                self.tile_loaded(&source_id, is_source_loaded);
                DetailUpdate::Unchanged
            }
        }
    }

    /// Cancels any pending apply. Every later call is a no-op.
    pub fn teardown(&mut self) {
        if !self.is_torn_down() {
            log::debug!("Synchronizer torn down");
        }
        self.phase = Phase::TornDown;
    }

    fn apply_current(&mut self) -> ApplyReport {
        let records = Arc::clone(&self.records);
        let mut report = ApplyReport::default();

        for (hex_id, record) in records.iter() {
            let patch = FeatureVisualState::from_record(record).to_patch();
            let failed = self.write_both(hex_id.as_str(), &patch);
            report.failed += failed;
            report.written += 2 - failed;
        }

        log::debug!(
            "Applied feature state for {} hexes ({} writes, {} failed)",
            records.len(),
            report.written,
            report.failed
        );
        report
    }

    /// Merges `patch` into the feature on both layers. Returns the number of
    /// failed writes.
    fn write_both(&mut self, id: &str, patch: &FeatureStatePatch) -> usize {
        let mut failed = 0;
        for layer_index in 0..2 {
            let source_layer = if layer_index == 0 {
                self.config.polygon_layer.as_str()
            } else {
                self.config.centroid_layer.as_str()
            };
            let target = FeatureTarget {
                source: &self.config.source_id,
                source_layer,
                id,
            };
            if let Err(e) = self.renderer.set_feature_state(&target, patch) {
                failed += 1;
                self.warn_once("Feature state update failed", &e);
            }
        }
        failed
    }

    fn warn_once(&mut self, context: &str, error: &RendererError) {
        if self.write_warning_shown {
            log::trace!("{context}: {error}");
        } else {
            log::warn!("{context}: {error}");
            self.write_warning_shown = true;
        }
    }
}
