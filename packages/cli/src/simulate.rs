//! Replays a map session against the in-memory renderer.
//!
//! Mounts the hex layers, loads every tile, drags the value filter from the
//! bottom of the scale up to the requested bound (exercising the debounce),
//! clicks the first visible hex and tears the map down.

use std::sync::Arc;
use std::time::Duration;

use emotion_map_aggregation::aggregate;
use emotion_map_aggregation::detail::HexSummary;
use emotion_map_aggregation_models::{Filters, SCALE_MIN};
use emotion_map_config::AppConfig;
use emotion_map_map_state::{
    DetailUpdate, InMemoryRenderer, MapContext, MapEvent, SyncError, Synchronizer, driver,
};
use emotion_map_survey_models::{Metric, Place, SurveyTable};

/// Intermediate filter states sent before the final one.
const DRAG_STEPS: u32 = 4;

/// Outcome of a simulated session.
pub struct SimulationReport {
    hexes: usize,
    visible: usize,
    filter_changes: u32,
    feature_state_writes: u64,
    features_with_state: usize,
    detail: Option<String>,
}

impl std::fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Hexes:                {}", self.hexes)?;
        writeln!(f, "Visible hexes:        {}", self.visible)?;
        writeln!(f, "Filter changes sent:  {}", self.filter_changes)?;
        writeln!(f, "Feature-state writes: {}", self.feature_state_writes)?;
        writeln!(f, "Features with state:  {}", self.features_with_state)?;
        match &self.detail {
            Some(detail) => write!(f, "Selected:             {detail}"),
            None => write!(f, "Selected:             -"),
        }
    }
}

fn drag_filters(target: Filters) -> Vec<Filters> {
    let mut steps: Vec<Filters> = (0..DRAG_STEPS)
        .map(|i| {
            let t = f64::from(i) / f64::from(DRAG_STEPS);
            let min = (target.min_value - SCALE_MIN).mul_add(t, SCALE_MIN);
            Filters {
                min_value: min.min(target.max_value),
                ..target
            }
        })
        .collect();
    steps.push(target);
    steps
}

/// Runs the simulated session.
///
/// # Errors
///
/// Returns [`SyncError`] if mounting fails or the synchronizer task stops
/// unexpectedly.
pub async fn run(
    config: &AppConfig,
    raw: &SurveyTable,
    metric: Metric,
    place: Place,
    filters: Filters,
) -> Result<SimulationReport, SyncError> {
    let map = &config.map;
    let mut context = MapContext::new(map.clone());
    let mut renderer = InMemoryRenderer::new();
    context.mount(&mut renderer, metric)?;

    for layer in [&map.polygon_layer, &map.centroid_layer] {
        let loaded = renderer.load_tile(
            &map.source_id,
            layer,
            raw.iter().map(|(id, _)| id.to_string()),
        );
        log::debug!("Loaded {loaded} features into {layer}");
    }

    let handle = driver::spawn(Synchronizer::new(renderer, map.clone()));

    let steps = drag_filters(filters);
    let mut latest = Arc::default();
    for step in &steps {
        latest = Arc::new(aggregate(raw, metric, &[place], step));
        handle.data_changed(Arc::clone(&latest)).await?;
        tokio::time::sleep(map.debounce() / 5).await;
    }
    tokio::time::sleep(map.debounce() * 2 + Duration::from_millis(10)).await;

    let clicked = latest.values().find(|record| record.visible);
    let mut detail = None;
    if let Some(record) = clicked {
        let update = handle
            .event(MapEvent::Click {
                hex_id: record.hex_id.clone(),
            })
            .await?;
        if let DetailUpdate::Show(_) = update {
            detail = Some(HexSummary::from_record(record, metric).to_string());
        }
    }

    let renderer = handle.teardown().await?;

    Ok(SimulationReport {
        hexes: latest.len(),
        visible: latest.values().filter(|r| r.visible).count(),
        filter_changes: u32::try_from(steps.len()).unwrap_or(u32::MAX),
        feature_state_writes: renderer.feature_state_writes(),
        features_with_state: renderer.features_with_state(),
        detail,
    })
}
