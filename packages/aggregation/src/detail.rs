//! Detail-view helpers for a single selected hex.
//!
//! The presentation layer reads these instead of walking the raw table or
//! the aggregated records itself.

use std::collections::BTreeMap;

use emotion_map_aggregation_models::AggregatedHexRecord;
use emotion_map_survey_models::{HexId, Metric, MetricGroup, Place, SurveyTable};
use serde::Serialize;

/// Placeholder shown when a hex has no value for the metric.
pub const NO_VALUE_LABEL: &str = "k.a.";

/// Returns the radar chart values of `group` for one hex and place.
///
/// Metrics without a value are reported as `0.0`. The map is empty when the
/// hex or its place record is missing, or for [`MetricGroup::Data`].
#[must_use]
pub fn radar_for_hex(
    raw: &SurveyTable,
    hex_id: &str,
    place: Place,
    group: MetricGroup,
) -> BTreeMap<Metric, f64> {
    let Some(record) = raw.get(hex_id).and_then(|hex| hex.place(place)) else {
        return BTreeMap::new();
    };

    group
        .metrics()
        .iter()
        .map(|&metric| (metric, record.value(metric).unwrap_or(0.0)))
        .collect()
}

/// Popup summary of a hex for the current metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HexSummary {
    /// Hex the summary belongs to.
    pub hex_id: HexId,
    /// Label of the metric the value refers to.
    pub metric_label: &'static str,
    /// Value with one decimal, or [`NO_VALUE_LABEL`].
    pub value_text: String,
    /// Participant total.
    pub participants: u32,
}

impl HexSummary {
    /// Builds the summary of `record` for `metric`.
    #[must_use]
    pub fn from_record(record: &AggregatedHexRecord, metric: Metric) -> Self {
        Self {
            hex_id: record.hex_id.clone(),
            metric_label: metric.label(),
            value_text: record
                .value
                .map_or_else(|| NO_VALUE_LABEL.to_string(), format_one_decimal),
            participants: record.participant_total,
        }
    }
}

/// Formats `value` with one decimal, rounding ties away from zero.
fn format_one_decimal(value: f64) -> String {
    format!("{:.1}", (value * 10.0).round() / 10.0)
}

impl std::fmt::Display for HexSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Durchschnittswert für {}: {} (Einträge: {})",
            self.metric_label, self.value_text, self.participants
        )
    }
}
