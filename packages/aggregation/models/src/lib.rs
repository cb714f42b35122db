#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter and aggregated record types for the emotion map.
//!
//! These are the inputs and outputs of the aggregation engine. Records are
//! derived on demand and never persisted; they are serialized only for
//! detail panels and CLI output.

use std::collections::BTreeMap;

use emotion_map_survey_models::{HexId, Place};
pub use emotion_map_survey_models::{SCALE_MAX, SCALE_MIN};
use serde::{Deserialize, Serialize};

/// User-controlled value and participant filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    /// Inclusive lower bound on the aggregated value.
    pub min_value: f64,
    /// Inclusive upper bound on the aggregated value.
    pub max_value: f64,
    /// Minimum participant total for a hex to pass.
    pub min_participants: u32,
    /// Hide hexes that have no data for the active place.
    pub hide_no_data: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            min_value: SCALE_MIN,
            max_value: SCALE_MAX,
            min_participants: 1,
            hide_no_data: false,
        }
    }
}

impl Filters {
    /// Returns a copy with the value range set from two slider positions,
    /// ordering them so that `min_value <= max_value`.
    ///
    /// The aggregation engine does not reorder bounds itself; callers that
    /// accept free-form input use this before aggregating.
    #[must_use]
    pub fn with_value_range(mut self, a: f64, b: f64) -> Self {
        self.min_value = a.min(b);
        self.max_value = a.max(b);
        self
    }

    /// Returns `true` if `value` lies within the inclusive value range.
    #[must_use]
    pub fn value_in_range(&self, value: f64) -> bool {
        self.min_value <= value && value <= self.max_value
    }
}

/// Value and participant count of one place within a hex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceBreakdown {
    /// Metric value at this place, `None` when unknown.
    pub value: Option<f64>,
    /// Participant count at this place, `None` when unknown.
    pub n: Option<u32>,
}

/// Derived visual record of one hex for a given metric, place and filter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedHexRecord {
    /// Hex this record describes.
    pub hex_id: HexId,
    /// Mean value rounded to two decimals, `None` without data.
    pub value: Option<f64>,
    /// Participants counted for the active place (0 when unknown).
    pub participant_total: u32,
    /// Whether the active place reported a value for the metric.
    pub has_data: bool,
    /// Whether the hex passes the value and participant filters.
    pub passes_filter: bool,
    /// Whether the hex is drawn at all.
    pub visible: bool,
    /// Per-place values for every place, independent of the active one.
    pub places: BTreeMap<Place, PlaceBreakdown>,
}

/// Aggregation output keyed by hex.
pub type AggregatedTable = BTreeMap<HexId, AggregatedHexRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_cover_full_scale() {
        let filters = Filters::default();
        assert!(filters.value_in_range(1.0));
        assert!(filters.value_in_range(5.0));
        assert!(!filters.value_in_range(5.01));
        assert_eq!(filters.min_participants, 1);
        assert!(!filters.hide_no_data);
    }

    #[test]
    fn value_range_orders_bounds() {
        let filters = Filters::default().with_value_range(4.0, 2.5);
        assert!((filters.min_value - 2.5).abs() < f64::EPSILON);
        assert!((filters.max_value - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn filters_serialize_camel_case() {
        let json = serde_json::to_value(Filters::default()).unwrap();
        assert_eq!(json["minParticipants"], 1);
        assert_eq!(json["hideNoData"], false);
    }
}
