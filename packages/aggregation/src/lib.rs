#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation engine for the emotion map.
//!
//! Turns the raw per-hex, per-place survey table into one derived
//! [`AggregatedHexRecord`] per hex for the selected metric, active place and
//! filter set. [`aggregate`] is a pure function: its output depends only on
//! its arguments, so it can be re-run whenever any of them changes.

pub mod detail;

use std::collections::BTreeMap;

use emotion_map_aggregation_models::{
    AggregatedHexRecord, AggregatedTable, Filters, PlaceBreakdown,
};
use emotion_map_survey_models::{HexId, HexSurvey, Metric, MetricGroup, Place, SurveyTable};

/// Normalizes a place selection to the single active place.
///
/// Duplicates are removed (keeping first occurrence), an empty selection
/// falls back to [`Place::DEFAULT`], and only the first remaining entry is
/// honored.
#[must_use]
pub fn ensure_place(selected: &[Place]) -> Place {
    let mut unique: Vec<Place> = Vec::with_capacity(selected.len());
    for place in selected {
        if !unique.contains(place) {
            unique.push(*place);
        }
    }
    unique.first().copied().unwrap_or(Place::DEFAULT)
}

/// Returns `metric` if it is shown under `group`, otherwise the first metric
/// of the group.
///
/// [`MetricGroup::Data`] accepts every metric.
#[must_use]
pub fn ensure_metric_for_group(metric: Metric, group: MetricGroup) -> Metric {
    let allowed = group.metrics();
    if allowed.is_empty() || allowed.contains(&metric) {
        return metric;
    }
    allowed[0]
}

/// Aggregates every hex of `raw` for `metric`, the active place derived from
/// `places`, and `filters`.
///
/// Hexes absent from `raw` never appear in the output. A hex whose active
/// place has no value for `metric` is still emitted with `has_data = false`.
#[must_use]
pub fn aggregate(
    raw: &SurveyTable,
    metric: Metric,
    places: &[Place],
    filters: &Filters,
) -> AggregatedTable {
    let active = ensure_place(places);

    let table: AggregatedTable = raw
        .iter()
        .map(|(hex_id, survey)| {
            (
                hex_id.clone(),
                aggregate_hex(hex_id, survey, metric, active, filters),
            )
        })
        .collect();

    log::debug!(
        "Aggregated {} hexes for {metric} at {active} ({} visible)",
        table.len(),
        table.values().filter(|r| r.visible).count()
    );

    table
}

fn aggregate_hex(
    hex_id: &HexId,
    survey: &HexSurvey,
    metric: Metric,
    active: Place,
    filters: &Filters,
) -> AggregatedHexRecord {
    let mut values: Vec<f64> = Vec::new();
    let mut participant_total: u32 = 0;

    let places: BTreeMap<Place, PlaceBreakdown> = Place::all()
        .iter()
        .map(|&place| {
            let breakdown = survey.place(place).map_or_else(PlaceBreakdown::default, |record| {
                PlaceBreakdown {
                    value: record.value(metric),
                    n: record.participants,
                }
            });

            if place == active {
                if let Some(value) = breakdown.value {
                    values.push(value);
                }
                participant_total = participant_total.saturating_add(breakdown.n.unwrap_or(0));
            }

            (place, breakdown)
        })
        .collect();

    let value = mean(&values).map(round_to_hundredths);
    let has_data = value.is_some();
    let passes_filter = value.is_some_and(|v| {
        filters.value_in_range(v) && participant_total >= filters.min_participants
    });
    let visible = if has_data {
        passes_filter
    } else {
        !filters.hide_no_data
    };

    AggregatedHexRecord {
        hex_id: hex_id.clone(),
        value,
        participant_total,
        has_data,
        passes_filter,
        visible,
        places,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use emotion_map_survey_models::PlaceMetricRecord;

    use super::*;

    fn place_record(metric: Metric, value: Option<f64>, n: Option<u32>) -> PlaceMetricRecord {
        let mut record = PlaceMetricRecord {
            participants: n,
            ..PlaceMetricRecord::default()
        };
        if let Some(value) = value {
            record.metrics.insert(metric, value);
        }
        record
    }

    /// H1: drinnen={Happy:4,n:10}, draussen={Happy:2,n:5}, oepnv absent.
    fn scenario_table() -> SurveyTable {
        let mut table = SurveyTable::new();
        table.insert_place_record(
            HexId::from("H1"),
            Place::Drinnen,
            place_record(Metric::Happy, Some(4.0), Some(10)),
        );
        table.insert_place_record(
            HexId::from("H1"),
            Place::Draussen,
            place_record(Metric::Happy, Some(2.0), Some(5)),
        );
        table
    }

    fn filters(min_value: f64, max_value: f64, min_participants: u32) -> Filters {
        Filters {
            min_value,
            max_value,
            min_participants,
            hide_no_data: false,
        }
    }

    #[test]
    fn outdoor_scenario_passes_full_range() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &filters(1.0, 5.0, 1));
        let record = &out["H1"];

        assert_eq!(record.hex_id.as_str(), "H1");
        assert_eq!(record.value, Some(2.0));
        assert_eq!(record.participant_total, 5);
        assert!(record.has_data);
        assert!(record.passes_filter);
        assert!(record.visible);
    }

    #[test]
    fn outdoor_scenario_fails_raised_minimum() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &filters(3.0, 5.0, 1));
        let record = &out["H1"];

        assert!(record.has_data);
        assert!(!record.passes_filter);
        assert!(!record.visible);
    }

    #[test]
    fn breakdown_covers_all_places() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &Filters::default());
        let places = &out["H1"].places;

        assert_eq!(places.len(), Place::all().len());
        assert_eq!(places[&Place::Drinnen], PlaceBreakdown { value: Some(4.0), n: Some(10) });
        assert_eq!(places[&Place::Draussen], PlaceBreakdown { value: Some(2.0), n: Some(5) });
        assert_eq!(places[&Place::Oepnv], PlaceBreakdown::default());
    }

    #[test]
    fn hex_missing_from_raw_is_not_emitted() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &Filters::default());
        assert!(!out.contains_key("H2"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn hex_without_place_data_is_faded_not_dropped() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Oepnv], &Filters::default());
        let record = &out["H1"];

        assert_eq!(record.value, None);
        assert_eq!(record.participant_total, 0);
        assert!(!record.has_data);
        assert!(!record.passes_filter);
        assert!(record.visible);

        let hidden = Filters {
            hide_no_data: true,
            ..Filters::default()
        };
        let out = aggregate(&table, Metric::Happy, &[Place::Oepnv], &hidden);
        assert!(!out["H1"].visible);
    }

    #[test]
    fn participants_count_without_metric_value() {
        let mut table = SurveyTable::new();
        table.insert_place_record(
            HexId::from("H3"),
            Place::Draussen,
            place_record(Metric::Stress, Some(3.0), Some(7)),
        );

        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &Filters::default());
        let record = &out["H3"];
        assert!(!record.has_data);
        assert_eq!(record.participant_total, 7);
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let table = scenario_table();
        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &filters(2.0, 2.0, 5));
        assert!(out["H1"].passes_filter);

        let out = aggregate(&table, Metric::Happy, &[Place::Draussen], &filters(2.0, 2.0, 6));
        assert!(!out["H1"].passes_filter);
    }

    #[test]
    fn value_is_rounded_to_two_decimals() {
        let mut table = SurveyTable::new();
        table.insert_place_record(
            HexId::from("H4"),
            Place::Draussen,
            place_record(Metric::Energy, Some(3.456_78), Some(2)),
        );
        let out = aggregate(&table, Metric::Energy, &[], &Filters::default());
        assert_eq!(out["H4"].value, Some(3.46));
    }

    #[test]
    fn filter_and_visibility_invariants_hold() {
        let mut table = scenario_table();
        table.insert_place_record(
            HexId::from("H5"),
            Place::Drinnen,
            place_record(Metric::Happy, None, None),
        );
        table.insert_place_record(
            HexId::from("H6"),
            Place::Oepnv,
            place_record(Metric::Happy, Some(5.0), Some(60)),
        );

        for place in Place::all() {
            for (min_value, max_value) in [(1.0, 5.0), (2.0, 4.0), (4.0, 5.0), (5.0, 5.0)] {
                for min_participants in [0, 1, 5, 11, 60] {
                    for hide_no_data in [false, true] {
                        let f = Filters {
                            min_value,
                            max_value,
                            min_participants,
                            hide_no_data,
                        };
                        for record in aggregate(&table, Metric::Happy, &[*place], &f).values() {
                            let expected_pass = record.has_data
                                && record.value.is_some_and(|v| min_value <= v && v <= max_value)
                                && record.participant_total >= min_participants;
                            assert_eq!(record.passes_filter, expected_pass, "{record:?}");

                            let expected_visible = (record.has_data && record.passes_filter)
                                || (!record.has_data && !hide_no_data);
                            assert_eq!(record.visible, expected_visible, "{record:?}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn aggregation_is_deterministic() {
        let table = scenario_table();
        let f = filters(1.5, 4.5, 2);
        let first = aggregate(&table, Metric::Happy, &[Place::Drinnen], &f);
        let second = aggregate(&table, Metric::Happy, &[Place::Drinnen], &f);
        assert_eq!(first, second);
    }

    #[test]
    fn changing_place_recomputes_every_field() {
        let table = scenario_table();
        let indoor = aggregate(&table, Metric::Happy, &[Place::Drinnen], &Filters::default());
        let outdoor = aggregate(&table, Metric::Happy, &[Place::Draussen], &Filters::default());

        assert_eq!(indoor["H1"].value, Some(4.0));
        assert_eq!(indoor["H1"].participant_total, 10);
        assert_eq!(outdoor["H1"].value, Some(2.0));
        assert_eq!(outdoor["H1"].participant_total, 5);

        let stress = aggregate(&table, Metric::Stress, &[Place::Drinnen], &Filters::default());
        assert!(!stress["H1"].has_data);
        assert_eq!(stress["H1"].places[&Place::Drinnen].value, None);
    }

    #[test]
    fn empty_table_yields_no_records() {
        let out = aggregate(&SurveyTable::new(), Metric::Happy, &[], &Filters::default());
        assert!(out.is_empty());
    }

    #[test]
    fn place_selection_is_normalized() {
        assert_eq!(ensure_place(&[]), Place::DEFAULT);
        assert_eq!(ensure_place(&[Place::Oepnv, Place::Drinnen]), Place::Oepnv);
        assert_eq!(ensure_place(&[Place::Drinnen, Place::Drinnen]), Place::Drinnen);
    }

    #[test]
    fn metric_is_kept_within_group() {
        assert_eq!(
            ensure_metric_for_group(Metric::Happy, MetricGroup::Emotions),
            Metric::Happy
        );
        assert_eq!(
            ensure_metric_for_group(Metric::Happy, MetricGroup::Environment),
            Metric::EnvBeauty
        );
        assert_eq!(
            ensure_metric_for_group(Metric::EnvSafety, MetricGroup::Data),
            Metric::EnvSafety
        );
    }
}
