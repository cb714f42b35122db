#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Survey taxonomy types shared across the emotion-map system.
//!
//! Defines the closed set of survey metrics and measurement places, plus the
//! raw per-hex, per-place table produced by the loader. The table is built
//! once per session and only read afterwards.

use std::borrow::Borrow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lower end of the survey value scale.
pub const SCALE_MIN: f64 = 1.0;

/// Upper end of the survey value scale.
pub const SCALE_MAX: f64 = 5.0;

/// Identifier of one cell of the hexagonal tessellation (an H3 index string).
///
/// Treated as an opaque key by everything downstream of the loader.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexId(String);

impl HexId {
    /// Creates a hex id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HexId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for HexId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for HexId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A survey metric recorded on a 1-5 scale.
///
/// The string form is the CSV column header of the metric.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Metric {
    // ── Emotions ─────────────────────────────────────────
    /// Perceived stress
    Stress,
    /// Happiness
    Happy,
    /// Loneliness
    Loneliness,
    /// Anxiety
    Anxiety,
    /// Energy level
    Energy,

    // ── Environment ─────────────────────────────────────
    /// Perceived beauty of the surroundings
    EnvBeauty,
    /// How interesting the surroundings are
    EnvInteresting,
    /// Perceived safety
    EnvSafety,
    /// How crowded the surroundings are
    EnvCrowded,
    /// Amount of greenery
    EnvironmentGreeness,
}

impl Metric {
    /// Metric shown when nothing else has been selected.
    pub const DEFAULT: Self = Self::Happy;

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Stress,
            Self::Happy,
            Self::Loneliness,
            Self::Anxiety,
            Self::Energy,
            Self::EnvBeauty,
            Self::EnvInteresting,
            Self::EnvSafety,
            Self::EnvCrowded,
            Self::EnvironmentGreeness,
        ]
    }

    /// Returns the group this metric is listed under.
    #[must_use]
    pub const fn group(self) -> MetricGroup {
        match self {
            Self::Stress | Self::Happy | Self::Loneliness | Self::Anxiety | Self::Energy => {
                MetricGroup::Emotions
            }
            Self::EnvBeauty
            | Self::EnvInteresting
            | Self::EnvSafety
            | Self::EnvCrowded
            | Self::EnvironmentGreeness => MetricGroup::Environment,
        }
    }

    /// Returns the user-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stress => "Stress",
            Self::Happy => "Glücklichsein",
            Self::Loneliness => "Einsamkeit",
            Self::Anxiety => "Angst",
            Self::Energy => "Energie",
            Self::EnvBeauty => "Umwelt: Schönheit",
            Self::EnvInteresting => "Umwelt: Interessant",
            Self::EnvSafety => "Umwelt: Sicherheit",
            Self::EnvCrowded => "Umwelt: Andrang",
            Self::EnvironmentGreeness => "Umwelt: Grünflächen",
        }
    }
}

/// Tab grouping of metrics in the presentation layer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MetricGroup {
    /// Emotional state metrics
    Emotions,
    /// Perception of the environment
    Environment,
    /// Raw data view; accepts any metric
    Data,
}

impl MetricGroup {
    /// Returns the metrics listed under this group.
    ///
    /// [`MetricGroup::Data`] has no fixed list and returns an empty slice.
    #[must_use]
    pub const fn metrics(self) -> &'static [Metric] {
        match self {
            Self::Emotions => &[
                Metric::Stress,
                Metric::Happy,
                Metric::Loneliness,
                Metric::Anxiety,
                Metric::Energy,
            ],
            Self::Environment => &[
                Metric::EnvBeauty,
                Metric::EnvInteresting,
                Metric::EnvSafety,
                Metric::EnvCrowded,
                Metric::EnvironmentGreeness,
            ],
            Self::Data => &[],
        }
    }
}

/// Context in which a survey response was collected.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Place {
    /// Indoors
    Drinnen,
    /// Outdoors
    Draussen,
    /// Public transit
    Oepnv,
}

impl Place {
    /// Place used when the caller supplies no usable selection.
    pub const DEFAULT: Self = Self::Draussen;

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Drinnen, Self::Draussen, Self::Oepnv]
    }

    /// Returns the user-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Drinnen => "Drinnen",
            Self::Draussen => "Draußen",
            Self::Oepnv => "ÖPNV",
        }
    }
}

/// Metric values and participant count for one (hex, place) pair.
///
/// A metric missing from `metrics` has no data. Values are on the 1-5 scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMetricRecord {
    /// Known metric values.
    pub metrics: BTreeMap<Metric, f64>,
    /// Number of participants, `None` when unknown.
    pub participants: Option<u32>,
}

impl PlaceMetricRecord {
    /// Returns the value recorded for `metric`, if any.
    #[must_use]
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }
}

/// All place records collected for a single hex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexSurvey {
    places: BTreeMap<Place, PlaceMetricRecord>,
}

impl HexSurvey {
    /// Returns the record for `place`, if the hex has one.
    #[must_use]
    pub fn place(&self, place: Place) -> Option<&PlaceMetricRecord> {
        self.places.get(&place)
    }

    /// Stores the record for `place`, replacing any previous one.
    pub fn insert(&mut self, place: Place, record: PlaceMetricRecord) {
        self.places.insert(place, record);
    }

    /// Iterates over the places that have a record.
    pub fn iter(&self) -> impl Iterator<Item = (Place, &PlaceMetricRecord)> {
        self.places.iter().map(|(place, record)| (*place, record))
    }
}

/// The raw survey table keyed by hex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyTable {
    hexes: BTreeMap<HexId, HexSurvey>,
}

impl SurveyTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hexes: BTreeMap::new(),
        }
    }

    /// Stores the record of one place for one hex, creating the hex entry if
    /// needed.
    pub fn insert_place_record(&mut self, hex_id: HexId, place: Place, record: PlaceMetricRecord) {
        self.hexes.entry(hex_id).or_default().insert(place, record);
    }

    /// Returns the survey of a single hex.
    #[must_use]
    pub fn get(&self, hex_id: &str) -> Option<&HexSurvey> {
        self.hexes.get(hex_id)
    }

    /// Iterates over all hexes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&HexId, &HexSurvey)> {
        self.hexes.iter()
    }

    /// Number of hexes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    /// Returns `true` if the table holds no hexes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_group_consistency() {
        for metric in Metric::all() {
            let group = metric.group();
            assert!(
                group.metrics().contains(metric),
                "{metric:?} claims group {group:?} but isn't listed there"
            );
        }
        assert!(MetricGroup::Data.metrics().is_empty());
    }

    #[test]
    fn metric_string_form_matches_csv_header() {
        assert_eq!(Metric::EnvironmentGreeness.as_ref(), "EnvironmentGreeness");
        assert_eq!("EnvBeauty".parse::<Metric>().unwrap(), Metric::EnvBeauty);
        assert!("Greeness".parse::<Metric>().is_err());
    }

    #[test]
    fn place_string_form_is_lowercase() {
        assert_eq!(Place::Oepnv.to_string(), "oepnv");
        assert_eq!("draussen".parse::<Place>().unwrap(), Place::Draussen);
        assert_eq!(
            serde_json::to_string(&Place::Drinnen).unwrap(),
            "\"drinnen\""
        );
    }

    #[test]
    fn table_merges_places_per_hex() {
        let mut table = SurveyTable::new();
        let mut indoor = PlaceMetricRecord::default();
        indoor.metrics.insert(Metric::Happy, 4.0);
        table.insert_place_record(HexId::from("a"), Place::Drinnen, indoor);
        table.insert_place_record(
            HexId::from("a"),
            Place::Draussen,
            PlaceMetricRecord::default(),
        );

        assert_eq!(table.len(), 1);
        let hex = table.get("a").unwrap();
        assert_eq!(hex.place(Place::Drinnen).unwrap().value(Metric::Happy), Some(4.0));
        assert!(hex.place(Place::Draussen).unwrap().value(Metric::Happy).is_none());
        assert!(hex.place(Place::Oepnv).is_none());
    }
}
