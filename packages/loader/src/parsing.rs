//! Row-level parsing of the per-place survey CSVs.
//!
//! Individual cells never fail a load: blank, non-numeric or out-of-scale
//! cells become unknown values, and rows without a usable hex id are skipped.

use std::str::FromStr as _;

use emotion_map_survey_models::{HexId, Metric, Place, PlaceMetricRecord, SCALE_MAX, SCALE_MIN};

use crate::LoaderError;

/// Column holding the hex id.
pub const HEX_ID_COLUMN: &str = "hex_id";

/// Column holding the participant count.
pub const COUNT_COLUMN: &str = "DataPointCount";

fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a metric cell. Returns `None` if blank, not a finite number or
/// outside the [`SCALE_MIN`]..=[`SCALE_MAX`] survey scale.
#[must_use]
pub fn parse_value(cell: &str) -> Option<f64> {
    parse_number(cell).filter(|v| (SCALE_MIN..=SCALE_MAX).contains(v))
}

/// Parses a participant count cell. Returns `None` if blank, non-numeric or
/// negative.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_count(cell: &str) -> Option<u32> {
    parse_number(cell)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u32)
}

/// Validates a hex id as an H3 cell index, optionally of a fixed resolution.
#[must_use]
pub fn parse_hex_id(cell: &str, resolution: Option<u8>) -> Option<HexId> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    let index = h3o::CellIndex::from_str(trimmed).ok()?;
    match resolution {
        Some(expected) if u8::from(index.resolution()) != expected => None,
        _ => Some(HexId::from(trimmed)),
    }
}

/// Header positions of the columns the loader reads.
struct Columns {
    hex_id: usize,
    count: Option<usize>,
    metrics: Vec<(Metric, usize)>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, place: Place) -> Result<Self, LoaderError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let hex_id = position(HEX_ID_COLUMN).ok_or_else(|| LoaderError::MissingColumn {
            place,
            column: HEX_ID_COLUMN.to_string(),
        })?;

        let metrics = Metric::all()
            .iter()
            .filter_map(|metric| position(metric.as_ref()).map(|idx| (*metric, idx)))
            .collect();

        Ok(Self {
            hex_id,
            count: position(COUNT_COLUMN),
            metrics,
        })
    }
}

/// Parses one place's CSV into `(hex id, record)` pairs.
///
/// # Errors
///
/// Returns [`LoaderError`] if the CSV is structurally malformed (e.g.
/// ragged rows) or lacks the `hex_id` column.
pub fn parse_place_csv<R: std::io::Read>(
    reader: R,
    place: Place,
    resolution: Option<u8>,
) -> Result<Vec<(HexId, PlaceMetricRecord)>, LoaderError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let columns = Columns::from_headers(csv_reader.headers()?, place)?;
    let mut rows = Vec::new();
    let mut skipped = 0_u64;

    for result in csv_reader.records() {
        let record = result?;

        let Some(hex_id) = record
            .get(columns.hex_id)
            .and_then(|cell| parse_hex_id(cell, resolution))
        else {
            skipped += 1;
            continue;
        };

        let metrics = columns
            .metrics
            .iter()
            .filter_map(|(metric, idx)| {
                record
                    .get(*idx)
                    .and_then(parse_value)
                    .map(|value| (*metric, value))
            })
            .collect();

        let participants = columns
            .count
            .and_then(|idx| record.get(idx))
            .and_then(parse_count);

        rows.push((
            hex_id,
            PlaceMetricRecord {
                metrics,
                participants,
            },
        ));
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} {place} rows without a valid hex id");
    }

    Ok(rows)
}
