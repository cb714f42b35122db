#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey data loader.
//!
//! Reads one CSV table per [`Place`] and merges them into a single
//! [`SurveyTable`] keyed by hex id. Tables come either from a local directory
//! or, when a base URL is configured, over HTTP.

pub mod parsing;

use std::path::{Path, PathBuf};

use emotion_map_config::DataConfig;
use emotion_map_survey_models::{HexId, Place, PlaceMetricRecord, SurveyTable};

/// Errors that can occur while loading survey tables.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Reading a local CSV file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The CSV is structurally malformed.
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// A required column is missing from a place's table.
    #[error("Table for {place} is missing column {column}")]
    MissingColumn {
        /// Place whose table is affected.
        place: Place,
        /// Name of the missing column.
        column: String,
    },
}

fn merge(table: &mut SurveyTable, place: Place, rows: Vec<(HexId, PlaceMetricRecord)>) {
    log::debug!("Merging {} {place} rows", rows.len());
    for (hex_id, record) in rows {
        table.insert_place_record(hex_id, place, record);
    }
}

/// Loads every place's CSV from `dir`, using the file names in `config`.
///
/// # Errors
///
/// Returns [`LoaderError`] if any file is missing, unreadable or malformed.
pub fn load_from_dir(dir: &Path, config: &DataConfig) -> Result<SurveyTable, LoaderError> {
    let mut table = SurveyTable::new();

    for &place in Place::all() {
        let path = dir.join(config.files.get(place));
        log::info!("Loading {place} survey data from {}", path.display());

        let file = std::fs::File::open(&path).map_err(|source| LoaderError::Io {
            path: path.clone(),
            source,
        })?;
        let rows = parsing::parse_place_csv(file, place, Some(config.h3_resolution))?;
        merge(&mut table, place, rows);
    }

    log::info!("Loaded survey data for {} hexes", table.len());
    Ok(table)
}

async fn fetch_place(
    client: &reqwest::Client,
    base_url: &str,
    place: Place,
    config: &DataConfig,
) -> Result<(Place, Vec<(HexId, PlaceMetricRecord)>), LoaderError> {
    let url = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        config.files.get(place)
    );
    log::info!("Fetching {place} survey data from {url}");

    let body = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let rows = parsing::parse_place_csv(body.as_ref(), place, Some(config.h3_resolution))?;
    Ok((place, rows))
}

/// Downloads every place's CSV from `base_url` concurrently.
///
/// # Errors
///
/// Returns [`LoaderError`] if any request fails or any table is malformed.
pub async fn fetch(base_url: &str, config: &DataConfig) -> Result<SurveyTable, LoaderError> {
    let client = reqwest::Client::new();

    let results = futures::future::try_join_all(
        Place::all()
            .iter()
            .map(|&place| fetch_place(&client, base_url, place, config)),
    )
    .await?;

    let mut table = SurveyTable::new();
    for (place, rows) in results {
        merge(&mut table, place, rows);
    }

    log::info!("Fetched survey data for {} hexes", table.len());
    Ok(table)
}

/// Loads the survey table from wherever `config` points: over HTTP when
/// `base_url` is set, otherwise from `base_dir`.
///
/// # Errors
///
/// Returns [`LoaderError`] if loading fails. Callers treat this as the data
/// being unavailable and continue with an empty table.
pub async fn load(config: &DataConfig) -> Result<SurveyTable, LoaderError> {
    match config.base_url.as_deref() {
        Some(base_url) => fetch(base_url, config).await,
        None => load_from_dir(&config.base_dir, config),
    }
}
