#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the emotion map.
//!
//! Aggregates survey data for a metric, place and filter set, prints the
//! renderer style, replays a session against an in-memory renderer and
//! manages the intro flag. Configuration comes from the embedded default or
//! the file named by `EMOTION_MAP_CONFIG`.

mod simulate;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use emotion_map_aggregation::detail::{HexSummary, radar_for_hex};
use emotion_map_aggregation::{aggregate, ensure_place};
use emotion_map_aggregation_models::Filters;
use emotion_map_config::AppConfig;
use emotion_map_config::intro::IntroFlag;
use emotion_map_survey_models::{Metric, MetricGroup, Place, SurveyTable};

#[derive(Parser)]
#[command(name = "emotion_map_cli", about = "Emotion map toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Selection shared by the data-driven subcommands.
#[derive(clap::Args)]
struct Selection {
    /// Directory holding the per-place CSV files (defaults to the configured source)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Metric to aggregate, e.g. "Happy" (defaults to the configured metric)
    #[arg(long)]
    metric: Option<Metric>,
    /// Active place; may be repeated, only the first distinct one is used
    #[arg(long)]
    place: Vec<Place>,
    /// Inclusive lower value bound
    #[arg(long)]
    min_value: Option<f64>,
    /// Inclusive upper value bound
    #[arg(long)]
    max_value: Option<f64>,
    /// Minimum participant total
    #[arg(long)]
    min_participants: Option<u32>,
    /// Hide hexes without data
    #[arg(long)]
    hide_no_data: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the survey data and print the records as JSON
    Aggregate {
        #[command(flatten)]
        selection: Selection,
    },
    /// Print the popup summary and radar values of one hex
    Detail {
        /// Hex id to describe
        hex: String,
        /// Metric group for the radar values
        #[arg(long, default_value = "emotions")]
        group: MetricGroup,
        #[command(flatten)]
        selection: Selection,
    },
    /// Print the tile source and style layers as JSON
    Style {
        /// Metric whose color ramp the fill layer uses
        #[arg(long)]
        metric: Option<Metric>,
    },
    /// Replay a session against an in-memory renderer and report the result
    Simulate {
        #[command(flatten)]
        selection: Selection,
    },
    /// Show or update the "seen intro" flag
    Intro {
        /// Forget that the intro was seen
        #[arg(long)]
        reset: bool,
        /// Mark the intro as seen
        #[arg(long, conflicts_with = "reset")]
        mark_seen: bool,
    },
}

impl Selection {
    fn metric(&self, config: &AppConfig) -> Metric {
        self.metric.unwrap_or(config.defaults.metric)
    }

    fn place(&self, config: &AppConfig) -> Place {
        if self.place.is_empty() {
            config.defaults.place
        } else {
            ensure_place(&self.place)
        }
    }

    fn filters(&self, config: &AppConfig) -> Filters {
        let defaults = config.defaults.filters;
        let mut filters = defaults.with_value_range(
            self.min_value.unwrap_or(defaults.min_value),
            self.max_value.unwrap_or(defaults.max_value),
        );
        if let Some(min_participants) = self.min_participants {
            filters.min_participants = min_participants;
        }
        filters.hide_no_data |= self.hide_no_data;
        filters
    }
}

/// Loads the survey table, falling back to an empty table when the data is
/// unavailable.
async fn load_table(config: &AppConfig, data_dir: Option<&Path>) -> SurveyTable {
    let result = match data_dir {
        Some(dir) => emotion_map_loader::load_from_dir(dir, &config.data),
        None => emotion_map_loader::load(&config.data).await,
    };
    result.unwrap_or_else(|e| {
        log::error!("Survey data unavailable: {e}");
        SurveyTable::new()
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let config = AppConfig::load()?;

    match cli.command {
        Commands::Aggregate { selection } => {
            let raw = load_table(&config, selection.data_dir.as_deref()).await;
            let records = aggregate(
                &raw,
                selection.metric(&config),
                &[selection.place(&config)],
                &selection.filters(&config),
            );
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Detail {
            hex,
            group,
            selection,
        } => {
            let raw = load_table(&config, selection.data_dir.as_deref()).await;
            let metric = selection.metric(&config);
            let place = selection.place(&config);
            let records = aggregate(&raw, metric, &[place], &selection.filters(&config));

            let Some(record) = records.get(hex.as_str()) else {
                return Err(format!("Hex {hex} is not part of the survey data").into());
            };
            println!("{}", HexSummary::from_record(record, metric));

            let radar = radar_for_hex(&raw, &hex, place, group);
            println!("{}", serde_json::to_string_pretty(&radar)?);
        }
        Commands::Style { metric } => {
            let metric = metric.unwrap_or(config.defaults.metric);
            let layers: Vec<_> = emotion_map_map_state::style::layers(&config.map, metric)
                .into_iter()
                .map(|(_, layer)| layer)
                .collect();
            let mut sources = serde_json::Map::new();
            sources.insert(
                config.map.source_id.clone(),
                emotion_map_map_state::style::source(&config.map),
            );
            let style = serde_json::json!({
                "version": 8,
                "center": config.map.center,
                "zoom": config.map.zoom,
                "sources": sources,
                "layers": layers,
            });
            println!("{}", serde_json::to_string_pretty(&style)?);
        }
        Commands::Simulate { selection } => {
            let raw = load_table(&config, selection.data_dir.as_deref()).await;
            let report = simulate::run(
                &config,
                &raw,
                selection.metric(&config),
                selection.place(&config),
                selection.filters(&config),
            )
            .await?;
            println!("{report}");
        }
        Commands::Intro { reset, mark_seen } => {
            let path = &config.intro.flag_path;
            if reset {
                IntroFlag::reset(path)?;
                println!("Intro flag reset");
            } else if mark_seen {
                IntroFlag::mark_seen(path)?;
                println!("Intro marked as seen");
            } else {
                let flag = IntroFlag::load(path)?;
                println!("{}", serde_json::to_string_pretty(&flag)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_metric_and_places() {
        let cli = Cli::try_parse_from([
            "emotion_map_cli",
            "aggregate",
            "--metric",
            "Stress",
            "--place",
            "oepnv",
            "--place",
            "drinnen",
            "--min-participants",
            "3",
        ])
        .unwrap();
        let Commands::Aggregate { selection } = cli.command else {
            panic!("expected the aggregate subcommand");
        };
        assert_eq!(selection.metric, Some(Metric::Stress));
        assert_eq!(selection.place, vec![Place::Oepnv, Place::Drinnen]);

        let config = AppConfig::embedded();
        assert_eq!(selection.place(&config), Place::Oepnv);
        assert_eq!(selection.filters(&config).min_participants, 3);
    }

    #[test]
    fn detail_group_defaults_to_emotions() {
        let cli = Cli::try_parse_from(["emotion_map_cli", "detail", "8928308280fffff"]).unwrap();
        let Commands::Detail { hex, group, .. } = cli.command else {
            panic!("expected the detail subcommand");
        };
        assert_eq!(hex, "8928308280fffff");
        assert_eq!(group, MetricGroup::Emotions);

        let cli = Cli::try_parse_from([
            "emotion_map_cli",
            "detail",
            "8928308280fffff",
            "--group",
            "environment",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Detail {
                group: MetricGroup::Environment,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_metric() {
        assert!(Cli::try_parse_from(["emotion_map_cli", "style", "--metric", "Joy"]).is_err());
    }
}
