//! Style-spec JSON for the hex source and its three layers.

use emotion_map_config::MapConfig;
use emotion_map_survey_models::Metric;
use serde_json::{Value, json};

use crate::encoding::{
    NO_DATA_COLOR, RADIUS_SCALE, SIZE_BUCKETS, ZOOM_BASE, ZOOM_RADII, color_ramp,
};
use crate::renderer::FeatureStateKey;

/// Circle layer drawing participant-count centroids.
pub const CENTROID_LAYER_ID: &str = "h3-centroids";

/// Fill layer drawing the metric color.
pub const FILL_LAYER_ID: &str = "h3-fill";

/// Line layer drawing hex outlines and the selection highlight.
pub const OUTLINE_LAYER_ID: &str = "h3-outline";

fn feature_state(key: FeatureStateKey) -> Value {
    json!(["feature-state", key.as_ref()])
}

fn when_selected(selected: Value, default: Value) -> Value {
    json!([
        "case",
        ["boolean", feature_state(FeatureStateKey::Selected), false],
        selected,
        default
    ])
}

/// `fill-color` expression for `metric`: the metric ramp, or the no-data
/// color when `value` is null.
#[must_use]
pub fn color_expression(metric: Metric) -> Value {
    let mut interpolate = vec![
        json!("interpolate"),
        json!(["linear"]),
        feature_state(FeatureStateKey::Value),
    ];
    for stop in color_ramp(metric) {
        interpolate.push(json!(stop.value));
        interpolate.push(json!(stop.color.to_string()));
    }

    json!([
        "case",
        ["==", feature_state(FeatureStateKey::Value), null],
        NO_DATA_COLOR,
        interpolate
    ])
}

/// `fill-opacity` expression.
#[must_use]
pub fn fill_opacity_expression() -> Value {
    json!(["coalesce", feature_state(FeatureStateKey::Opacity), 0])
}

/// `circle-opacity` expression.
#[must_use]
pub fn circle_opacity_expression() -> Value {
    json!(["coalesce", feature_state(FeatureStateKey::CircleOpacity), 0])
}

/// Step expression bucketing the participant total.
#[must_use]
pub fn size_bucket_expression() -> Value {
    let mut step = vec![
        json!("step"),
        json!(["coalesce", feature_state(FeatureStateKey::N), 0]),
        json!(0),
    ];
    for (edge, size) in SIZE_BUCKETS {
        step.push(json!(edge));
        step.push(json!(size));
    }
    Value::Array(step)
}

/// `circle-radius` expression: bucket size times visibility, scaled by an
/// exponential zoom curve.
#[must_use]
pub fn circle_radius_expression() -> Value {
    let visible_factor = json!([
        "case",
        ["boolean", feature_state(FeatureStateKey::Visible), false],
        1,
        0
    ]);
    let bucket = size_bucket_expression();

    let mut interpolate = vec![
        json!("interpolate"),
        json!(["exponential", ZOOM_BASE]),
        json!(["zoom"]),
    ];
    for (zoom, radius) in ZOOM_RADII {
        interpolate.push(json!(zoom));
        interpolate.push(json!(["*", radius * RADIUS_SCALE, bucket, visible_factor]));
    }
    Value::Array(interpolate)
}

/// Vector source backed by the tile archive, promoting the id property on
/// both source layers.
#[must_use]
pub fn source(config: &MapConfig) -> Value {
    let mut promote_id = serde_json::Map::new();
    promote_id.insert(
        config.polygon_layer.clone(),
        Value::from(config.id_property.as_str()),
    );
    promote_id.insert(
        config.centroid_layer.clone(),
        Value::from(config.id_property.as_str()),
    );

    json!({
        "type": "vector",
        "url": config.archive_url(),
        "promoteId": promote_id,
    })
}

/// The three style layers in draw order, keyed by layer id.
#[must_use]
pub fn layers(config: &MapConfig, metric: Metric) -> [(&'static str, Value); 3] {
    [
        (
            CENTROID_LAYER_ID,
            json!({
                "id": CENTROID_LAYER_ID,
                "type": "circle",
                "source": config.source_id,
                "source-layer": config.centroid_layer,
                "paint": {
                    "circle-color": "#ffffff",
                    "circle-opacity": circle_opacity_expression(),
                    "circle-radius": circle_radius_expression(),
                    "circle-stroke-width": 0,
                    "circle-stroke-color": "#0f172a",
                },
            }),
        ),
        (
            FILL_LAYER_ID,
            json!({
                "id": FILL_LAYER_ID,
                "type": "fill",
                "source": config.source_id,
                "source-layer": config.polygon_layer,
                "paint": {
                    "fill-color": color_expression(metric),
                    "fill-opacity": fill_opacity_expression(),
                },
            }),
        ),
        (
            OUTLINE_LAYER_ID,
            json!({
                "id": OUTLINE_LAYER_ID,
                "type": "line",
                "source": config.source_id,
                "source-layer": config.polygon_layer,
                "paint": {
                    "line-color": when_selected(json!("#F4F4F6"), json!("#928FA3")),
                    "line-opacity": when_selected(json!(0.8), json!(0.4)),
                    "line-width": when_selected(json!(3), json!(0.1)),
                },
            }),
        ),
    ]
}
