//! Visual encoding of aggregated records.
//!
//! Everything the paint expressions compute on the renderer side is also
//! evaluable here, so the policies can be tested and reused for legends.

use emotion_map_aggregation_models::{AggregatedHexRecord, SCALE_MAX, SCALE_MIN};
use emotion_map_survey_models::Metric;

use crate::renderer::{FeatureStateKey, FeatureStatePatch, FeatureStateValue};

/// Color used for hexes without a value, regardless of metric.
pub const NO_DATA_COLOR: &str = "rgba(176,176,176,0.3)";

/// Participant bucket edges and the relative circle size from each edge up.
pub const SIZE_BUCKETS: [(u32, f64); 5] = [(1, 0.2), (5, 0.4), (10, 0.6), (25, 0.8), (50, 1.0)];

/// Zoom stops and the circle base radius at each stop.
pub const ZOOM_RADII: [(f64, f64); 4] = [(9.0, 1.75), (12.0, 14.0), (15.0, 112.0), (18.0, 896.0)];

/// Base of the exponential zoom interpolation.
pub const ZOOM_BASE: f64 = 2.0;

/// Multiplier applied to every base radius.
pub const RADIUS_SCALE: f64 = 2.4;

/// Values of the five color ramp stops.
const RAMP_VALUES: [f64; 5] = [SCALE_MIN, 2.0, 3.0, 4.0, SCALE_MAX];

/// How far each ramp stop is blended from white toward the metric color.
const RAMP_TINTS: [f64; 5] = [0.12, 0.34, 0.56, 0.78, 1.0];

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// White.
    pub const WHITE: Self = Self::new(0xff, 0xff, 0xff);

    /// Creates a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linearly interpolates toward `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| {
            let (a, b) = (f64::from(a), f64::from(b));
            (b - a).mul_add(t, a).round() as u8
        };
        Self::new(
            channel(self.r, other.r),
            channel(self.g, other.g),
            channel(self.b, other.b),
        )
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Resolved fill color of a hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillColor {
    /// The fixed no-data color.
    NoData,
    /// A color from the metric's ramp.
    Ramp(Rgb),
}

impl std::fmt::Display for FillColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoData => f.write_str(NO_DATA_COLOR),
            Self::Ramp(rgb) => rgb.fmt(f),
        }
    }
}

/// One stop of a color ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    /// Value at which the stop applies.
    pub value: f64,
    /// Color at that value.
    pub color: Rgb,
}

/// Accent color of a metric.
#[must_use]
pub const fn metric_color(metric: Metric) -> Rgb {
    match metric {
        Metric::Stress | Metric::EnvBeauty => Rgb::new(0xcd, 0x3f, 0x32),
        Metric::Happy | Metric::EnvInteresting => Rgb::new(0xf8, 0xd1, 0x30),
        Metric::Loneliness | Metric::EnvSafety => Rgb::new(0x0f, 0x29, 0xdb),
        Metric::Anxiety | Metric::EnvCrowded => Rgb::new(0x65, 0x50, 0x9e),
        Metric::Energy | Metric::EnvironmentGreeness => Rgb::new(0x04, 0xbe, 0xac),
    }
}

/// Five-stop ramp of `metric` over the value scale, ending at its accent.
#[must_use]
pub fn color_ramp(metric: Metric) -> [ColorStop; 5] {
    let accent = metric_color(metric);
    std::array::from_fn(|i| ColorStop {
        value: RAMP_VALUES[i],
        color: Rgb::WHITE.lerp(accent, RAMP_TINTS[i]),
    })
}

/// Evaluates a ramp at `value`, clamping outside the first and last stop.
#[must_use]
pub fn interpolate_ramp(stops: &[ColorStop; 5], value: f64) -> Rgb {
    let [first, .., last] = *stops;
    if value <= first.value {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if value <= hi.value {
            let t = (value - lo.value) / (hi.value - lo.value);
            return lo.color.lerp(hi.color, t);
        }
    }
    last.color
}

/// Fill color of a hex with `value` under `metric`.
#[must_use]
pub fn fill_color(metric: Metric, value: Option<f64>) -> FillColor {
    value.map_or(FillColor::NoData, |v| {
        FillColor::Ramp(interpolate_ramp(&color_ramp(metric), v))
    })
}

/// Relative circle size for a participant total.
#[must_use]
pub fn size_bucket(n: u32) -> f64 {
    SIZE_BUCKETS
        .iter()
        .rev()
        .find(|(edge, _)| n >= *edge)
        .map_or(0.0, |(_, size)| *size)
}

/// Base radius at `zoom`, interpolated exponentially between stops.
#[must_use]
pub fn zoom_radius(zoom: f64) -> f64 {
    let [first, .., last] = ZOOM_RADII;
    if zoom <= first.0 {
        return first.1;
    }
    for pair in ZOOM_RADII.windows(2) {
        let ((z0, r0), (z1, r1)) = (pair[0], pair[1]);
        if zoom <= z1 {
            let t = (ZOOM_BASE.powf(zoom - z0) - 1.0) / (ZOOM_BASE.powf(z1 - z0) - 1.0);
            return (r1 - r0).mul_add(t, r0);
        }
    }
    last.1
}

/// Centroid circle radius in pixels.
#[must_use]
pub fn circle_radius(n: u32, visible: bool, zoom: f64) -> f64 {
    if !visible {
        return 0.0;
    }
    zoom_radius(zoom) * RADIUS_SCALE * size_bucket(n)
}

/// Opacities for the pass, fail and no-data tiers of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityTiers {
    /// Has data and passes the filters.
    pub pass: f64,
    /// Has data but fails the filters.
    pub fail: f64,
    /// No data but still visible.
    pub no_data: f64,
}

/// Tiers of the hex fill.
pub const AREA_OPACITY: OpacityTiers = OpacityTiers {
    pass: 0.8,
    fail: 0.15,
    no_data: 0.1,
};

/// Tiers of the centroid circle.
pub const CIRCLE_OPACITY: OpacityTiers = OpacityTiers {
    pass: 0.9,
    fail: 0.2,
    no_data: 0.05,
};

impl OpacityTiers {
    /// Picks the tier for a record's flags; `0` when hidden without data.
    #[must_use]
    pub const fn resolve(&self, has_data: bool, passes_filter: bool, visible: bool) -> f64 {
        match (has_data, passes_filter, visible) {
            (true, true, _) => self.pass,
            (true, false, _) => self.fail,
            (false, _, true) => self.no_data,
            (false, _, false) => 0.0,
        }
    }
}

/// Renderer-facing projection of an [`AggregatedHexRecord`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVisualState {
    /// Aggregated value.
    pub value: Option<f64>,
    /// Participant total.
    pub n: u32,
    /// Whether the active place has a value.
    pub has_data: bool,
    /// Whether the filters pass.
    pub passes_filter: bool,
    /// Whether the hex is drawn.
    pub visible: bool,
    /// Fill opacity.
    pub opacity: f64,
    /// Centroid opacity.
    pub circle_opacity: f64,
}

impl FeatureVisualState {
    /// Projects a record onto renderer primitives.
    #[must_use]
    pub const fn from_record(record: &AggregatedHexRecord) -> Self {
        let (has_data, passes_filter, visible) =
            (record.has_data, record.passes_filter, record.visible);
        Self {
            value: record.value,
            n: record.participant_total,
            has_data,
            passes_filter,
            visible,
            opacity: AREA_OPACITY.resolve(has_data, passes_filter, visible),
            circle_opacity: CIRCLE_OPACITY.resolve(has_data, passes_filter, visible),
        }
    }

    /// Builds the feature-state patch. Never touches `selected`.
    #[must_use]
    pub fn to_patch(&self) -> FeatureStatePatch {
        let flag = |b: bool| FeatureStateValue::Number(f64::from(u8::from(b)));
        FeatureStatePatch::from([
            (FeatureStateKey::Value, FeatureStateValue::from(self.value)),
            (FeatureStateKey::N, FeatureStateValue::Number(f64::from(self.n))),
            (FeatureStateKey::HasData, flag(self.has_data)),
            (FeatureStateKey::PassesFilter, flag(self.passes_filter)),
            (FeatureStateKey::Visible, FeatureStateValue::Bool(self.visible)),
            (FeatureStateKey::Opacity, FeatureStateValue::Number(self.opacity)),
            (
                FeatureStateKey::CircleOpacity,
                FeatureStateValue::Number(self.circle_opacity),
            ),
        ])
    }
}

/// Patch that sets or clears the selection highlight only.
#[must_use]
pub fn selection_patch(selected: bool) -> FeatureStatePatch {
    FeatureStatePatch::from([(FeatureStateKey::Selected, FeatureStateValue::Bool(selected))])
}
