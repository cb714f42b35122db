//! The seam between the synchronizer and a vector tile map renderer.
//!
//! Feature state is a per-feature key/value store owned by the renderer.
//! Writes are partial merges: keys absent from a patch keep their value.

use std::collections::BTreeMap;

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Feature-state keys read by the paint expressions.
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
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FeatureStateKey {
    /// Aggregated value, `null` without data.
    Value,
    /// Participant total.
    N,
    /// `1` when the active place has a value, else `0`.
    HasData,
    /// `1` when the hex passes the filters, else `0`.
    PassesFilter,
    /// Whether the hex is drawn.
    Visible,
    /// Fill opacity.
    Opacity,
    /// Centroid circle opacity.
    CircleOpacity,
    /// Whether the hex is the current selection.
    Selected,
}

impl FeatureStateKey {
    /// Every key, in wire order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Value,
            Self::N,
            Self::HasData,
            Self::PassesFilter,
            Self::Visible,
            Self::Opacity,
            Self::CircleOpacity,
            Self::Selected,
        ]
    }
}

/// A feature-state value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureStateValue {
    /// Explicit `null`.
    Null,
    /// Any number.
    Number(f64),
    /// A boolean.
    Bool(bool),
}

impl FeatureStateValue {
    /// Returns the number, if this is one.
    #[must_use]
    pub const fn as_number(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(b),
            Self::Null | Self::Number(_) => None,
        }
    }
}

impl From<bool> for FeatureStateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FeatureStateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for FeatureStateValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Number)
    }
}

/// A partial feature-state update.
pub type FeatureStatePatch = BTreeMap<FeatureStateKey, FeatureStateValue>;

/// Addresses one feature of one source layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureTarget<'a> {
    /// Vector source id.
    pub source: &'a str,
    /// Layer within the source's tiles.
    pub source_layer: &'a str,
    /// Promoted feature id (the hex id).
    pub id: &'a str,
}

/// Errors reported by a renderer.
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    /// The source has not been added.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// The style layer has not been added.
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),

    /// A source with this id already exists.
    #[error("Source already exists: {0}")]
    DuplicateSource(String),

    /// A style layer with this id already exists.
    #[error("Layer already exists: {0}")]
    DuplicateLayer(String),

    /// A layer definition is missing its id or is not an object.
    #[error("Invalid layer definition: {0}")]
    InvalidLayer(String),

    /// A URL protocol handler is already registered under this scheme.
    #[error("Protocol already registered: {0}")]
    ProtocolAlreadyRegistered(String),

    /// The feature is not part of any loaded tile yet.
    #[error("Feature {id} not loaded in {source_id}/{source_layer}")]
    FeatureNotLoaded {
        /// Source the write targeted.
        source_id: String,
        /// Source layer the write targeted.
        source_layer: String,
        /// Feature id.
        id: String,
    },
}

/// Operations the synchronizer needs from a vector tile map renderer.
pub trait MapRenderer {
    /// Registers a URL protocol handler for tile archives.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the renderer rejects the registration.
    fn register_protocol(&mut self, scheme: &str) -> Result<(), RendererError>;

    /// Returns `true` if a source with `id` exists.
    fn has_source(&self, id: &str) -> bool;

    /// Adds a source from its style-spec JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the source cannot be added.
    fn add_source(&mut self, id: &str, source: serde_json::Value) -> Result<(), RendererError>;

    /// Returns `true` if a style layer with `id` exists.
    fn has_layer(&self, id: &str) -> bool;

    /// Adds a style layer from its style-spec JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the layer cannot be added.
    fn add_layer(&mut self, layer: serde_json::Value) -> Result<(), RendererError>;

    /// Replaces one paint property of a style layer.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the layer does not exist.
    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: serde_json::Value,
    ) -> Result<(), RendererError>;

    /// Merges `patch` into the state of one feature.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the feature cannot be addressed, e.g.
    /// because its tile has not loaded yet.
    fn set_feature_state(
        &mut self,
        target: &FeatureTarget<'_>,
        patch: &FeatureStatePatch,
    ) -> Result<(), RendererError>;
}
