//! An in-process [`MapRenderer`] with the same feature-state semantics as a
//! real tiled renderer: features only exist once a tile containing them has
//! loaded, writes to unknown features fail, and writes merge.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::renderer::{FeatureStatePatch, FeatureTarget, MapRenderer, RendererError};

/// `(source, source layer, feature id)`.
type FeatureKey = (String, String, String);

fn feature_key(target: &FeatureTarget<'_>) -> FeatureKey {
    (
        target.source.to_string(),
        target.source_layer.to_string(),
        target.id.to_string(),
    )
}

/// Renderer that keeps sources, layers and feature state in memory.
#[derive(Debug, Default)]
pub struct InMemoryRenderer {
    protocols: Vec<String>,
    sources: BTreeMap<String, Value>,
    layers: Vec<Value>,
    loaded: BTreeSet<FeatureKey>,
    states: BTreeMap<FeatureKey, FeatureStatePatch>,
    feature_state_writes: u64,
}

impl InMemoryRenderer {
    /// Creates an empty renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a tile load that brings `ids` of one source layer into
    /// existence. Returns how many features were new.
    pub fn load_tile<I, S>(&mut self, source: &str, source_layer: &str, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for id in ids {
            let key = (source.to_string(), source_layer.to_string(), id.into());
            if self.loaded.insert(key) {
                added += 1;
            }
        }
        added
    }

    /// Returns the merged state of one feature, if any was written.
    #[must_use]
    pub fn feature_state(&self, target: &FeatureTarget<'_>) -> Option<&FeatureStatePatch> {
        self.states.get(&feature_key(target))
    }

    /// Number of features with any state.
    #[must_use]
    pub fn features_with_state(&self) -> usize {
        self.states.len()
    }

    /// Number of successful feature-state writes so far.
    #[must_use]
    pub const fn feature_state_writes(&self) -> u64 {
        self.feature_state_writes
    }

    /// Schemes registered through [`MapRenderer::register_protocol`].
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Returns a style layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&Value> {
        self.layers
            .iter()
            .find(|layer| layer.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Ids of all style layers in draw order.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter_map(|layer| layer.get("id").and_then(Value::as_str))
            .collect()
    }

    /// Returns a source definition by id.
    #[must_use]
    pub fn source(&self, id: &str) -> Option<&Value> {
        self.sources.get(id)
    }
}

impl MapRenderer for InMemoryRenderer {
    fn register_protocol(&mut self, scheme: &str) -> Result<(), RendererError> {
        if self.protocols.iter().any(|s| s == scheme) {
            return Err(RendererError::ProtocolAlreadyRegistered(scheme.to_string()));
        }
        self.protocols.push(scheme.to_string());
        Ok(())
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, source: Value) -> Result<(), RendererError> {
        if self.has_source(id) {
            return Err(RendererError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), source);
        Ok(())
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn add_layer(&mut self, layer: Value) -> Result<(), RendererError> {
        let Some(id) = layer.get("id").and_then(Value::as_str) else {
            return Err(RendererError::InvalidLayer(layer.to_string()));
        };
        if self.has_layer(id) {
            return Err(RendererError::DuplicateLayer(id.to_string()));
        }
        self.layers.push(layer);
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: Value,
    ) -> Result<(), RendererError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.get("id").and_then(Value::as_str) == Some(layer_id))
            .ok_or_else(|| RendererError::UnknownLayer(layer_id.to_string()))?;

        let paint = layer
            .as_object_mut()
            .ok_or_else(|| RendererError::InvalidLayer(layer_id.to_string()))?
            .entry("paint")
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        let Some(paint) = paint.as_object_mut() else {
            return Err(RendererError::InvalidLayer(layer_id.to_string()));
        };
        paint.insert(property.to_string(), value);
        Ok(())
    }

    fn set_feature_state(
        &mut self,
        target: &FeatureTarget<'_>,
        patch: &FeatureStatePatch,
    ) -> Result<(), RendererError> {
        if !self.has_source(target.source) {
            return Err(RendererError::UnknownSource(target.source.to_string()));
        }
        let key = feature_key(target);
        if !self.loaded.contains(&key) {
            return Err(RendererError::FeatureNotLoaded {
                source_id: key.0,
                source_layer: key.1,
                id: key.2,
            });
        }
        self.states
            .entry(key)
            .or_default()
            .extend(patch.iter().map(|(k, v)| (*k, *v)));
        self.feature_state_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::renderer::{FeatureStateKey, FeatureStateValue};

    const TARGET: FeatureTarget<'static> = FeatureTarget {
        source: "h3",
        source_layer: "h3",
        id: "8928308280fffff",
    };

    fn renderer() -> InMemoryRenderer {
        let mut renderer = InMemoryRenderer::new();
        renderer.add_source("h3", json!({ "type": "vector" })).unwrap();
        renderer
    }

    #[test]
    fn writes_before_tile_load_fail() {
        let mut renderer = renderer();
        let patch = FeatureStatePatch::from([(FeatureStateKey::N, FeatureStateValue::Number(1.0))]);

        let err = renderer.set_feature_state(&TARGET, &patch).unwrap_err();
        assert!(matches!(err, RendererError::FeatureNotLoaded { .. }));
        assert_eq!(renderer.feature_state_writes(), 0);

        assert_eq!(renderer.load_tile("h3", "h3", ["8928308280fffff"]), 1);
        assert_eq!(renderer.load_tile("h3", "h3", ["8928308280fffff"]), 0);
        renderer.set_feature_state(&TARGET, &patch).unwrap();
        assert_eq!(renderer.feature_state_writes(), 1);
    }

    #[test]
    fn feature_state_merges() {
        let mut renderer = renderer();
        renderer.load_tile("h3", "h3", ["8928308280fffff"]);

        let selected =
            FeatureStatePatch::from([(FeatureStateKey::Selected, FeatureStateValue::Bool(true))]);
        let value =
            FeatureStatePatch::from([(FeatureStateKey::Value, FeatureStateValue::Number(2.0))]);
        renderer.set_feature_state(&TARGET, &selected).unwrap();
        renderer.set_feature_state(&TARGET, &value).unwrap();

        let state = renderer.feature_state(&TARGET).unwrap();
        assert_eq!(state[&FeatureStateKey::Selected], FeatureStateValue::Bool(true));
        assert_eq!(state[&FeatureStateKey::Value], FeatureStateValue::Number(2.0));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let mut renderer = InMemoryRenderer::new();
        let err = renderer
            .set_feature_state(&TARGET, &FeatureStatePatch::new())
            .unwrap_err();
        assert!(matches!(err, RendererError::UnknownSource(_)));
    }

    #[test]
    fn layers_and_paint_properties() {
        let mut renderer = renderer();
        renderer
            .add_layer(json!({ "id": "h3-fill", "type": "fill", "paint": {} }))
            .unwrap();
        assert!(matches!(
            renderer.add_layer(json!({ "id": "h3-fill" })),
            Err(RendererError::DuplicateLayer(_))
        ));
        assert!(matches!(
            renderer.add_layer(json!({ "type": "fill" })),
            Err(RendererError::InvalidLayer(_))
        ));

        renderer
            .set_paint_property("h3-fill", "fill-color", json!("#ffffff"))
            .unwrap();
        assert_eq!(
            renderer.layer("h3-fill").unwrap()["paint"]["fill-color"],
            "#ffffff"
        );
        assert!(matches!(
            renderer.set_paint_property("missing", "fill-color", json!(1)),
            Err(RendererError::UnknownLayer(_))
        ));
        assert_eq!(renderer.layer_ids(), ["h3-fill"]);
    }

    #[test]
    fn protocol_registers_once() {
        let mut renderer = InMemoryRenderer::new();
        renderer.register_protocol("pmtiles").unwrap();
        assert!(matches!(
            renderer.register_protocol("pmtiles"),
            Err(RendererError::ProtocolAlreadyRegistered(_))
        ));
        assert_eq!(renderer.protocols(), ["pmtiles"]);
    }
}
