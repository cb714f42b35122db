//! Map context owning the tile protocol registration.
//!
//! The tile archive protocol must be registered with the renderer at most
//! once, even when the map is mounted repeatedly. The guard lives in an
//! explicitly constructed [`MapContext`] instead of global state.

use emotion_map_config::MapConfig;
use emotion_map_survey_models::Metric;

use crate::renderer::{MapRenderer, RendererError};
use crate::{SyncError, style};

/// Tile archive URL protocol with a register-once guard.
#[derive(Debug)]
pub struct TileProtocol {
    scheme: String,
    registered: bool,
}

impl TileProtocol {
    /// Creates an unregistered protocol for `scheme`.
    #[must_use]
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            registered: false,
        }
    }

    /// URL scheme, e.g. `pmtiles`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Whether registration has already happened.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.registered
    }

    /// Registers the protocol with `renderer` unless that already happened.
    ///
    /// # Errors
    ///
    /// Returns [`RendererError`] if the renderer rejects the registration.
    /// The guard stays unset so a later mount can retry.
    pub fn ensure_registered<R: MapRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
    ) -> Result<(), RendererError> {
        if self.registered {
            return Ok(());
        }
        renderer.register_protocol(&self.scheme)?;
        self.registered = true;
        log::debug!("Registered {} tile protocol", self.scheme);
        Ok(())
    }
}

/// Application-lifetime map context.
#[derive(Debug)]
pub struct MapContext {
    config: MapConfig,
    protocol: TileProtocol,
}

impl MapContext {
    /// Creates a context for `config`.
    #[must_use]
    pub fn new(config: MapConfig) -> Self {
        let protocol = TileProtocol::new(config.protocol_scheme.clone());
        Self { config, protocol }
    }

    /// Map settings.
    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    /// The tile protocol guard.
    #[must_use]
    pub const fn protocol(&self) -> &TileProtocol {
        &self.protocol
    }

    /// Prepares `renderer` for the hex layers: registers the tile protocol,
    /// then adds the source and each layer that does not exist yet.
    ///
    /// A protocol registration failure is logged and does not stop the
    /// mount.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if the source or a layer cannot be added.
    pub fn mount<R: MapRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        metric: Metric,
    ) -> Result<(), SyncError> {
        if let Err(e) = self.protocol.ensure_registered(renderer) {
            log::error!("Tile protocol error: {e}");
        }

        if !renderer.has_source(&self.config.source_id) {
            renderer.add_source(&self.config.source_id, style::source(&self.config))?;
        }

        for (id, layer) in style::layers(&self.config, metric) {
            if !renderer.has_layer(id) {
                renderer.add_layer(layer)?;
            }
        }

        log::info!("Mounted hex layers for {metric}");
        Ok(())
    }
}
