#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map state synchronization for the emotion map.
//!
//! Translates aggregated hex records into per-feature state on a tiled
//! vector map renderer. The renderer is abstracted behind [`MapRenderer`]
//! and written to through partial merges, so data visualization and the
//! selected-hex highlight can be updated independently.
//!
//! The [`Synchronizer`] is a plain state machine driven by explicit events.
//! [`driver::spawn`] runs it on a tokio task and handles the debounce timer.

pub mod context;
pub mod driver;
pub mod encoding;
pub mod memory;
pub mod renderer;
pub mod style;
pub mod sync;

pub use context::{MapContext, TileProtocol};
pub use driver::SyncHandle;
pub use memory::InMemoryRenderer;
pub use renderer::{
    FeatureStateKey, FeatureStatePatch, FeatureStateValue, FeatureTarget, MapRenderer,
    RendererError,
};
pub use sync::{DetailUpdate, MapEvent, Phase, Synchronizer};

/// Errors that can occur while mounting or driving the synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A renderer call failed outside the per-feature write path.
    #[error("Renderer error: {0}")]
    Renderer(#[from] RendererError),

    /// The synchronizer task has stopped and no longer accepts commands.
    #[error("Synchronizer task has stopped")]
    Closed,

    /// The synchronizer task panicked or was cancelled.
    #[error("Synchronizer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
