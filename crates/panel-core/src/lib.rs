//! Contract layer for the control-panel scenario engine.
//!
//! Defines the step/asset model (`ScenarioStep`, `ScenarioAsset`), action-key
//! parsing (`ActionKey`), the typed argument codec (`args`), the
//! mode-selected binding primitive (`ModeBinding`) and the `AssetStore`
//! seam that feeds the runner.

pub mod action;
pub mod args;
pub mod binding;
pub mod step;

pub use action::ActionKey;
pub use args::{ArgError, Args};
pub use binding::{BindingError, Mode, ModeBinding};
pub use step::{AssetError, AssetKind, ScenarioAsset, ScenarioStep};

// ---------------------------------------------------------------------------
// Asset store seam
// ---------------------------------------------------------------------------

/// Supplies scenario assets to the runner (directory loader, in-memory, …).
///
/// The store is re-read on every run; no caching is implied.
pub trait AssetStore: Send + Sync {
    /// Load the named `Scene` asset.
    fn load_scenario(&self, name: &str) -> Result<ScenarioAsset, AssetError>;

    /// Load the distinguished `Setup` asset.
    fn load_setup(&self) -> Result<ScenarioAsset, AssetError>;
}
