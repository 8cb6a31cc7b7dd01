//! Asset stores: in-memory (tests, demos) and directory-backed.
//!
//! Directory layout:
//! ```text
//! <root>/setup.json
//! <root>/scenes/<name>.json
//! ```
//! Files are re-read on every load.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use panel_core::{AssetError, AssetKind, AssetStore, ScenarioAsset};

const SETUP_NAME: &str = "setup";

#[derive(Clone, Default)]
pub struct MemoryStore {
    setup: Option<ScenarioAsset>,
    scenes: Arc<HashMap<String, ScenarioAsset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset: a `Setup` asset replaces the setup, a `Scene` is keyed
    /// by its name.
    pub fn with(mut self, a: ScenarioAsset) -> Self {
        match a.kind() {
            AssetKind::Setup => self.setup = Some(a),
            AssetKind::Scene => {
                let mut m = (*self.scenes).clone();
                m.insert(a.name().to_string(), a);
                self.scenes = Arc::new(m);
            }
        }
        self
    }
}

impl AssetStore for MemoryStore {
    fn load_scenario(&self, name: &str) -> Result<ScenarioAsset, AssetError> {
        self.scenes
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }

    fn load_setup(&self) -> Result<ScenarioAsset, AssetError> {
        self.setup
            .clone()
            .ok_or_else(|| AssetError::NotFound(SETUP_NAME.to_string()))
    }
}

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, name: &str, kind: AssetKind, path: &Path) -> Result<ScenarioAsset, AssetError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssetError::NotFound(name.to_string()))
            }
            Err(e) => {
                return Err(AssetError::Malformed {
                    name: name.to_string(),
                    reason: format!("reading {}: {e}", path.display()),
                })
            }
        };
        let asset = ScenarioAsset::from_json(name, kind, &raw)?;
        tracing::debug!(asset = %name, path = %path.display(), steps = asset.len(), "asset.loaded");
        Ok(asset)
    }
}

/// Scene names are plain file stems: no separators, no dot-prefixed names.
fn valid_scene_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl AssetStore for DirStore {
    fn load_scenario(&self, name: &str) -> Result<ScenarioAsset, AssetError> {
        if !valid_scene_name(name) {
            return Err(AssetError::NotFound(name.to_string()));
        }
        let path = self.root.join("scenes").join(format!("{name}.json"));
        self.read(name, AssetKind::Scene, &path)
    }

    fn load_setup(&self) -> Result<ScenarioAsset, AssetError> {
        let path = self.root.join("setup.json");
        self.read(SETUP_NAME, AssetKind::Setup, &path)
    }
}
