//! Scenario step and asset types.

use serde::{Deserialize, Serialize};

use crate::args::Args;

/// One instruction inside a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Dotted `"<domain>.<verb>"` key. Normalized at dispatch time, not here.
    pub action: String,
    /// Named parameters. `None` when the step carries no `args` at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

impl ScenarioStep {
    pub fn new(action: impl Into<String>, args: Option<Args>) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }

    /// Borrow the argument bag, if any.
    pub fn args(&self) -> Option<&Args> {
        self.args.as_ref()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Run once at initialization and on reset.
    Setup,
    /// Run when triggered by a button.
    Scene,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetError {
    #[error("Err.Asset.NotFound: no asset named '{0}'")]
    NotFound(String),
    #[error("Err.Asset.Invalid: asset '{0}' has no steps")]
    Empty(String),
    #[error("Err.Asset.Invalid: asset '{name}' could not be read: {reason}")]
    Malformed { name: String, reason: String },
}

/// An ordered, non-empty sequence of steps.
#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioAsset {
    name: String,
    kind: AssetKind,
    steps: Vec<ScenarioStep>,
}

impl ScenarioAsset {
    pub fn new(
        name: impl Into<String>,
        kind: AssetKind,
        steps: Vec<ScenarioStep>,
    ) -> Result<Self, AssetError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(AssetError::Empty(name));
        }
        Ok(Self { name, kind, steps })
    }

    /// Shorthand for a `Scene` asset.
    pub fn scene(name: impl Into<String>, steps: Vec<ScenarioStep>) -> Result<Self, AssetError> {
        Self::new(name, AssetKind::Scene, steps)
    }

    /// Shorthand for the `Setup` asset.
    pub fn setup(steps: Vec<ScenarioStep>) -> Result<Self, AssetError> {
        Self::new("setup", AssetKind::Setup, steps)
    }

    /// Parse an asset from JSON: either a bare array of steps or an object
    /// with a `steps` array.
    pub fn from_json(name: &str, kind: AssetKind, raw: &str) -> Result<Self, AssetError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Doc {
            Bare(Vec<ScenarioStep>),
            Wrapped { steps: Vec<ScenarioStep> },
        }

        let doc: Doc = serde_json::from_str(raw).map_err(|e| AssetError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let steps = match doc {
            Doc::Bare(steps) | Doc::Wrapped { steps } => steps,
        };
        Self::new(name, kind, steps)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn steps(&self) -> &[ScenarioStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: construction rejects empty assets.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
