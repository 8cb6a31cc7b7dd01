//! Mode-selected binding: pick a real or simulated implementation once.
//!
//! The predicate runs on first `resolve()` and never again. Only the chosen
//! factory is invoked, so building the real side (opening a hardware handle,
//! spawning a network loop) never happens when simulation is selected.
//! A predicate failure is cached too: every resolution reports it, neither
//! branch is ever defaulted to.

use std::fmt;
use std::sync::OnceLock;

type Predicate = Box<dyn Fn() -> anyhow::Result<bool> + Send + Sync>;
type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

const BOARD_MODEL_PATH: &str = "/proc/device-tree/model";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Real,
    Simulated,
}

impl Mode {
    /// Build the production predicate from a configured setting:
    /// `real`, `simulated` (or `sim`), or `auto` (probe the board).
    ///
    /// An unknown setting is reported by the predicate, i.e. on first use.
    pub fn predicate(setting: &str) -> impl Fn() -> anyhow::Result<bool> + Send + Sync + 'static {
        let setting = setting.trim().to_lowercase();
        move || match setting.as_str() {
            "real" => Ok(true),
            "simulated" | "sim" => Ok(false),
            "auto" | "" => detect_board(),
            other => Err(anyhow::anyhow!(
                "unknown PANEL_MODE '{other}' (expected auto, real or simulated)"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Simulated => write!(f, "simulated"),
        }
    }
}

/// True when running on a Raspberry Pi (device-tree model string).
/// A missing device tree means "not a Pi"; any other read error propagates.
pub fn detect_board() -> anyhow::Result<bool> {
    match std::fs::read(BOARD_MODEL_PATH) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).contains("Raspberry Pi")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(anyhow::anyhow!("reading {BOARD_MODEL_PATH}: {e}")),
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("Err.Binding.Predicate: '{capability}' mode predicate failed: {reason}")]
    Predicate { capability: String, reason: String },
}

pub struct ModeBinding<T> {
    capability: String,
    predicate: Predicate,
    real: Factory<T>,
    simulated: Factory<T>,
    slot: OnceLock<Result<(Mode, T), BindingError>>,
}

impl<T> ModeBinding<T> {
    pub fn new(
        predicate: impl Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
        real: impl Fn() -> T + Send + Sync + 'static,
        simulated: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            capability: "capability".into(),
            predicate: Box::new(predicate),
            real: Box::new(real),
            simulated: Box::new(simulated),
            slot: OnceLock::new(),
        }
    }

    /// Name used in logs and errors.
    pub fn named(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }

    /// The bound instance; the same one on every call.
    pub fn resolve(&self) -> Result<&T, BindingError> {
        match self.slot.get_or_init(|| self.select()) {
            Ok((_, value)) => Ok(value),
            Err(e) => Err(e.clone()),
        }
    }

    /// The selected mode, once resolved successfully.
    pub fn mode(&self) -> Option<Mode> {
        match self.slot.get() {
            Some(Ok((mode, _))) => Some(*mode),
            _ => None,
        }
    }

    /// The bound instance if it has already been resolved. Never triggers
    /// selection; used at shutdown to dispose of what was built.
    pub fn get(&self) -> Option<&T> {
        match self.slot.get() {
            Some(Ok((_, value))) => Some(value),
            _ => None,
        }
    }

    fn select(&self) -> Result<(Mode, T), BindingError> {
        let use_real = (self.predicate)().map_err(|e| {
            tracing::error!(capability = %self.capability, error = %e, "binding.predicate_failed");
            BindingError::Predicate {
                capability: self.capability.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        let (mode, value) = if use_real {
            (Mode::Real, (self.real)())
        } else {
            (Mode::Simulated, (self.simulated)())
        };
        tracing::info!(capability = %self.capability, mode = %mode, "binding.selected");
        Ok((mode, value))
    }
}

impl<T> fmt::Debug for ModeBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeBinding")
            .field("capability", &self.capability)
            .field("mode", &self.mode())
            .finish()
    }
}

/// `ModeBinding::new` as a free function.
pub fn bind<T>(
    predicate: impl Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    real: impl Fn() -> T + Send + Sync + 'static,
    simulated: impl Fn() -> T + Send + Sync + 'static,
) -> ModeBinding<T> {
    ModeBinding::new(predicate, real, simulated)
}
