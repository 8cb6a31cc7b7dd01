//! Error taxonomy for scenario execution.
//!
//! Leaf crates keep their own `thiserror` enums; everything a router can
//! fail with converts into `StepError`, which carries an `Err.<Category>.<Detail>`
//! code and an actionable hint.

use std::fmt;

use mqtt_link::LinkError;
use panel_core::{ArgError, AssetError, BindingError};
use panel_hw::PinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // --- Scenario authoring ---
    ArgInvalid,
    ActionUnknown,
    AssetNotFound,
    AssetInvalid,

    // --- Configuration ---
    BindingPredicate,

    // --- IO / External ---
    IoTransport,
    IoGpio,

    // --- Run control ---
    RunCancelled,

    Internal,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ArgInvalid => "Err.Arg.Invalid",
            Self::ActionUnknown => "Err.Action.Unknown",
            Self::AssetNotFound => "Err.Asset.NotFound",
            Self::AssetInvalid => "Err.Asset.Invalid",
            Self::BindingPredicate => "Err.Binding.Predicate",
            Self::IoTransport => "Err.IO.Transport",
            Self::IoGpio => "Err.IO.Gpio",
            Self::RunCancelled => "Err.Run.Cancelled",
            Self::Internal => "Err.Internal",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::ArgInvalid => "A required step argument is missing or has the wrong type. Check the step's 'args' in the scenario file.",
            Self::ActionUnknown => "The action key does not name a registered domain/verb. Use '<domain>.<verb>' with domain gpio, mqtt, audio or video.",
            Self::AssetNotFound => "No scenario file with that name. Check PANEL_ASSETS_DIR and the scenes/<name>.json file.",
            Self::AssetInvalid => "The scenario file is not a non-empty JSON array of steps. Fix the file and trigger the scene again.",
            Self::BindingPredicate => "Could not decide between real and simulated hardware. Check PANEL_MODE (auto, real or simulated).",
            Self::IoTransport => "A player or broker command could not be delivered. Check that VLC's HTTP interface is running and reachable.",
            Self::IoGpio => "Writing a GPIO pin failed. Check that the process can write to GPIO_SYSFS_BASE.",
            Self::RunCancelled => "The run was cancelled by a newer trigger or a stop request. Hardware is left as the last completed step set it.",
            Self::Internal => "An internal error occurred. Check the panel logs for details.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A step handler failure with structured code + message + hint.
#[derive(Debug)]
pub struct StepError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: String,
    pub source: Option<anyhow::Error>,
}

impl StepError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: code.hint().to_string(),
            source: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn with_source(mut self, err: anyhow::Error) -> Self {
        self.source = Some(err);
        self
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::RunCancelled, "scenario run cancelled")
    }

    pub fn transport(message: impl Into<String>, err: anyhow::Error) -> Self {
        Self::new(ErrorCode::IoTransport, message).with_source(err)
    }

    pub fn gpio(pin: u8, err: anyhow::Error) -> Self {
        Self::new(ErrorCode::IoGpio, format!("gpio pin {pin} write failed")).with_source(err)
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::RunCancelled
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} → {}", self.code.code(), self.message, self.hint)
    }
}

impl std::error::Error for StepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<ArgError> for StepError {
    fn from(e: ArgError) -> Self {
        Self::new(ErrorCode::ArgInvalid, e.to_string())
    }
}

impl From<PinError> for StepError {
    fn from(e: PinError) -> Self {
        Self::new(ErrorCode::ArgInvalid, e.to_string())
    }
}

impl From<BindingError> for StepError {
    fn from(e: BindingError) -> Self {
        Self::new(ErrorCode::BindingPredicate, e.to_string())
    }
}

impl From<AssetError> for StepError {
    fn from(e: AssetError) -> Self {
        let code = match e {
            AssetError::NotFound(_) => ErrorCode::AssetNotFound,
            AssetError::Empty(_) | AssetError::Malformed { .. } => ErrorCode::AssetInvalid,
        };
        Self::new(code, e.to_string())
    }
}

impl From<LinkError> for StepError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::EmptyTopic => Self::new(ErrorCode::ArgInvalid, e.to_string()),
            LinkError::Stopped => Self::new(ErrorCode::IoTransport, e.to_string())
                .with_hint("The messaging client was shut down before the step ran."),
        }
    }
}
