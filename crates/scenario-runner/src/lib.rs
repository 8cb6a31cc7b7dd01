//! Scenario runtime for the control panel.
//!
//! Loads an asset, walks its steps in order, and routes each step's action
//! key to the router registered for its domain (`gpio`, `mqtt`, `audio`,
//! `video`). Routers decode arguments, resolve logical pins, and call the
//! real or simulated implementation their binding selected.
//!
//! Unknown actions are logged and skipped; router failures are surfaced to
//! the runner, which applies its `FailurePolicy`.

pub mod adapters;
pub mod assets;
pub mod config;
pub mod errors;
pub mod executor;
pub mod panel;
pub mod registry;
pub mod routers;
pub mod runner;
