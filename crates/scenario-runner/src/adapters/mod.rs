//! Concrete player adapters.
//!
//! `player` holds the `PlayerClient` seam with its simulated and log-only
//! implementations; `vlc` is the real VLC HTTP client, gated behind the
//! `live` feature.

pub mod player;
#[cfg(feature = "live")]
pub mod vlc;
