//! Domain routers, one per action-key prefix.
//!
//! Every router holds the binding for its capability, not the capability
//! itself: the real/simulated choice happens on the first step that needs it.

pub mod gpio;
pub mod mqtt;
pub mod player;

use std::sync::Arc;

use mqtt_link::MessagingClient;
use panel_core::ModeBinding;
use panel_hw::GpioDriver;

use crate::adapters::player::PlayerClient;

pub use gpio::GpioRouter;
pub use mqtt::MqttRouter;
pub use player::PlayerRouter;

pub type GpioBinding = ModeBinding<Arc<dyn GpioDriver>>;
pub type LinkBinding = ModeBinding<Arc<MessagingClient>>;
pub type PlayerBinding = ModeBinding<Arc<dyn PlayerClient>>;
