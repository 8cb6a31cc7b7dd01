//! Panel hardware: the logical-name → pin table and the GPIO driver seam.

pub mod gpio;
pub mod pins;

pub use gpio::{GpioDriver, SimulatedGpio, SysfsGpio};
pub use pins::{Button, Led, LogicalPin, PinError};
