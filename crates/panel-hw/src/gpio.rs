//! GPIO driver seam plus two implementations:
//!
//! - `SysfsGpio`: Linux `/sys/class/gpio` interface (export, direction, value).
//! - `SimulatedGpio`: in-memory pin levels with a write log, for desktop
//!   runs and tests.
//!
//! Pin writes are synchronous and fast; nothing here suspends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

pub trait GpioDriver: Send + Sync {
    /// Drive an output pin high or low.
    fn set_pin(&self, pin: u8, high: bool) -> anyhow::Result<()>;

    /// Sample an input pin.
    fn read_pin(&self, pin: u8) -> anyhow::Result<bool>;

    /// Short driver name for logs.
    fn kind(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// SysfsGpio
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

pub struct SysfsGpio {
    base: PathBuf,
    configured: Mutex<HashMap<u8, Direction>>,
}

impl SysfsGpio {
    pub const DEFAULT_BASE: &'static str = "/sys/class/gpio";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            configured: Mutex::new(HashMap::new()),
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.base.join(format!("gpio{pin}"))
    }

    /// Export the pin (if the kernel has not already) and set its direction.
    /// Cached, so repeated writes on the same pin touch only `value`.
    fn ensure(&self, pin: u8, dir: Direction) -> anyhow::Result<PathBuf> {
        let pin_dir = self.pin_dir(pin);
        let mut configured = self
            .configured
            .lock()
            .map_err(|_| anyhow::anyhow!("gpio state lock poisoned"))?;
        if configured.get(&pin) == Some(&dir) {
            return Ok(pin_dir);
        }

        if !pin_dir.exists() {
            write_attr(&self.base.join("export"), &pin.to_string())?;
        }
        write_attr(&pin_dir.join("direction"), dir.as_str())?;
        configured.insert(pin, dir);
        tracing::debug!(pin = pin, direction = dir.as_str(), "gpio.configure");
        Ok(pin_dir)
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE)
    }
}

fn write_attr(path: &Path, value: &str) -> anyhow::Result<()> {
    std::fs::write(path, value).with_context(|| format!("writing {}", path.display()))
}

impl GpioDriver for SysfsGpio {
    fn set_pin(&self, pin: u8, high: bool) -> anyhow::Result<()> {
        let dir = self.ensure(pin, Direction::Out)?;
        write_attr(&dir.join("value"), if high { "1" } else { "0" })?;
        tracing::debug!(pin = pin, high = high, "gpio.set");
        Ok(())
    }

    fn read_pin(&self, pin: u8) -> anyhow::Result<bool> {
        let dir = self.ensure(pin, Direction::In)?;
        let path = dir.join("value");
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(raw.trim() == "1")
    }

    fn kind(&self) -> &'static str {
        "sysfs"
    }
}

// ---------------------------------------------------------------------------
// SimulatedGpio
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SimulatedGpio {
    levels: Mutex<HashMap<u8, bool>>,
    writes: Mutex<Vec<(u8, bool)>>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a pin (low if never driven).
    pub fn level(&self, pin: u8) -> bool {
        self.levels
            .lock()
            .map(|l| l.get(&pin).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Force an input level, e.g. to fake a button press.
    pub fn drive_input(&self, pin: u8, high: bool) {
        if let Ok(mut levels) = self.levels.lock() {
            levels.insert(pin, high);
        }
    }

    /// Every `set_pin` call so far, in order.
    pub fn writes(&self) -> Vec<(u8, bool)> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl GpioDriver for SimulatedGpio {
    fn set_pin(&self, pin: u8, high: bool) -> anyhow::Result<()> {
        self.levels
            .lock()
            .map_err(|_| anyhow::anyhow!("simulated gpio lock poisoned"))?
            .insert(pin, high);
        self.writes
            .lock()
            .map_err(|_| anyhow::anyhow!("simulated gpio lock poisoned"))?
            .push((pin, high));
        tracing::debug!(pin = pin, high = high, "gpio.set (simulated)");
        Ok(())
    }

    fn read_pin(&self, pin: u8) -> anyhow::Result<bool> {
        Ok(self.level(pin))
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_base(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "panel-hw-gpio-{}-{:?}",
            name,
            std::thread::current().id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn sysfs_writes_direction_and_value() {
        let base = temp_base("write");
        std::fs::create_dir_all(base.join("gpio17")).unwrap();
        let gpio = SysfsGpio::new(&base);

        gpio.set_pin(17, true).unwrap();
        assert_eq!(std::fs::read_to_string(base.join("gpio17/direction")).unwrap(), "out");
        assert_eq!(std::fs::read_to_string(base.join("gpio17/value")).unwrap(), "1");

        gpio.set_pin(17, false).unwrap();
        assert_eq!(std::fs::read_to_string(base.join("gpio17/value")).unwrap(), "0");
        // Already exported, so no export write.
        assert!(!base.join("export").exists());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn sysfs_reads_input() {
        let base = temp_base("read");
        std::fs::create_dir_all(base.join("gpio5")).unwrap();
        std::fs::write(base.join("gpio5/value"), "1\n").unwrap();
        let gpio = SysfsGpio::new(&base);

        assert!(gpio.read_pin(5).unwrap());
        assert_eq!(std::fs::read_to_string(base.join("gpio5/direction")).unwrap(), "in");

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn sysfs_surfaces_io_errors() {
        let gpio = SysfsGpio::new(std::env::temp_dir().join("panel-hw-gpio-missing-base"));
        let err = gpio.set_pin(3, true).unwrap_err();
        assert!(err.to_string().contains("export"));
        let io = err.root_cause().downcast_ref::<std::io::Error>().expect("io error kept as source");
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn sysfs_read_error_keeps_path_and_source() {
        let base = temp_base("read-missing");
        // Exported with a direction file but no value file.
        std::fs::create_dir_all(base.join("gpio6")).unwrap();
        let gpio = SysfsGpio::new(&base);

        let err = gpio.read_pin(6).unwrap_err();
        assert!(err.to_string().starts_with("reading "));
        assert!(err.to_string().contains("gpio6"));
        assert!(err.root_cause().downcast_ref::<std::io::Error>().is_some());

        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn simulated_records_writes() {
        let gpio = SimulatedGpio::new();
        gpio.set_pin(17, true).unwrap();
        gpio.set_pin(27, false).unwrap();
        assert!(gpio.level(17));
        assert!(!gpio.read_pin(27).unwrap());
        assert_eq!(gpio.writes(), vec![(17, true), (27, false)]);

        gpio.drive_input(5, true);
        assert!(gpio.read_pin(5).unwrap());
    }
}
