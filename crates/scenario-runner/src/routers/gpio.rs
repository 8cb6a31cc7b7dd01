//! `gpio.*` steps: LEDs and the process-indicator bar.
//!
//! | verb     | args                                  |
//! |----------|---------------------------------------|
//! | `on`     | `led` or `leds: [..]`                 |
//! | `off`    | `led` or `leds: [..]`                 |
//! | `toggle` | `led`                                 |
//! | `blink`  | `led`, `times` (3), `interval_ms` (250) |
//! | `bar`    | `level` (0..=5, clamped)              |
//! | `clear`  | none                                  |
//!
//! LED names resolve through the pin table before any pin is written, so a
//! bad name fails the step with nothing applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use panel_core::{args, ActionKey, ArgError, Args, ScenarioStep};
use panel_hw::{GpioDriver, Led};

use super::GpioBinding;
use crate::errors::{ErrorCode, StepError};
use crate::executor::{DomainRouter, ExecCtx, SkipReason, StepOutcome};

const DEFAULT_BLINK_TIMES: i64 = 3;
const DEFAULT_BLINK_INTERVAL_MS: i64 = 250;

pub struct GpioRouter {
    driver: Arc<GpioBinding>,
    /// Last level this router wrote per pin; `toggle` flips it.
    /// Reading back through sysfs would flip the pin's direction to input.
    written: Mutex<HashMap<u8, bool>>,
}

impl GpioRouter {
    pub fn new(driver: Arc<GpioBinding>) -> Self {
        Self {
            driver,
            written: Mutex::new(HashMap::new()),
        }
    }

    fn write(&self, driver: &dyn GpioDriver, led: Led, high: bool) -> Result<(), StepError> {
        let pin = led.pin();
        driver
            .set_pin(pin, high)
            .map_err(|e| StepError::gpio(pin, e))?;
        if let Ok(mut written) = self.written.lock() {
            written.insert(pin, high);
        }
        tracing::debug!(led = led.name(), pin = pin, high = high, driver = driver.kind(), "gpio.set");
        Ok(())
    }

    fn last_written(&self, led: Led) -> bool {
        self.written
            .lock()
            .map(|w| w.get(&led.pin()).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    async fn blink(
        &self,
        driver: &dyn GpioDriver,
        led: Led,
        times: u32,
        interval: Duration,
        ctx: &ExecCtx,
    ) -> Result<(), StepError> {
        for i in 0..times {
            self.write(driver, led, true)?;
            if let Err(e) = ctx.sleep(interval).await {
                // leave the LED dark when interrupted mid-blink
                self.write(driver, led, false)?;
                return Err(e);
            }
            self.write(driver, led, false)?;
            if i + 1 < times {
                ctx.sleep(interval).await?;
            }
        }
        Ok(())
    }
}

/// `led` as a single name, or `leds` as an array of names.
fn leds_arg(args: Option<&Args>) -> Result<Vec<Led>, StepError> {
    if let Some(node) = args::get_node(args, "leds") {
        let names = node.as_array().ok_or_else(|| ArgError::Invalid {
            key: "leds".into(),
            expected: "array of led names",
        })?;
        return names
            .iter()
            .map(|v| -> Result<Led, StepError> {
                let name = v.as_str().ok_or_else(|| ArgError::Invalid {
                    key: "leds".into(),
                    expected: "array of led names",
                })?;
                Ok(name.parse::<Led>()?)
            })
            .collect();
    }
    Ok(vec![led_arg(args)?])
}

fn led_arg(args: Option<&Args>) -> Result<Led, StepError> {
    Ok(args::get_required_string(args, "led")?.parse::<Led>()?)
}

fn non_negative(args: Option<&Args>, key: &str, fallback: i64) -> Result<i64, StepError> {
    let v = args::get_int(args, key, fallback);
    if v < 0 {
        return Err(StepError::new(
            ErrorCode::ArgInvalid,
            format!("argument '{key}' must not be negative (got {v})"),
        ));
    }
    Ok(v)
}

#[async_trait]
impl DomainRouter for GpioRouter {
    fn domain(&self) -> &'static str {
        "gpio"
    }

    async fn execute(
        &self,
        key: &ActionKey,
        step: &ScenarioStep,
        ctx: &ExecCtx,
    ) -> Result<StepOutcome, StepError> {
        let args = step.args();
        let Some(verb) = key.verb() else {
            return Ok(StepOutcome::Skipped(SkipReason::UnknownVerb));
        };

        match verb {
            "on" | "off" => {
                let leds = leds_arg(args)?;
                let driver: &dyn GpioDriver = self.driver.resolve()?.as_ref();
                for led in leds {
                    self.write(driver, led, verb == "on")?;
                }
            }
            "toggle" => {
                let led = led_arg(args)?;
                let driver: &dyn GpioDriver = self.driver.resolve()?.as_ref();
                self.write(driver, led, !self.last_written(led))?;
            }
            "blink" => {
                let led = led_arg(args)?;
                let times = non_negative(args, "times", DEFAULT_BLINK_TIMES)?;
                let interval = non_negative(args, "interval_ms", DEFAULT_BLINK_INTERVAL_MS)?;
                let driver: &dyn GpioDriver = self.driver.resolve()?.as_ref();
                self.blink(
                    driver,
                    led,
                    u32::try_from(times).unwrap_or(u32::MAX),
                    Duration::from_millis(interval as u64),
                    ctx,
                )
                .await?;
            }
            "bar" => {
                let level = args::get_required_int(args, "level")?
                    .clamp(0, Led::PROCESS_BAR.len() as i64) as usize;
                let driver: &dyn GpioDriver = self.driver.resolve()?.as_ref();
                for (i, led) in Led::PROCESS_BAR.iter().enumerate() {
                    self.write(driver, *led, i < level)?;
                }
            }
            "clear" => {
                let driver: &dyn GpioDriver = self.driver.resolve()?.as_ref();
                for led in Led::ALL {
                    self.write(driver, *led, false)?;
                }
            }
            _ => return Ok(StepOutcome::Skipped(SkipReason::UnknownVerb)),
        }
        Ok(StepOutcome::Applied)
    }
}
