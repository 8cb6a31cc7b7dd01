//! Button watch loop: samples the panel buttons and turns presses into
//! runner triggers.
//!
//! A press is a rising edge between two samples. The first sample only
//! primes the state, so a button held during startup does not fire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use panel_hw::{Button, GpioDriver};
use scenario_runner::runner::ScenarioRunner;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Scene(&'static str),
    Reset,
    Stop,
}

impl Trigger {
    fn for_button(button: Button) -> Self {
        match (button, button.scene()) {
            (_, Some(scene)) => Trigger::Scene(scene),
            (Button::Stop, None) => Trigger::Stop,
            (_, None) => Trigger::Reset,
        }
    }
}

#[derive(Default)]
pub struct ButtonWatcher {
    last: HashMap<Button, bool>,
    primed: bool,
}

impl ButtonWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample every button once; triggers for the buttons that went high.
    /// A pin that cannot be read counts as released.
    pub fn poll(&mut self, driver: &dyn GpioDriver) -> Vec<Trigger> {
        let mut fired = vec![];
        for &button in Button::ALL {
            let pressed = match driver.read_pin(button.pin()) {
                Ok(level) => level,
                Err(e) => {
                    tracing::warn!(button = button.name(), error = %e, "button.read_failed");
                    false
                }
            };
            let was = self.last.insert(button, pressed).unwrap_or(false);
            if self.primed && pressed && !was {
                tracing::info!(button = button.name(), "button.pressed");
                fired.push(Trigger::for_button(button));
            }
        }
        self.primed = true;
        fired
    }
}

/// Poll until `shutdown` is cancelled. Scene and reset runs are spawned so
/// a later press can preempt them; stop cancels the active run in place.
pub async fn watch(
    runner: Arc<ScenarioRunner>,
    driver: Arc<dyn GpioDriver>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut watcher = ButtonWatcher::new();
    tracing::info!(poll_ms = every.as_millis() as u64, driver = driver.kind(), "buttons.watch");

    loop {
        for trigger in watcher.poll(driver.as_ref()) {
            dispatch(&runner, trigger);
        }

        tokio::select! {
            _ = tokio::time::sleep(every) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("buttons.watch stopped");
                return;
            }
        }
    }
}

fn dispatch(runner: &Arc<ScenarioRunner>, trigger: Trigger) {
    match trigger {
        Trigger::Stop => {
            runner.cancel_current();
        }
        Trigger::Scene(name) => {
            let runner = runner.clone();
            tokio::spawn(async move {
                match runner.run_scene(name).await {
                    Ok(report) => tracing::info!(
                        scene = name,
                        applied = report.applied,
                        cancelled = report.cancelled,
                        "scene.finished"
                    ),
                    Err(e) => tracing::error!(scene = name, error = %e, "scene.failed"),
                }
            });
        }
        Trigger::Reset => {
            let runner = runner.clone();
            tokio::spawn(async move {
                if let Err(e) = runner.reset().await {
                    tracing::error!(error = %e, "reset.failed");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_hw::SimulatedGpio;

    #[test]
    fn fires_on_rising_edge_only() {
        let gpio = SimulatedGpio::new();
        let mut w = ButtonWatcher::new();
        assert!(w.poll(&gpio).is_empty());

        gpio.drive_input(Button::Scene2.pin(), true);
        assert_eq!(w.poll(&gpio), vec![Trigger::Scene("scene2")]);
        // still held
        assert!(w.poll(&gpio).is_empty());

        gpio.drive_input(Button::Scene2.pin(), false);
        assert!(w.poll(&gpio).is_empty());
        gpio.drive_input(Button::Scene2.pin(), true);
        assert_eq!(w.poll(&gpio), vec![Trigger::Scene("scene2")]);
    }

    #[test]
    fn held_at_startup_does_not_fire() {
        let gpio = SimulatedGpio::new();
        gpio.drive_input(Button::Reset.pin(), true);
        let mut w = ButtonWatcher::new();
        assert!(w.poll(&gpio).is_empty());
        assert!(w.poll(&gpio).is_empty());
    }

    #[test]
    fn control_buttons_map_to_reset_and_stop() {
        assert_eq!(Trigger::for_button(Button::Reset), Trigger::Reset);
        assert_eq!(Trigger::for_button(Button::Stop), Trigger::Stop);
        assert_eq!(Trigger::for_button(Button::Scene4), Trigger::Scene("scene4"));
    }
}
