//! End-to-end scenario tests for the panel runtime.
//!
//! These tests wire a full `Panel` in simulated mode and drive it through
//! the runner: GPIO levels, MQTT deliveries, player calls, skips and errors.

use std::sync::Arc;
use std::time::Duration;

use panel_core::{AssetStore, ScenarioAsset, ScenarioStep};
use panel_hw::Led;
use scenario_runner::assets::{DirStore, MemoryStore};
use scenario_runner::config::PanelConfig;
use scenario_runner::errors::ErrorCode;
use scenario_runner::executor::FailurePolicy;
use scenario_runner::panel::Panel;
use scenario_runner::runner::RunError;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn simulated(policy: FailurePolicy) -> PanelConfig {
    let mut cfg = PanelConfig {
        mode: "simulated".into(),
        failure_policy: policy,
        ..PanelConfig::default()
    };
    cfg.link.reconnect_delay = Duration::from_millis(10);
    cfg.link.shutdown_timeout = Duration::from_millis(200);
    cfg
}

fn steps(raw: serde_json::Value) -> Vec<ScenarioStep> {
    serde_json::from_value(raw).unwrap()
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "scenario-e2e-{}-{:?}",
        name,
        std::thread::current().id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("scenes")).unwrap();
    dir
}

async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let reached = tokio::time::timeout(Duration::from_secs(3), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for: {what}");
}

fn led_is_on(panel: &Panel, led: Led) -> bool {
    panel.gpio().resolve().unwrap().read_pin(led.pin()).unwrap()
}

// ---------------------------------------------------------------------------
// Test 1: three-step scenario (gpio, mqtt, unknown action)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_step_scenario_applies_publishes_and_skips() {
    let scene = ScenarioAsset::scene(
        "scene1",
        steps(serde_json::json!([
            {"action": "gpio.on", "args": {"led": "SystemGreen"}},
            {"action": "mqtt.publish", "args": {"topic": "x", "payload": "1"}},
            {"action": "nonsense.verb"}
        ])),
    )
    .unwrap();
    let store: Arc<dyn AssetStore> = Arc::new(MemoryStore::new().with(scene));
    let panel = Panel::with_store(&simulated(FailurePolicy::Abort), store);

    let report = panel.runner().run_scene("scene1").await.unwrap();
    assert_eq!(report.steps, 3);
    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.is_clean());

    assert!(led_is_on(&panel, Led::SystemGreen));

    let broker = panel.simulated_broker().expect("messaging was bound");
    eventually("mqtt delivery", || broker.delivered().len() == 1).await;
    let msg = &broker.delivered()[0];
    assert_eq!(msg.topic, "x");
    assert_eq!(msg.payload, "1");

    panel.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test 2: setup + scene from an asset directory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn setup_then_scene_from_directory() {
    let dir = temp_dir("dir");
    std::fs::write(
        dir.join("setup.json"),
        serde_json::json!([
            {"action": "gpio.clear"},
            {"action": "gpio.on", "args": {"led": "SystemGreen"}},
            {"action": "audio.reset"},
            {"action": "video.reset"}
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.join("scenes/scene2.json"),
        serde_json::json!({"steps": [
            {"action": "GPIO.On", "args": {"leds": ["Scene2Lamp"]}},
            {"action": "gpio.bar", "args": {"level": 3}},
            {"action": "video.play", "args": {"item": "scene2.mp4"}},
            {"action": "mqtt.publish", "args": {"topic": "panel/scene", "payload": {"scene": 2}}}
        ]})
        .to_string(),
    )
    .unwrap();

    let mut cfg = simulated(FailurePolicy::Abort);
    cfg.assets_dir = dir.clone();
    let panel = Panel::with_store(&cfg, Arc::new(DirStore::new(&dir)));
    let runner = panel.runner();

    let setup = runner.run_setup().await.unwrap();
    assert_eq!(setup.applied, 4);
    let scene = runner.run_scene("scene2").await.unwrap();
    assert_eq!(scene.applied, 4);

    assert!(led_is_on(&panel, Led::SystemGreen));
    assert!(led_is_on(&panel, Led::Scene2Lamp));
    assert!(led_is_on(&panel, Led::ProcessBar3));
    assert!(!led_is_on(&panel, Led::ProcessBar4));

    let broker = panel.simulated_broker().unwrap();
    eventually("scene publish", || broker.delivered().len() == 1).await;
    assert_eq!(broker.delivered()[0].payload, r#"{"scene":2}"#);

    panel.shutdown().await;
}

// ---------------------------------------------------------------------------
// Test 3: failure policies
// ---------------------------------------------------------------------------

fn failing_scene() -> Arc<dyn AssetStore> {
    let scene = ScenarioAsset::scene(
        "broken",
        steps(serde_json::json!([
            {"action": "gpio.on", "args": {"led": "NoSuchLed"}},
            {"action": "gpio.on", "args": {"led": "SystemRed"}}
        ])),
    )
    .unwrap();
    Arc::new(MemoryStore::new().with(scene))
}

#[tokio::test]
async fn abort_policy_stops_at_bad_step() {
    let panel = Panel::with_store(&simulated(FailurePolicy::Abort), failing_scene());
    let err = panel.runner().run_scene("broken").await.unwrap_err();
    match err {
        RunError::Step(failure) => {
            assert_eq!(failure.index, 0);
            assert_eq!(failure.error.code, ErrorCode::ArgInvalid);
        }
        other => panic!("expected step failure, got {other:?}"),
    }
    assert!(panel.gpio().get().is_none(), "gpio never needed, never bound");
}

#[tokio::test]
async fn continue_policy_runs_remaining_steps() {
    let panel = Panel::with_store(&simulated(FailurePolicy::Continue), failing_scene());
    let report = panel.runner().run_scene("broken").await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.applied, 1);
    assert!(led_is_on(&panel, Led::SystemRed));
}

// ---------------------------------------------------------------------------
// Test 4: a bad PANEL_MODE surfaces as a binding error on first use
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_mode_fails_the_first_hardware_step() {
    let scene = ScenarioAsset::scene(
        "s",
        steps(serde_json::json!([{"action": "gpio.on", "args": {"led": "SystemGreen"}}])),
    )
    .unwrap();
    let cfg = PanelConfig {
        mode: "quantum".into(),
        ..simulated(FailurePolicy::Abort)
    };
    let panel = Panel::with_store(&cfg, Arc::new(MemoryStore::new().with(scene)));

    for _ in 0..2 {
        let Err(RunError::Step(failure)) = panel.runner().run_scene("s").await else {
            panic!("expected binding failure");
        };
        assert_eq!(failure.error.code, ErrorCode::BindingPredicate);
    }
}

// ---------------------------------------------------------------------------
// Test 5: shutdown without any bound capability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_of_idle_panel() {
    let panel = Panel::with_store(&simulated(FailurePolicy::Abort), Arc::new(MemoryStore::new()));
    panel.shutdown().await;
    assert!(panel.link().get().is_none());
    assert!(panel.simulated_broker().is_none());
    assert!(matches!(
        panel.runner().run_scene("anything").await,
        Err(RunError::Asset(_))
    ));
}
