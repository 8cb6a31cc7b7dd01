//! Panel wiring: bindings, routers, runner.
//!
//! Three capabilities are mode-selected, each with its own predicate built
//! from `PANEL_MODE`:
//!
//! | capability | real                         | simulated                     |
//! |------------|------------------------------|-------------------------------|
//! | gpio       | `SysfsGpio`                  | `SimulatedGpio`               |
//! | messaging  | `MessagingClient` + rumqttc  | `MessagingClient` + loopback  |
//! | player     | `VlcHttpClient` (`live`)     | `SimulatedPlayer`             |
//!
//! Nothing is built until a step first needs it.

use std::sync::{Arc, OnceLock};

use mqtt_link::{LoopbackHandle, LoopbackTransport, MessagingClient, RumqttTransport};
use panel_core::{AssetStore, Mode, ModeBinding};
use panel_hw::{GpioDriver, SimulatedGpio, SysfsGpio};

use crate::adapters::player::{PlayerClient, SimulatedPlayer};
use crate::assets::DirStore;
use crate::config::PanelConfig;
use crate::executor::ActionExecutor;
use crate::registry::RouterRegistry;
use crate::routers::{GpioBinding, GpioRouter, LinkBinding, MqttRouter, PlayerBinding, PlayerRouter};
use crate::runner::ScenarioRunner;

pub struct Panel {
    gpio: Arc<GpioBinding>,
    link: Arc<LinkBinding>,
    player: Arc<PlayerBinding>,
    broker: Arc<OnceLock<LoopbackHandle>>,
    runner: Arc<ScenarioRunner>,
}

impl Panel {
    /// Panel reading its assets from `cfg.assets_dir`.
    pub fn from_config(cfg: &PanelConfig) -> Self {
        Self::with_store(cfg, Arc::new(DirStore::new(cfg.assets_dir.clone())))
    }

    pub fn with_store(cfg: &PanelConfig, store: Arc<dyn AssetStore>) -> Self {
        let gpio_base = cfg.gpio_base.clone();
        let gpio: Arc<GpioBinding> = Arc::new(
            ModeBinding::new(
                Mode::predicate(&cfg.mode),
                move || -> Arc<dyn GpioDriver> { Arc::new(SysfsGpio::new(gpio_base.clone())) },
                || -> Arc<dyn GpioDriver> { Arc::new(SimulatedGpio::new()) },
            )
            .named("gpio"),
        );

        let broker = Arc::new(OnceLock::new());
        let real_link = cfg.link.clone();
        let sim_link = cfg.link.clone();
        let sim_broker = broker.clone();
        let link: Arc<LinkBinding> = Arc::new(
            ModeBinding::new(
                Mode::predicate(&cfg.mode),
                move || {
                    let client = Arc::new(MessagingClient::new(real_link.clone()));
                    client.start(RumqttTransport::new(&real_link));
                    client
                },
                move || {
                    let (transport, handle) = LoopbackTransport::new(true);
                    let _ = sim_broker.set(handle);
                    let client = Arc::new(MessagingClient::new(sim_link.clone()));
                    client.start(transport);
                    client
                },
            )
            .named("messaging"),
        );

        let audio = cfg.audio.clone();
        let video = cfg.video.clone();
        let player: Arc<PlayerBinding> = Arc::new(
            ModeBinding::new(
                Mode::predicate(&cfg.mode),
                move || real_player(&audio, &video),
                || -> Arc<dyn PlayerClient> { Arc::new(SimulatedPlayer::new()) },
            )
            .named("player"),
        );

        let registry = RouterRegistry::new()
            .with(Arc::new(GpioRouter::new(gpio.clone())))
            .with(Arc::new(MqttRouter::new(link.clone())))
            .with(Arc::new(PlayerRouter::audio(player.clone())))
            .with(Arc::new(PlayerRouter::video(player.clone())));
        tracing::info!(domains = ?registry.domains(), mode = %cfg.mode, "panel.wired");

        let executor = Arc::new(ActionExecutor::new(Arc::new(registry)));
        let runner = Arc::new(ScenarioRunner::new(store, executor, cfg.failure_policy));

        Self {
            gpio,
            link,
            player,
            broker,
            runner,
        }
    }

    pub fn runner(&self) -> Arc<ScenarioRunner> {
        self.runner.clone()
    }

    pub fn gpio(&self) -> Arc<GpioBinding> {
        self.gpio.clone()
    }

    pub fn link(&self) -> Arc<LinkBinding> {
        self.link.clone()
    }

    pub fn player(&self) -> Arc<PlayerBinding> {
        self.player.clone()
    }

    /// Broker side of the simulated messaging link, once it has been bound.
    pub fn simulated_broker(&self) -> Option<LoopbackHandle> {
        self.broker.get().cloned()
    }

    /// Stop the runner, then the messaging client if it was ever bound.
    pub async fn shutdown(&self) {
        self.runner.shutdown().await;
        if let Some(client) = self.link.get() {
            client.stop().await;
        }
        tracing::info!("panel.shutdown");
    }
}

#[cfg(feature = "live")]
fn real_player(
    audio: &crate::adapters::player::PlayerEndpoint,
    video: &crate::adapters::player::PlayerEndpoint,
) -> Arc<dyn PlayerClient> {
    match crate::adapters::vlc::VlcHttpClient::new(audio.clone(), video.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "player.vlc unavailable, commands will be logged only");
            Arc::new(crate::adapters::player::LoggingPlayer)
        }
    }
}

#[cfg(not(feature = "live"))]
fn real_player(
    _audio: &crate::adapters::player::PlayerEndpoint,
    _video: &crate::adapters::player::PlayerEndpoint,
) -> Arc<dyn PlayerClient> {
    Arc::new(crate::adapters::player::LoggingPlayer)
}
