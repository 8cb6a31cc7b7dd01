use std::time::Duration;

use clap::Parser;
use scenario_runner::config::PanelConfig;
use scenario_runner::panel::Panel;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod buttons;

// ---------------------------------------------------------------------------
// Control panel host
//
// Startup: config from env → panel wiring → setup asset → button watch.
// A `--scene` run executes one scene after setup and exits.
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "panel", version, about = "Control-panel scenario host")]
struct Cli {
    /// Run this scene once after setup, then exit
    #[arg(long, env = "PANEL_SCENE")]
    scene: Option<String>,
    /// Skip the setup asset at startup
    #[arg(long)]
    no_setup: bool,
    /// Button sampling period in milliseconds
    #[arg(long, env = "PANEL_POLL_MS", default_value_t = 50)]
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "panel=info,scenario_runner=info,mqtt_link=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = PanelConfig::from_env()?;
    tracing::info!(
        mode = %cfg.mode,
        assets = %cfg.assets_dir.display(),
        policy = ?cfg.failure_policy,
        "panel.start"
    );

    let panel = Panel::from_config(&cfg);
    let runner = panel.runner();

    if !cli.no_setup {
        match runner.run_setup().await {
            Ok(report) => tracing::info!(applied = report.applied, skipped = report.skipped, "setup.done"),
            Err(e) => tracing::error!(error = %e, "setup.failed"),
        }
    }

    if let Some(scene) = cli.scene {
        let outcome = runner.run_scene(&scene).await;
        panel.shutdown().await;
        let report = outcome?;
        tracing::info!(
            scene = %scene,
            applied = report.applied,
            skipped = report.skipped,
            failed = report.failures.len(),
            "scene.done"
        );
        return Ok(());
    }

    let driver = panel.gpio().resolve()?.clone();
    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(buttons::watch(
        runner,
        driver,
        Duration::from_millis(cli.poll_ms.max(1)),
        shutdown.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("panel.signal");
    shutdown.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "buttons.watch task failed");
    }
    panel.shutdown().await;
    Ok(())
}
