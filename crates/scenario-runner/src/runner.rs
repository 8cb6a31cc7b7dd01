//! Scenario runner: loads assets, serializes runs, owns run cancellation.
//!
//! Flow for every trigger:
//!   1. load the asset (re-read from the store each time)
//!   2. cancel whatever run is active; nothing is compensated
//!   3. wait for the run lock, so at most one scenario drives hardware
//!   4. execute with the configured `FailurePolicy`
//!
//! A trigger whose asset fails to load does not disturb the active run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use panel_core::{AssetError, AssetStore, ScenarioAsset};
use tokio_util::sync::CancellationToken;

use crate::executor::{ActionExecutor, ExecCtx, FailurePolicy, RunReport, StepFailure};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Step(#[from] StepFailure),
    #[error("Err.Run.Cancelled: runner is shut down")]
    ShutDown,
}

struct ActiveRun {
    seq: u64,
    token: CancellationToken,
}

pub struct ScenarioRunner {
    store: Arc<dyn AssetStore>,
    executor: Arc<ActionExecutor>,
    policy: FailurePolicy,
    run_lock: tokio::sync::Mutex<()>,
    active: Mutex<Option<ActiveRun>>,
    root: CancellationToken,
    seq: AtomicU64,
}

impl ScenarioRunner {
    pub fn new(store: Arc<dyn AssetStore>, executor: Arc<ActionExecutor>, policy: FailurePolicy) -> Self {
        Self {
            store,
            executor,
            policy,
            run_lock: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
            root: CancellationToken::new(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run the setup asset (initialization).
    pub async fn run_setup(&self) -> Result<RunReport, RunError> {
        let asset = self.store.load_setup()?;
        self.run_asset(asset).await
    }

    /// Reset the panel: cancel the active scene and run setup again.
    pub async fn reset(&self) -> Result<RunReport, RunError> {
        tracing::info!("runner.reset");
        self.run_setup().await
    }

    /// Run the named scene, preempting any scene in progress.
    pub async fn run_scene(&self, name: &str) -> Result<RunReport, RunError> {
        let asset = self.store.load_scenario(name)?;
        self.run_asset(asset).await
    }

    /// Cancel the active run, if any. Returns whether one was cancelled.
    pub fn cancel_current(&self) -> bool {
        let Ok(active) = self.active.lock() else {
            return false;
        };
        match active.as_ref() {
            Some(run) if !run.token.is_cancelled() => {
                tracing::info!(seq = run.seq, "runner.cancel");
                run.token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel everything and wait for the active run to wind down. Later
    /// triggers fail with `RunError::ShutDown`.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let _idle = self.run_lock.lock().await;
        tracing::info!("runner.shutdown");
    }

    async fn run_asset(&self, asset: ScenarioAsset) -> Result<RunReport, RunError> {
        if self.root.is_cancelled() {
            return Err(RunError::ShutDown);
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = self.root.child_token();
        self.cancel_current();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveRun {
                seq,
                token: token.clone(),
            });
        }

        let result = {
            let _turn = self.run_lock.lock().await;
            let ctx = ExecCtx::new(format!("run-{}-{seq}", now_nanos()), asset.name(), token);
            self.executor.run(&asset, &ctx, self.policy).await
        };

        if let Ok(mut active) = self.active.lock() {
            if active.as_ref().is_some_and(|run| run.seq == seq) {
                *active = None;
            }
        }
        result.map_err(RunError::from)
    }
}

fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
