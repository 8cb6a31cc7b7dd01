//! ActionExecutor: walks an asset's steps and routes each to its domain router.
//!
//! The executor owns no domain logic. For every step it parses the action
//! key, looks the domain up in the `RouterRegistry`, and awaits the router.
//! Unknown actions are logged and skipped; a router failure is always
//! returned to the caller, tagged with the step index.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use panel_core::{ActionKey, ScenarioAsset, ScenarioStep};
use tokio_util::sync::CancellationToken;

use crate::errors::StepError;
use crate::registry::RouterRegistry;

// ---------------------------------------------------------------------------
// ExecCtx: context passed to every router call
// ---------------------------------------------------------------------------

/// Execution context for one step. Cloned per step; the token is shared by
/// every step of the run.
#[derive(Clone, Debug)]
pub struct ExecCtx {
    pub run_id: String,
    pub scenario: String,
    pub step_index: usize,
    pub cancel: CancellationToken,
}

impl ExecCtx {
    pub fn new(run_id: impl Into<String>, scenario: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            run_id: run_id.into(),
            scenario: scenario.into(),
            step_index: 0,
            cancel,
        }
    }

    pub fn for_step(&self, index: usize) -> Self {
        Self {
            step_index: index,
            ..self.clone()
        }
    }

    /// Fails with `Err.Run.Cancelled` once the run's token is cancelled.
    /// Routers call this before every publish or HTTP command.
    pub fn check_cancelled(&self) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            return Err(StepError::cancelled());
        }
        Ok(())
    }

    /// Sleep that ends early, with `Err.Run.Cancelled`, when the run is cancelled.
    pub async fn sleep(&self, delay: Duration) -> Result<(), StepError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StepError::cancelled()),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Step outcome
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    EmptyAction,
    MalformedAction,
    UnknownDomain,
    UnknownVerb,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EmptyAction => "empty_action",
            Self::MalformedAction => "malformed_action",
            Self::UnknownDomain => "unknown_domain",
            Self::UnknownVerb => "unknown_verb",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Skipped(SkipReason),
}

// ---------------------------------------------------------------------------
// Router trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DomainRouter: Send + Sync {
    /// Domain prefix this router answers for (`gpio`, `mqtt`, …).
    fn domain(&self) -> &'static str;

    /// Interpret `key.verb` with the step's args. An unrecognized verb is
    /// `Ok(StepOutcome::Skipped(SkipReason::UnknownVerb))`, never an error.
    async fn execute(
        &self,
        key: &ActionKey,
        step: &ScenarioStep,
        ctx: &ExecCtx,
    ) -> Result<StepOutcome, StepError>;
}

// ---------------------------------------------------------------------------
// Failure policy and run report
// ---------------------------------------------------------------------------

/// What the run does after a step fails. Failed steps are never retried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" | "" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(format!("unknown failure policy '{other}' (expected abort or continue)")),
        }
    }
}

/// A failed step, tagged with its position in the asset.
#[derive(Debug, thiserror::Error)]
#[error("step {index} ({action}) failed: {error}")]
pub struct StepFailure {
    pub index: usize,
    pub action: String,
    #[source]
    pub error: StepError,
}

/// Result of a scenario run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub scenario: String,
    pub run_id: String,
    /// Steps attempted (applied + skipped + failed).
    pub steps: usize,
    pub applied: usize,
    pub skipped: usize,
    /// Failures recorded under `FailurePolicy::Continue`.
    pub failures: Vec<StepFailure>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

// ---------------------------------------------------------------------------
// ActionExecutor
// ---------------------------------------------------------------------------

pub struct ActionExecutor {
    registry: Arc<RouterRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<RouterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RouterRegistry {
        &self.registry
    }

    /// Dispatch one step. Unknown actions come back as `Skipped`.
    pub async fn execute_step(
        &self,
        step: &ScenarioStep,
        ctx: &ExecCtx,
    ) -> Result<StepOutcome, StepError> {
        let Some(key) = ActionKey::parse(&step.action) else {
            let reason = if step.action.trim().is_empty() {
                SkipReason::EmptyAction
            } else {
                SkipReason::MalformedAction
            };
            log_unknown(ctx, &step.action, reason);
            return Ok(StepOutcome::Skipped(reason));
        };

        let Some(router) = self.registry.try_resolve(&key.domain) else {
            log_unknown(ctx, &step.action, SkipReason::UnknownDomain);
            return Ok(StepOutcome::Skipped(SkipReason::UnknownDomain));
        };

        let outcome = router.execute(&key, step, ctx).await?;
        if let StepOutcome::Skipped(reason) = outcome {
            log_unknown(ctx, &step.action, reason);
        }
        Ok(outcome)
    }

    /// Run every step of `asset` in order.
    ///
    /// Cancellation is checked before each step and ends the run with
    /// `report.cancelled = true`. Under `Abort` the first failure is returned
    /// as `Err`; under `Continue` it is logged, recorded and the run goes on.
    pub async fn run(
        &self,
        asset: &ScenarioAsset,
        ctx: &ExecCtx,
        policy: FailurePolicy,
    ) -> Result<RunReport, StepFailure> {
        let t0 = std::time::Instant::now();
        let mut report = RunReport {
            scenario: asset.name().to_string(),
            run_id: ctx.run_id.clone(),
            ..RunReport::default()
        };

        tracing::info!(
            run_id = %ctx.run_id,
            scenario = %asset.name(),
            kind = ?asset.kind(),
            steps = asset.len(),
            policy = ?policy,
            "scenario.start"
        );

        for (index, step) in asset.steps().iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let step_ctx = ctx.for_step(index);
            let ts = std::time::Instant::now();
            report.steps += 1;

            match self.execute_step(step, &step_ctx).await {
                Ok(StepOutcome::Applied) => report.applied += 1,
                Ok(StepOutcome::Skipped(_)) => report.skipped += 1,
                Err(e) if e.is_cancelled() => {
                    report.cancelled = true;
                    break;
                }
                Err(error) => {
                    tracing::warn!(
                        run_id = %ctx.run_id,
                        step = index,
                        action = %step.action,
                        code = %error.code,
                        error = %error.message,
                        "step.failed"
                    );
                    let failure = StepFailure {
                        index,
                        action: step.action.clone(),
                        error,
                    };
                    match policy {
                        FailurePolicy::Abort => {
                            tracing::warn!(run_id = %ctx.run_id, step = index, "scenario.halt");
                            return Err(failure);
                        }
                        FailurePolicy::Continue => {
                            report.failures.push(failure);
                            continue;
                        }
                    }
                }
            }

            tracing::debug!(
                run_id = %ctx.run_id,
                step = index,
                action = %step.action,
                elapsed_ms = ts.elapsed().as_millis() as u64,
                "step.done"
            );
        }

        report.elapsed_ms = t0.elapsed().as_millis() as u64;
        if report.cancelled {
            tracing::info!(run_id = %ctx.run_id, scenario = %report.scenario, applied = report.applied, "scenario.cancelled");
        } else {
            tracing::info!(
                run_id = %ctx.run_id,
                scenario = %report.scenario,
                applied = report.applied,
                skipped = report.skipped,
                failed = report.failures.len(),
                elapsed_ms = report.elapsed_ms,
                "scenario.end"
            );
        }
        Ok(report)
    }
}

fn log_unknown(ctx: &ExecCtx, action: &str, reason: SkipReason) {
    tracing::warn!(
        run_id = %ctx.run_id,
        scenario = %ctx.scenario,
        step = ctx.step_index,
        action = %action,
        reason = %reason,
        "action.unknown"
    );
}
