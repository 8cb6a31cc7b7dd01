//! `audio.*` and `video.*` steps. One `PlayerRouter` per domain, both over
//! the same player binding.
//!
//! Verbs: `play {item?}`, `pause`, `resume`, `stop`, `next`, `previous`,
//! `volume {level}` (percent, clamped to 0..=100), `seek {position}`
//! (seconds), `loop {enabled}` (default true), `reset`.
//!
//! Player commands go straight over HTTP, so a failed command fails the
//! step with `Err.IO.Transport`. A command still in flight when the run is
//! cancelled is abandoned and the step reports `Err.Run.Cancelled`.

use std::sync::Arc;

use async_trait::async_trait;
use panel_core::{args, ActionKey, Args, ScenarioStep};

use super::PlayerBinding;
use crate::adapters::player::{Player, PlayerCommand};
use crate::errors::{ErrorCode, StepError};
use crate::executor::{DomainRouter, ExecCtx, SkipReason, StepOutcome};

enum PlayerOp {
    Command(PlayerCommand),
    Reset,
}

pub struct PlayerRouter {
    player: Player,
    client: Arc<PlayerBinding>,
}

impl PlayerRouter {
    pub fn audio(client: Arc<PlayerBinding>) -> Self {
        Self {
            player: Player::Audio,
            client,
        }
    }

    pub fn video(client: Arc<PlayerBinding>) -> Self {
        Self {
            player: Player::Video,
            client,
        }
    }
}

/// Decode `verb` + args. `Ok(None)` for a verb this domain does not know.
fn decode(verb: &str, args: Option<&Args>) -> Result<Option<PlayerOp>, StepError> {
    let cmd = match verb {
        "play" => PlayerCommand::Play {
            item: Some(args::get_string(args, "item", ""))
                .filter(|s| !s.trim().is_empty()),
        },
        "pause" => PlayerCommand::Pause,
        "resume" => PlayerCommand::Resume,
        "stop" => PlayerCommand::Stop,
        "next" => PlayerCommand::Next,
        "previous" => PlayerCommand::Previous,
        "volume" => {
            let level = args::get_required_int(args, "level")?.clamp(0, 100);
            PlayerCommand::Volume(level as u8)
        }
        "seek" => {
            let position = args::get_required_int(args, "position")?;
            let secs = u32::try_from(position).map_err(|_| {
                StepError::new(
                    ErrorCode::ArgInvalid,
                    format!("argument 'position' must be 0..={} seconds (got {position})", u32::MAX),
                )
            })?;
            PlayerCommand::Seek(secs)
        }
        "loop" => PlayerCommand::Loop(args::get_bool(args, "enabled", true)),
        "reset" => return Ok(Some(PlayerOp::Reset)),
        _ => return Ok(None),
    };
    Ok(Some(PlayerOp::Command(cmd)))
}

#[async_trait]
impl DomainRouter for PlayerRouter {
    fn domain(&self) -> &'static str {
        self.player.as_str()
    }

    async fn execute(
        &self,
        key: &ActionKey,
        step: &ScenarioStep,
        ctx: &ExecCtx,
    ) -> Result<StepOutcome, StepError> {
        let Some(verb) = key.verb() else {
            return Ok(StepOutcome::Skipped(SkipReason::UnknownVerb));
        };
        let Some(op) = decode(verb, step.args())? else {
            return Ok(StepOutcome::Skipped(SkipReason::UnknownVerb));
        };
        let client = self.client.resolve()?;

        ctx.check_cancelled()?;
        let send = async {
            match &op {
                PlayerOp::Command(cmd) => client.send_command(self.player, cmd, &ctx.cancel).await,
                PlayerOp::Reset => client.reset(self.player, &ctx.cancel).await,
            }
        };
        let sent = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(StepError::cancelled()),
            sent = send => sent,
        };
        sent.map_err(|e| StepError::transport(format!("{} {verb} failed", self.player), e))?;

        tracing::debug!(
            run_id = %ctx.run_id,
            step = ctx.step_index,
            player = %self.player,
            verb = verb,
            client = client.kind(),
            "player.done"
        );
        Ok(StepOutcome::Applied)
    }
}
