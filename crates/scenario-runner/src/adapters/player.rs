//! Player seam: `send_command(player, command)` and `reset(player)`.
//!
//! Both take the run's cancellation token. A client that waits on the
//! network stops waiting once it fires.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Which media player a command targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    Audio,
    Video,
}

impl Player {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where one VLC instance listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerEndpoint {
    pub base_url: String,
    pub password: String,
}

impl PlayerEndpoint {
    pub fn new(base_url: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            password: password.into(),
        }
    }

    pub fn status_url(&self) -> String {
        format!("{}/requests/status.xml", self.base_url)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Resume the playlist, or enqueue and start `item` when given.
    Play { item: Option<String> },
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    /// Volume in percent, 0..=100.
    Volume(u8),
    /// Absolute position in seconds.
    Seek(u32),
    /// Repeat the whole playlist.
    Loop(bool),
}

impl PlayerCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Volume(_) => "volume",
            Self::Seek(_) => "seek",
            Self::Loop(_) => "loop",
        }
    }
}

#[async_trait]
pub trait PlayerClient: Send + Sync {
    async fn send_command(
        &self,
        player: Player,
        command: &PlayerCommand,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;

    /// Stop playback and clear the playlist.
    async fn reset(&self, player: Player, cancel: &CancellationToken) -> anyhow::Result<()>;

    /// Short client name for logs.
    fn kind(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// LoggingPlayer: logs commands, talks to nothing.
// Used as the real side when the crate is built without `live`.
// ---------------------------------------------------------------------------

pub struct LoggingPlayer;

#[async_trait]
impl PlayerClient for LoggingPlayer {
    async fn send_command(
        &self,
        player: Player,
        command: &PlayerCommand,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::info!(player = %player, command = ?command, "player.command (no http adapter)");
        Ok(())
    }

    async fn reset(&self, player: Player, _cancel: &CancellationToken) -> anyhow::Result<()> {
        tracing::info!(player = %player, "player.reset (no http adapter)");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "logging"
    }
}

// ---------------------------------------------------------------------------
// SimulatedPlayer: records every call.
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerCall {
    Command(Player, PlayerCommand),
    Reset(Player),
}

#[derive(Default)]
pub struct SimulatedPlayer {
    calls: Mutex<Vec<PlayerCall>>,
}

impl SimulatedPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: PlayerCall) -> anyhow::Result<()> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("simulated player lock poisoned"))?
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl PlayerClient for SimulatedPlayer {
    async fn send_command(
        &self,
        player: Player,
        command: &PlayerCommand,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::debug!(player = %player, command = command.name(), "player.command (simulated)");
        self.record(PlayerCall::Command(player, command.clone()))
    }

    async fn reset(&self, player: Player, _cancel: &CancellationToken) -> anyhow::Result<()> {
        tracing::debug!(player = %player, "player.reset (simulated)");
        self.record(PlayerCall::Reset(player))
    }

    fn kind(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_player_records_in_order() {
        let p = SimulatedPlayer::new();
        let cancel = CancellationToken::new();
        p.send_command(Player::Video, &PlayerCommand::Next, &cancel).await.unwrap();
        p.reset(Player::Audio, &cancel).await.unwrap();
        assert_eq!(
            p.calls(),
            vec![
                PlayerCall::Command(Player::Video, PlayerCommand::Next),
                PlayerCall::Reset(Player::Audio),
            ]
        );
    }

    #[tokio::test]
    async fn logging_player_accepts_everything() {
        let p = LoggingPlayer;
        let cancel = CancellationToken::new();
        p.send_command(Player::Audio, &PlayerCommand::Volume(40), &cancel).await.unwrap();
        p.reset(Player::Video, &cancel).await.unwrap();
        assert_eq!(p.kind(), "logging");
    }
}
