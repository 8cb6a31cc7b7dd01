//! VLC HTTP interface client.
//!
//! - `GET <base>/requests/status.xml?command=<cmd>[&input=..|&val=..]`
//! - HTTP basic auth, empty user, configured password
//! - Timeout 5s, exponential retries on send errors and 5xx (default max 2)
//! - Requests and retry pauses give up as soon as the run is cancelled
//!
//! VLC only exposes loop as a toggle (`pl_loop`), so the client keeps the
//! loop flag it last set per player and sends the toggle only on change.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::player::{Player, PlayerClient, PlayerCommand, PlayerEndpoint};

pub struct VlcHttpClient {
    inner: reqwest::Client,
    audio: PlayerEndpoint,
    video: PlayerEndpoint,
    max_retries: u32,
    looping: Mutex<HashMap<Player, bool>>,
}

impl VlcHttpClient {
    pub fn new(audio: PlayerEndpoint, video: PlayerEndpoint) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| anyhow::anyhow!("building vlc http client: {e}"))?;
        Ok(Self {
            inner,
            audio,
            video,
            max_retries: 2,
            looping: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    fn endpoint(&self, player: Player) -> &PlayerEndpoint {
        match player {
            Player::Audio => &self.audio,
            Player::Video => &self.video,
        }
    }

    fn loop_state(&self, player: Player) -> anyhow::Result<bool> {
        let looping = self
            .looping
            .lock()
            .map_err(|_| anyhow::anyhow!("vlc loop state lock poisoned"))?;
        Ok(looping.get(&player).copied().unwrap_or(false))
    }

    fn set_loop_state(&self, player: Player, on: bool) -> anyhow::Result<()> {
        self.looping
            .lock()
            .map_err(|_| anyhow::anyhow!("vlc loop state lock poisoned"))?
            .insert(player, on);
        Ok(())
    }

    /// One status.xml request with retries.
    async fn request(
        &self,
        player: Player,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let endpoint = self.endpoint(player);
        let url = endpoint.status_url();
        let t0 = std::time::Instant::now();
        let mut retries = 0u32;

        loop {
            let req = self
                .inner
                .get(&url)
                .basic_auth("", Some(&endpoint.password))
                .query(query);

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(player, &url)),
                sent = req.send() => sent,
            };

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    tracing::debug!(
                        player = %player,
                        url = %url,
                        status = status.as_u16(),
                        retries = retries,
                        latency_ms = t0.elapsed().as_millis() as u64,
                        "vlc.request"
                    );

                    if status.is_server_error() && retries < self.max_retries {
                        retries += 1;
                        pause(cancel, backoff(retries)).await.map_err(|_| cancelled(player, &url))?;
                        continue;
                    }
                    if !status.is_success() {
                        return Err(anyhow::anyhow!("vlc {player} answered {status} for {url}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tracing::warn!(player = %player, error = %e, retry = retries, "vlc.request.retry");
                        pause(cancel, backoff(retries)).await.map_err(|_| cancelled(player, &url))?;
                        continue;
                    }
                    return Err(anyhow::anyhow!(
                        "vlc {player} request failed after {retries} retries: {e}"
                    ));
                }
            }
        }
    }

    async fn command(&self, player: Player, cmd: &str, cancel: &CancellationToken) -> anyhow::Result<()> {
        self.request(player, &[("command", cmd.to_string())], cancel).await
    }
}

fn backoff(retry: u32) -> Duration {
    Duration::from_millis(100 * 2u64.pow(retry))
}

/// Sleep unless cancelled first.
async fn pause(cancel: &CancellationToken, delay: Duration) -> Result<(), ()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(()),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn cancelled(player: Player, url: &str) -> anyhow::Error {
    anyhow::anyhow!("vlc {player} request to {url} cancelled")
}

/// VLC's volume scale: 256 is 100%.
fn vlc_volume(percent: u8) -> u32 {
    u32::from(percent.min(100)) * 256 / 100
}

#[async_trait]
impl PlayerClient for VlcHttpClient {
    async fn send_command(
        &self,
        player: Player,
        command: &PlayerCommand,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::info!(player = %player, command = command.name(), "player.command");
        match command {
            PlayerCommand::Play { item: Some(item) } => {
                self.request(
                    player,
                    &[("command", "in_play".to_string()), ("input", item.clone())],
                    cancel,
                )
                .await
            }
            PlayerCommand::Play { item: None } => self.command(player, "pl_play", cancel).await,
            PlayerCommand::Pause => self.command(player, "pl_forcepause", cancel).await,
            PlayerCommand::Resume => self.command(player, "pl_forceresume", cancel).await,
            PlayerCommand::Stop => self.command(player, "pl_stop", cancel).await,
            PlayerCommand::Next => self.command(player, "pl_next", cancel).await,
            PlayerCommand::Previous => self.command(player, "pl_previous", cancel).await,
            PlayerCommand::Volume(pct) => {
                self.request(
                    player,
                    &[("command", "volume".to_string()), ("val", vlc_volume(*pct).to_string())],
                    cancel,
                )
                .await
            }
            PlayerCommand::Seek(secs) => {
                self.request(
                    player,
                    &[("command", "seek".to_string()), ("val", secs.to_string())],
                    cancel,
                )
                .await
            }
            PlayerCommand::Loop(on) => {
                if self.loop_state(player)? == *on {
                    return Ok(());
                }
                self.command(player, "pl_loop", cancel).await?;
                self.set_loop_state(player, *on)
            }
        }
    }

    async fn reset(&self, player: Player, cancel: &CancellationToken) -> anyhow::Result<()> {
        tracing::info!(player = %player, "player.reset");
        self.command(player, "pl_stop", cancel).await?;
        self.command(player, "pl_empty", cancel).await?;
        if self.loop_state(player)? {
            self.command(player, "pl_loop", cancel).await?;
            self.set_loop_state(player, false)?;
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "vlc-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP responder: records request lines, answers `status`.
    async fn fake_vlc(status: u16) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                log.lock().unwrap().push(head.lines().next().unwrap_or("").to_string());
                let resp = format!(
                    "HTTP/1.1 {status} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
                let _ = sock.write_all(resp.as_bytes()).await;
            }
        });
        (base, seen)
    }

    /// Accepts and reads requests, never answers.
    async fn stalled_vlc() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        tokio::spawn(async move {
            let mut held = vec![];
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                log.lock().unwrap().push(head.lines().next().unwrap_or("").to_string());
                held.push(sock);
            }
        });
        (base, seen)
    }

    fn client(base: &str) -> VlcHttpClient {
        VlcHttpClient::new(PlayerEndpoint::new(base, "pw"), PlayerEndpoint::new(base, "pw"))
            .unwrap()
            .with_max_retries(0)
    }

    fn live() -> CancellationToken {
        CancellationToken::new()
    }

    fn cancel_after(ms: u64) -> CancellationToken {
        let token = CancellationToken::new();
        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            t.cancel();
        });
        token
    }

    #[tokio::test]
    async fn commands_map_to_status_requests() {
        let (base, seen) = fake_vlc(200).await;
        let vlc = client(&base);

        vlc.send_command(Player::Video, &PlayerCommand::Next, &live()).await.unwrap();
        vlc.send_command(Player::Audio, &PlayerCommand::Volume(50), &live()).await.unwrap();
        vlc.send_command(
            Player::Video,
            &PlayerCommand::Play { item: Some("intro.mp4".into()) },
            &live(),
        )
        .await
        .unwrap();

        let lines = seen.lock().unwrap().clone();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("GET /requests/status.xml?command=pl_next "));
        assert!(lines[1].contains("command=volume&val=128"));
        assert!(lines[2].contains("command=in_play&input=intro.mp4"));
    }

    #[tokio::test]
    async fn loop_toggle_sent_only_on_change() {
        let (base, seen) = fake_vlc(200).await;
        let vlc = client(&base);

        vlc.send_command(Player::Audio, &PlayerCommand::Loop(false), &live()).await.unwrap();
        vlc.send_command(Player::Audio, &PlayerCommand::Loop(true), &live()).await.unwrap();
        vlc.send_command(Player::Audio, &PlayerCommand::Loop(true), &live()).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        // reset turns looping back off
        vlc.reset(Player::Audio, &live()).await.unwrap();
        let lines = seen.lock().unwrap().clone();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].contains("command=pl_stop"));
        assert!(lines[2].contains("command=pl_empty"));
        assert!(lines[3].contains("command=pl_loop"));
    }

    #[tokio::test]
    async fn unauthorized_is_an_error() {
        let (base, _) = fake_vlc(401).await;
        let err = client(&base)
            .send_command(Player::Video, &PlayerCommand::Pause, &live())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn unreachable_player_fails_after_retries() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&base)
            .send_command(Player::Audio, &PlayerCommand::Stop, &live())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed after 0 retries"));
    }

    #[tokio::test]
    async fn stalled_request_gives_up_on_cancel() {
        let (base, seen) = stalled_vlc().await;
        let vlc = client(&base);

        let t0 = std::time::Instant::now();
        let err = vlc
            .send_command(Player::Video, &PlayerCommand::Next, &cancel_after(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(t0.elapsed() < Duration::from_secs(2), "waited out the http timeout");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_reset_sends_no_further_requests() {
        let (base, seen) = stalled_vlc().await;
        let vlc = client(&base);

        let err = vlc.reset(Player::Audio, &cancel_after(50)).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let lines = seen.lock().unwrap().clone();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("command=pl_stop"));
    }

    #[tokio::test]
    async fn retry_pause_is_cut_short_by_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        // backoff alone would be 200ms + 400ms + 800ms
        let vlc = client(&base).with_max_retries(3);
        let t0 = std::time::Instant::now();
        let err = vlc
            .send_command(Player::Audio, &PlayerCommand::Stop, &cancel_after(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(t0.elapsed() < Duration::from_millis(1000));
    }

    #[test]
    fn volume_scale() {
        assert_eq!(vlc_volume(0), 0);
        assert_eq!(vlc_volume(100), 256);
        assert_eq!(vlc_volume(200), 256);
    }
}
