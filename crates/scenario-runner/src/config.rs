//! Panel configuration from environment variables.
//!
//! | Variable                     | Default                  |
//! |------------------------------|--------------------------|
//! | `PANEL_MODE`                 | `auto`                   |
//! | `PANEL_ASSETS_DIR`           | `./assets`               |
//! | `PANEL_FAILURE_POLICY`       | `abort`                  |
//! | `GPIO_SYSFS_BASE`            | `/sys/class/gpio`        |
//! | `MQTT_HOST` / `MQTT_PORT`    | `localhost` / `1883`     |
//! | `MQTT_CLIENT_ID`             | `control-panel`          |
//! | `MQTT_USERNAME` / `MQTT_PASSWORD` | unset               |
//! | `MQTT_KEEP_ALIVE_SECS`       | `30`                     |
//! | `MQTT_RECONNECT_DELAY_SECS`  | `5`                      |
//! | `VLC_AUDIO_URL`              | `http://127.0.0.1:8081`  |
//! | `VLC_VIDEO_URL`              | `http://127.0.0.1:8080`  |
//! | `VLC_PASSWORD`               | empty                    |
//!
//! `PANEL_MODE` is kept as text: an unknown value surfaces as
//! `Err.Binding.Predicate` on first use of a capability, not at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use mqtt_link::LinkConfig;
use panel_hw::SysfsGpio;

use crate::adapters::player::PlayerEndpoint;
use crate::executor::FailurePolicy;

#[derive(Clone, Debug)]
pub struct PanelConfig {
    pub mode: String,
    pub assets_dir: PathBuf,
    pub failure_policy: FailurePolicy,
    pub gpio_base: PathBuf,
    pub link: LinkConfig,
    pub audio: PlayerEndpoint,
    pub video: PlayerEndpoint,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            mode: "auto".into(),
            assets_dir: PathBuf::from("./assets"),
            failure_policy: FailurePolicy::Abort,
            gpio_base: PathBuf::from(SysfsGpio::DEFAULT_BASE),
            link: LinkConfig::default(),
            audio: PlayerEndpoint::new("http://127.0.0.1:8081", ""),
            video: PlayerEndpoint::new("http://127.0.0.1:8080", ""),
        }
    }
}

impl PanelConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup; unset variables take their default.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let d = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let failure_policy = match var("PANEL_FAILURE_POLICY") {
            Some(v) => FailurePolicy::from_str(&v).map_err(anyhow::Error::msg)?,
            None => d.failure_policy,
        };

        let mut link = LinkConfig::new(
            var("MQTT_HOST").unwrap_or(d.link.host.clone()),
            parse_or(var("MQTT_PORT"), "MQTT_PORT", d.link.port)?,
        );
        link.client_id = var("MQTT_CLIENT_ID").unwrap_or(d.link.client_id.clone());
        link.keep_alive = Duration::from_secs(parse_or(
            var("MQTT_KEEP_ALIVE_SECS"),
            "MQTT_KEEP_ALIVE_SECS",
            d.link.keep_alive.as_secs(),
        )?);
        link.reconnect_delay = Duration::from_secs(parse_or(
            var("MQTT_RECONNECT_DELAY_SECS"),
            "MQTT_RECONNECT_DELAY_SECS",
            d.link.reconnect_delay.as_secs(),
        )?);
        if let (Some(user), Some(pass)) = (var("MQTT_USERNAME"), lookup("MQTT_PASSWORD")) {
            link = link.with_credentials(user, pass);
        }

        let vlc_password = lookup("VLC_PASSWORD").unwrap_or_default();

        Ok(Self {
            mode: var("PANEL_MODE").unwrap_or(d.mode),
            assets_dir: var("PANEL_ASSETS_DIR").map(PathBuf::from).unwrap_or(d.assets_dir),
            failure_policy,
            gpio_base: var("GPIO_SYSFS_BASE").map(PathBuf::from).unwrap_or(d.gpio_base),
            link,
            audio: PlayerEndpoint::new(
                var("VLC_AUDIO_URL").unwrap_or(d.audio.base_url),
                vlc_password.clone(),
            ),
            video: PlayerEndpoint::new(
                var("VLC_VIDEO_URL").unwrap_or(d.video.base_url),
                vlc_password,
            ),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, fallback: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.trim().parse().with_context(|| format!("{key}='{v}'")),
        None => Ok(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = PanelConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(cfg.mode, "auto");
        assert_eq!(cfg.assets_dir, PathBuf::from("./assets"));
        assert_eq!(cfg.failure_policy, FailurePolicy::Abort);
        assert_eq!(cfg.gpio_base, PathBuf::from("/sys/class/gpio"));
        assert_eq!(cfg.link.host, "localhost");
        assert_eq!(cfg.link.port, 1883);
        assert_eq!(cfg.link.client_id, "control-panel");
        assert_eq!(cfg.link.reconnect_delay, Duration::from_secs(5));
        assert!(cfg.link.username.is_none());
        assert_eq!(cfg.audio.base_url, "http://127.0.0.1:8081");
        assert_eq!(cfg.video.base_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.video.password, "");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = PanelConfig::from_vars(vars(&[
            ("PANEL_MODE", "simulated"),
            ("PANEL_FAILURE_POLICY", "Continue"),
            ("MQTT_HOST", "broker.lan"),
            ("MQTT_PORT", "8883"),
            ("MQTT_USERNAME", "panel"),
            ("MQTT_PASSWORD", "s3cret"),
            ("MQTT_RECONNECT_DELAY_SECS", "2"),
            ("VLC_VIDEO_URL", "http://10.0.0.5:8080/"),
            ("VLC_PASSWORD", "vlc"),
        ]))
        .unwrap();
        assert_eq!(cfg.mode, "simulated");
        assert_eq!(cfg.failure_policy, FailurePolicy::Continue);
        assert_eq!(cfg.link.host, "broker.lan");
        assert_eq!(cfg.link.port, 8883);
        assert_eq!(cfg.link.username.as_deref(), Some("panel"));
        assert_eq!(cfg.link.password.as_deref(), Some("s3cret"));
        assert_eq!(cfg.link.reconnect_delay, Duration::from_secs(2));
        assert_eq!(cfg.video.base_url, "http://10.0.0.5:8080");
        assert_eq!(cfg.audio.password, "vlc");
    }

    #[test]
    fn bad_numbers_and_policies_are_reported() {
        let err = PanelConfig::from_vars(vars(&[("MQTT_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("MQTT_PORT"));
        assert!(PanelConfig::from_vars(vars(&[("PANEL_FAILURE_POLICY", "retry")])).is_err());
    }
}
