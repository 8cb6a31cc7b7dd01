//! `mqtt.publish {topic, payload}`.
//!
//! `payload` may be a scalar (sent as its string form) or an object/array
//! (sent as compact JSON). A missing payload publishes an empty string.
//! The messaging client queues while the link is down, so a publish step
//! completes as soon as the message is enqueued.

use std::sync::Arc;

use async_trait::async_trait;
use panel_core::{args, ActionKey, Args, ScenarioStep};

use super::LinkBinding;
use crate::errors::{ErrorCode, StepError};
use crate::executor::{DomainRouter, ExecCtx, SkipReason, StepOutcome};

pub struct MqttRouter {
    link: Arc<LinkBinding>,
}

impl MqttRouter {
    pub fn new(link: Arc<LinkBinding>) -> Self {
        Self { link }
    }
}

fn payload_arg(args: Option<&Args>) -> Result<String, StepError> {
    match args::get_node(args, "payload") {
        Some(node) => serde_json::to_string(node).map_err(|e| {
            StepError::new(ErrorCode::ArgInvalid, "argument 'payload' is not serializable")
                .with_source(e.into())
        }),
        None => Ok(args::get_string(args, "payload", "")),
    }
}

#[async_trait]
impl DomainRouter for MqttRouter {
    fn domain(&self) -> &'static str {
        "mqtt"
    }

    async fn execute(
        &self,
        key: &ActionKey,
        step: &ScenarioStep,
        ctx: &ExecCtx,
    ) -> Result<StepOutcome, StepError> {
        if key.verb() != Some("publish") {
            return Ok(StepOutcome::Skipped(SkipReason::UnknownVerb));
        }

        let args = step.args();
        let topic = args::get_required_string(args, "topic")?;
        let payload = payload_arg(args)?;
        let client = self.link.resolve()?;

        ctx.check_cancelled()?;
        client.publish(&topic, payload)?;
        tracing::info!(
            run_id = %ctx.run_id,
            step = ctx.step_index,
            topic = %topic,
            link = %client.state(),
            "mqtt.publish"
        );
        Ok(StepOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mqtt_link::{LinkConfig, LoopbackTransport, MessagingClient};
    use panel_core::ModeBinding;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn router() -> (MqttRouter, Arc<MessagingClient>) {
        let client = Arc::new(MessagingClient::new(LinkConfig::default()));
        let c = client.clone();
        let binding = ModeBinding::new(
            || Ok(false),
            || -> Arc<MessagingClient> { unreachable!("real link in test") },
            move || c.clone(),
        );
        (MqttRouter::new(Arc::new(binding)), client)
    }

    fn step(args: serde_json::Value) -> (ActionKey, ScenarioStep) {
        let args = args.as_object().cloned();
        (
            ActionKey::parse("mqtt.publish").unwrap(),
            ScenarioStep::new("mqtt.publish", args),
        )
    }

    fn ctx() -> ExecCtx {
        ExecCtx::new("run-test", "test", CancellationToken::new())
    }

    #[test]
    fn payload_shapes() {
        let bag = |v: serde_json::Value| v.as_object().cloned();
        assert_eq!(payload_arg(bag(json!({"payload": 1})).as_ref()).unwrap(), "1");
        assert_eq!(payload_arg(bag(json!({"payload": true})).as_ref()).unwrap(), "true");
        assert_eq!(payload_arg(bag(json!({"payload": "on"})).as_ref()).unwrap(), "on");
        assert_eq!(
            payload_arg(bag(json!({"payload": {"scene": 2}})).as_ref()).unwrap(),
            r#"{"scene":2}"#
        );
        assert_eq!(payload_arg(bag(json!({})).as_ref()).unwrap(), "");
    }

    #[tokio::test]
    async fn publish_queues_on_the_client() {
        let (r, client) = router();
        let (k, s) = step(json!({"topic": "panel/scene", "payload": "1"}));
        assert_eq!(r.execute(&k, &s, &ctx()).await.unwrap(), StepOutcome::Applied);
        // never started: the message waits in the queue
        assert_eq!(client.pending(), 1);
    }

    #[tokio::test]
    async fn missing_or_blank_topic_is_invalid() {
        let (r, client) = router();
        let (k, s) = step(json!({"payload": "1"}));
        assert_eq!(r.execute(&k, &s, &ctx()).await.unwrap_err().code, ErrorCode::ArgInvalid);
        let (k, s) = step(json!({"topic": "  "}));
        assert_eq!(r.execute(&k, &s, &ctx()).await.unwrap_err().code, ErrorCode::ArgInvalid);
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_does_not_publish() {
        let (r, client) = router();
        let c = ctx();
        c.cancel.cancel();
        let (k, s) = step(json!({"topic": "x", "payload": "1"}));
        assert!(r.execute(&k, &s, &c).await.unwrap_err().is_cancelled());
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn other_verbs_are_skipped() {
        let (r, _) = router();
        let k = ActionKey::parse("mqtt.subscribe").unwrap();
        let s = ScenarioStep::new("mqtt.subscribe", None);
        assert_eq!(
            r.execute(&k, &s, &ctx()).await.unwrap(),
            StepOutcome::Skipped(SkipReason::UnknownVerb)
        );
    }
}
