//! Proposal notification fan-out.
//!
//! Notifications fire after the opening transaction commits and are
//! fire-and-forget: a lost delivery never reverses committed state, and
//! receivers must tolerate at-least-once delivery.

use async_trait::async_trait;
use covenant_core::{Proposal, Registration, Team};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;

/// Delay before each delivery attempt after the first.
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(30),
];

/// Signature header attached to webhook deliveries.
pub const SIGNATURE_HEADER: &str = "X-Covenant-Signature";

/// A consumer included in a proposal notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotifiedConsumer {
    pub team_id: String,
    pub team_name: String,
    pub pinned_version: Option<String>,
}

impl NotifiedConsumer {
    pub fn from_registration(registration: &Registration, team: &Team) -> Self {
        Self {
            team_id: registration.consumer_team_id.to_string(),
            team_name: team.name.clone(),
            pinned_version: registration.pinned_version.clone(),
        }
    }
}

impl From<&crate::services::impact::ImpactedConsumer> for NotifiedConsumer {
    fn from(consumer: &crate::services::impact::ImpactedConsumer) -> Self {
        Self {
            team_id: consumer.team_id.to_string(),
            team_name: consumer.team_name.clone(),
            pinned_version: consumer.pinned_version.clone(),
        }
    }
}

/// Fan-out interface invoked by the publish coordinator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_proposal_opened(&self, proposal: &Proposal, consumers: &[NotifiedConsumer]);
}

/// Default notifier when nothing is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_proposal_opened(&self, _proposal: &Proposal, _consumers: &[NotifiedConsumer]) {}
}

/// Webhook notifier: POSTs a signed JSON payload to one endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

#[derive(Serialize)]
struct ProposalOpenedPayload<'a> {
    event: &'static str,
    proposal_id: String,
    asset_id: String,
    proposed_version: &'a str,
    change_type: &'a str,
    breaking_changes: &'a [serde_json::Value],
    impacted_consumers: &'a [NotifiedConsumer],
}

impl WebhookNotifier {
    pub fn new(url: String, secret: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            secret,
        }
    }

    fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body);
        Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }

    async fn deliver(&self, body: Vec<u8>, signature: Option<String>) {
        let mut attempt = 0usize;
        loop {
            let mut request = self
                .client
                .post(&self.url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(signature) = &signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) => {
                    tracing::warn!(status = %response.status(), url = %self.url, "webhook delivery rejected");
                }
                Err(err) => {
                    tracing::warn!(error = %err, url = %self.url, "webhook delivery failed");
                }
            }

            let Some(delay) = RETRY_DELAYS.get(attempt) else {
                tracing::error!(url = %self.url, "webhook delivery gave up after retries");
                return;
            };
            tokio::time::sleep(*delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_proposal_opened(&self, proposal: &Proposal, consumers: &[NotifiedConsumer]) {
        let payload = ProposalOpenedPayload {
            event: "proposal.opened",
            proposal_id: proposal.proposal_id.to_string(),
            asset_id: proposal.asset_id.to_string(),
            proposed_version: &proposal.proposed_version,
            change_type: proposal.change_type.as_str(),
            breaking_changes: &proposal.breaking_changes,
            impacted_consumers: consumers,
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize webhook payload");
                return;
            }
        };
        let signature = self.sign(&body);
        self.deliver(body, signature).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_hex_sha256() {
        let notifier = WebhookNotifier::new(
            "http://localhost:9/hook".to_string(),
            Some("topsecret".to_string()),
        );
        let a = notifier.sign(b"payload").unwrap();
        let b = notifier.sign(b"payload").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
        // sha256 hex digest is 64 chars.
        assert_eq!(a.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_no_secret_means_no_signature() {
        let notifier = WebhookNotifier::new("http://localhost:9/hook".to_string(), None);
        assert!(notifier.sign(b"payload").is_none());
    }
}
