//! External notification capability.
//!
//! The transport (email, chat, push) is outside this system; it is modeled
//! as a `send(notice)` capability behind a trait. The webhook implementation
//! forwards the notice as JSON to a configured HTTP endpoint.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Payload handed to the external notifier for a task coming due.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DueTaskNotice {
    pub owner_name: String,
    pub project_name: String,
    pub task_name: String,
    pub due_time: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notice. An `Err` leaves the task un-flagged so a later
    /// scan retries it.
    async fn notify(&self, notice: &DueTaskNotice) -> anyhow::Result<()>;
}

/// Forwards notices as JSON to an HTTP endpoint.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &DueTaskNotice) -> anyhow::Result<()> {
        let response = self.client.post(&self.url).json(notice).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Fallback when no webhook is configured: the notice only reaches the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &DueTaskNotice) -> anyhow::Result<()> {
        info!(
            owner = %notice.owner_name,
            project = %notice.project_name,
            task = %notice.task_name,
            due = %notice.due_time,
            "task due soon"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serializes_fields() {
        let notice = DueTaskNotice {
            owner_name: "ana".into(),
            project_name: "Roadmap".into(),
            task_name: "ship".into(),
            due_time: "2026-08-07T12:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["owner_name"], "ana");
        assert_eq!(json["project_name"], "Roadmap");
        assert_eq!(json["task_name"], "ship");
    }

    #[tokio::test]
    async fn test_log_notifier_always_succeeds() {
        let notice = DueTaskNotice {
            owner_name: "o".into(),
            project_name: "p".into(),
            task_name: "t".into(),
            due_time: String::new(),
        };
        assert!(LogNotifier.notify(&notice).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_notifier_unreachable_endpoint_errors() {
        // Port 1 — nothing listening; the send must fail, not hang.
        let notifier = WebhookNotifier::new("http://127.0.0.1:1/notify").unwrap();
        let notice = DueTaskNotice {
            owner_name: "o".into(),
            project_name: "p".into(),
            task_name: "t".into(),
            due_time: String::new(),
        };
        assert!(notifier.notify(&notice).await.is_err());
    }
}
