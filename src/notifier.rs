//! Notification transports
//!
//! Email goes through the local `sendmail` binary; SMS goes through an HTTP
//! gateway when one is configured. Both are best-effort: callers log failures
//! and move on, nothing retries.

use crate::error::{Error, Result};
use crate::store::SystemSettings;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Short event description handed to the transports
#[derive(Debug, Clone)]
pub struct EventSummary {
    pub camera_name: String,
    pub label: String,
    /// 0-100 scale
    pub confidence: f32,
    pub snapshot_url: String,
}

/// Fire-and-forget alert transports
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, settings: &SystemSettings, summary: &EventSummary) -> Result<()>;
    async fn send_sms(&self, settings: &SystemSettings, summary: &EventSummary) -> Result<()>;
}

/// sendmail + HTTP gateway transports
pub struct SystemNotifier {
    client: reqwest::Client,
    sms_gateway_url: Option<String>,
}

impl SystemNotifier {
    pub fn new(sms_gateway_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            sms_gateway_url,
        }
    }

    fn build_message(settings: &SystemSettings, to: &str, summary: &EventSummary) -> String {
        let from = settings
            .smtp_from
            .as_deref()
            .unwrap_or("alerts@argos.local");
        let company = settings.company_name.as_deref().unwrap_or("Argos");

        format!(
            "To: {to}\nFrom: {from}\nSubject: [{company}] {label} detected on {camera}\n\n\
             {label} detected on camera \"{camera}\" (confidence {conf:.0}%).\nSnapshot: {url}\n",
            to = to,
            from = from,
            company = company,
            label = summary.label,
            camera = summary.camera_name,
            conf = summary.confidence,
            url = summary.snapshot_url,
        )
    }
}

#[async_trait]
impl Notifier for SystemNotifier {
    async fn send_email(&self, settings: &SystemSettings, summary: &EventSummary) -> Result<()> {
        let to = settings
            .admin_email
            .as_deref()
            .ok_or_else(|| Error::Notify("no admin_email configured".to_string()))?;

        let message = Self::build_message(settings, to, summary);

        let mut child = Command::new("sendmail")
            .arg("-t")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Notify(format!("sendmail spawn failed: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .await
                .map_err(|e| Error::Notify(format!("sendmail stdin write failed: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Notify(format!("sendmail wait failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Notify(format!("sendmail failed: {}", stderr.trim())));
        }

        tracing::info!(to = %to, label = %summary.label, "Alert email sent");
        Ok(())
    }

    async fn send_sms(&self, _settings: &SystemSettings, summary: &EventSummary) -> Result<()> {
        let gateway = self
            .sms_gateway_url
            .as_deref()
            .ok_or_else(|| Error::Notify("SMS gateway not configured".to_string()))?;

        let body = serde_json::json!({
            "text": format!(
                "{} detected on {} ({:.0}%)",
                summary.label, summary.camera_name, summary.confidence
            ),
        });

        let resp = self.client.post(gateway).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Notify(format!(
                "SMS gateway returned {}",
                resp.status()
            )));
        }

        tracing::info!(label = %summary.label, "Alert SMS sent");
        Ok(())
    }
}
