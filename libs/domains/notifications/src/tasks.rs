//! Delivery tasks.
//!
//! A [`Task`] is the unit of work a delivery method hands to the task runner.
//! It holds plain data only (addresses, names, rendered text) so it can be
//! queued, serialized and executed elsewhere. Anything richer, such as a
//! recipient's webhook configuration, is looked up again from the settings
//! snapshot when the task runs.

use lettre::address::Envelope;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::error::{NotificationError, NotificationResult};
use crate::models::Recipient;
use crate::settings::Settings;
use crate::utils::parse_webhook_config;

/// Pushover message API endpoint.
pub const PUSHOVER_URL: &str = "https://api.pushover.net/1/messages.json";

/// A unit of delivery work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Send an already formatted email message over SMTP.
    SendMail {
        from: String,
        to: Vec<String>,
        message: String,
    },
    /// POST a JSON body to the webhook of the named recipient.
    SendHttpRequest { recipient_name: String, body: String },
    /// Send a Pushover notification to a device.
    SendPushoverNotification {
        device: String,
        title: String,
        message: String,
    },
}

impl Task {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Task::SendMail { .. } => "sendmail",
            Task::SendHttpRequest { .. } => "send_http_request",
            Task::SendPushoverNotification { .. } => "send_pushover_notification",
        }
    }

    /// Perform the task's I/O. Makes a single attempt.
    pub async fn execute(&self, settings: &Settings) -> NotificationResult<()> {
        match self {
            Task::SendMail { from, to, message } => sendmail(settings, from, to, message).await,
            Task::SendHttpRequest {
                recipient_name,
                body,
            } => send_http_request(settings, recipient_name, body).await,
            Task::SendPushoverNotification {
                device,
                title,
                message,
            } => send_pushover_notification(settings, PUSHOVER_URL, device, title, message).await,
        }
    }
}

async fn sendmail(
    settings: &Settings,
    from: &str,
    to: &[String],
    message: &str,
) -> NotificationResult<()> {
    let from: Mailbox = from.parse()?;
    let to = to
        .iter()
        .map(|addr| addr.parse::<Mailbox>().map(|mailbox| mailbox.email))
        .collect::<Result<Vec<_>, _>>()?;
    let envelope = Envelope::new(Some(from.email), to.clone())?;

    let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.email_smtp_host)?
        .port(settings.email_smtp_port)
        .credentials(Credentials::new(
            settings.email_smtp_username.clone(),
            settings.email_password()?,
        ))
        .timeout(Some(settings.requests_timeout))
        .build();

    info!(to = ?to, host = %settings.email_smtp_host, "Sending email notification");
    transport.send_raw(&envelope, message.as_bytes()).await?;
    info!(to = ?to, "Sent email notification");

    Ok(())
}

async fn send_http_request(
    settings: &Settings,
    recipient_name: &str,
    body: &str,
) -> NotificationResult<()> {
    let recipient = Recipient::from_name(recipient_name, settings)?;
    let config = recipient.config_for("webhook").ok_or_else(|| {
        NotificationError::Http(format!("recipient {} has no webhook configured", recipient_name))
    })?;
    let (url, headers) = parse_webhook_config(config)?;

    let client = reqwest::Client::builder()
        .timeout(settings.requests_timeout)
        .build()?;
    let mut request = client.post(&url).body(body.to_string());
    for (name, value) in headers {
        request = request.header(name, value);
    }

    info!(url = %url, recipient = recipient_name, "Sending webhook notification");
    let response = request
        .header(CONTENT_TYPE, "application/json")
        .send()
        .await?
        .error_for_status()?;
    info!(url = %url, status = %response.status(), "Sent webhook notification");

    Ok(())
}

pub(crate) async fn send_pushover_notification(
    settings: &Settings,
    url: &str,
    device: &str,
    title: &str,
    message: &str,
) -> NotificationResult<()> {
    let params = json!({
        "token": settings.pushover_app_token,
        "user": settings.pushover_user_key,
        "device": device,
        "title": title,
        "message": message,
    });
    debug!(device, title, "Pushover parameters prepared");

    let client = reqwest::Client::builder()
        .timeout(settings.requests_timeout)
        .build()?;

    info!(device, "Sending pushover notification");
    client
        .post(url)
        .json(&params)
        .send()
        .await?
        .error_for_status()?;
    info!(device, "Sent pushover notification");

    Ok(())
}
