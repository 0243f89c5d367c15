//! Email notification method.
//!
//! Composes a plain-text message from the `email_{event}.eml` template and
//! hands it to the task runner, which delivers it over SMTP.

use std::sync::Arc;

use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{MethodContext, MethodType, NotificationMethod};
use crate::error::{NotificationError, NotificationResult};
use crate::gbp::{GbpMetadata, Package};
use crate::models::{Event, Recipient};
use crate::settings::Settings;
use crate::tasks::Task;
use crate::templates::TemplateEngine;
use crate::worker::TaskRunner;

pub const NAME: &str = "email";

pub struct EmailMethod {
    settings: Arc<Settings>,
    runner: Arc<dyn TaskRunner>,
    templates: Arc<TemplateEngine>,
}

impl EmailMethod {
    pub fn new(context: &MethodContext) -> Self {
        Self {
            settings: Arc::clone(&context.settings),
            runner: Arc::clone(&context.runner),
            templates: Arc::clone(&context.templates),
        }
    }

    pub fn method_type() -> MethodType {
        MethodType::new(NAME, |context| Box::new(EmailMethod::new(context)))
    }

    /// Compose the message for `event`.
    ///
    /// Fails with [`NotificationError::TemplateNotFound`] when the event has
    /// no email template.
    pub fn compose(&self, event: &Event, recipient: &Recipient) -> NotificationResult<Message> {
        let body = generate_email_content(&self.templates, event, recipient)?;

        Ok(Message::builder()
            .subject(format!("GBP: {}", event.name()))
            .from(self.settings.email_from.parse::<Mailbox>()?)
            .to(recipient_mailbox(recipient)?)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?)
    }
}

impl NotificationMethod for EmailMethod {
    fn send(&self, event: &Event, recipient: &Recipient) -> NotificationResult<()> {
        let message = match self.compose(event, recipient) {
            Ok(message) => message,
            Err(NotificationError::TemplateNotFound(_)) => {
                warn!("No template found for event: {}", event.name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let task = Task::SendMail {
            from: self.settings.email_from.clone(),
            to: vec![recipient_mailbox(recipient)?.to_string()],
            message: String::from_utf8_lossy(&message.formatted()).into_owned(),
        };
        debug!(recipient = recipient.name(), event = event.name(), "Enqueueing email");

        self.runner.run(task)
    }
}

/// The recipient's mailbox. Underscores in the name become spaces.
pub fn recipient_mailbox(recipient: &Recipient) -> NotificationResult<Mailbox> {
    let address = recipient.config_for(NAME).ok_or_else(|| {
        NotificationError::Email(format!("recipient {} has no email address", recipient.name()))
    })?;

    Ok(Mailbox::new(
        Some(recipient.name().replace('_', " ")),
        address.parse()?,
    ))
}

/// Render the email body for `event`.
///
/// The template is looked up before the event data is read, so events
/// without a template never have their build metadata parsed.
pub fn generate_email_content(
    templates: &TemplateEngine,
    event: &Event,
    recipient: &Recipient,
) -> NotificationResult<String> {
    let name = format!("email_{}.eml", event.name());
    if !templates.has_template(&name) {
        return Err(NotificationError::TemplateNotFound(name));
    }

    let context = json!({
        "packages": built_packages(event)?,
        "recipient": recipient,
        "event": event.data(),
    });

    templates.render(&name, &context)
}

/// Packages built for the event's build, empty when it carries no metadata.
pub(crate) fn built_packages(event: &Event) -> NotificationResult<Vec<Package>> {
    match event.data().get("gbp_metadata") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            let metadata: GbpMetadata = serde_json::from_value(value.clone())?;
            Ok(metadata.packages.built)
        }
    }
}
