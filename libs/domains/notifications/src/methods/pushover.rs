//! Pushover notification method.
//!
//! The recipient's `pushover` config names the device to notify. The app
//! token and user key come from settings.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use super::email::built_packages;
use super::{MethodContext, MethodType, NotificationMethod};
use crate::error::{NotificationError, NotificationResult};
use crate::models::{Event, Recipient};
use crate::tasks::Task;
use crate::templates::TemplateEngine;
use crate::worker::TaskRunner;

pub const NAME: &str = "pushover";

pub struct PushoverMethod {
    runner: Arc<dyn TaskRunner>,
    templates: Arc<TemplateEngine>,
}

impl PushoverMethod {
    pub fn new(context: &MethodContext) -> Self {
        Self {
            runner: Arc::clone(&context.runner),
            templates: Arc::clone(&context.templates),
        }
    }

    pub fn method_type() -> MethodType {
        MethodType::new(NAME, |context| Box::new(PushoverMethod::new(context)))
    }

    fn message(&self, event: &Event, recipient: &Recipient) -> NotificationResult<String> {
        let name = format!("pushover_{}.txt", event.name());
        if !self.templates.has_template(&name) {
            return Err(NotificationError::TemplateNotFound(name));
        }

        let context = json!({
            "packages": built_packages(event)?,
            "recipient": recipient,
            "event": event.data(),
        });
        let message = self.templates.render(&name, &context)?;

        Ok(message.trim().to_string())
    }
}

impl NotificationMethod for PushoverMethod {
    fn send(&self, event: &Event, recipient: &Recipient) -> NotificationResult<()> {
        let device = recipient.config_for(NAME).unwrap_or_default().to_string();

        let message = match self.message(event, recipient) {
            Ok(message) => message,
            Err(NotificationError::TemplateNotFound(_)) => {
                warn!("No template found for event: {}", event.name());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        debug!(device = %device, event = event.name(), "Enqueueing pushover notification");

        self.runner.run(Task::SendPushoverNotification {
            device,
            title: format!("GBP: {}", event.name()),
            message,
        })
    }
}
