//! Event dispatch.
//!
//! [`Notifier`] ties matching to delivery: every recipient subscribed to an
//! event is sent the event through each method its configuration names.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::NotificationResult;
use crate::matching::resolve;
use crate::methods::{MethodContext, MethodRegistry};
use crate::models::Event;
use crate::settings::Settings;
use crate::templates::TemplateEngine;
use crate::worker::TaskRunner;

pub struct Notifier {
    context: MethodContext,
    registry: Arc<MethodRegistry>,
}

impl Notifier {
    /// Create a notifier with the built-in templates.
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<MethodRegistry>,
        runner: Arc<dyn TaskRunner>,
    ) -> NotificationResult<Self> {
        let templates = Arc::new(TemplateEngine::new()?);
        Ok(Self::with_templates(settings, registry, runner, templates))
    }

    pub fn with_templates(
        settings: Arc<Settings>,
        registry: Arc<MethodRegistry>,
        runner: Arc<dyn TaskRunner>,
        templates: Arc<TemplateEngine>,
    ) -> Self {
        Self {
            context: MethodContext {
                settings,
                runner,
                templates,
            },
            registry,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// Send `event` to everyone subscribed to it.
    ///
    /// Stops at the first failing send and returns its error. Recipients are
    /// visited in no particular order.
    pub fn notify(&self, event: &Event) -> NotificationResult<()> {
        let recipients = resolve(event, self.context.settings.subscriptions());

        info!(
            event = event.name(),
            machine = event.machine(),
            recipients = recipients.len(),
            "Dispatching event"
        );

        for recipient in &recipients {
            for method_type in recipient.methods(&self.registry)? {
                let method = method_type.build(&self.context);

                if let Err(e) = method.send(event, recipient) {
                    error!(
                        event = event.name(),
                        machine = event.machine(),
                        recipient = recipient.name(),
                        method = method_type.name(),
                        error = %e,
                        "Failed to send notification"
                    );
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}
