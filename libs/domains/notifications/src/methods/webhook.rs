//! Webhook notification method.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{MethodContext, MethodType, NotificationMethod};
use crate::error::NotificationResult;
use crate::models::{Event, Recipient};
use crate::tasks::Task;
use crate::worker::TaskRunner;

pub const NAME: &str = "webhook";

/// Build fields sent in the payload. Notes and logs are left out.
pub const WANTED_FIELDS: [&str; 6] = [
    "machine",
    "build_id",
    "keep",
    "submitted",
    "completed",
    "built",
];

pub struct WebhookMethod {
    runner: Arc<dyn TaskRunner>,
}

impl WebhookMethod {
    pub fn new(context: &MethodContext) -> Self {
        Self {
            runner: Arc::clone(&context.runner),
        }
    }

    pub fn method_type() -> MethodType {
        MethodType::new(NAME, |context| Box::new(WebhookMethod::new(context)))
    }
}

impl NotificationMethod for WebhookMethod {
    fn send(&self, event: &Event, recipient: &Recipient) -> NotificationResult<()> {
        let body = create_body(event)?;
        debug!(recipient = recipient.name(), event = event.name(), "Enqueueing webhook");

        self.runner.run(Task::SendHttpRequest {
            recipient_name: recipient.name().to_string(),
            body,
        })
    }
}

/// The JSON request body for `event`: `{"name", "machine", "data"}` with
/// `data.build` reduced to [`WANTED_FIELDS`].
pub fn create_body(event: &Event) -> NotificationResult<String> {
    let mut value = serde_json::to_value(event)?;

    if let Some(Value::Object(build)) = value.pointer_mut("/data/build") {
        build.retain(|key, _| WANTED_FIELDS.contains(&key.as_str()));
    }

    Ok(serde_json::to_string(&value)?)
}
