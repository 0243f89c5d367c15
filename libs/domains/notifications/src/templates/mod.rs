//! Notification template rendering engine.
//!
//! Templates are Handlebars sources embedded in the binary and registered
//! under their file names (`email_build_pulled.eml`, ...). Delivery methods
//! pick a template by event name; an event without a template is not an
//! error for them, they just skip the send.

use handlebars::Handlebars;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{NotificationError, NotificationResult};

const EMAIL_BUILD_PULLED: &str = include_str!("email_build_pulled.eml");
const EMAIL_BUILD_PUBLISHED: &str = include_str!("email_build_published.eml");
const PUSHOVER_BUILD_PULLED: &str = include_str!("pushover_build_pulled.txt");
const PUSHOVER_BUILD_PUBLISHED: &str = include_str!("pushover_build_published.txt");

const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    ("email_build_pulled.eml", EMAIL_BUILD_PULLED),
    ("email_build_published.eml", EMAIL_BUILD_PUBLISHED),
    ("pushover_build_pulled.txt", PUSHOVER_BUILD_PULLED),
    ("pushover_build_published.txt", PUSHOVER_BUILD_PUBLISHED),
];

/// Template engine for rendering notification bodies.
#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Arc<Handlebars<'static>>,
}

impl TemplateEngine {
    /// Create a new template engine with all built-in templates registered.
    pub fn new() -> NotificationResult<Self> {
        Self::with_templates(BUILTIN_TEMPLATES)
    }

    /// Create an engine with exactly the given `(name, source)` templates.
    pub fn with_templates<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NotificationResult<Self> {
        let mut handlebars = Handlebars::new();
        // Bodies are plain text, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in templates {
            handlebars
                .register_template_string(name, source)
                .map_err(|e| {
                    NotificationError::Template(format!("Failed to register {}: {}", name, e))
                })?;
        }

        Ok(Self {
            handlebars: Arc::new(handlebars),
        })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }

    /// Render the named template with `context`.
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> NotificationResult<String> {
        if !self.has_template(name) {
            return Err(NotificationError::TemplateNotFound(name.to_string()));
        }

        debug!(template = name, "Rendering template");
        Ok(self.handlebars.render(name, context)?)
    }
}
