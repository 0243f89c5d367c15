//! Notification methods and their registry.
//!
//! A notification method turns a resolved `(event, recipient)` pair into an
//! outbound notification: it composes the payload and hands a [`Task`] to the
//! task runner. Methods are looked up by the keys of a recipient's config
//! (`email`, `webhook`, `pushover`), so new methods can be registered without
//! touching the matching or dispatch code.
//!
//! [`Task`]: crate::tasks::Task

pub mod email;
pub mod pushover;
pub mod webhook;

pub use email::EmailMethod;
pub use pushover::PushoverMethod;
pub use webhook::WebhookMethod;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{NotificationError, NotificationResult};
use crate::models::{Event, Recipient};
use crate::settings::Settings;
use crate::templates::TemplateEngine;
use crate::worker::TaskRunner;

/// A way of notifying a recipient of an event.
pub trait NotificationMethod: Send + Sync {
    /// Notify `recipient` of `event`. Implementations enqueue their I/O on
    /// the task runner instead of performing it.
    fn send(&self, event: &Event, recipient: &Recipient) -> NotificationResult<()>;
}

/// Everything a method is constructed from.
#[derive(Clone)]
pub struct MethodContext {
    pub settings: Arc<Settings>,
    pub runner: Arc<dyn TaskRunner>,
    pub templates: Arc<TemplateEngine>,
}

type MethodFactory = dyn Fn(&MethodContext) -> Box<dyn NotificationMethod> + Send + Sync;

/// A named, constructible notification method.
///
/// Two method types are the same when their names are.
#[derive(Clone)]
pub struct MethodType {
    name: String,
    factory: Arc<MethodFactory>,
}

impl MethodType {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&MethodContext) -> Box<dyn NotificationMethod> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct the method from a context snapshot.
    pub fn build(&self, context: &MethodContext) -> Box<dyn NotificationMethod> {
        (self.factory)(context)
    }
}

impl fmt::Debug for MethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodType").field("name", &self.name).finish()
    }
}

impl PartialEq for MethodType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for MethodType {}

impl Hash for MethodType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for MethodType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MethodType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// Name-to-method registry with a memoized lookup.
///
/// Registering two methods under one name is allowed, but looking that name
/// up fails: an ambiguous registration is never resolved by picking one.
#[derive(Default)]
pub struct MethodRegistry {
    registrations: HashMap<String, Vec<MethodType>>,
    cache: RwLock<HashMap<String, MethodType>>,
}

impl MethodRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in email, webhook and pushover methods.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(EmailMethod::method_type());
        registry.register(WebhookMethod::method_type());
        registry.register(PushoverMethod::method_type());
        registry
    }

    /// Add a method under its name.
    pub fn register(&mut self, method: MethodType) {
        debug!(method = method.name(), "Registering notification method");

        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(method.name());
        self.registrations
            .entry(method.name().to_string())
            .or_default()
            .push(method);
    }

    /// Return the single method registered under `name`.
    pub fn get_method(&self, name: &str) -> NotificationResult<MethodType> {
        if let Some(method) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(method.clone());
        }

        let method = match self.registrations.get(name).map(Vec::as_slice) {
            Some([method]) => method.clone(),
            Some(methods) if methods.len() > 1 => {
                warn!(
                    method = name,
                    registrations = methods.len(),
                    "Ambiguous notification method registration"
                );
                return Err(NotificationError::MethodNotFound(name.to_string()));
            }
            _ => return Err(NotificationError::MethodNotFound(name.to_string())),
        };

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), method.clone());

        Ok(method)
    }

    /// Forget every memoized lookup.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Whether a lookup for `name` is currently memoized.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}
