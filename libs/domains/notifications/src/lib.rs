//! Build Notifications Domain
//!
//! Fans build events out to the recipients subscribed to them, over
//! pluggable delivery methods.
//!
//! # Features
//!
//! - Subscriptions per machine and event, with `*` wildcards on either side
//! - Email, webhook and Pushover delivery methods
//! - A name-keyed method registry open to extension
//! - Inline or background task execution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Signal Dispatch │  ← postpull / published fired with a build
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    Notifier     │  ← Event → subscribed recipients → methods
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │ Method Registry │  ← email, webhook, pushover, ...
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │   Task Runner   │  ← SMTP / HTTP I/O, inline or in the background
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use core_config::FromEnv;
//! use domain_notifications::{
//!     register_handlers, runner_from_settings, Dispatcher, MethodRegistry, Notifier, Settings,
//! };
//!
//! let settings = Arc::new(Settings::from_env()?);
//! let runner = runner_from_settings(Arc::clone(&settings))?;
//! let notifier = Notifier::new(settings, Arc::new(MethodRegistry::with_builtins()), runner)?;
//!
//! let mut dispatcher = Dispatcher::new();
//! register_handlers(&mut dispatcher, Arc::new(notifier));
//! dispatcher.emit("postpull", &build, context)?;
//! ```

pub mod dispatch;
pub mod error;
pub mod gbp;
pub mod matching;
pub mod methods;
pub mod models;
pub mod settings;
pub mod signals;
pub mod tasks;
pub mod templates;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use dispatch::Notifier;
pub use error::{NotificationError, NotificationResult};
pub use gbp::{Build, GbpMetadata, Package, PackageMetadata};
pub use matching::{resolve, wildcard_events};
pub use methods::{MethodContext, MethodRegistry, MethodType, NotificationMethod};
pub use models::{Event, Recipient, Subscription, SubscriptionTable, WILDCARD};
pub use settings::{Settings, WorkerBackend};
pub use signals::{Dispatcher, EventHandler, SignalDispatcher, SignalHandler, register_handlers};
pub use tasks::Task;
pub use templates::TemplateEngine;
pub use worker::{BackgroundRunner, InlineRunner, TaskRunner, runner_from_settings};
