//! Build signals.
//!
//! The build publisher fires named signals (`postpull`, `published`) with the
//! build they concern and some keyword context. Handlers bound to a
//! [`SignalDispatcher`] turn those into [`Event`]s for the [`Notifier`].
//! Handlers are owned by the dispatcher and live as long as it does.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::dispatch::Notifier;
use crate::error::NotificationResult;
use crate::gbp::Build;
use crate::models::Event;

pub const POSTPULL: &str = "postpull";
pub const PUBLISHED: &str = "published";

/// Signal to event name bindings installed by [`register_handlers`].
pub const SIGNAL_EVENTS: [(&str, &str); 2] =
    [(POSTPULL, "build_pulled"), (PUBLISHED, "build_published")];

/// Receives a fired signal.
pub trait SignalHandler: Send + Sync {
    fn handle(&self, build: &Build, context: Map<String, Value>) -> NotificationResult<()>;
}

/// Something handlers can be bound to by signal name.
pub trait SignalDispatcher {
    fn bind(&mut self, signal: &str, handler: Arc<dyn SignalHandler>);
}

/// In-process signal dispatcher.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Vec<Arc<dyn SignalHandler>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the signals that have at least one handler, sorted.
    pub fn signals(&self) -> Vec<&str> {
        let mut signals: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        signals.sort_unstable();
        signals
    }

    /// Fire `signal`, calling its handlers in binding order.
    ///
    /// The first handler error is returned and the remaining handlers are
    /// not called. Firing a signal nobody is bound to does nothing.
    pub fn emit(
        &self,
        signal: &str,
        build: &Build,
        context: Map<String, Value>,
    ) -> NotificationResult<()> {
        let Some(handlers) = self.handlers.get(signal) else {
            debug!(signal, "No handlers bound to signal");
            return Ok(());
        };

        info!(signal, machine = %build.machine, build_id = %build.build_id, "Emitting signal");
        for handler in handlers {
            handler.handle(build, context.clone())?;
        }

        Ok(())
    }
}

impl SignalDispatcher for Dispatcher {
    fn bind(&mut self, signal: &str, handler: Arc<dyn SignalHandler>) {
        self.handlers
            .entry(signal.to_string())
            .or_default()
            .push(handler);
    }
}

/// Notifies subscribers of a fixed event whenever its signal fires.
pub struct EventHandler {
    event_name: String,
    notifier: Arc<Notifier>,
}

impl EventHandler {
    pub fn new(event_name: impl Into<String>, notifier: Arc<Notifier>) -> Self {
        Self {
            event_name: event_name.into(),
            notifier,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl SignalHandler for EventHandler {
    fn handle(&self, build: &Build, context: Map<String, Value>) -> NotificationResult<()> {
        let event = Event::from_build(self.event_name.as_str(), build, context)?;
        self.notifier.notify(&event)
    }
}

/// Bind the `postpull` and `published` signals to their event handlers.
pub fn register_handlers<D: SignalDispatcher + ?Sized>(dispatcher: &mut D, notifier: Arc<Notifier>) {
    for (signal, event_name) in SIGNAL_EVENTS {
        debug!(signal, event = event_name, "Binding signal handler");
        dispatcher.bind(
            signal,
            Arc::new(EventHandler::new(event_name, Arc::clone(&notifier))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl SignalHandler for Recorder {
        fn handle(&self, build: &Build, context: Map<String, Value>) -> NotificationResult<()> {
            self.seen
                .lock()
                .unwrap()
                .push((build.build_id.clone(), context));
            Ok(())
        }
    }

    struct Failing;

    impl SignalHandler for Failing {
        fn handle(&self, _build: &Build, _context: Map<String, Value>) -> NotificationResult<()> {
            Err(NotificationError::Runtime("boom".to_string()))
        }
    }

    #[test]
    fn test_emit_calls_bound_handlers() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.bind(POSTPULL, recorder.clone());

        let mut context = Map::new();
        context.insert("tag".to_string(), Value::from("stable"));
        dispatcher
            .emit(POSTPULL, &Build::new("babette", "666"), context.clone())
            .unwrap();
        dispatcher
            .emit(PUBLISHED, &Build::new("babette", "667"), Map::new())
            .unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(*seen, vec![("666".to_string(), context)]);
    }

    #[test]
    fn test_emit_unbound_signal_is_noop() {
        let dispatcher = Dispatcher::new();
        assert!(dispatcher
            .emit("deleted", &Build::new("babette", "666"), Map::new())
            .is_ok());
    }

    #[test]
    fn test_emit_stops_at_first_error() {
        let recorder = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.bind(PUBLISHED, Arc::new(Failing));
        dispatcher.bind(PUBLISHED, recorder.clone());

        let result = dispatcher.emit(PUBLISHED, &Build::new("babette", "666"), Map::new());

        assert!(result.is_err());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handlers_are_owned_by_dispatcher() {
        let mut dispatcher = Dispatcher::new();
        {
            let recorder = Arc::new(Recorder::default());
            dispatcher.bind(POSTPULL, recorder);
        }

        assert_eq!(dispatcher.signals(), vec![POSTPULL]);
        assert!(dispatcher
            .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
            .is_ok());
    }
}
