//! Subscription matching.
//!
//! An event `(name, machine)` is matched against exactly four keys of the
//! subscription table:
//!
//! | key                 | meaning                               |
//! |---------------------|---------------------------------------|
//! | `(name, machine)`   | this event on this machine            |
//! | `(*, *)`            | every event on every machine          |
//! | `(*, machine)`      | every event on this machine           |
//! | `(name, *)`         | this event on every machine           |
//!
//! There is no prefix or partial matching.

use std::collections::HashSet;

use tracing::debug;

use crate::models::{Event, Recipient, SubscriptionTable, WILDCARD};

/// Return the wildcard keys that also match `event`.
///
/// The keys carry no `data`.
pub fn wildcard_events(event: &Event) -> [Event; 3] {
    [
        Event::new(WILDCARD, WILDCARD),
        Event::new(WILDCARD, event.machine()),
        Event::new(event.name(), WILDCARD),
    ]
}

/// Return every recipient subscribed to `event`, each exactly once.
pub fn resolve(event: &Event, table: &SubscriptionTable) -> HashSet<Recipient> {
    let wildcards = wildcard_events(event);

    let recipients: HashSet<Recipient> = std::iter::once(event)
        .chain(wildcards.iter())
        .filter_map(|key| table.get(key))
        .flat_map(|subscription| subscription.iter().cloned())
        .collect();

    debug!(
        event = event.name(),
        machine = event.machine(),
        recipients = recipients.len(),
        "Resolved event subscribers"
    );

    recipients
}
