//! Domain model: events, recipients and the subscriptions that bind them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{NotificationError, NotificationResult};
use crate::gbp::Build;
use crate::methods::{MethodRegistry, MethodType};
use crate::settings::Settings;
use crate::utils::{find_subscribers, split_string_by};

/// Token matching any event name or any machine in a subscription key.
pub const WILDCARD: &str = "*";

// ============================================================================
// Event
// ============================================================================

/// An event that subscribers want to be notified of.
///
/// Two events are equal when their `name` and `machine` are equal; `data`
/// never takes part in equality or hashing, so an event can be used directly
/// as a subscription key.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    name: String,
    machine: String,
    data: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(name: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            machine: machine.into(),
            data: Map::new(),
        }
    }

    /// Attach the event payload.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Build the event for a signal fired about `build`.
    ///
    /// The payload holds the serialized build under `"build"` plus every
    /// entry of `context`.
    pub fn from_build(
        name: impl Into<String>,
        build: &Build,
        context: Map<String, Value>,
    ) -> NotificationResult<Self> {
        let mut data = context;
        data.insert("build".to_string(), serde_json::to_value(build)?);

        Ok(Self::new(name, build.machine.clone()).with_data(data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn machine(&self) -> &str {
        &self.machine
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Whether this is a wildcard lookup key rather than a real occurrence.
    pub fn is_pattern(&self) -> bool {
        self.name == WILDCARD || self.machine == WILDCARD
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.machine == other.machine
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.machine.hash(state);
    }
}

// ============================================================================
// Recipient
// ============================================================================

/// A named notification target.
///
/// `config` maps a delivery method name (`email`, `webhook`, ...) to that
/// method's configuration for this recipient. Identity is the name alone.
#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    name: String,
    config: BTreeMap<String, String>,
}

impl Recipient {
    /// Create a recipient with no delivery methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BTreeMap::new(),
        }
    }

    /// Create a recipient with the given method configuration.
    pub fn with_config<I, K, V>(name: impl Into<String>, config: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            config: config
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BTreeMap<String, String> {
        &self.config
    }

    /// The configuration for one delivery method, if the recipient uses it.
    pub fn config_for(&self, method: &str) -> Option<&str> {
        self.config.get(method).map(String::as_str)
    }

    /// Delivery methods this recipient is configured for, sorted by name.
    pub fn methods(&self, registry: &MethodRegistry) -> NotificationResult<Vec<MethodType>> {
        let methods = self
            .config
            .keys()
            .map(|key| registry.get_method(key))
            .collect::<NotificationResult<BTreeSet<_>>>()?;

        Ok(methods.into_iter().collect())
    }

    /// Look the recipient up by name in a settings snapshot.
    pub fn from_name(name: &str, settings: &Settings) -> NotificationResult<Recipient> {
        settings
            .recipient(name)
            .cloned()
            .ok_or_else(|| NotificationError::RecipientNotFound(name.to_string()))
    }

    /// Parse `name:key=value,key=value name2:key=value ...`.
    ///
    /// The result is sorted by name. A repeated name keeps its first entry.
    pub fn from_string(string: &str) -> NotificationResult<Vec<Recipient>> {
        let mut recipients = BTreeSet::new();

        for item in string.split_whitespace() {
            let (name, rest) = split_string_by(item, ':')?;
            let mut config = BTreeMap::new();

            for attr in rest.split(',').filter(|attr| !attr.is_empty()) {
                let (key, value) = split_string_by(attr, '=')?;
                config.insert(key.to_string(), value.to_string());
            }

            recipients.insert(Recipient {
                name: name.to_string(),
                config,
            });
        }

        Ok(recipients.into_iter().collect())
    }

    /// Build recipients from the structured `name -> {method -> config}` form.
    pub fn from_map(map: BTreeMap<String, BTreeMap<String, String>>) -> Vec<Recipient> {
        map.into_iter()
            .map(|(name, config)| Recipient { name, config })
            .collect()
    }

    /// Serialize recipients back into the delimited string form.
    pub fn to_string_list(recipients: &[Recipient]) -> String {
        recipients
            .iter()
            .map(|recipient| {
                let attrs = recipient
                    .config
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}:{}", recipient.name, attrs)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl PartialEq for Recipient {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Recipient {}

impl Hash for Recipient {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Recipient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Recipient {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// The recipients bound to one event key, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    subscribers: BTreeSet<Recipient>,
}

impl Subscription {
    pub fn new(subscribers: impl IntoIterator<Item = Recipient>) -> Self {
        Self {
            subscribers: subscribers.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.subscribers.iter()
    }

    pub fn contains(&self, recipient: &Recipient) -> bool {
        self.subscribers.contains(recipient)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl FromIterator<Recipient> for Subscription {
    fn from_iter<T: IntoIterator<Item = Recipient>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Subscription {
    type Item = &'a Recipient;
    type IntoIter = std::collections::btree_set::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscribers.iter()
    }
}

// ============================================================================
// SubscriptionTable
// ============================================================================

/// Structured subscriptions: machine -> event name -> recipient names.
pub type SubscriptionMap = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Mapping from event key to its subscription. Built once, then read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionTable {
    entries: HashMap<Event, Subscription>,
}

impl SubscriptionTable {
    pub fn get(&self, event: &Event) -> Option<&Subscription> {
        self.entries.get(event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by `(machine, name)`.
    pub fn entries(&self) -> Vec<(&Event, &Subscription)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|(a, _), (b, _)| (a.machine(), a.name()).cmp(&(b.machine(), b.name())));
        entries
    }

    /// Parse `machine.event=name1,name2 machine2.event2=name3 ...`.
    ///
    /// Names that are not in `recipients` are dropped. When a key appears more
    /// than once the last occurrence replaces the earlier ones.
    pub fn from_string(string: &str, recipients: &[Recipient]) -> NotificationResult<Self> {
        let mut entries = HashMap::new();

        for item in string.split_whitespace() {
            let (machine_event, names) = split_string_by(item, '=')?;
            let (machine, event_name) = split_string_by(machine_event, '.')?;

            let names: Vec<&str> = names.split(',').filter(|name| !name.is_empty()).collect();
            let subscription = Subscription {
                subscribers: find_subscribers(recipients, &names),
            };

            entries.insert(Event::new(event_name, machine), subscription);
        }

        Ok(Self { entries })
    }

    /// Build the table from the structured `machine -> event -> [names]` form.
    pub fn from_map(map: SubscriptionMap, recipients: &[Recipient]) -> Self {
        let entries = map
            .into_iter()
            .flat_map(|(machine, events)| {
                events.into_iter().map(move |(event_name, names)| {
                    let subscription = Subscription {
                        subscribers: find_subscribers(recipients, &names),
                    };
                    (Event::new(event_name, machine.clone()), subscription)
                })
            })
            .collect();

        Self { entries }
    }

    /// Serialize back into the delimited string form, sorted by key.
    pub fn to_config_string(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(event, subscription)| {
                let names = subscription
                    .iter()
                    .map(Recipient::name)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}.{}={}", event.machine(), event.name(), names)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl FromIterator<(Event, Subscription)> for SubscriptionTable {
    fn from_iter<T: IntoIterator<Item = (Event, Subscription)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
