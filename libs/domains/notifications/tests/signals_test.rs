//! End-to-end tests: a fired signal reaches the subscribed recipients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use domain_notifications::signals::{POSTPULL, PUBLISHED};
use domain_notifications::{
    Build, Dispatcher, GbpMetadata, MethodRegistry, NotificationResult, Notifier, Package,
    PackageMetadata, Settings, Task, TaskRunner, register_handlers,
};
use serde_json::{Map, Value};

/// Collects tasks instead of running them.
#[derive(Default)]
struct RecordingRunner {
    tasks: Mutex<Vec<Task>>,
}

impl RecordingRunner {
    fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }

    /// Names of the recipients that were sent a webhook, sorted.
    fn webhook_recipients(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tasks()
            .into_iter()
            .filter_map(|task| match task {
                Task::SendHttpRequest { recipient_name, .. } => Some(recipient_name),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }
}

impl TaskRunner for RecordingRunner {
    fn run(&self, task: Task) -> NotificationResult<()> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

const RECIPIENTS: &str = "marduk:webhook=http://host.invalid/marduk \
                          bob:webhook=http://host.invalid/bob \
                          albert:email=albert@host.invalid";

fn setup(subscriptions: &str) -> (Dispatcher, Arc<RecordingRunner>) {
    let vars = HashMap::from([
        ("RECIPIENTS".to_string(), RECIPIENTS.to_string()),
        ("SUBSCRIPTIONS".to_string(), subscriptions.to_string()),
        ("EMAIL_FROM".to_string(), "gbp@host.invalid".to_string()),
    ]);
    let settings = Arc::new(Settings::from_vars(&vars).unwrap());
    let runner = Arc::new(RecordingRunner::default());

    let notifier = Notifier::new(
        settings,
        Arc::new(MethodRegistry::with_builtins()),
        runner.clone(),
    )
    .unwrap();

    let mut dispatcher = Dispatcher::new();
    register_handlers(&mut dispatcher, Arc::new(notifier));

    (dispatcher, runner)
}

fn gbp_metadata_context() -> Map<String, Value> {
    let metadata = GbpMetadata {
        build_duration: 3600,
        packages: PackageMetadata {
            total: 2,
            size: 100,
            built: vec![Package {
                cpv: "dev-vcs/git-2.43.0".to_string(),
                repo: "gentoo".to_string(),
                path: "dev-vcs/git/git-2.43.0-1.gpkg.tar".to_string(),
                build_id: 1,
                size: 50,
                build_time: 0,
            }],
        },
    };

    let mut context = Map::new();
    context.insert(
        "gbp_metadata".to_string(),
        serde_json::to_value(metadata).unwrap(),
    );
    context
}

#[test]
fn test_register_handlers_binds_both_signals() {
    let (dispatcher, _) = setup("");
    assert_eq!(dispatcher.signals(), vec![POSTPULL, PUBLISHED]);
}

#[test]
fn test_exact_subscription() {
    let (dispatcher, runner) = setup("babette.build_pulled=marduk");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();
    dispatcher
        .emit(POSTPULL, &Build::new("lighthouse", "667"), Map::new())
        .unwrap();
    dispatcher
        .emit(PUBLISHED, &Build::new("babette", "666"), Map::new())
        .unwrap();

    assert_eq!(runner.webhook_recipients(), ["marduk"]);
}

#[test]
fn test_wildcard_machine() {
    let (dispatcher, runner) = setup("*.build_pulled=marduk");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();
    dispatcher
        .emit(POSTPULL, &Build::new("lighthouse", "667"), Map::new())
        .unwrap();
    dispatcher
        .emit(PUBLISHED, &Build::new("babette", "666"), Map::new())
        .unwrap();

    assert_eq!(runner.webhook_recipients(), ["marduk", "marduk"]);
}

#[test]
fn test_wildcard_name() {
    let (dispatcher, runner) = setup("babette.*=marduk");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();
    dispatcher
        .emit(PUBLISHED, &Build::new("babette", "666"), Map::new())
        .unwrap();
    dispatcher
        .emit(POSTPULL, &Build::new("lighthouse", "667"), Map::new())
        .unwrap();

    assert_eq!(runner.webhook_recipients(), ["marduk", "marduk"]);
}

#[test]
fn test_wildcard_name_and_machine() {
    let (dispatcher, runner) = setup("*.*=marduk");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();
    dispatcher
        .emit(PUBLISHED, &Build::new("lighthouse", "667"), Map::new())
        .unwrap();

    assert_eq!(runner.webhook_recipients(), ["marduk", "marduk"]);
}

#[test]
fn test_overlapping_wildcards_notify_once() {
    let (dispatcher, runner) =
        setup("*.*=marduk babette.*=marduk,bob *.build_pulled=bob babette.build_pulled=marduk");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();

    assert_eq!(runner.webhook_recipients(), ["bob", "marduk"]);
}

#[test]
fn test_unknown_recipient_is_ignored() {
    let (dispatcher, runner) = setup("babette.build_pulled=bogus");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), Map::new())
        .unwrap();

    assert!(runner.tasks().is_empty());
}

#[test]
fn test_webhook_body_carries_trimmed_build() {
    let (dispatcher, runner) = setup("babette.build_published=marduk");
    let mut build = Build::new("babette", "666");
    build.logs = Some("a very long build log".to_string());

    dispatcher.emit(PUBLISHED, &build, Map::new()).unwrap();

    let tasks = runner.tasks();
    let Task::SendHttpRequest { body, .. } = &tasks[0] else {
        panic!("expected a webhook task, got {:?}", tasks[0]);
    };
    let body: Value = serde_json::from_str(body).unwrap();
    assert_eq!(body["name"], "build_published");
    assert_eq!(body["data"]["build"]["build_id"], "666");
    assert!(body["data"]["build"].get("logs").is_none());
}

#[test]
fn test_email_sent_for_pulled_build() {
    let (dispatcher, runner) = setup("babette.build_pulled=albert");

    dispatcher
        .emit(POSTPULL, &Build::new("babette", "666"), gbp_metadata_context())
        .unwrap();

    let tasks = runner.tasks();
    assert_eq!(tasks.len(), 1);
    let Task::SendMail { from, to, message } = &tasks[0] else {
        panic!("expected an email task, got {:?}", tasks[0]);
    };
    assert_eq!(from, "gbp@host.invalid");
    assert!(to[0].contains("albert@host.invalid"));
    assert!(message.contains("Subject: GBP: build_pulled"));
}

#[test]
fn test_unbound_signal_notifies_nobody() {
    let (dispatcher, runner) = setup("*.*=albert");

    dispatcher
        .emit("deleted", &Build::new("babette", "666"), Map::new())
        .unwrap();

    assert!(runner.tasks().is_empty());
}
