//! Settings for build notifications.
//!
//! Settings are read once from `GBP_NOTIFICATIONS_*` environment variables
//! into an immutable snapshot that is shared (behind an `Arc`) by the
//! notifier, the delivery methods and the task runner.
//!
//! | Variable (without prefix)  | Default | Notes                                   |
//! |----------------------------|---------|-----------------------------------------|
//! | `RECIPIENTS`               | empty   | `name:method=config,... ...`            |
//! | `SUBSCRIPTIONS`            | empty   | `machine.event=name,... ...`            |
//! | `CONFIG_FILE`              | unset   | TOML file, replaces the two above       |
//! | `EMAIL_FROM`               | empty   |                                         |
//! | `EMAIL_SMTP_HOST`          | empty   |                                         |
//! | `EMAIL_SMTP_PORT`          | `465`   | implicit TLS                            |
//! | `EMAIL_SMTP_USERNAME`      | empty   |                                         |
//! | `EMAIL_SMTP_PASSWORD`      | empty   |                                         |
//! | `EMAIL_SMTP_PASSWORD_FILE` | empty   | takes precedence over the password      |
//! | `REQUESTS_TIMEOUT`         | `10`    | seconds                                 |
//! | `PUSHOVER_APP_TOKEN`       | empty   |                                         |
//! | `PUSHOVER_USER_KEY`        | empty   |                                         |
//! | `WORKER_BACKEND`           | `sync`  | `sync` or `background`                  |

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_with_prefix};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{NotificationError, NotificationResult};
use crate::models::{Recipient, SubscriptionMap, SubscriptionTable};

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "GBP_NOTIFICATIONS_";

const DEFAULT_SMTP_PORT: u16 = 465;
const DEFAULT_REQUESTS_TIMEOUT_SECS: u64 = 10;

/// Which task runner executes delivery tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerBackend {
    /// Run each task to completion before `send` returns.
    #[default]
    Sync,
    /// Spawn each task onto the Tokio runtime and return immediately.
    Background,
}

impl FromStr for WorkerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sync" => Ok(WorkerBackend::Sync),
            "background" => Ok(WorkerBackend::Background),
            other => Err(format!("unknown worker backend {:?}", other)),
        }
    }
}

/// Structured recipients/subscriptions, as found in the TOML config file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    recipients: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    subscriptions: SubscriptionMap,
}

/// Immutable settings snapshot.
#[derive(Debug, Clone)]
pub struct Settings {
    pub recipients: Vec<Recipient>,
    pub subscriptions: SubscriptionTable,
    pub email_from: String,
    pub email_smtp_host: String,
    pub email_smtp_port: u16,
    pub email_smtp_username: String,
    pub email_smtp_password: String,
    pub email_smtp_password_file: String,
    pub requests_timeout: Duration,
    pub pushover_app_token: String,
    pub pushover_user_key: String,
    pub worker_backend: WorkerBackend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subscriptions: SubscriptionTable::default(),
            email_from: String::new(),
            email_smtp_host: String::new(),
            email_smtp_port: DEFAULT_SMTP_PORT,
            email_smtp_username: String::new(),
            email_smtp_password: String::new(),
            email_smtp_password_file: String::new(),
            requests_timeout: Duration::from_secs(DEFAULT_REQUESTS_TIMEOUT_SECS),
            pushover_app_token: String::new(),
            pushover_user_key: String::new(),
            worker_backend: WorkerBackend::default(),
        }
    }
}

impl Settings {
    /// Build settings from variables with the prefix already stripped.
    pub fn from_vars(vars: &HashMap<String, String>) -> NotificationResult<Self> {
        let var = |key: &str| vars.get(key).cloned().unwrap_or_default();

        let (recipients, subscriptions) = match vars.get("CONFIG_FILE").filter(|p| !p.is_empty()) {
            Some(path) => {
                if vars.contains_key("RECIPIENTS") || vars.contains_key("SUBSCRIPTIONS") {
                    warn!(
                        config_file = %path,
                        "CONFIG_FILE is set; ignoring RECIPIENTS and SUBSCRIPTIONS"
                    );
                }
                Self::load_config_file(Path::new(path))?
            }
            None => {
                let recipients = Recipient::from_string(&var("RECIPIENTS"))?;
                let subscriptions =
                    SubscriptionTable::from_string(&var("SUBSCRIPTIONS"), &recipients)?;
                (recipients, subscriptions)
            }
        };

        let settings = Self {
            recipients,
            subscriptions,
            email_from: var("EMAIL_FROM"),
            email_smtp_host: var("EMAIL_SMTP_HOST"),
            email_smtp_port: parse_var(vars, "EMAIL_SMTP_PORT", DEFAULT_SMTP_PORT)?,
            email_smtp_username: var("EMAIL_SMTP_USERNAME"),
            email_smtp_password: var("EMAIL_SMTP_PASSWORD"),
            email_smtp_password_file: var("EMAIL_SMTP_PASSWORD_FILE"),
            requests_timeout: Duration::from_secs(parse_var(
                vars,
                "REQUESTS_TIMEOUT",
                DEFAULT_REQUESTS_TIMEOUT_SECS,
            )?),
            pushover_app_token: var("PUSHOVER_APP_TOKEN"),
            pushover_user_key: var("PUSHOVER_USER_KEY"),
            worker_backend: parse_var(vars, "WORKER_BACKEND", WorkerBackend::default())?,
        };

        debug!(
            recipients = settings.recipients.len(),
            subscriptions = settings.subscriptions.len(),
            worker_backend = ?settings.worker_backend,
            "Loaded notification settings"
        );

        Ok(settings)
    }

    fn load_config_file(path: &Path) -> NotificationResult<(Vec<Recipient>, SubscriptionTable)> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NotificationError::ConfigFile(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ConfigFile = toml::from_str(&text)?;

        let recipients = Recipient::from_map(config.recipients);
        let subscriptions = SubscriptionTable::from_map(config.subscriptions, &recipients);

        Ok((recipients, subscriptions))
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// Find a recipient by name.
    pub fn recipient(&self, name: &str) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.name() == name)
    }

    /// The SMTP password. The password file, when set, wins over the plain value.
    pub fn email_password(&self) -> NotificationResult<String> {
        if self.email_smtp_password_file.is_empty() {
            return Ok(self.email_smtp_password.clone());
        }

        let contents = std::fs::read_to_string(&self.email_smtp_password_file)?;
        Ok(contents.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl FromEnv for Settings {
    type Error = NotificationError;

    fn from_env() -> Result<Self, Self::Error> {
        Self::from_vars(&env_with_prefix(ENV_PREFIX))
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value
            .parse()
            .map_err(|e: T::Err| ConfigError::parse(format!("{}{}", ENV_PREFIX, key), e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, Subscription};
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_vars(&HashMap::new()).unwrap();

        assert!(settings.recipients().is_empty());
        assert!(settings.subscriptions().is_empty());
        assert_eq!(settings.email_smtp_port, 465);
        assert_eq!(settings.requests_timeout, Duration::from_secs(10));
        assert_eq!(settings.worker_backend, WorkerBackend::Sync);
    }

    #[test]
    fn test_from_vars_parses_strings() {
        let settings = Settings::from_vars(&vars(&[
            ("RECIPIENTS", "albert:email=marduk@host.invalid"),
            ("SUBSCRIPTIONS", "babette.build_pulled=albert"),
            ("EMAIL_FROM", "marduk@host.invalid"),
            ("EMAIL_SMTP_PORT", "2525"),
            ("WORKER_BACKEND", "background"),
        ]))
        .unwrap();

        let albert = Recipient::new("albert");
        assert_eq!(settings.recipients(), &[albert.clone()]);
        assert_eq!(
            settings
                .subscriptions()
                .get(&Event::new("build_pulled", "babette")),
            Some(&Subscription::new([albert]))
        );
        assert_eq!(settings.email_from, "marduk@host.invalid");
        assert_eq!(settings.email_smtp_port, 2525);
        assert_eq!(settings.worker_backend, WorkerBackend::Background);
    }

    #[test]
    fn test_from_vars_rejects_malformed_recipients() {
        let err = Settings::from_vars(&vars(&[("RECIPIENTS", "albert")])).unwrap_err();
        assert!(matches!(err, NotificationError::Parse { delimiter: ':', .. }));
    }

    #[test]
    fn test_from_vars_rejects_bad_port() {
        let err = Settings::from_vars(&vars(&[("EMAIL_SMTP_PORT", "smtp")])).unwrap_err();
        assert!(err.to_string().contains("GBP_NOTIFICATIONS_EMAIL_SMTP_PORT"));
    }

    #[test]
    fn test_from_vars_rejects_unknown_backend() {
        let err = Settings::from_vars(&vars(&[("WORKER_BACKEND", "celery")])).unwrap_err();
        assert!(err.to_string().contains("celery"));
    }

    #[test]
    fn test_email_password_string() {
        let settings = Settings {
            email_smtp_password: "foobar".to_string(),
            ..Settings::default()
        };

        assert_eq!(settings.email_password().unwrap(), "foobar");
    }

    #[test]
    fn test_email_password_prefers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "file").unwrap();

        let settings = Settings {
            email_smtp_password: "string".to_string(),
            email_smtp_password_file: file.path().display().to_string(),
            ..Settings::default()
        };

        assert_eq!(settings.email_password().unwrap(), "file");
    }

    #[test]
    fn test_subscriptions_and_recipients_from_file() {
        let toml = r#"
[recipients]
# Comment
marduk = {email = "marduk@host.invalid"}
bob = {email = "bob@host.invalid"}

[subscriptions]
babette = {pull = ["marduk", "bob"], foo = ["marduk"]}
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let path = file.path().display().to_string();
        let settings = Settings::from_vars(&vars(&[("CONFIG_FILE", path.as_str())])).unwrap();

        let bob = Recipient::with_config("bob", [("email", "bob@host.invalid")]);
        let marduk = Recipient::with_config("marduk", [("email", "marduk@host.invalid")]);

        assert_eq!(settings.recipients(), &[bob.clone(), marduk.clone()]);
        assert_eq!(settings.recipients()[0].config_for("email"), Some("bob@host.invalid"));

        let expected: SubscriptionTable = [
            (
                Event::new("pull", "babette"),
                Subscription::new([bob, marduk.clone()]),
            ),
            (Event::new("foo", "babette"), Subscription::new([marduk])),
        ]
        .into_iter()
        .collect();
        assert_eq!(settings.subscriptions(), &expected);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Settings::from_vars(&vars(&[("CONFIG_FILE", "/nonexistent/gbp.toml")]))
            .unwrap_err();
        assert!(matches!(err, NotificationError::ConfigFile(_)));
    }

    #[test]
    fn test_recipient_lookup() {
        let settings = Settings {
            recipients: vec![Recipient::new("foo")],
            ..Settings::default()
        };

        assert_eq!(Recipient::from_name("foo", &settings).unwrap(), Recipient::new("foo"));
        assert!(matches!(
            Recipient::from_name("bar", &settings),
            Err(NotificationError::RecipientNotFound(name)) if name == "bar"
        ));
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("GBP_NOTIFICATIONS_RECIPIENTS", Some("marduk:email=marduk@host.invalid")),
                ("GBP_NOTIFICATIONS_SUBSCRIPTIONS", Some("*.build_published=marduk")),
                ("GBP_NOTIFICATIONS_CONFIG_FILE", None),
                ("GBP_NOTIFICATIONS_EMAIL_SMTP_PORT", None),
                ("GBP_NOTIFICATIONS_WORKER_BACKEND", None),
                ("GBP_NOTIFICATIONS_REQUESTS_TIMEOUT", Some("3")),
            ],
            || {
                let settings = Settings::from_env().unwrap();
                assert_eq!(settings.recipients().len(), 1);
                assert_eq!(settings.subscriptions().len(), 1);
                assert_eq!(settings.requests_timeout, Duration::from_secs(3));
            },
        );
    }
}
