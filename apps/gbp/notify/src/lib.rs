//! gbp-notify
//!
//! Command line front end for the build notifications domain.
//!
//! ```text
//! gbp-notify emit --signal postpull --machine babette --build-id 1234
//! gbp-notify show
//! ```
//!
//! `emit` fires a build signal through an in-process dispatcher wired with
//! the notification handlers, so every subscriber of the resulting event is
//! notified. `show` prints the recipients and subscriptions in the same
//! delimited form the environment variables use.

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Section;
use core_config::{Environment, FromEnv};
use domain_notifications::signals::{POSTPULL, PUBLISHED};
use domain_notifications::{
    BackgroundRunner, Build, Dispatcher, InlineRunner, MethodRegistry, Notifier, Recipient,
    Settings, TaskRunner, WorkerBackend, register_handlers,
};
use eyre::{Result, WrapErr};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gbp-notify")]
#[command(about = "Send build notifications to subscribed recipients")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fire a build signal
    Emit {
        /// Signal to fire
        #[arg(short, long, value_enum)]
        signal: Signal,

        /// Machine the build belongs to
        #[arg(short, long)]
        machine: String,

        /// Build ID
        #[arg(short, long)]
        build_id: String,

        /// Extra signal context as a JSON object, e.g. '{"gbp_metadata": null}'
        #[arg(short, long, value_parser = parse_context)]
        context: Option<Map<String, Value>>,
    },

    /// Print the configured recipients and subscriptions
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Signal {
    Postpull,
    Published,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Postpull => POSTPULL,
            Signal::Published => PUBLISHED,
        }
    }
}

fn parse_context(s: &str) -> Result<Map<String, Value>, String> {
    serde_json::from_str(s).map_err(|e| format!("context must be a JSON object: {e}"))
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the settings cannot be loaded or a notification
/// cannot be sent.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    let settings = Settings::from_env()
        .wrap_err("Failed to load notification settings")
        .suggestion("Check the GBP_NOTIFICATIONS_* environment variables")?;

    match cli.command {
        Commands::Emit {
            signal,
            machine,
            build_id,
            context,
        } => {
            let build = Build::new(machine, build_id);
            emit(Arc::new(settings), signal, &build, context.unwrap_or_default()).await
        }
        Commands::Show => {
            print!("{}", show(&settings));
            Ok(())
        }
    }
}

/// Fire `signal` for `build` and wait until its notifications are out.
pub async fn emit(
    settings: Arc<Settings>,
    signal: Signal,
    build: &Build,
    context: Map<String, Value>,
) -> Result<()> {
    let registry = Arc::new(MethodRegistry::with_builtins());

    let background = match settings.worker_backend {
        WorkerBackend::Sync => None,
        WorkerBackend::Background => Some(Arc::new(BackgroundRunner::current(Arc::clone(
            &settings,
        ))?)),
    };
    let runner: Arc<dyn TaskRunner> = match &background {
        Some(runner) => runner.clone(),
        None => Arc::new(InlineRunner::new(Arc::clone(&settings))),
    };

    let notifier = Notifier::new(settings, registry, runner)?;
    let mut dispatcher = Dispatcher::new();
    register_handlers(&mut dispatcher, Arc::new(notifier));

    info!(
        signal = signal.as_str(),
        machine = %build.machine,
        build_id = %build.build_id,
        "Firing signal"
    );
    dispatcher
        .emit(signal.as_str(), build, context)
        .wrap_err_with(|| format!("Failed to notify {} subscribers", signal.as_str()))?;

    if let Some(runner) = background {
        runner.drain().await;
    }

    Ok(())
}

/// Recipients and subscriptions in their delimited string form.
pub fn show(settings: &Settings) -> String {
    format!(
        "RECIPIENTS={}\nSUBSCRIPTIONS={}\n",
        Recipient::to_string_list(settings.recipients()),
        settings.subscriptions().to_config_string()
    )
}
