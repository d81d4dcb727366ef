#[macro_use]
extern crate prettytable;

use anyhow::Context;
use chrono::{DateTime, Local, TimeZone, Utc};
use structopt::StructOpt;
use tracing::debug;

mod auth;
mod cli;
mod config;
mod drafts;
mod horizon;
mod interface;
mod journal;
mod model;
mod view;

use crate::auth::{ConsoleMailer, Session};
use crate::config::{Config, Zone};
use crate::drafts::Drafts;
use crate::interface::Shift;
use crate::journal::{open_journal, Journal};
use crate::model::{NewTask, TaskStore, TaskUpdate};
use cli::{Command::*, CommandLineArgs};

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("DAYBOOK_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {}", error))?;

    Ok(())
}

/// The store for whoever is using the program: the signed-in user's part of
/// the journal, or the local drafts when nobody is signed in.
fn open_store(config: &Config, session: Option<&Session>) -> anyhow::Result<Box<dyn TaskStore>> {
    match session {
        Some(session) => {
            let db = open_journal(&config.journal_path()?)?;
            debug!(user = %session.user_id, "using journal");
            Ok(Box::new(Journal::new(db, session.user_id.clone())))
        }
        None => {
            debug!("nobody signed in, using local drafts");
            Ok(Box::new(Drafts::load(&config.drafts_path()?)?))
        }
    }
}

fn run<Tz: TimeZone>(action: cli::Command, config: &Config, now: &DateTime<Tz>) -> anyhow::Result<()> {
    let session_path = config.session_path()?;
    let session = Session::load(&session_path)?;

    match action {
        Login { email } => {
            let db = open_journal(&config.journal_path()?)?;
            interface::login(&db, &ConsoleMailer, &email, config.code_ttl()?, now)
        }
        Confirm { code } => {
            let db = open_journal(&config.journal_path()?)?;
            interface::confirm(db, &code, &session_path, &config.drafts_path()?, now)
        }
        Logout => interface::logout(&session_path),
        Whoami => {
            interface::whoami(session.as_ref());
            Ok(())
        }
        action => {
            let mut store = open_store(config, session.as_ref())?;
            run_task_command(action, store.as_mut(), now)
        }
    }
}

fn run_task_command<Tz: TimeZone>(
    action: cli::Command,
    store: &mut dyn TaskStore,
    now: &DateTime<Tz>,
) -> anyhow::Result<()> {
    match action {
        Add {
            title,
            description,
            priority,
            horizon,
            due,
            category,
        } => {
            let new = NewTask {
                title,
                description,
                priority,
                time_horizon: horizon,
                due_date: due,
                category,
            };
            interface::add(store, new, now)
        }
        List { tab, json } => interface::list(store, tab, json, now),
        Show { id } => interface::show(store, id, now),
        Edit {
            id,
            title,
            description,
            status,
            priority,
            horizon,
            due,
            category,
        } => {
            let changes = TaskUpdate {
                title,
                description,
                status,
                priority,
                time_horizon: horizon,
                due_date: due,
                category,
            };
            interface::edit(store, id, changes, now)
        }
        Move { id, horizon } => interface::move_to(store, id, horizon, now),
        Later { id } => interface::shift(store, id, Shift::Later, now),
        Sooner { id } => interface::shift(store, id, Shift::Sooner, now),
        Done { id } => interface::toggle_done(store, id, now),
        Touch { id } => interface::touch(store, id, now),
        Rm { id } => interface::remove(store, id),
        Clear { yes } => interface::clear(store, yes),
        Export => interface::export(store),
        Login { .. } | Confirm { .. } | Logout | Whoami => {
            anyhow::bail!("account commands do not use the task store")
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        journal_file,
        verbose,
        quiet,
    } = CommandLineArgs::from_args();

    init_tracing(quiet, verbose)?;

    let mut config = Config::load().context("Failed to load configuration.")?;
    if journal_file.is_some() {
        config.journal_file = journal_file;
    }

    // "now" is read once per invocation, in the configured zone.
    match config.zone()? {
        Zone::Local => run(action, &config, &Local::now()),
        Zone::Utc => run(action, &config, &Utc::now()),
        Zone::Fixed(offset) => run(action, &config, &Utc::now().with_timezone(&offset)),
    }
}
