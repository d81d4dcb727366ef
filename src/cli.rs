use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use structopt::StructOpt;

use crate::model::{Priority, Status, TimeHorizon};
use crate::view::Tab;

/// Parse a due date given as YYYY-MM-DD. Stored as midnight UTC.
fn parse_due(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    Ok(DateTime::from_naive_utc_and_offset(day.and_time(chrono::NaiveTime::MIN), Utc))
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Write a new task.
    Add {
        /// The task title.
        #[structopt()]
        title: String,

        #[structopt(short, long)]
        description: Option<String>,

        /// low, medium or high (default: medium)
        #[structopt(short, long)]
        priority: Option<Priority>,

        /// today, tomorrow or someday (default: today)
        #[structopt(short = "H", long)]
        horizon: Option<TimeHorizon>,

        /// Due date (YYYY-MM-DD)
        #[structopt(long, parse(try_from_str = parse_due))]
        due: Option<DateTime<Utc>>,

        #[structopt(short, long)]
        category: Option<String>,
    },
    /// List the tasks of a tab: today, tomorrow, someday or done.
    List {
        #[structopt(default_value = "today")]
        tab: Tab,

        /// Print the tab as JSON.
        #[structopt(long)]
        json: bool,
    },
    /// Show a single task.
    Show {
        #[structopt()]
        id: i64,
    },
    /// Change some fields of a task.
    Edit {
        #[structopt()]
        id: i64,

        #[structopt(long)]
        title: Option<String>,

        /// New description; an empty string clears it.
        #[structopt(long)]
        description: Option<String>,

        #[structopt(long)]
        status: Option<Status>,

        #[structopt(long)]
        priority: Option<Priority>,

        #[structopt(long)]
        horizon: Option<TimeHorizon>,

        #[structopt(long, parse(try_from_str = parse_due))]
        due: Option<DateTime<Utc>>,

        /// New category; an empty string clears it.
        #[structopt(long)]
        category: Option<String>,
    },
    /// Put a task in another bucket.
    Move {
        #[structopt()]
        id: i64,

        #[structopt()]
        horizon: TimeHorizon,
    },
    /// Push a task one bucket further away (Today to Tomorrow, Tomorrow to Someday).
    Later {
        #[structopt()]
        id: i64,
    },
    /// Pull a task one bucket closer, or complete it when it is already in Today.
    Sooner {
        #[structopt()]
        id: i64,
    },
    /// Mark a task as completed, or as pending again if it already was.
    Done {
        #[structopt()]
        id: i64,
    },
    /// Mark a task as updated now, without changing it.
    Touch {
        #[structopt()]
        id: i64,
    },
    /// Delete a task.
    Rm {
        #[structopt()]
        id: i64,
    },
    /// Delete every task.
    Clear {
        /// Required, this cannot be undone.
        #[structopt(long)]
        yes: bool,
    },
    /// Print every task as JSON.
    Export,
    /// Ask for a sign-in code.
    Login {
        #[structopt()]
        email: String,
    },
    /// Sign in with a code. Tasks kept locally are moved to the account.
    Confirm {
        #[structopt()]
        code: String,
    },
    /// Sign out. Later tasks are kept locally.
    Logout,
    /// Tell who is signed in.
    Whoami,
}

#[derive(Debug, StructOpt)]
#[structopt(name = "daybook", about = "A small planner for today, tomorrow and someday.")]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different journal file.
    #[structopt(parse(from_os_str), short, long)]
    pub journal_file: Option<PathBuf>,

    /// Log debug output.
    #[structopt(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[structopt(short, long)]
    pub quiet: bool,
}
