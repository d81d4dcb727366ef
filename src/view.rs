use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};

use crate::horizon::{effective_horizon, is_overdue, is_stale_completion};
use crate::model::{Task, TaskError, TimeHorizon};

/// The four lists a user can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Today,
    Tomorrow,
    Someday,
    Done,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Today, Tab::Tomorrow, Tab::Someday, Tab::Done];

    pub const fn as_str(self) -> &'static str {
        match self {
            Tab::Today => "today",
            Tab::Tomorrow => "tomorrow",
            Tab::Someday => "someday",
            Tab::Done => "done",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Tab::Today => "Today",
            Tab::Tomorrow => "Tomorrow",
            Tab::Someday => "Someday",
            Tab::Done => "Done",
        }
    }

    /// The horizon a tab lists, `None` for Done.
    pub const fn horizon(self) -> Option<TimeHorizon> {
        match self {
            Tab::Today => Some(TimeHorizon::Today),
            Tab::Tomorrow => Some(TimeHorizon::Tomorrow),
            Tab::Someday => Some(TimeHorizon::Someday),
            Tab::Done => None,
        }
    }
}

impl From<TimeHorizon> for Tab {
    fn from(horizon: TimeHorizon) -> Self {
        match horizon {
            TimeHorizon::Today => Tab::Today,
            TimeHorizon::Tomorrow => Tab::Tomorrow,
            TimeHorizon::Someday => Tab::Someday,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, TaskError> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case(Tab::Done.as_str()) {
            return Ok(Tab::Done);
        }
        wanted.parse::<TimeHorizon>().map(Tab::from).map_err(|_| TaskError::UnknownName {
            kind: "tab",
            value: wanted.to_string(),
        })
    }
}

/// Whether `task` is listed under `tab` at `now`.
///
/// Done lists every completed task. The other tabs list the tasks whose
/// effective horizon matches, except those completed on an earlier day: they
/// drop out of their bucket and are only reachable from Done.
pub fn belongs_to<Tz: TimeZone>(task: &Task, tab: Tab, now: &DateTime<Tz>) -> bool {
    match tab.horizon() {
        None => task.is_completed(),
        Some(horizon) => {
            effective_horizon(task.time_horizon, Some(task.updated_at), now) == horizon
                && !is_stale_completion(task.is_completed(), Some(task.updated_at), now)
        }
    }
}

/// The tasks of `tab`, ready for display: incomplete before completed, then
/// higher priority first. Otherwise the input order is kept.
pub fn partition<'a, Tz: TimeZone>(tasks: &'a [Task], tab: Tab, now: &DateTime<Tz>) -> Vec<&'a Task> {
    let mut listed: Vec<&Task> = tasks.iter().filter(|task| belongs_to(task, tab, now)).collect();
    listed.sort_by_key(|task| (task.is_completed(), Reverse(task.priority)));
    listed
}

pub fn task_is_overdue<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> bool {
    is_overdue(
        task.time_horizon,
        task.is_completed(),
        Some(task.created_at),
        Some(task.updated_at),
        now,
    )
}

/// Number of overdue tasks in the whole collection, whatever tab is shown.
pub fn overdue_count<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> usize {
    tasks.iter().filter(|task| task_is_overdue(task, now)).count()
}

/// Sizes of every tab plus the overdue badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Board {
    pub today: usize,
    pub tomorrow: usize,
    pub someday: usize,
    pub done: usize,
    pub overdue: usize,
}

impl Board {
    pub fn build<Tz: TimeZone>(tasks: &[Task], now: &DateTime<Tz>) -> Board {
        let count = |tab| tasks.iter().filter(|task| belongs_to(task, tab, now)).count();
        Board {
            today: count(Tab::Today),
            tomorrow: count(Tab::Tomorrow),
            someday: count(Tab::Someday),
            done: count(Tab::Done),
            overdue: overdue_count(tasks, now),
        }
    }

    pub fn size(&self, tab: Tab) -> usize {
        match tab {
            Tab::Today => self.today,
            Tab::Tomorrow => self.tomorrow,
            Tab::Someday => self.someday,
            Tab::Done => self.done,
        }
    }

    /// Tab title as shown in the header, e.g. "Today (2 overdue)".
    pub fn title(&self, tab: Tab) -> String {
        if tab == Tab::Today && self.overdue > 0 {
            format!("{} ({} overdue)", tab.label(), self.overdue)
        } else {
            tab.label().to_string()
        }
    }
}

/// What a quick move does to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Complete,
    To(TimeHorizon),
}

/// Quick moves available from the bucket a task is shown in, as
/// `(sooner, later)`. Completed tasks have none.
pub fn quick_moves<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> (Option<Move>, Option<Move>) {
    if task.is_completed() {
        return (None, None);
    }
    match effective_horizon(task.time_horizon, Some(task.updated_at), now) {
        TimeHorizon::Today => (Some(Move::Complete), Some(Move::To(TimeHorizon::Tomorrow))),
        TimeHorizon::Tomorrow => (
            Some(Move::To(TimeHorizon::Today)),
            Some(Move::To(TimeHorizon::Someday)),
        ),
        TimeHorizon::Someday => (Some(Move::To(TimeHorizon::Tomorrow)), None),
    }
}
