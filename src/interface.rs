use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use humantime::format_duration;
use prettytable::Table;
use rusqlite::Connection;
use tracing::warn;

use crate::auth::{self, Mailer, Session};
use crate::drafts::Drafts;
use crate::horizon::{effective_horizon, local_day};
use crate::journal::Journal;
use crate::model::{NewTask, Status, Task, TaskStore, TaskUpdate, TimeHorizon};
use crate::view::{partition, quick_moves, task_is_overdue, Board, Move, Tab};

const TITLE_WIDTH: usize = 40;

/// Which way a quick move goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Sooner,
    Later,
}

fn found(task: Option<Task>, id: i64) -> Result<Task> {
    task.ok_or_else(|| anyhow!("Task {} not found.", id))
}

pub fn add<Tz: TimeZone>(store: &mut dyn TaskStore, new: NewTask, now: &DateTime<Tz>) -> Result<()> {
    let task = store.create(new, now.with_timezone(&Utc))?;
    println!("{}. {} ({})", task.id, task.title, Tab::from(task.time_horizon).label());
    Ok(())
}

pub fn list<Tz: TimeZone>(store: &dyn TaskStore, tab: Tab, json: bool, now: &DateTime<Tz>) -> Result<()> {
    let tasks = store.all()?;
    let listed = partition(&tasks, tab, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&listed).context("Failed to encode tasks.")?);
        return Ok(());
    }

    let board = Board::build(&tasks, now);
    println!("{}", tabs_header(&board, tab));
    if listed.is_empty() {
        println!("Nothing here.");
    } else {
        tab_table(&listed, tab, now).printstd();
    }
    Ok(())
}

pub fn show<Tz: TimeZone>(store: &dyn TaskStore, id: i64, now: &DateTime<Tz>) -> Result<()> {
    let task = found(store.get(id)?, id)?;
    println!("{}", describe(&task, now));
    Ok(())
}

pub fn edit<Tz: TimeZone>(
    store: &mut dyn TaskStore,
    id: i64,
    changes: TaskUpdate,
    now: &DateTime<Tz>,
) -> Result<()> {
    if changes.is_empty() {
        bail!("Nothing to change. Use `touch` to only mark the task as updated.");
    }
    let task = found(store.update(id, changes, now.with_timezone(&Utc))?, id)?;
    println!("{}", describe(&task, now));
    Ok(())
}

pub fn move_to<Tz: TimeZone>(
    store: &mut dyn TaskStore,
    id: i64,
    horizon: TimeHorizon,
    now: &DateTime<Tz>,
) -> Result<()> {
    let task = found(store.update(id, TaskUpdate::horizon(horizon), now.with_timezone(&Utc))?, id)?;
    println!("{}. {} -> {}", task.id, task.title, Tab::from(horizon).label());
    Ok(())
}

/// Move a task one bucket sooner or later, from the bucket it is shown in.
pub fn shift<Tz: TimeZone>(store: &mut dyn TaskStore, id: i64, shift: Shift, now: &DateTime<Tz>) -> Result<()> {
    let task = found(store.get(id)?, id)?;
    let (sooner, later) = quick_moves(&task, now);
    let chosen = match shift {
        Shift::Sooner => sooner,
        Shift::Later => later,
    };
    match chosen {
        Some(Move::Complete) => set_status(store, id, Status::Completed, now),
        Some(Move::To(horizon)) => move_to(store, id, horizon, now),
        None if task.is_completed() => bail!("Task {} is completed.", id),
        None => bail!("Task {} cannot move any {}.", id, shift_word(shift)),
    }
}

/// Completed becomes pending, anything else becomes completed.
pub fn toggle_done<Tz: TimeZone>(store: &mut dyn TaskStore, id: i64, now: &DateTime<Tz>) -> Result<()> {
    let task = found(store.get(id)?, id)?;
    let status = if task.is_completed() {
        Status::Pending
    } else {
        Status::Completed
    };
    set_status(store, id, status, now)
}

fn set_status<Tz: TimeZone>(store: &mut dyn TaskStore, id: i64, status: Status, now: &DateTime<Tz>) -> Result<()> {
    let task = found(store.update(id, TaskUpdate::status(status), now.with_timezone(&Utc))?, id)?;
    println!("{}. {} [{}]", task.id, task.title, task.status);
    Ok(())
}

pub fn touch<Tz: TimeZone>(store: &mut dyn TaskStore, id: i64, now: &DateTime<Tz>) -> Result<()> {
    found(store.update(id, TaskUpdate::default(), now.with_timezone(&Utc))?, id)?;
    Ok(())
}

pub fn remove(store: &mut dyn TaskStore, id: i64) -> Result<()> {
    if !store.delete(id)? {
        bail!("Task {} not found.", id);
    }
    Ok(())
}

pub fn clear(store: &mut dyn TaskStore, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("This deletes every task. Run again with --yes to confirm.");
    }
    let removed = store.clear()?;
    println!("Deleted {} task(s).", removed);
    Ok(())
}

pub fn export(store: &dyn TaskStore) -> Result<()> {
    let tasks = store.all()?;
    println!("{}", serde_json::to_string_pretty(&tasks).context("Failed to encode tasks.")?);
    Ok(())
}

pub fn login<Tz: TimeZone>(
    db: &Connection,
    mailer: &dyn Mailer,
    email: &str,
    ttl: Duration,
    now: &DateTime<Tz>,
) -> Result<()> {
    auth::request_code(db, mailer, email, now.with_timezone(&Utc), ttl)?;
    let ttl = ttl.to_std().context("Invalid code lifetime.")?;
    println!(
        "If that email is registered, a code has been sent. It expires in {}.",
        format_duration(ttl)
    );
    Ok(())
}

/// Sign in with `code`, then hand local drafts over to the account. The
/// hand-over never makes the sign-in fail.
pub fn confirm<Tz: TimeZone>(
    db: Connection,
    code: &str,
    session_path: &Path,
    drafts_path: &Path,
    now: &DateTime<Tz>,
) -> Result<()> {
    let now = now.with_timezone(&Utc);
    let user = match auth::confirm_code(&db, code, now)? {
        Some(user) => user,
        None => bail!("Invalid or expired code."),
    };
    Session::from(&user).save(session_path)?;
    println!("Signed in as {}.", user.email);

    match Drafts::load(drafts_path) {
        Ok(mut drafts) => {
            let local = drafts.len();
            let mut journal = Journal::new(db, user.id);
            match drafts.merge_into(&mut journal, now) {
                Ok(moved) if moved > 0 => println!("Moved {} local task(s) to your account.", moved),
                Ok(_) if local > 0 => println!("{} local task(s) are still kept on this machine.", local),
                Ok(_) => {}
                Err(error) => warn!(error = %format!("{:#}", error), "local tasks were moved but not removed"),
            }
        }
        Err(error) => warn!(error = %format!("{:#}", error), "could not read local tasks"),
    }
    Ok(())
}

pub fn logout(session_path: &Path) -> Result<()> {
    if Session::sign_out(session_path)? {
        println!("Signed out.");
    } else {
        println!("Not signed in.");
    }
    Ok(())
}

pub fn whoami(session: Option<&Session>) {
    match session {
        Some(session) => println!("{}", session.email),
        None => println!("Not signed in, tasks are kept on this machine."),
    }
}

fn shift_word(shift: Shift) -> &'static str {
    match shift {
        Shift::Sooner => "sooner",
        Shift::Later => "later",
    }
}

/// One line naming every tab with its size, the selected one in brackets.
pub fn tabs_header(board: &Board, selected: Tab) -> String {
    Tab::ALL
        .iter()
        .map(|&tab| {
            let title = format!("{}: {}", board.title(tab), board.size(tab));
            if tab == selected {
                format!("[{}]", title)
            } else {
                title
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn tab_table<Tz: TimeZone>(tasks: &[&Task], tab: Tab, now: &DateTime<Tz>) -> Table {
    let mut table = Table::new();
    table.add_row(row!["id", "task", "priority", "bucket", "category", "status", "note"]);
    for task in tasks {
        table.add_row(row![
            task.id,
            textwrap::fill(&task.title, TITLE_WIDTH),
            task.priority,
            Tab::from(effective_horizon(task.time_horizon, Some(task.updated_at), now)).label(),
            task.category.as_deref().unwrap_or(""),
            task.status,
            note(task, tab, now)
        ]);
    }
    table
}

/// Short remark shown next to a task.
pub fn note<Tz: TimeZone>(task: &Task, tab: Tab, now: &DateTime<Tz>) -> String {
    if tab == Tab::Done {
        return format!("done {}", local_day(task.updated_at, now));
    }
    let mut notes = Vec::new();
    if task_is_overdue(task, now) {
        notes.push("overdue".to_string());
    }
    let effective = effective_horizon(task.time_horizon, Some(task.updated_at), now);
    if effective != task.time_horizon {
        notes.push(format!("from {}", task.time_horizon));
    }
    if let Some(due) = task.due_date {
        notes.push(format!("due {}", local_day(due, now)));
    }
    notes.join(", ")
}

pub fn describe<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> String {
    let effective = effective_horizon(task.time_horizon, Some(task.updated_at), now);
    let mut lines = vec![
        format!("{}. {}", task.id, task.title),
        format!("  status:   {}", task.status),
        format!("  priority: {}", task.priority),
    ];
    if effective == task.time_horizon {
        lines.push(format!("  bucket:   {}", effective));
    } else {
        lines.push(format!("  bucket:   {} (set to {})", effective, task.time_horizon));
    }
    if task_is_overdue(task, now) {
        lines.push("  overdue".to_string());
    }
    if let Some(category) = &task.category {
        lines.push(format!("  category: {}", category));
    }
    if let Some(due) = task.due_date {
        lines.push(format!("  due:      {}", local_day(due, now)));
    }
    lines.push(format!("  created:  {}", local_day(task.created_at, now)));
    lines.push(format!("  updated:  {}", local_day(task.updated_at, now)));
    if let Some(description) = &task.description {
        lines.push(String::new());
        lines.push(textwrap::fill(description, 72));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    /// 2026-02-01 12:00 at UTC+01:00.
    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 1, 12, 0, 0)
            .unwrap()
    }

    fn yesterday() -> DateTime<Utc> {
        "2026-01-31T09:00:00Z".parse().unwrap()
    }

    fn drafts(dir: &tempfile::TempDir) -> Drafts {
        Drafts::load(&dir.path().join("drafts.json")).unwrap()
    }

    #[test]
    fn toggle_done_flips_between_completed_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);
        let task = store.create(NewTask::titled("laundry"), yesterday()).unwrap();

        toggle_done(&mut store, task.id, &now()).unwrap();
        assert_eq!(store.get(task.id).unwrap().unwrap().status, Status::Completed);
        toggle_done(&mut store, task.id, &now()).unwrap();
        assert_eq!(store.get(task.id).unwrap().unwrap().status, Status::Pending);
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);

        let error = toggle_done(&mut store, 12, &now()).unwrap_err();
        assert_eq!(error.to_string(), "Task 12 not found.");
        assert!(remove(&mut store, 12).is_err());
        assert!(touch(&mut store, 12, &now()).is_err());
    }

    #[test]
    fn shift_follows_the_effective_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);
        let mut new = NewTask::titled("dentist");
        new.time_horizon = Some(TimeHorizon::Tomorrow);
        let task = store.create(new, yesterday()).unwrap();

        // set to Tomorrow yesterday, so it is shown in Today: later goes back to Tomorrow
        shift(&mut store, task.id, Shift::Later, &now()).unwrap();
        let moved = store.get(task.id).unwrap().unwrap();
        assert_eq!(moved.time_horizon, TimeHorizon::Tomorrow);
        assert_eq!(effective_horizon(moved.time_horizon, Some(moved.updated_at), &now()), TimeHorizon::Tomorrow);

        shift(&mut store, task.id, Shift::Sooner, &now()).unwrap();
        assert_eq!(store.get(task.id).unwrap().unwrap().time_horizon, TimeHorizon::Today);

        shift(&mut store, task.id, Shift::Sooner, &now()).unwrap();
        assert_eq!(store.get(task.id).unwrap().unwrap().status, Status::Completed);
        assert!(shift(&mut store, task.id, Shift::Later, &now()).is_err());
    }

    #[test]
    fn someday_cannot_move_later() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);
        let mut new = NewTask::titled("learn piano");
        new.time_horizon = Some(TimeHorizon::Someday);
        let task = store.create(new, yesterday()).unwrap();

        let error = shift(&mut store, task.id, Shift::Later, &now()).unwrap_err();
        assert_eq!(error.to_string(), format!("Task {} cannot move any later.", task.id));
    }

    #[test]
    fn touch_keeps_a_tomorrow_task_in_tomorrow() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);
        let mut new = NewTask::titled("call bank");
        new.time_horizon = Some(TimeHorizon::Tomorrow);
        let task = store.create(new, yesterday()).unwrap();

        let tasks = store.all().unwrap();
        assert_eq!(partition(&tasks, Tab::Today, &now()).len(), 1);

        touch(&mut store, task.id, &now()).unwrap();
        let tasks = store.all().unwrap();
        assert!(partition(&tasks, Tab::Today, &now()).is_empty());
        assert_eq!(partition(&tasks, Tab::Tomorrow, &now()).len(), 1);
    }

    #[test]
    fn clear_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = drafts(&dir);
        store.create(NewTask::titled("a"), yesterday()).unwrap();

        assert!(clear(&mut store, false).is_err());
        assert_eq!(store.all().unwrap().len(), 1);
        clear(&mut store, true).unwrap();
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn notes_flag_overdue_and_promoted_tasks() {
        let mut task = NewTask::titled("taxes").into_task(1, yesterday());
        task.time_horizon = TimeHorizon::Tomorrow;
        assert_eq!(note(&task, Tab::Today, &now()), "overdue, from tomorrow");

        task.status = Status::Completed;
        task.updated_at = "2026-02-01T10:00:00Z".parse().unwrap();
        assert_eq!(note(&task, Tab::Done, &now()), "done 2026-02-01");
    }

    #[test]
    fn header_marks_selected_tab_and_overdue_badge() {
        let board = Board {
            today: 3,
            tomorrow: 1,
            someday: 0,
            done: 2,
            overdue: 1,
        };
        assert_eq!(
            tabs_header(&board, Tab::Tomorrow),
            "Today (1 overdue): 3  [Tomorrow: 1]  Someday: 0  Done: 2"
        );
    }

    #[test]
    fn table_has_a_row_per_task() {
        let mut high = NewTask::titled("high").into_task(1, yesterday());
        high.priority = Priority::High;
        let low = NewTask::titled("low").into_task(2, yesterday());
        let tasks = vec![low, high];
        let listed = partition(&tasks, Tab::Today, &now());

        let table = tab_table(&listed, Tab::Today, &now());
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_row(1).unwrap().get_cell(0).unwrap().get_content(), "1");
    }

    #[test]
    fn describe_mentions_the_original_bucket() {
        let mut task = NewTask::titled("plan").into_task(5, yesterday());
        task.time_horizon = TimeHorizon::Tomorrow;
        task.category = Some("work".to_string());
        let text = describe(&task, &now());
        assert!(text.contains("bucket:   today (set to tomorrow)"));
        assert!(text.contains("category: work"));
        assert!(text.contains("overdue"));
    }
}
