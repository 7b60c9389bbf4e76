use std::io::{self, Write};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{info, warn};

use weekwise::cli::{Cli, Commands, init_tracing, parse_day};
use weekwise::display::{DisplayOptions, format_summary, render_projection, supports_color};
use weekwise::{AppError, Config, JsonFileStore, MutationState, ReconcileError, Reconciler, Result};
use weekwise_core::{DropEvent, EditForm, TaskIndex, compose, parse_draft};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let cfg = Config::load()?;
    let store = Arc::new(JsonFileStore::new(cfg.tasks_path()));
    let reconciler = Reconciler::new(store.clone(), Arc::new(cfg.session()));
    info!(path = %store.path().display(), "using task store");

    // Recovery must work even when the current document no longer loads
    if !matches!(cli.command, Commands::Recover { .. }) {
        match reconciler.load().await {
            Ok(_) => {}
            Err(ReconcileError::Unauthenticated) => {
                warn!("no user_id configured, starting with an empty task list");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // One day snapshot for the whole invocation
    let today = Local::now().date_naive();

    match cli.command {
        Commands::Show {
            view,
            week,
            sort,
            completed,
            hide_completed,
            descriptions,
            search,
            no_color,
        } => {
            let mut params = cfg.view_params().with_week_offset(week);
            if let Some(mode) = view {
                params.mode = mode;
            }
            if let Some(sort) = sort {
                params = params.with_sort(sort);
            }
            if completed {
                params = params.with_completed(true);
            } else if hide_completed {
                params = params.with_completed(false);
            }
            if descriptions {
                params = params.with_descriptions(true);
            }
            if let Some(query) = search {
                params = params.with_search(query);
            }

            let index = reconciler.snapshot().await;
            let projection = compose(index.tasks(), &params, today);
            let opts = DisplayOptions {
                show_descriptions: params.show_descriptions,
                use_color: !no_color && supports_color(),
            };

            println!("{}", render_projection(&projection, today, opts));
            let cards = projection.cards();
            if !cards.is_empty() {
                println!();
                let done = cards.iter().filter(|t| t.is_completed).count();
                println!("{}", format_summary(cards.len(), done, opts.use_color));
            }
        }

        Commands::Add { text, view, week } => {
            let text = text.join(" ");
            let draft = parse_draft(&text, today)
                .ok_or_else(|| AppError::validation("title", "Title must not be blank"))?;

            let mut params = cfg.view_params().with_week_offset(week);
            if let Some(mode) = view {
                params.mode = mode;
            }
            let draft = draft.placed(&params, today);

            match reconciler.add(draft).await {
                Ok(task) => match (task.date, task.time) {
                    (Some(date), Some(time)) => println!(
                        "Task added: {} (scheduled: {} {})",
                        task.title,
                        date.format("%Y-%m-%d"),
                        time.format("%H:%M")
                    ),
                    (Some(date), None) => println!(
                        "Task added: {} (scheduled: {})",
                        task.title,
                        date.format("%Y-%m-%d")
                    ),
                    _ => println!("Task added: {}", task.title),
                },
                Err(rejected) => {
                    eprintln!("Task not saved, your text was: {}", rejected.input.title);
                    return Err(rejected.into());
                }
            }
        }

        Commands::Toggle { id } => {
            let index = reconciler.snapshot().await;
            let id = index.resolve(&id)?;
            let settled = reconciler.toggle(&id).await?;

            match settled.state {
                MutationState::Committed => {
                    let index = reconciler.snapshot().await;
                    let task = index.get_or_err(&id)?;
                    let status = if task.is_completed { "done" } else { "open" };
                    println!("Marked {} as {}: {}", id.short(), status, task.title);
                }
                MutationState::RolledBack => {
                    return Err(AppError::store("Could not save the change, it was undone"));
                }
                MutationState::Idle | MutationState::Pending => {
                    return Err(AppError::TaskNotFound(id));
                }
            }
        }

        Commands::Edit {
            id,
            title,
            date,
            time,
            description,
            done,
            open,
        } => {
            if title.is_none() && date.is_none() && time.is_none() && description.is_none() && !done && !open {
                return Err(AppError::validation(
                    "edit",
                    "At least one of --title, --date, --time, --description, --done or --open must be provided",
                ));
            }

            let index = reconciler.snapshot().await;
            let id = index.resolve(&id)?;
            let form = edit_form(&index, &id, title, date, time, description, done, open, today)?;

            match reconciler.edit(&id, form).await {
                Ok(Some(task)) => {
                    println!("Updated {}: {}", id.short(), task.title);
                    if let Some(date) = task.date {
                        match task.time {
                            Some(time) => println!("  Scheduled: {} {}", date.format("%Y-%m-%d"), time.format("%H:%M")),
                            None => println!("  Scheduled: {}", date.format("%Y-%m-%d")),
                        }
                    }
                }
                Ok(None) => return Err(AppError::TaskNotFound(id)),
                Err(rejected) => return Err(rejected.into()),
            }
        }

        Commands::Move { id, day } => {
            let index = reconciler.snapshot().await;
            let id = index.resolve(&id)?;
            let day = parse_day(&day, today)?;

            match reconciler.reschedule(DropEvent::new(id.clone(), day)).await? {
                Some(task) => println!("Moved {} to {}: {}", id.short(), day, task.title),
                None => return Err(AppError::TaskNotFound(id)),
            }
        }

        Commands::Clear { force } => {
            let count = reconciler.snapshot().await.count_completed();
            if count == 0 {
                println!("No completed tasks to remove.");
                return Ok(());
            }

            if !force && !confirm(&format!("Remove {} completed task(s)?", count))? {
                println!("Cancelled.");
                return Ok(());
            }

            let settled = reconciler.clear_completed().await?;
            if settled.state == MutationState::RolledBack {
                return Err(AppError::store("Could not remove completed tasks, nothing was deleted"));
            }
            println!("Removed {} completed task(s).", settled.affected);
        }

        Commands::Refresh => {
            let count = reconciler.load().await?;
            println!("Loaded {} task(s).", count);
        }

        Commands::Recover { force } => {
            if !store.backup_exists().await {
                return Err(AppError::parse("No backup file found"));
            }

            if !force && !confirm("Restore tasks from backup? Current tasks will be replaced.")? {
                println!("Cancelled.");
                return Ok(());
            }

            let count = store.recover().await?;
            println!("Recovered {} task(s) from backup.", count);
        }
    }

    Ok(())
}

/// Prefill from the current record, then overlay the flags that were given
#[allow(clippy::too_many_arguments)]
fn edit_form(
    index: &TaskIndex,
    id: &weekwise_core::TaskId,
    title: Option<String>,
    date: Option<String>,
    time: Option<String>,
    description: Option<String>,
    done: bool,
    open: bool,
    today: NaiveDate,
) -> Result<EditForm> {
    let mut form = EditForm::from_task(index.get_or_err(id)?);

    if let Some(title) = title {
        form.title = title;
    }
    if let Some(date) = date {
        form.date = match date.trim() {
            "" | "none" => String::new(),
            raw => parse_day(&[raw.to_string()], today)?.to_string(),
        };
    }
    if let Some(time) = time {
        form.time = if time.trim() == "none" { String::new() } else { time };
    }
    if let Some(description) = description {
        form.description = description;
    }
    if done {
        form.is_completed = true;
    } else if open {
        form.is_completed = false;
    }
    Ok(form)
}

/// Ask user for confirmation
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase() == "y")
}
