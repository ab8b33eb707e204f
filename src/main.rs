//! sprintd - CLI entry point
//!
//! Thin glue: parses arguments, loads configuration, constructs the
//! services, and prints results. All scheduling logic lives in the
//! library.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result, bail};
use tracing::info;

use sprintd::cli::{BacklogCommand, Cli, Command, SprintCommand, WorkspaceCommand};
use sprintd::config::Config;
use sprintd::coordinator::{CommandExecutor, ExecutionCoordinator};
use sprintd::domain::{Bug, ScheduledItem, Sprint, Story, Task, resolve_reference};
use sprintd::lifecycle::{SchedulerSession, SprintLifecycle};
use sprintd::planner::{CapacityPlanner, derive_velocity};
use sprintd::workspace::WorkspaceManager;
use workstore::Store;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    let store = Store::open(&config.storage.store_dir).context("Failed to open store")?;

    match cli.command {
        Command::Backlog { command } => cmd_backlog(&store, command),
        Command::Sprint { command } => cmd_sprint(&config, &store, command),
        Command::Plan { sprint } => cmd_plan(&store, &sprint),
        Command::Run { sprint } => cmd_run(&config, &store, &sprint).await,
        Command::Workspace { command } => cmd_workspace(&config, command).await,
    }
}

fn cmd_backlog(store: &Store, command: BacklogCommand) -> Result<()> {
    match command {
        BacklogCommand::Story { title, points, priority } => {
            let mut story = Story::new(title).with_priority(priority);
            if let Some(points) = points {
                story.estimate(points)?;
            }
            let id = store.insert(story)?;
            println!("Created story {}", id);
        }
        BacklogCommand::Task { story, title } => {
            let story_ids: Vec<Story> = store.list()?;
            let story_id = resolve_one(story_ids.iter().map(|s| s.id.as_str()), &story)?;
            let task = Task::new(story_id, title);
            let id = store.insert(task)?;
            println!("Created task {}", id);
        }
        BacklogCommand::Bug {
            title,
            severity,
            priority,
            points,
        } => {
            let mut bug = Bug::new(title).with_severity(severity).with_priority(priority);
            if let Some(points) = points {
                bug.estimate(points)?;
            }
            let id = store.insert(bug)?;
            println!("Created bug {}", id);
        }
        BacklogCommand::Estimate { item, points } => {
            let id = resolve_item(store, &item)?;
            match load_item(store, &id)? {
                ScheduledItem::Story(mut story) => {
                    story.estimate(points)?;
                    store.update(story)?;
                }
                ScheduledItem::Bug(mut bug) => {
                    bug.estimate(points)?;
                    store.update(bug)?;
                }
                ScheduledItem::Task(_) => bail!("Tasks carry no estimate; their parent story does"),
            }
            println!("Estimated {} at {} points", id, points);
        }
        BacklogCommand::Depend { item, on } => {
            let item_id = resolve_item(store, &item)?;
            let dep_id = resolve_item(store, &on)?;
            if item_id == dep_id {
                bail!("An item cannot depend on itself");
            }
            match load_item(store, &item_id)? {
                ScheduledItem::Story(mut story) => {
                    story.add_dependency(&dep_id);
                    store.update(story)?;
                }
                ScheduledItem::Task(mut task) => {
                    task.add_dependency(&dep_id);
                    store.update(task)?;
                }
                ScheduledItem::Bug(mut bug) => {
                    bug.add_dependency(&dep_id);
                    store.update(bug)?;
                }
            }
            println!("Added dependency: {} -> {}", item_id, dep_id);
        }
        BacklogCommand::List => {
            print_backlog(store)?;
        }
    }
    Ok(())
}

fn print_backlog(store: &Store) -> Result<()> {
    let stories: Vec<Story> = store.list()?;
    let tasks: Vec<Task> = store.list()?;
    let bugs: Vec<Bug> = store.list()?;

    println!("Stories:");
    for story in &stories {
        let points = if story.is_estimated() {
            story.points.to_string()
        } else {
            "-".to_string()
        };
        println!(
            "  [{}] {}  ({} pts, {}, {})",
            story.status, story.id, points, story.priority, story.title
        );
    }

    println!("Tasks:");
    for task in &tasks {
        println!(
            "  [{}] {}  (story {}, {}% done, {}% cov)",
            task.status, task.id, task.story_id, task.completion, task.coverage
        );
    }

    println!("Bugs:");
    for bug in &bugs {
        println!(
            "  [{}] {}  ({} pts, {} severity, {})",
            bug.status, bug.id, bug.points, bug.severity, bug.title
        );
    }

    Ok(())
}

fn cmd_sprint(config: &Config, store: &Store, command: SprintCommand) -> Result<()> {
    let lifecycle = SprintLifecycle::new(store);

    match command {
        SprintCommand::New { name, goal, velocity } => {
            let velocity = match velocity {
                Some(v) => v,
                None => {
                    let history: Vec<Sprint> = store.list()?;
                    derive_velocity(&history, config.planner.velocity_lookback, config.planner.default_velocity)
                }
            };
            let sprint = Sprint::new(name, goal, velocity);
            let id = store.insert(sprint)?;
            println!("Created sprint {} (velocity {})", id, velocity);
        }
        SprintCommand::Start { sprint } => {
            let id = resolve_sprint(store, &sprint)?;
            let mut session = SchedulerSession::restore(store)?;
            let sprint = lifecycle.start(&mut session, &id)?;
            println!(
                "Sprint {} started: {} points committed across {} stories, {} tasks, {} bugs",
                sprint.id,
                sprint.committed_points,
                sprint.story_ids.len(),
                sprint.task_ids.len(),
                sprint.bug_ids.len()
            );
        }
        SprintCommand::Complete { sprint, notes } => {
            let id = resolve_sprint(store, &sprint)?;
            let mut session = SchedulerSession::restore(store)?;
            let sprint = lifecycle.complete(&mut session, &id, notes)?;
            println!(
                "Sprint {} completed: {}/{} points done",
                sprint.id, sprint.completed_points, sprint.committed_points
            );
        }
        SprintCommand::Cancel { sprint } => {
            let id = resolve_sprint(store, &sprint)?;
            let mut session = SchedulerSession::restore(store)?;
            let sprint = lifecycle.cancel(&mut session, &id)?;
            println!("Sprint {} cancelled", sprint.id);
        }
        SprintCommand::Show { sprint } => {
            let id = resolve_sprint(store, &sprint)?;
            let sprint: Sprint = store
                .get(&id)?
                .ok_or_else(|| eyre::eyre!("Sprint not found: {}", id))?;
            println!("Sprint {} ({})", sprint.id, sprint.status);
            println!("  Name:      {}", sprint.name);
            if !sprint.goal.is_empty() {
                println!("  Goal:      {}", sprint.goal);
            }
            println!("  Velocity:  {}", sprint.velocity);
            println!("  Committed: {}", sprint.committed_points);
            println!("  Completed: {}", sprint.completed_points);
            println!(
                "  Items:     {} stories, {} tasks, {} bugs",
                sprint.story_ids.len(),
                sprint.task_ids.len(),
                sprint.bug_ids.len()
            );
            if !sprint.burndown.is_empty() {
                println!("  Burndown:");
                for point in &sprint.burndown {
                    println!("    {}  {} remaining", point.day, point.remaining_points);
                }
            }
        }
    }
    Ok(())
}

fn cmd_plan(store: &Store, sprint: &str) -> Result<()> {
    let id = resolve_sprint(store, sprint)?;
    let plan = CapacityPlanner::new(store).plan_sprint(&id)?;
    println!(
        "Planned sprint {}: {} points committed ({} stories, {} tasks, {} bugs)",
        id,
        plan.committed_points,
        plan.story_ids.len(),
        plan.task_ids.len(),
        plan.bug_ids.len()
    );
    Ok(())
}

async fn cmd_run(config: &Config, store: &Store, sprint: &str) -> Result<()> {
    let Some(command) = config.executor.command.clone() else {
        bail!("No executor command configured; set executor.command in the config file");
    };

    let id = resolve_sprint(store, sprint)?;
    let repo_root = std::env::current_dir().context("Failed to get current directory")?;
    if !repo_root.join(".git").exists() {
        bail!("Not a git repository: {}", repo_root.display());
    }

    let workspaces = WorkspaceManager::new(config.git.workspace_config(repo_root));
    workspaces.initialize().await?;

    let executor = Arc::new(CommandExecutor::new(command));
    let coordinator = ExecutionCoordinator::new(store, &workspaces, executor, &config.executor.name);

    info!(sprint = %id, "Starting sprint run");
    let report = coordinator.run_sprint(&id).await?;

    for result in &report.results {
        if result.success {
            println!("ok   {}", result.item_id);
        } else {
            println!("FAIL {}  ({})", result.item_id, result.errors.join("; "));
        }
    }
    println!(
        "{} succeeded, {} failed{}",
        report.succeeded(),
        report.failed(),
        if report.halted_on.is_some() { "; run halted" } else { "" }
    );

    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_workspace(config: &Config, command: WorkspaceCommand) -> Result<()> {
    let repo_root = std::env::current_dir().context("Failed to get current directory")?;
    let manager = WorkspaceManager::new(config.git.workspace_config(repo_root));
    let store = Store::open(&config.storage.store_dir)?;

    match command {
        WorkspaceCommand::Init => {
            manager.initialize().await?;
            println!("Workspace isolation root ready");
        }
        WorkspaceCommand::List => {
            let entries = manager.list().await?;
            if entries.is_empty() {
                println!("No managed workspaces");
            }
            for entry in entries {
                println!(
                    "{}  [{}] {} -> {}",
                    entry.item_id,
                    entry.status,
                    entry.branch,
                    entry.path.display()
                );
            }
        }
        WorkspaceCommand::Status { item } => {
            let id = resolve_item(&store, &item).unwrap_or(item);
            let status = manager.status(&id).await?;
            println!("Workspace {}", status.item_id);
            println!("  State:  {}", status.state);
            if let Some(branch) = &status.branch {
                println!("  Branch: {}", branch);
                println!("  Dirty:  {}", if status.dirty { "yes" } else { "no" });
                println!("  Ahead/behind trunk: {}/{}", status.ahead, status.behind);
            }
        }
        WorkspaceCommand::Remove { item, force } => {
            let id = resolve_item(&store, &item).unwrap_or(item);
            manager.remove(&id, force).await?;
            println!("Removed workspace for {}", id);
        }
        WorkspaceCommand::Cleanup { remove_completed } => {
            let removed = manager.cleanup(remove_completed).await?;
            println!("Cleanup removed {} workspace entries", removed);
        }
        WorkspaceCommand::Review { item, title, body } => {
            let id = resolve_item(&store, &item).unwrap_or(item);
            let title = match title {
                Some(title) => title,
                None => match load_item(&store, &id) {
                    Ok(item) => item.title().to_string(),
                    Err(_) => id.clone(),
                },
            };
            let outcome = manager.push_and_request_review(&id, &title, &body).await?;
            println!("{}", outcome.message);
        }
    }
    Ok(())
}

/// Resolve a partial reference among all work items
fn resolve_item(store: &Store, reference: &str) -> Result<String> {
    let stories: Vec<Story> = store.list()?;
    let tasks: Vec<Task> = store.list()?;
    let bugs: Vec<Bug> = store.list()?;

    let ids = stories
        .iter()
        .map(|s| s.id.as_str())
        .chain(tasks.iter().map(|t| t.id.as_str()))
        .chain(bugs.iter().map(|b| b.id.as_str()));

    resolve_one(ids, reference)
}

/// Resolve a partial reference among sprints
fn resolve_sprint(store: &Store, reference: &str) -> Result<String> {
    let sprints: Vec<Sprint> = store.list()?;
    resolve_one(sprints.iter().map(|s| s.id.as_str()), reference)
}

fn resolve_one<'a, I>(ids: I, reference: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    match resolve_reference(ids, reference) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => bail!("No item matches: {}", reference),
        Err(candidates) => bail!("Ambiguous reference {}; candidates: {}", reference, candidates.join(", ")),
    }
}

/// Load a work item by exact id, whichever collection holds it
fn load_item(store: &Store, id: &str) -> Result<ScheduledItem> {
    if let Some(story) = store.get::<Story>(id)? {
        return Ok(ScheduledItem::Story(story));
    }
    if let Some(task) = store.get::<Task>(id)? {
        return Ok(ScheduledItem::Task(task));
    }
    if let Some(bug) = store.get::<Bug>(id)? {
        return Ok(ScheduledItem::Bug(bug));
    }
    bail!("Item not found: {}", id)
}
