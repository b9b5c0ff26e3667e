//! actiondeck CLI - browse and drive GitHub Actions workflows from a local cache

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use actiondeck::config::{self, AppConfig};
use actiondeck::github::{GithubClient, WorkflowSource};
use actiondeck::model::Repository;
use actiondeck::storage::Store;
use actiondeck::sync::{self, SyncReport};
use actiondeck::ui::{self, Icons};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "actiondeck")]
#[command(version)]
#[command(about = "Browse, enable, disable and dispatch GitHub Actions workflows")]
#[command(long_about = r#"
actiondeck keeps a local SQLite cache of the workflows in your configured
repositories and drives them through the GitHub Actions API.

Example usage:
  actiondeck sync
  actiondeck list lazy-project
  actiondeck disable lazy-project 161335
  actiondeck dispatch lazy-project 161335 --ref main
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the workflow cache database
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured repositories
    Repos,

    /// Fetch workflows of the configured repositories into the cache
    Sync {
        /// Only sync this repository
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Show cached workflows of a repository
    List {
        /// Repository name
        repo: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one cached workflow
    Show {
        /// Workflow id
        id: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop a workflow from the cache
    Forget {
        /// Workflow id
        id: String,
    },

    /// Enable a workflow on GitHub
    Enable {
        /// Repository name
        repo: String,
        /// Workflow id
        id: String,
    },

    /// Disable a workflow on GitHub
    Disable {
        /// Repository name
        repo: String,
        /// Workflow id
        id: String,
    },

    /// Trigger a workflow_dispatch run
    Dispatch {
        /// Repository name
        repo: String,
        /// Workflow id
        id: String,
        /// Branch or tag to run on
        #[arg(long = "ref", default_value = "main")]
        git_ref: String,
    },

    /// Show cache and configuration status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let app_config = config::load_config(Some(&config_path))?;
    let db_path = cli.database.clone().unwrap_or_else(|| app_config.database_path());
    let store = open_store(&app_config, &db_path);

    let result = run(cli.command, &app_config, &config_path, &store);
    store.close();
    result
}

/// Open the cache and seed it from config, or carry on without one
fn open_store(app_config: &AppConfig, db_path: &Path) -> Store {
    if let Err(e) = config::ensure_db_dir(db_path) {
        tracing::warn!("could not create {}: {}", db_path.display(), e);
    }

    let store = Store::open_or_disabled(db_path, app_config.store_options());
    if !store.is_available() {
        ui::warn("Workflow cache unavailable, continuing without it");
        return store;
    }

    if let Err(e) = store.seed_repositories(app_config.repositories()) {
        tracing::warn!("could not seed repositories: {}", e);
    }
    store
}

fn run(command: Commands, app_config: &AppConfig, config_path: &Path, store: &Store) -> anyhow::Result<()> {
    match command {
        Commands::Repos => cmd_repos(app_config, config_path, store),
        Commands::Sync { repo } => cmd_sync(app_config, store, repo.as_deref()),
        Commands::List { repo, json } => cmd_list(store, &repo, json),
        Commands::Show { id, json } => cmd_show(store, &id, json),
        Commands::Forget { id } => cmd_forget(store, &id),
        Commands::Enable { repo, id } => cmd_toggle(app_config, store, &repo, &id, true),
        Commands::Disable { repo, id } => cmd_toggle(app_config, store, &repo, &id, false),
        Commands::Dispatch { repo, id, git_ref } => cmd_dispatch(app_config, &repo, &id, &git_ref),
        Commands::Status => cmd_status(app_config, config_path, store),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn require_store(store: &Store) -> anyhow::Result<()> {
    if !store.is_available() {
        anyhow::bail!("the workflow cache is unavailable");
    }
    Ok(())
}

fn configured_repo<'a>(app_config: &'a AppConfig, name: &str) -> anyhow::Result<&'a Repository> {
    app_config
        .repository(name)
        .with_context(|| format!("repository '{}' is not configured", name))
}

/// Repositories known to the cache, falling back to config without one
fn known_repositories(app_config: &AppConfig, store: &Store) -> Vec<Repository> {
    if store.is_available() {
        match store.list_repositories() {
            Ok(repos) => return repos,
            Err(e) => tracing::warn!("could not read repositories from cache: {}", e),
        }
    }
    app_config.repositories()
}

fn cmd_repos(app_config: &AppConfig, config_path: &Path, store: &Store) -> anyhow::Result<()> {
    let repos = known_repositories(app_config, store);
    if repos.is_empty() {
        ui::info("No repositories configured", &config_path.display().to_string());
        return Ok(());
    }
    println!("{}", ui::repository_table(&repos));
    Ok(())
}

fn cmd_sync(app_config: &AppConfig, store: &Store, only: Option<&str>) -> anyhow::Result<()> {
    let repos = app_config.sync_targets(only)?;
    if repos.is_empty() {
        ui::warn("Nothing to sync, add repositories to the config first");
        return Ok(());
    }

    let client = GithubClient::github()?;
    let started = Instant::now();
    let spinner = ui::Spinner::new(&format!("Syncing {} repositories", repos.len()));
    let report: SyncReport = runtime()?.block_on(sync::sync_all(&client, store, &repos));
    spinner.finish_and_clear();

    for (name, count) in &report.synced {
        ui::status(Icons::PACKAGE, name, &format!("{} workflow(s)", count));
    }
    for (name, e) in &report.failed {
        ui::error(&format!("{}: {}", name, e));
    }
    ui::sync_summary(
        started.elapsed(),
        report.synced.len(),
        report.total_workflows(),
        report.failed.len(),
    );

    if !report.is_clean() {
        anyhow::bail!("{} repositories failed to sync", report.failed.len());
    }
    Ok(())
}

fn cmd_list(store: &Store, repo: &str, json: bool) -> anyhow::Result<()> {
    require_store(store)?;
    let workflows = store.list_workflows_for_repo(repo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }
    if workflows.is_empty() {
        println!("{}", ui::muted(&format!("No cached workflows for {}. Run `actiondeck sync` first.", repo)));
        return Ok(());
    }

    ui::header(&format!("{} workflow(s) in {}", workflows.len(), repo));
    println!("{}", ui::workflow_table(&workflows));
    Ok(())
}

fn cmd_show(store: &Store, id: &str, json: bool) -> anyhow::Result<()> {
    require_store(store)?;
    let workflow = store
        .get_workflow(id)
        .with_context(|| format!("failed to load workflow {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflow)?);
    } else {
        ui::workflow_details(&workflow);
    }
    Ok(())
}

fn cmd_forget(store: &Store, id: &str) -> anyhow::Result<()> {
    require_store(store)?;
    if store.remove_workflow(id)? {
        ui::success(&format!("Removed workflow {} from the cache", id));
    } else {
        println!("{}", ui::muted(&format!("Workflow {} was not cached", id)));
    }
    Ok(())
}

fn cmd_toggle(app_config: &AppConfig, store: &Store, repo: &str, id: &str, enable: bool) -> anyhow::Result<()> {
    let repo = configured_repo(app_config, repo)?;
    let client = GithubClient::github()?;

    let workflow = runtime()?.block_on(async {
        if enable {
            client.enable(repo, id).await?;
        } else {
            client.disable(repo, id).await?;
        }
        sync::refresh_workflow(&client, store, repo, id).await
    })?;

    ui::success(&format!(
        "{} is now {}",
        workflow.name,
        ui::state_label(workflow.state)
    ));
    Ok(())
}

fn cmd_dispatch(app_config: &AppConfig, repo: &str, id: &str, git_ref: &str) -> anyhow::Result<()> {
    let repo = configured_repo(app_config, repo)?;
    let client = GithubClient::github()?;

    runtime()?
        .block_on(client.dispatch(repo, id, git_ref))
        .with_context(|| format!("failed to dispatch workflow {}", id))?;

    ui::success(&format!("Dispatched workflow {} on {} ({})", id, repo.full_name(), git_ref));
    Ok(())
}

fn cmd_status(app_config: &AppConfig, config_path: &Path, store: &Store) -> anyhow::Result<()> {
    ui::section(" actiondeck ");
    ui::status(Icons::GEAR, "Config", &config_path.display().to_string());
    ui::status(
        Icons::DATABASE,
        "Cache",
        store.location().unwrap_or("unavailable"),
    );

    let options = store.options();
    let stats = [
        ("Repositories", known_repositories(app_config, store).len().to_string()),
        (
            "Actor state",
            store
                .actor_state()
                .map(|state| format!("{:?}", state))
                .unwrap_or_else(|| "disabled".to_string()),
        ),
        ("Mailbox capacity", options.mailbox_capacity.to_string()),
        ("Submit timeout", format!("{} ms", options.submit_timeout.as_millis())),
    ];
    println!("{}", ui::stats_table(&stats));
    Ok(())
}
