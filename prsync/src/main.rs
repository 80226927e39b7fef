//! Mirror GitHub review work into Todoist tasks.
//!
//! `prsync sync` polls GitHub, reconciles the tracking document
//! (`.prsync/state.json` by default) and creates or closes Todoist tasks.
//! Run it on a schedule; runs must not overlap.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use prsync::core::types::Policy;
use prsync::exit_codes;
use prsync::io::config::{SyncConfig, load_config};
use prsync::io::github::GitHubClient;
use prsync::io::http::HttpClient;
use prsync::io::state_store::{JsonStateStore, StateStore};
use prsync::io::todoist::{DryRunTaskStore, TodoistClient};
use prsync::logging;
use prsync::sync::{PolicyReport, PolicySelection, SyncOptions, SyncOutcome, TaskDefaults, run_sync};

#[derive(Parser)]
#[command(
    name = "prsync",
    version,
    about = "Mirror GitHub review requests and received reviews as Todoist tasks"
)]
struct Cli {
    /// TOML config file (defaults to `prsync.toml` when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the state file location.
    #[arg(long, global = true)]
    state: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one reconciliation pass.
    Sync {
        /// Reconcile a single policy.
        #[arg(long, value_enum)]
        only: Option<PolicyArg>,
        /// Log task operations instead of sending them; state is not saved.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the tracked entries from the state file.
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// PRs awaiting your review.
    Requests,
    /// PRs you authored that received reviews.
    Received,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Requests => Policy::ReviewRequest,
            PolicyArg::Received => Policy::ReviewReceived,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
    std::process::exit(exit_codes::OK);
}

fn run(cli: Cli) -> Result<()> {
    let mut cfg = load_config(cli.config.as_deref(), |key| std::env::var(key).ok())
        .context("load configuration")?;
    if let Some(state) = cli.state {
        cfg.state_path = state;
    }
    debug!(config = ?cfg, "configuration loaded");
    match cli.command {
        Command::Sync { only, dry_run } => cmd_sync(&cfg, only, dry_run),
        Command::State => cmd_state(&cfg),
    }
}

fn cmd_sync(cfg: &SyncConfig, only: Option<PolicyArg>, dry_run: bool) -> Result<()> {
    let credentials = cfg.credentials()?;
    let http = HttpClient::new(cfg.request_timeout(), cfg.request_delay());
    let host = GitHubClient::new(http.clone(), &cfg.github_api_base, &credentials.github_token);
    let store = JsonStateStore::new(&cfg.state_path);
    let options = SyncOptions {
        policies: only
            .map(|arg| PolicySelection::Only(arg.into()))
            .unwrap_or_default(),
        task_defaults: TaskDefaults {
            project_id: cfg.todoist_project_id.clone(),
            section_id: cfg.todoist_section_id.clone(),
            due_string: cfg.due_string.clone(),
        },
        persist_state: !dry_run,
    };

    let outcome = if dry_run {
        run_sync(&host, &DryRunTaskStore::default(), &store, &options)?
    } else {
        let tasks = TodoistClient::new(http, &cfg.todoist_api_base, &credentials.todoist_token);
        run_sync(&host, &tasks, &store, &options)?
    };
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    let rows = [
        (Policy::ReviewRequest, &outcome.review_requests),
        (Policy::ReviewReceived, &outcome.reviews_received),
    ];
    for (policy, report) in rows {
        if let Some(report) = report {
            println!("sync: {}", format_report(policy, report));
        }
    }
    println!("sync: state_saved={}", outcome.state_saved);
}

fn format_report(policy: Policy, report: &PolicyReport) -> String {
    if report.aborted {
        return format!("policy={} aborted=true", policy);
    }
    format!(
        "policy={} created={} closed={} failures={}",
        policy, report.created, report.closed, report.failures
    )
}

fn cmd_state(cfg: &SyncConfig) -> Result<()> {
    let store = JsonStateStore::new(&cfg.state_path);
    let doc = store.load();
    println!("state: path={}", store.path().display());
    for (url, task_id) in &doc.review_requests {
        println!("{} {} task={}", Policy::ReviewRequest, url, task_id);
    }
    for (url, entry) in &doc.reviews_received {
        let task = entry
            .task_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let review = entry
            .last_review_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{} {} task={} last_review={}",
            Policy::ReviewReceived,
            url,
            task,
            review
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sync_defaults() {
        let cli = Cli::parse_from(["prsync", "sync"]);
        assert!(matches!(
            cli.command,
            Command::Sync {
                only: None,
                dry_run: false
            }
        ));
    }

    #[test]
    fn parse_sync_only_received_dry_run() {
        let cli = Cli::parse_from(["prsync", "sync", "--only", "received", "--dry-run"]);
        assert!(matches!(
            cli.command,
            Command::Sync {
                only: Some(PolicyArg::Received),
                dry_run: true
            }
        ));
    }

    #[test]
    fn global_state_flag_after_subcommand() {
        let cli = Cli::parse_from(["prsync", "state", "--state", "/tmp/s.json"]);
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.json")));
        assert!(matches!(cli.command, Command::State));
    }

    #[test]
    fn aborted_report_is_formatted_without_counts() {
        let report = PolicyReport {
            aborted: true,
            ..PolicyReport::default()
        };
        assert_eq!(
            format_report(Policy::ReviewRequest, &report),
            "policy=review_requests aborted=true"
        );
    }
}
