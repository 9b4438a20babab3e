//! `keke` command-line entry point.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use keke::core::tier::{Mode, ModelTier};
use keke::dispatch::Dispatcher;
use keke::exit_codes;
use keke::io::config::load_config;
use keke::io::project::{ProjectContext, init_project};
use keke::io::prompter::TerminalPrompter;
use keke::io::remote::{AuthContext, HttpRemote, RemoteError};
use keke::logging;
use keke::looping::{AgentRequest, LoopEvent, LoopStop, run_conversation};
use keke::rollback::{RollbackOutcome, run_rollback};
use keke::ui;

#[derive(Parser)]
#[command(name = "keke", version, about = "Local agent runtime with permissions and snapshots")]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.keke/` (grants, snapshots, changelog, config) in the project.
    Init,
    /// Ask the agent to work on the project.
    Ask(AgentArgs),
    /// Data and ML workflow with research actions enabled.
    Research(AgentArgs),
    /// Coding session driven by provider tool calls.
    Code(AgentArgs),
    /// Restore a file from a snapshot.
    Rollback {
        /// Only list snapshots of this file.
        file: Option<String>,
    },
}

#[derive(Args)]
struct AgentArgs {
    /// Request text.
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,

    /// Model tier (defaults to `default_tier` in config).
    #[arg(long, value_enum)]
    model: Option<ModelTier>,

    /// Provider hint forwarded to the remote agent.
    #[arg(long)]
    provider: Option<String>,

    /// Remote agent endpoint URL.
    #[arg(long, env = "KEKE_ENDPOINT")]
    endpoint: Option<String>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            debug!(err = %format!("{err:#}"), "command failed");
            ui::error(one_line(&err));
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match cli.project {
        Some(root) => root,
        None => env::current_dir().context("resolve current directory")?,
    };
    let project = ProjectContext::new(root);
    match cli.command {
        Command::Init => cmd_init(&project),
        Command::Ask(args) => cmd_agent(&project, Mode::Ask, args),
        Command::Research(args) => cmd_agent(&project, Mode::Research, args),
        Command::Code(args) => cmd_agent(&project, Mode::Code, args),
        Command::Rollback { file } => cmd_rollback(&project, file.as_deref()),
    }
}

fn cmd_init(project: &ProjectContext) -> Result<i32> {
    let report = init_project(project)?;
    if !report.created {
        ui::warning("Project already initialized");
        return Ok(exit_codes::OK);
    }
    ui::success(format!("Initialized .keke/ in {}", project.root.display()));
    if report.gitignore_updated {
        ui::info("Added .keke/ to .gitignore");
    }
    Ok(exit_codes::OK)
}

fn cmd_agent(project: &ProjectContext, mode: Mode, args: AgentArgs) -> Result<i32> {
    project.ensure_initialized()?;
    let config = load_config(&project.config_path)?;
    let endpoint = args.endpoint.or_else(|| config.endpoint.clone()).ok_or_else(|| {
        RemoteError::NotConfigured(
            "set --endpoint, KEKE_ENDPOINT, or endpoint in .keke/config.toml".to_string(),
        )
    })?;
    let remote = HttpRemote::new(endpoint, AuthContext::discover()?, &config)?;

    let request = AgentRequest {
        prompt: args.prompt.join(" "),
        tier: args.model.unwrap_or(config.default_tier),
        mode,
        provider: args.provider.or_else(|| config.provider.clone()),
        max_iterations: config.max_iterations,
    };
    let prompter = TerminalPrompter;
    let dispatcher = Dispatcher::new(project, &config, &prompter, mode);

    ui::info(format!("Mode: {mode} | Model: {}", request.tier));
    let outcome = run_conversation(&remote, &dispatcher, &request, render_event)?;

    ui::divider();
    if let LoopStop::IterationLimit { max_iterations } = outcome.stop {
        ui::warning(format!(
            "Max iterations ({max_iterations}) reached. The task may need more steps."
        ));
    }
    ui::info(format!("Total credits used: {}", outcome.credits));
    Ok(exit_codes::OK)
}

fn render_event(event: LoopEvent<'_>) {
    match event {
        LoopEvent::Reply { reply, .. } => {
            let message = reply.message.trim();
            if !message.is_empty() {
                ui::blank();
                ui::plain(message);
            }
        }
        LoopEvent::ActionStarted {
            index,
            total,
            description,
        } => {
            ui::blank();
            ui::info(format!("[{index}/{total}] {description}"));
        }
        LoopEvent::ActionFinished {
            output,
            error: None,
        } => {
            ui::success("Completed");
            let output = output.trim();
            if !output.is_empty() {
                ui::plain(ui::preview(output));
            }
        }
        LoopEvent::ActionFinished {
            error: Some(error), ..
        } => ui::error(format!("Failed: {}", ui::preview(error.trim()))),
    }
}

fn cmd_rollback(project: &ProjectContext, file: Option<&str>) -> Result<i32> {
    project.ensure_initialized()?;
    let code = match run_rollback(project, file, &TerminalPrompter)? {
        RollbackOutcome::InvalidSelection(_) => exit_codes::FAILURE,
        RollbackOutcome::Empty
        | RollbackOutcome::NoMatch(_)
        | RollbackOutcome::Cancelled
        | RollbackOutcome::Restored { .. } => exit_codes::OK,
    };
    Ok(code)
}

/// Top-level message, plus the first line of the root cause when it adds
/// information.
fn one_line(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let root = err.root_cause().to_string();
    let root = root.lines().next().unwrap_or_default();
    if root.is_empty() || top.contains(root) {
        top
    } else {
        format!("{top}: {root}")
    }
}
