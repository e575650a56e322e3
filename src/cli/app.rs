//! Main CLI application

use crate::config::{find_config_file, load_project, Project};
use crate::error::{AssetflowError, ConfigError};
use crate::logging::{init_logging, Verbosity};
use crate::runner::{default_jobs, subscribe, Context, Executor, RunReport, WatchCoordinator};
use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::info;

/// CLI application
pub struct App {
    /// Loaded project
    project: Project,
    /// Execution context shared by every run
    ctx: Context,
    verbosity: Verbosity,
}

impl App {
    /// Load the project from the discovered config file
    pub fn new(verbosity: Verbosity) -> Result<Self, AssetflowError> {
        let path = find_config_file()?;
        Self::with_config_file(path, verbosity)
    }

    /// Load the project from a specific config file
    pub fn with_config_file(path: PathBuf, verbosity: Verbosity) -> Result<Self, AssetflowError> {
        let project = load_project(&path)?;
        let jobs = project.jobs.unwrap_or_else(default_jobs);
        let ctx = Context::new().with_jobs(jobs);

        Ok(App {
            project,
            ctx,
            verbosity,
        })
    }

    /// Override mapping parallelism
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.ctx = self.ctx.with_jobs(jobs);
        self
    }

    /// Run tasks and aliases in order; fails if any task failed
    pub fn run_tasks(&self, names: &[String]) -> Result<(), AssetflowError> {
        let executor = Executor::new(&self.project, &self.ctx);
        let report = executor.run_sequence(names)?;
        self.print_summary(None, &report);

        if report.is_success() {
            return Ok(());
        }
        if report.cancelled {
            return Err(AssetflowError::RunFailed("run cancelled".to_string()));
        }
        let failed: Vec<&str> = report.failed().map(|t| t.name.as_str()).collect();
        Err(AssetflowError::RunFailed(format!(
            "task(s) failed: {}",
            failed.join(", ")
        )))
    }

    /// Watch the project until Ctrl+C
    pub fn watch(&self) -> Result<(), AssetflowError> {
        if self.project.watch.is_empty() {
            return Err(ConfigError::Invalid("no watch bindings configured".to_string()).into());
        }

        let shutdown = self.ctx.cancel_flag();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl+C handler")?;

        let (_handle, events) = subscribe(&self.project.root)?;
        let mut coordinator = WatchCoordinator::new(Executor::new(&self.project, &self.ctx));

        info!("waiting for changes (Ctrl+C to stop)");
        coordinator.run(events, |binding, report| self.print_summary(Some(binding), report));
        Ok(())
    }

    /// What a bare `assetflow` invocation does for this project
    pub fn default_action(&self) -> DefaultAction {
        default_action(&self.project)
    }

    /// Print capabilities, tasks, aliases and watch bindings
    pub fn list(&self) {
        let registry = &self.project.registry;

        println!("{}", "Capabilities:".bold());
        for kind in self.project.capabilities.kinds() {
            let usage = self
                .project
                .capability_usage
                .get(kind)
                .map(String::as_str)
                .unwrap_or_default();
            println!("  {:<20} {}", kind.green(), usage);
        }

        println!("{}", "Tasks:".bold());
        for task in registry.tasks() {
            let usage = task.usage.as_deref().unwrap_or_default();
            println!("  {:<20} {:<12} {}", task.name.green(), task.kind.dimmed(), usage);
        }

        if registry.aliases().next().is_some() {
            println!("{}", "Aliases:".bold());
            for (name, members) in registry.aliases() {
                println!("  {:<20} {}", name.green(), members.join(", "));
            }
        }

        if !self.project.watch.is_empty() {
            println!("{}", "Watch:".bold());
            for binding in &self.project.watch {
                println!(
                    "  {:<20} {} -> {}",
                    binding.name.green(),
                    binding.patterns.join(", "),
                    binding.tasks.join(", ")
                );
            }
        }
    }

    fn print_summary(&self, binding: Option<&str>, report: &RunReport) {
        if self.verbosity == Verbosity::Silent {
            return;
        }
        if let Some(binding) = binding {
            println!("{} {}", "watch".cyan(), binding.bold());
        }

        for task in &report.tasks {
            if task.is_success() {
                println!("{} {} ({} files)", "ok".green(), task.name.bold(), task.mappings);
            } else {
                println!("{} {}", "failed".red(), task.name.bold());
                for err in &task.errors {
                    println!("    {}", err.to_string().red());
                }
            }
        }
        for name in &report.skipped {
            println!("{} {}", "skipped".yellow(), name);
        }
    }
}

/// Task or alias run when no subcommand is given
pub const DEFAULT_TASK: &str = "default";

/// Behaviour of `assetflow` without a subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultAction {
    /// Run the `default` task or alias
    Run(String),
    /// Start watch mode
    Watch,
    /// Nothing to do; print help
    Help,
}

/// Pick the default action: the `default` entry, then watch mode, then help
pub fn default_action(project: &Project) -> DefaultAction {
    if project.registry.contains(DEFAULT_TASK) {
        DefaultAction::Run(DEFAULT_TASK.to_string())
    } else if !project.watch.is_empty() {
        DefaultAction::Watch
    } else {
        DefaultAction::Help
    }
}

/// Build the clap command
pub fn build_command() -> Command {
    Command::new("assetflow")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Declarative front-end asset pipeline runner")
        .after_help("Without a command, runs the 'default' task or alias, or watches if bindings exist.")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to assetflow.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .help("Mappings processed in parallel within a task")
                .value_parser(value_parser!(usize))
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print warnings and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Only print errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("run").about("Run tasks or aliases in order").arg(
                Arg::new("tasks")
                    .value_name("TASK")
                    .help("Task or alias names")
                    .num_args(1..)
                    .required(true),
            ),
        )
        .subcommand(Command::new("watch").about("Re-run bound tasks when watched files change"))
        .subcommand(Command::new("list").about("List tasks, aliases and watch bindings"))
        .subcommand(
            Command::new("completions")
                .about("Print a shell completion script")
                .arg(
                    Arg::new("shell")
                        .value_name("SHELL")
                        .required(true)
                        .value_parser(value_parser!(Shell)),
                ),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Run the CLI application with process arguments
pub fn run() -> Result<(), AssetflowError> {
    let matches = build_command().get_matches();
    let verbosity = get_verbosity(&matches);
    init_logging(verbosity);

    if let Some(("completions", sub_matches)) = matches.subcommand() {
        if let Some(shell) = sub_matches.get_one::<Shell>("shell") {
            generate(*shell, &mut build_command(), "assetflow", &mut io::stdout());
        }
        return Ok(());
    }

    let app = match matches.get_one::<String>("file") {
        Some(path) => App::with_config_file(PathBuf::from(path), verbosity)?,
        None => App::new(verbosity)?,
    };
    let app = match matches.get_one::<usize>("jobs") {
        Some(&jobs) => app.with_jobs(jobs),
        None => app,
    };

    let Some((name, sub_matches)) = matches.subcommand() else {
        return match app.default_action() {
            DefaultAction::Run(task) => app.run_tasks(&[task]),
            DefaultAction::Watch => app.watch(),
            DefaultAction::Help => {
                build_command().print_help()?;
                Ok(())
            }
        };
    };

    match name {
        "run" => {
            let tasks: Vec<String> = sub_matches
                .get_many::<String>("tasks")
                .map(|values| values.cloned().collect())
                .unwrap_or_default();
            app.run_tasks(&tasks)
        }
        "watch" => app.watch(),
        "list" => {
            app.list();
            Ok(())
        }
        _ => Ok(()),
    }
}
