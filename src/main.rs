use clap::{Parser, Subcommand};
use datetidy::bootstrap::Instructions;
use datetidy::cli::{OrganizeCommand, Policy, RunContext, run_cli};
use datetidy::config::DatetidyConfig;
use datetidy::logging::init_logger;
use datetidy::output::OutputFormatter;
use std::path::PathBuf;
use std::process::ExitCode;

/// Organize files into year/month/extension folders, reversibly.
#[derive(Debug, Parser)]
#[command(name = "datetidy", version, about)]
struct Args {
    /// Operate on this directory instead of locating an instructions file.
    #[arg(long, global = true, conflicts_with = "instructions")]
    root: Option<PathBuf>,

    /// Use this instructions file instead of searching for one.
    #[arg(long, global = true)]
    instructions: Option<PathBuf>,

    /// Path to a TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Move files into <root>/YYYY/MM/EXT and record a manifest.
    Organize {
        #[arg(long, value_enum, default_value_t = Policy::ExcludeMarked)]
        policy: Policy,
        /// Show what would be moved without moving anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Move files recorded in a manifest back where they came from.
    Revert {
        /// Manifest file name, as printed by `list`.
        manifest: String,
    },
    /// List the manifests available for revert.
    List,
}

impl From<Command> for OrganizeCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Organize { policy, dry_run } => OrganizeCommand::Organize { policy, dry_run },
            Command::Revert { manifest } => OrganizeCommand::Revert { manifest },
            Command::List => OrganizeCommand::List,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match DatetidyConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&format!("Error loading configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };
    init_logger(&config.logging.level);

    let context = if let Some(root) = args.root {
        RunContext::new(root)
    } else {
        let instructions = match &args.instructions {
            Some(path) => Instructions::load(path),
            None => Instructions::discover(&config.bootstrap.search_paths),
        };
        match instructions {
            Ok(instructions) => {
                OutputFormatter::info(&format!(
                    "Set location to: {}",
                    instructions.root.display()
                ));
                RunContext {
                    root: instructions.root,
                    allow_list: instructions.allow_list,
                    progress: false,
                }
            }
            Err(e) => {
                OutputFormatter::error(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    };
    let context = RunContext {
        progress: config.output.progress,
        ..context
    };

    match run_cli(&args.command.into(), &context) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&format!("Error: {}", e));
            ExitCode::FAILURE
        }
    }
}
