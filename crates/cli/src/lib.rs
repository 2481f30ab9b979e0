pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "snapquote",
    about = "Snapquote operator CLI",
    long_about = "Operate Snapquote policy storage: migrations, config inspection, effective-policy resolution, industry pack backfill, and key readiness.",
    after_help = "Examples:\n  snapquote doctor --json\n  snapquote show-config tenant-aurora --industry roofing\n  snapquote packs list-missing --limit 10"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo fixtures for local development")]
    Seed,
    #[command(
        about = "Inspect effective process configuration with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, platform credential readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Resolve and display the effective AI policy for a tenant")]
    ShowConfig {
        #[arg(help = "Tenant identifier to resolve")]
        tenant_id: String,
        #[arg(long, help = "Industry key override (defaults to the tenant's stored industry)")]
        industry: Option<String>,
    },
    #[command(about = "Display key policy readiness for a tenant")]
    KeyStatus {
        #[arg(help = "Tenant identifier to evaluate")]
        tenant_id: String,
    },
    #[command(subcommand, about = "Inspect and backfill industry prompt packs")]
    Packs(PacksCommand),
}

#[derive(Debug, Subcommand)]
enum PacksCommand {
    #[command(about = "List active industries that have no prompt pack yet")]
    ListMissing {
        #[arg(long, default_value_t = 20, help = "Maximum number of keys to list")]
        limit: usize,
    },
    #[command(about = "Create or update an industry pack from a JSON draft file")]
    Upsert {
        #[arg(help = "Industry key (trimmed and lowercased before storage)")]
        key: String,
        #[arg(long, help = "Path to the JSON pack draft")]
        file: PathBuf,
        #[arg(long, help = "Audit identity recorded on the stored version")]
        updated_by: Option<String>,
        #[arg(long, help = "Provenance tag recorded on the stored version")]
        source: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::ShowConfig { tenant_id, industry } => {
            commands::show_config::run(&tenant_id, industry.as_deref())
        }
        Command::KeyStatus { tenant_id } => commands::key_status::run(&tenant_id),
        Command::Packs(packs) => match packs {
            PacksCommand::ListMissing { limit } => commands::packs::run_list_missing(limit),
            PacksCommand::Upsert { key, file, updated_by, source } => {
                commands::packs::run_upsert(&key, &file, updated_by, source)
            }
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
