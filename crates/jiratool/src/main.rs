use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use jiratool_core::api::JiraClient;
use jiratool_core::config::{JiraConfig, load_config};
use jiratool_core::importer::{ImportOptions, ImportReport, Importer};
use jiratool_core::maintenance::{delete_issue_by_id, render_field_schema};
use jiratool_core::rows::DEFAULT_SKIP_LINES;

#[derive(Debug, Parser)]
#[command(
    name = "jiratool",
    version,
    about = "CSV work-breakdown importer for Jira-style issue trackers"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        default_value = "jiratool.toml"
    )]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Import a CSV work breakdown into a project version")]
    Import(ImportArgs),
    #[command(about = "Delete issues (and their subtasks) by numeric id")]
    Delete(DeleteArgs),
    #[command(about = "Dump the backend field schema (createmeta)")]
    Fields,
}

#[derive(Debug, Args)]
struct ImportArgs {
    project: String,
    version: String,
    file: PathBuf,
    #[arg(long, default_value_t = DEFAULT_SKIP_LINES, help = "Header lines to skip")]
    skip_lines: usize,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    project: String,
    #[arg(required = true)]
    ids: Vec<u64>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Import(args) => run_import(&config, args),
        Commands::Delete(args) => run_delete(&config, args),
        Commands::Fields => run_fields(&config),
    }
}

fn run_import(config: &JiraConfig, args: ImportArgs) -> Result<()> {
    let mut client = JiraClient::from_config(config)?;
    let options = ImportOptions::from_config(config, &args.project, &args.version);
    let mut importer = Importer::bootstrap(&mut client, options)?;

    println!("import");
    println!("project: {}", args.project);
    println!("version: {}", args.version);
    println!("file: {}", args.file.display());
    println!("cached_issues: {}", importer.cached_issues());
    println!("known_users: {}", importer.known_users());

    let report = importer.import_csv_file(&args.file, args.skip_lines)?;
    print_report(&report);
    Ok(())
}

fn run_delete(config: &JiraConfig, args: DeleteArgs) -> Result<()> {
    let mut client = JiraClient::from_config(config)?;
    println!("delete");
    println!("project: {}", args.project);
    for id in args.ids {
        let report = delete_issue_by_id(&mut client, &args.project, id)?;
        println!("deleted: {}", report.issue_key);
    }
    Ok(())
}

fn run_fields(config: &JiraConfig) -> Result<()> {
    let mut client = JiraClient::from_config(config)?;
    println!("{}", render_field_schema(&mut client)?);
    Ok(())
}

fn print_report(report: &ImportReport) {
    println!("rows: {}", report.rows);
    println!("epics_created: {}", report.epics_created);
    println!("epics_reused: {}", report.epics_reused);
    println!("tasks_created: {}", report.tasks_created);
    println!("tasks_reused: {}", report.tasks_reused);
    println!("subtasks_created: {}", report.subtasks_created);
    println!("subtasks_skipped: {}", report.subtasks_skipped);
    println!("request_count: {}", report.request_count);
    if report.created_keys.is_empty() {
        println!("created_keys: <none>");
    } else {
        for key in &report.created_keys {
            println!("created_keys.key: {key}");
        }
    }
    if !report.warnings.is_empty() {
        println!("warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
}
