use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use musicdb_tools::config::Config;
use musicdb_tools::duplicates::{scan_all, ScanScope};
use musicdb_tools::progress::{create_spinner, format_duration, init_tracing, set_log_only};
use musicdb_tools::prompt::ConsolePrompter;
use musicdb_tools::safety::backup_database;
use musicdb_tools::schema::open_existing;
use musicdb_tools::session::run_session;

#[derive(Parser)]
#[command(name = "find-duplicates")]
#[command(about = "Find duplicate songs, artists and albums and resolve them interactively")]
struct Args {
    /// Path to the music library database
    #[arg(long)]
    db: PathBuf,

    #[arg(long, value_enum, default_value = "all")]
    scope: ScanScope,

    /// TOML config file; only its [dedup] table applies to this tool
    #[arg(long)]
    config: Option<PathBuf>,

    /// Skip the database backup before deleting anything
    #[arg(long)]
    no_backup: bool,

    /// Disable progress bars, log periodic progress lines instead
    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing("warn");
    set_log_only(args.log_only);

    let dedup = Config::load(args.config.as_deref())?.dedup;
    let start = Instant::now();

    println!("Opening database: {:?}", args.db);
    let mut conn = open_existing(&args.db)?;

    let spinner = create_spinner("Scanning for duplicates");
    let groups = scan_all(&conn, args.scope)?;
    spinner.finish_and_clear();
    println!("Found {} duplicate group(s) in {}", groups.len(), format_duration(start.elapsed()));

    if groups.is_empty() {
        return Ok(());
    }

    if dedup.backup && !args.no_backup {
        let backup = backup_database(&args.db)?;
        println!("Backup written to {:?}", backup);
    }

    let mut prompter = ConsolePrompter::stdio();
    let stats = run_session(&mut conn, &groups, &mut prompter)?;

    println!("\n{:=<60}", "");
    println!("Session complete!");
    println!("  Groups reviewed: {}", stats.groups_seen);
    println!("  Rows deleted: {}", stats.rows_deleted);
    println!("  Files deleted: {}", stats.files_deleted);
    println!("  Errors: {}", stats.errors);
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    stats.log_summary();
    Ok(())
}
