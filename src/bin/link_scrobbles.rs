//! Link scrobble fallback rows to artists, albums and songs in the library
//! Usage: cargo run --release --bin link-scrobbles -- --db <path>

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use musicdb_tools::cache::LookupCache;
use musicdb_tools::config::Config;
use musicdb_tools::progress::{format_duration, init_tracing, set_log_only};
use musicdb_tools::resolver::Resolver;
use musicdb_tools::schema::open_existing;
use musicdb_tools::scrobbles::link_scrobbled_songs;

#[derive(Parser)]
#[command(name = "link-scrobbles")]
#[command(about = "Fill artist/album/song ids of scrobbled_songs rows")]
struct Args {
    #[arg(long)]
    db: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Resolve and report without writing
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    log_only: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing("warn");
    set_log_only(args.log_only);

    let config = Config::load(args.config.as_deref())?;
    let start = Instant::now();

    let conn = open_existing(&args.db)?;
    let mut resolver = Resolver::new(&conn, config.matching, LookupCache::new());
    let stats = link_scrobbled_songs(&conn, &mut resolver, args.dry_run)?;

    println!(
        "Examined {} row(s): {} song(s) linked, {} unresolved{}",
        stats.examined,
        stats.songs_linked,
        stats.unresolved,
        if args.dry_run { " (dry run)" } else { "" }
    );
    println!(
        "Cache hits: {}  Elapsed: {}",
        resolver.cache().hits(),
        format_duration(start.elapsed())
    );
    stats.log_summary();
    Ok(())
}
