//! Build lookup indexes and the songs full-text index, then ANALYZE and VACUUM
//! Usage: cargo run --release --bin optimize-db -- --db <path> [--test "query"]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use musicdb_tools::progress::{format_duration, init_tracing};
use musicdb_tools::schema::{open_existing, optimize_database, search_songs};

#[derive(Parser)]
#[command(name = "optimize-db")]
#[command(about = "Index and compact the music library database")]
struct Args {
    #[arg(long)]
    db: PathBuf,

    /// Run a full-text search afterwards to check the index
    #[arg(long)]
    test: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing("warn");
    let start = Instant::now();

    let conn = open_existing(&args.db)?;
    optimize_database(&conn)?;

    let file_size = std::fs::metadata(&args.db)?.len();
    println!("Optimized {:?}", args.db);
    println!("  Size: {:.2} MB", file_size as f64 / 1_048_576.0);
    println!("  Elapsed: {}", format_duration(start.elapsed()));

    if let Some(query) = args.test {
        println!("\nSearch: {}", query);
        for song in search_songs(&conn, &query, 10)? {
            println!(
                "  [{}] {} - {} ({})",
                song.id,
                song.title,
                song.artist.as_deref().unwrap_or("?"),
                song.album.as_deref().unwrap_or("?")
            );
        }
    }
    Ok(())
}
