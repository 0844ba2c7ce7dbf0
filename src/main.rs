//! # ffmirror
//!
//! A personal tool that maintains a local mirror of fan-fiction stories
//! from FanFiction.net and FictionPress.
//!
//! ## Features
//!
//! - Downloads single stories as standalone HTML (or Kindle-friendly text)
//! - Adds an author's whole corpus, or their favorites, to a local mirror
//! - Incrementally refreshes the mirror, re-downloading only stories whose
//!   word count, chapter count, or update time changed
//! - Rebuilds a lightweight JSON index of the mirror for browsing
//!
//! ## Usage
//!
//! ```sh
//! ffmirror -m ~/fanfic add https://www.fanfiction.net/u/12345/Some-Writer
//! ffmirror -m ~/fanfic update
//! ffmirror -m ~/fanfic cache
//! ```
//!
//! ## Architecture
//!
//! Every subcommand is a sequential batch over outbound HTTP: fetch a
//! page, parse the site's markup into story metadata, compare against the
//! flat-file store, download what changed. Failures on one story or
//! author are logged and skipped; the batch continues.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod commands;
mod fetch;
mod mirror;
mod models;
mod sites;
mod utils;

use cli::{Cli, Command};
use fetch::Fetcher;
use mirror::Mirror;
use sites::ffnet::CompileOptions;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ffmirror starting up");

    let args = Cli::parse();
    debug!(?args.mirror_dir, ?args.http_cache_dir, "Parsed CLI arguments");

    let fetcher = Fetcher::new(args.http_cache_dir.map(PathBuf::from))?;
    let mirror = Mirror::new(&args.mirror_dir);

    match args.command {
        Command::Download {
            url,
            outfile,
            contents,
            no_headers,
            kindle,
            dry_run,
            update,
        } => {
            let opts = CompileOptions {
                headers: !no_headers,
                contents,
                kindle,
            };
            commands::download_story(&fetcher, &url, outfile.as_deref(), &opts, dry_run, update)
                .await?;
        }
        Command::Add {
            url,
            favorites,
            all,
            dry_run,
        } => {
            commands::add_author(&mirror, &fetcher, &url, favorites, all, dry_run).await?;
        }
        Command::Update { author } => {
            commands::update_mirror(&mirror, &fetcher, author.as_deref()).await?;
        }
        Command::Cache => {
            commands::build_cache(&mirror)?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
