//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Global options can be provided via flags or environment
//! variables; each subcommand maps to one of the mirror operations.

use clap::{Parser, Subcommand};

/// Command-line arguments for ffmirror.
///
/// # Examples
///
/// ```sh
/// # Download one story next to the current directory
/// ffmirror download https://www.fanfiction.net/s/987654/1/Some-Story
///
/// # Add an author's corpus to the mirror
/// ffmirror -m ~/fanfic add https://www.fanfiction.net/u/12345/Some-Writer
///
/// # Refresh every author already in the mirror, then rebuild the index
/// ffmirror -m ~/fanfic update
/// ffmirror -m ~/fanfic cache
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Mirror root directory
    #[arg(short, long, env = "FFMIRROR_DIR", default_value = ".")]
    pub mirror_dir: String,

    /// Directory for the on-disk HTTP page cache (disabled when unset)
    #[arg(long, env = "FFMIRROR_CACHE_DIR")]
    pub http_cache_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download a single story to a standalone file
    Download {
        /// A URL for any chapter of the story, or (with --update) the path
        /// of an existing mirror file
        url: String,

        /// The file to output to (defaults to a name built from the title)
        #[arg(short, long)]
        outfile: Option<String>,

        /// Generate a table of contents
        #[arg(short, long, conflicts_with = "no_headers")]
        contents: bool,

        /// Suppress the story title and chapter headers
        #[arg(long)]
        no_headers: bool,

        /// Replace horizontal-rule scene breaks for e-readers
        #[arg(short, long)]
        kindle: bool,

        /// Dry run (no download, just parse and print metadata)
        #[arg(short = 'd', long)]
        dry_run: bool,

        /// Update an existing downloaded file in place
        #[arg(short, long)]
        update: bool,
    },

    /// Add an author's corpus or favorites to the mirror, or refresh them
    Add {
        /// A URL for the author's profile
        url: String,

        /// Mirror the author's favorites rather than their own stories
        #[arg(short, long)]
        favorites: bool,

        /// Download every story without checking for an up-to-date copy
        #[arg(short, long)]
        all: bool,

        /// Dry run (only parse the listing and print it)
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Re-check every author in the mirror for new or updated stories
    Update {
        /// Refresh only the named author (display name or directory name)
        author: Option<String>,
    },

    /// Rebuild the browse index from the mirror contents
    Cache,
}
