//! Site modules for the supported fan-fiction archives.
//!
//! Each site module knows how to turn site URLs into ids, download and parse
//! story metadata, walk an author's profile listing, and compile a full
//! story into a standalone HTML document.
//!
//! # Supported sites
//!
//! | Site | Tag | Notes |
//! |------|-----|-------|
//! | FanFiction.net | `ffnet` | Primary target |
//! | FictionPress | `fictionpress` | Same markup, different hostname |
//!
//! The two sites render identical markup, so both are handled by
//! [`ffnet::FFNet`] parameterized with a hostname and site tag. Use
//! [`ffnet::FFNet::for_url`] to dispatch on a pasted URL and
//! [`ffnet::FFNet::by_name`] to dispatch on a stored site tag.
//!
//! # Parsing strategy
//!
//! The profile and story pages are queried through `scraper` where the DOM
//! is dependable, and through regexes over the raw page where it is not.
//! Story text in particular is cut out of the raw HTML: the archives serve
//! malformed markup inside `#storytext` that does not survive a parse and
//! re-serialize round trip.

use thiserror::Error;

pub mod ffnet;

/// Errors produced while parsing a site's markup.
///
/// These are per-page failures; batch operations log them and move on to
/// the next story or author.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("page element not found: {0}")]
    MissingElement(&'static str),

    #[error("malformed page content: {0}")]
    Malformed(String),

    #[error("no site module for {0:?}")]
    UnknownSite(String),
}
