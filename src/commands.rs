//! The mirror operations behind each CLI subcommand.
//!
//! Each operation is best-effort over a batch: a story or author that
//! fails to download or parse is logged and skipped, and the batch moves
//! on. Only errors that make the whole operation meaningless (an
//! unrecognized URL, an unreadable mirror) are returned to `main`.

use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tracing::{error, info, instrument, warn};

use crate::fetch::Fetcher;
use crate::mirror::{read_story_meta, Mirror};
use crate::models::StoryInfo;
use crate::sites::ffnet::{CompileOptions, FFNet};
use crate::utils::make_filename;

/// Download a single story to a standalone file.
///
/// With `update`, `url` names an existing downloaded file; the story is
/// re-fetched only when the site copy differs from the stored metadata,
/// and the file is rewritten in place unless `outfile` overrides it.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn download_story(
    fetcher: &Fetcher,
    url: &str,
    outfile: Option<&str>,
    opts: &CompileOptions,
    dry_run: bool,
    update: bool,
) -> Result<(), Box<dyn Error>> {
    let (site, sid, existing) = if update {
        let meta = read_story_meta(Path::new(url))
            .ok_or("no story metadata block found in file")?;
        let site = FFNet::by_name(meta.get("site").ok_or("file metadata has no site tag")?)?;
        let sid = meta
            .get("id")
            .ok_or("file metadata has no story id")?
            .to_string();
        (site, sid, Some(meta))
    } else {
        let site = FFNet::for_url(url).ok_or("unrecognized story URL")?;
        let sid = FFNet::story_id_from_url(url).ok_or("not a story URL")?;
        (site, sid, None)
    };

    let (story, toc) = site.download_metadata(fetcher, &sid).await?;
    info!(title = %story.title, chapters = toc.len(), "Found story");

    if dry_run {
        println!("Metadata:");
        for (k, v) in story.meta_map() {
            println!("{}: {}", k, v);
        }
        println!("\nContents:");
        for chapter in &toc {
            println!("{}", chapter.title);
        }
        return Ok(());
    }

    if let Some(meta) = &existing {
        if !meta.differs_from(&story) {
            info!(title = %story.title, "Nothing to do (up to date)");
            return Ok(());
        }
    }

    let out_path = match outfile {
        Some(path) => path.to_string(),
        None if update => url.to_string(),
        None => default_outfile(&story.title, opts.kindle),
    };
    let doc = site.compile_story(fetcher, &story, &toc, opts).await?;
    tokio::fs::write(&out_path, doc).await?;
    info!(path = %out_path, "Wrote story");
    Ok(())
}

/// Add an author's corpus (or favorites) to the mirror, downloading every
/// story that is new or updated.
///
/// The author's favorites list is always written to their directory as
/// `favorites.json`, so the mirror remembers which other authors are worth
/// following.
#[instrument(level = "info", skip_all, fields(%url, favorites, all))]
pub async fn add_author(
    mirror: &Mirror,
    fetcher: &Fetcher,
    url: &str,
    favorites: bool,
    all: bool,
    dry_run: bool,
) -> Result<(), Box<dyn Error>> {
    let site = FFNet::for_url(url).ok_or("unrecognized author URL")?;
    let aid = FFNet::author_id_from_url(url).ok_or("not an author profile URL")?;
    let (authored, faved, info) = site.download_list(fetcher, &aid).await?;

    if !dry_run {
        mirror.write_favorites(&info, &faved)?;
    }

    let listing = if favorites { faved } else { authored };
    let listing: Vec<StoryInfo> = listing
        .into_iter()
        .unique_by(|s| (s.site.clone(), s.id.clone()))
        .collect();
    let pending: Vec<&StoryInfo> = if all {
        listing.iter().collect()
    } else {
        listing.iter().filter(|s| mirror.check_update(s)).collect()
    };
    info!(
        author = %info.name,
        pending = pending.len(),
        total = listing.len(),
        "Stories to download"
    );

    if dry_run {
        for story in &listing {
            println!("{}", serde_json::to_string(story)?);
        }
        return Ok(());
    }

    mirror.update_tags(
        pending
            .iter()
            .map(|s| (s.mirror_filename(), site.tags_for(s))),
    )?;

    let opts = CompileOptions {
        contents: true,
        ..CompileOptions::default()
    };
    for (n, entry) in pending.iter().enumerate() {
        info!(index = n + 1, total = pending.len(), title = %entry.title, "Acquiring story");
        // Re-fetch full metadata from the story page; the listing entry is
        // abbreviated and carries no chapter titles.
        let (story, toc) = match site.download_metadata(fetcher, &entry.id).await {
            Ok(pair) => pair,
            Err(e) => {
                error!(id = %entry.id, title = %entry.title, error = %e, "Metadata fetch failed; skipping story");
                continue;
            }
        };
        let doc = match site.compile_story(fetcher, &story, &toc, &opts).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(id = %story.id, title = %story.title, error = %e, "Download failed; skipping story");
                continue;
            }
        };
        match mirror.write_story(&story, &doc) {
            Ok(path) => info!(path = %path.display(), "Stored story"),
            Err(e) => error!(id = %story.id, error = %e, "Failed to write story file"),
        }
    }
    Ok(())
}

/// Walk the mirror and refresh every author in it from the source site.
#[instrument(level = "info", skip_all)]
pub async fn update_mirror(
    mirror: &Mirror,
    fetcher: &Fetcher,
    author_filter: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let entries = mirror.read_entries()?;
    let total = entries.len();
    for (n, (author, stories)) in entries.iter().enumerate() {
        if let Some(filter) = author_filter {
            let dir_match = stories
                .first()
                .and_then(|s| s.meta.get("author_dir"))
                .map(|d| d == filter)
                .unwrap_or(false);
            if !author.eq_ignore_ascii_case(filter) && !dir_match {
                continue;
            }
        }
        let Some(first) = stories.first() else {
            continue;
        };
        let (site_tag, aid) = match (first.meta.get("site"), first.meta.get("authorid")) {
            (Some(site), Some(aid)) => (site, aid),
            _ => {
                warn!(%author, "Stored metadata names no site or author id; skipping");
                continue;
            }
        };
        let site = match FFNet::by_name(site_tag) {
            Ok(site) => site,
            Err(e) => {
                warn!(%author, error = %e, "Skipping author");
                continue;
            }
        };
        let url = site.user_url(aid);
        info!(%author, index = n + 1, total, "Refreshing author");
        if let Err(e) = add_author(mirror, fetcher, &url, false, false, false).await {
            error!(%author, error = %e, "Author refresh failed; continuing");
        }
    }
    Ok(())
}

/// Rebuild the browse index from the mirror contents.
pub fn build_cache(mirror: &Mirror) -> Result<(), Box<dyn Error>> {
    let count = mirror.write_index()?;
    info!(stories = count, "Browse index rebuilt");
    Ok(())
}

fn default_outfile(title: &str, kindle: bool) -> String {
    format!(
        "{}.{}",
        make_filename(title),
        if kindle { "txt" } else { "html" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_outfile() {
        assert_eq!(default_outfile("The Longest Road", false), "the_longest_road.html");
        assert_eq!(default_outfile("The Longest Road", true), "the_longest_road.txt");
    }
}
