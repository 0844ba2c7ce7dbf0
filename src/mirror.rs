//! Flat-file mirror store.
//!
//! The mirror is a plain directory tree: one directory per author, named
//! `<author>-<site>-<id>`, one HTML file per story inside it. Each story
//! file embeds its own metadata as an HTML comment of `key: value` lines,
//! so the mirror stays self-describing and browsable without any database.
//!
//! # Layout
//!
//! ```text
//! mirror/
//! ├── some_writer-ffnet-12345/
//! │   ├── the_longest_road.html
//! │   └── favorites.json
//! ├── tags.json      # story relpath -> fandom tag set
//! └── index.json     # browse index, rebuilt by the `cache` command
//! ```
//!
//! All checks for "does this story need re-downloading" compare the words,
//! chapters, and updated fields of a fresh listing entry against the
//! metadata block stored in the local file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::models::{AuthorInfo, StoryInfo};

static META_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+): (.*)$").unwrap());

const TAGS_FILE: &str = "tags.json";
const INDEX_FILE: &str = "index.json";
const FAVORITES_FILE: &str = "favorites.json";

/// Metadata block parsed back out of a stored story file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoryMeta(pub BTreeMap<String, String>);

impl StoryMeta {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    /// True when a freshly scraped entry differs from the stored copy in
    /// words, chapters, or update time. Missing fields count as different.
    pub fn differs_from(&self, story: &StoryInfo) -> bool {
        match (
            self.get_int("words"),
            self.get_int("chapters"),
            self.get_int("updated"),
        ) {
            (Some(words), Some(chapters), Some(updated)) => {
                words != story.words as i64
                    || chapters != story.chapters as i64
                    || updated != story.updated.timestamp()
            }
            _ => true,
        }
    }
}

/// One story in the browse index: its file, its tags, and its metadata.
#[derive(Debug, Serialize)]
pub struct StoryEntry {
    pub filename: String,
    pub tags: BTreeSet<String>,
    pub meta: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FavoritesFile<'a> {
    info: &'a AuthorInfo,
    favs: &'a [StoryInfo],
}

/// Read the metadata comment block out of a stored story file.
///
/// Returns `None` for missing or unreadable files, files without a
/// metadata block, and files that do not end with `</html>` (truncated
/// leftovers from an interrupted download).
pub fn read_story_meta(path: &Path) -> Option<StoryMeta> {
    let content = fs::read_to_string(path).ok()?;
    if !content.trim_end().ends_with("</html>") {
        return None;
    }
    let mut map = BTreeMap::new();
    let mut reading = false;
    for line in content.lines() {
        if !reading {
            // The first multi-line HTML comment in the file is the block.
            if line.starts_with("<!--") && !line.contains("-->") {
                reading = true;
            }
            continue;
        }
        match META_LINE_RE.captures(line) {
            Some(c) => {
                map.insert(c[1].to_string(), c[2].to_string());
            }
            None => break,
        }
    }
    if map.is_empty() {
        return None;
    }
    Some(StoryMeta(map))
}

/// Handle on a mirror directory.
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a story's file inside the mirror.
    pub fn story_path(&self, story: &StoryInfo) -> PathBuf {
        self.root.join(story.mirror_filename())
    }

    /// Decide whether a listing entry needs downloading.
    ///
    /// True when no local copy exists or the stored copy is stale. When the
    /// file on disk belongs to a different story id, the entry is skipped:
    /// two stories by one author sharing a title would otherwise clobber
    /// each other on every run.
    pub fn check_update(&self, story: &StoryInfo) -> bool {
        let path = self.story_path(story);
        let meta = match read_story_meta(&path) {
            Some(meta) => meta,
            None => return true,
        };
        if let Some(id) = meta.get("id") {
            if id != story.id {
                debug!(
                    path = %path.display(),
                    stored_id = id,
                    listing_id = %story.id,
                    "Title collision with a different story; leaving the stored copy alone"
                );
                return false;
            }
        }
        meta.differs_from(story)
    }

    /// Write a compiled story document at its mirror path.
    pub fn write_story(&self, story: &StoryInfo, document: &str) -> std::io::Result<PathBuf> {
        let path = self.story_path(story);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, document)?;
        Ok(path)
    }

    /// Write an author's favorites list to their directory.
    pub fn write_favorites(
        &self,
        info: &AuthorInfo,
        favs: &[StoryInfo],
    ) -> Result<PathBuf, Box<dyn Error>> {
        let dir = self.root.join(info.mirror_dirname());
        fs::create_dir_all(&dir)?;
        let path = dir.join(FAVORITES_FILE);
        let payload = serde_json::to_string_pretty(&FavoritesFile { info, favs })?;
        fs::write(&path, payload)?;
        Ok(path)
    }

    /// Read the mirror-level tags file. Missing or unreadable means empty.
    pub fn read_tags(&self) -> BTreeMap<String, BTreeSet<String>> {
        let path = self.root.join(TAGS_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable tags file");
            BTreeMap::new()
        })
    }

    /// Merge tag sets into the mirror-level tags file.
    ///
    /// Each item maps a story's relative path to the tags to add; existing
    /// tags on that story are kept.
    pub fn update_tags<I>(&self, items: I) -> Result<(), Box<dyn Error>>
    where
        I: IntoIterator<Item = (String, BTreeSet<String>)>,
    {
        let mut tags = self.read_tags();
        for (resource, new_tags) in items {
            tags.entry(resource).or_default().extend(new_tags);
        }
        fs::create_dir_all(&self.root)?;
        let path = self.root.join(TAGS_FILE);
        fs::write(&path, serde_json::to_string_pretty(&tags)?)?;
        Ok(())
    }

    /// Walk the mirror and collect every readable story file, grouped by
    /// author display name, with tags attached.
    ///
    /// This reads every story file in the mirror and takes a while on a
    /// large one; the `cache` command persists the result as the browse
    /// index.
    #[instrument(level = "info", skip(self), fields(root = %self.root.display()))]
    pub fn read_entries(&self) -> std::io::Result<BTreeMap<String, Vec<StoryEntry>>> {
        let tags = self.read_tags();
        let mut by_author: BTreeMap<String, Vec<StoryEntry>> = BTreeMap::new();
        let mut skipped = 0usize;

        if !self.root.is_dir() {
            return Ok(by_author);
        }
        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let dir_name = dir_entry.file_name().to_string_lossy().into_owned();
            for file_entry in fs::read_dir(dir_entry.path())? {
                let file_entry = file_entry?;
                let file_name = file_entry.file_name().to_string_lossy().into_owned();
                if !file_name.ends_with(".html") {
                    continue;
                }
                let meta = match read_story_meta(&file_entry.path()) {
                    Some(meta) => meta,
                    None => {
                        skipped += 1;
                        debug!(path = %file_entry.path().display(), "Skipping file without metadata");
                        continue;
                    }
                };
                let filename = format!("{}/{}", dir_name, file_name);
                let author = meta
                    .get("author")
                    .map(str::to_string)
                    .unwrap_or_else(|| dir_name.clone());
                by_author.entry(author).or_default().push(StoryEntry {
                    tags: tags.get(&filename).cloned().unwrap_or_default(),
                    meta: meta.0,
                    filename,
                });
            }
        }
        let total: usize = by_author.values().map(Vec::len).sum();
        info!(authors = by_author.len(), stories = total, skipped, "Walked mirror");
        Ok(by_author)
    }

    /// Rebuild the browse index from the mirror contents. Returns the
    /// number of indexed stories.
    pub fn write_index(&self) -> Result<usize, Box<dyn Error>> {
        let entries = self.read_entries()?;
        let count = entries.values().map(Vec::len).sum();
        let path = self.root.join(INDEX_FILE);
        fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
        info!(path = %path.display(), stories = count, "Wrote browse index");
        Ok(count)
    }
}
