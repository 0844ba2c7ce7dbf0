//! Data models for stories, authors, and chapters.
//!
//! This module defines the core data structures used throughout the
//! application:
//! - [`StoryInfo`]: Metadata for one story, as scraped from a site
//! - [`AuthorInfo`]: An author identity and its mirror directory name
//! - [`ChapterInfo`]: One chapter title plus its fetch URL
//! - [`StorySource`]: Whether a listing entry was authored or favorited
//!
//! `StoryInfo` serializes to JSON for `favorites.json` and gets flattened to
//! sorted `key: value` lines for the metadata comment block embedded in each
//! stored story file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::make_filename;

/// Where a profile-page listing entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorySource {
    /// Written by the profile's author.
    Authored,
    /// Favorited by the profile's author; carries its own author link.
    Favorites,
    /// Parsed from a story page rather than a listing.
    Story,
}

impl StorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorySource::Authored => "authored",
            StorySource::Favorites => "favorites",
            StorySource::Story => "story",
        }
    }
}

/// An author identity on a source site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthorInfo {
    /// Display name as shown on the profile page.
    pub name: String,
    /// Site-assigned numeric id, kept as a string.
    pub id: String,
    /// Canonical profile URL.
    pub url: String,
    /// Site tag, e.g. `"ffnet"` or `"fictionpress"`.
    pub site: String,
}

impl AuthorInfo {
    /// Directory name for this author inside the mirror.
    ///
    /// The site tag and id are part of the name so that two authors with the
    /// same display name on different sites never collide.
    pub fn mirror_dirname(&self) -> String {
        format!("{}-{}-{}", make_filename(&self.name), self.site, self.id)
    }
}

/// One chapter of a story: its title and the page it is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChapterInfo {
    pub title: String,
    pub url: String,
}

/// Metadata for a single story.
///
/// Listing entries (from an author's profile page) and story-page entries
/// carry the same fields; a listing entry for an authored story is stamped
/// with the profile's author by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoryInfo {
    pub title: String,
    pub summary: String,
    /// Fandom category, e.g. `"Naruto"` or `"Book X-overs"`.
    pub category: String,
    /// Site-assigned story id, kept as a string.
    pub id: String,
    pub reviews: u32,
    pub chapters: u32,
    pub words: u64,
    pub characters: String,
    pub source: StorySource,
    pub author: AuthorInfo,
    pub genre: String,
    /// Site tag, matches `author.site`.
    pub site: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub published: DateTime<Utc>,
    pub complete: bool,
    pub story_url: String,
}

impl StoryInfo {
    /// Relative path of this story's file inside the mirror:
    /// `<author-dir>/<title>.html`.
    pub fn mirror_filename(&self) -> String {
        format!(
            "{}/{}.html",
            self.author.mirror_dirname(),
            make_filename(&self.title)
        )
    }

    /// Flatten the metadata to sorted `key: value` pairs.
    ///
    /// This is the view written into the comment block of each stored story
    /// file and printed by `download --dry-run`. Values are forced onto a
    /// single line and must not terminate the surrounding HTML comment.
    pub fn meta_map(&self) -> BTreeMap<&'static str, String> {
        let clean = |s: &str| s.replace(['\n', '\r'], " ").replace("-->", "--");
        let mut m = BTreeMap::new();
        m.insert("title", clean(&self.title));
        m.insert("summary", clean(&self.summary));
        m.insert("category", clean(&self.category));
        m.insert("id", self.id.clone());
        m.insert("reviews", self.reviews.to_string());
        m.insert("chapters", self.chapters.to_string());
        m.insert("words", self.words.to_string());
        m.insert("characters", clean(&self.characters));
        m.insert("source", self.source.as_str().to_string());
        m.insert("author", clean(&self.author.name));
        m.insert("authorid", self.author.id.clone());
        m.insert("author_url", self.author.url.clone());
        m.insert("author_dir", self.author.mirror_dirname());
        m.insert("genre", clean(&self.genre));
        m.insert("site", self.site.clone());
        m.insert("updated", self.updated.timestamp().to_string());
        m.insert("published", self.published.timestamp().to_string());
        m.insert("complete", self.complete.to_string());
        m.insert("story_url", self.story_url.clone());
        m
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn sample_author() -> AuthorInfo {
        AuthorInfo {
            name: "Some Writer".to_string(),
            id: "12345".to_string(),
            url: "https://www.fanfiction.net/u/12345/".to_string(),
            site: "ffnet".to_string(),
        }
    }

    pub(crate) fn sample_story() -> StoryInfo {
        StoryInfo {
            title: "The Longest Road".to_string(),
            summary: "A story about walking.".to_string(),
            category: "Naruto".to_string(),
            id: "987654".to_string(),
            reviews: 12,
            chapters: 3,
            words: 40211,
            characters: "Naruto U., Hinata H.".to_string(),
            source: StorySource::Authored,
            author: sample_author(),
            genre: "Adventure/Romance".to_string(),
            site: "ffnet".to_string(),
            updated: Utc.timestamp_opt(1585699200, 0).unwrap(),
            published: Utc.timestamp_opt(1546300800, 0).unwrap(),
            complete: false,
            story_url: "https://www.fanfiction.net/s/987654/1/".to_string(),
        }
    }

    #[test]
    fn test_mirror_dirname() {
        assert_eq!(sample_author().mirror_dirname(), "some_writer-ffnet-12345");
    }

    #[test]
    fn test_mirror_filename() {
        assert_eq!(
            sample_story().mirror_filename(),
            "some_writer-ffnet-12345/the_longest_road.html"
        );
    }

    #[test]
    fn test_meta_map_round_trip_fields() {
        let m = sample_story().meta_map();
        assert_eq!(m["id"], "987654");
        assert_eq!(m["words"], "40211");
        assert_eq!(m["chapters"], "3");
        assert_eq!(m["updated"], "1585699200");
        assert_eq!(m["complete"], "false");
        assert_eq!(m["author_dir"], "some_writer-ffnet-12345");
        assert_eq!(m["source"], "authored");
    }

    #[test]
    fn test_meta_map_sanitizes_values() {
        let mut story = sample_story();
        story.summary = "line one\nline two --> done".to_string();
        let m = story.meta_map();
        assert_eq!(m["summary"], "line one line two -- done");
    }

    #[test]
    fn test_story_info_json_round_trip() {
        let story = sample_story();
        let json = serde_json::to_string(&story).unwrap();
        assert!(json.contains("\"updated\":1585699200"));
        let back: StoryInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.title, story.title);
        assert_eq!(back.updated, story.updated);
        assert_eq!(back.source, StorySource::Authored);
    }
}
