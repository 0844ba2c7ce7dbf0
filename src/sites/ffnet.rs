//! FanFiction.net scraper, shared with FictionPress.
//!
//! This is the site module for FF.net and the model for any future site
//! module. It handles only site-specific tasks: recognizing story and
//! profile URLs, downloading story metadata and chapter lists, walking an
//! author's listing (authored plus favorited stories), and compiling a
//! whole story into a single HTML document.
//!
//! # URL patterns
//!
//! Stories live at `https://<host>/s/<sid>/<chapter>/` and profiles at
//! `https://<host>/u/<aid>/`. The hostname seen in a pasted URL is kept for
//! subsequent requests, so mobile mirrors keep working. FictionPress serves
//! byte-identical markup under a different hostname and is handled by the
//! same parser.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::error::Error;
use tracing::{info, instrument, warn};

use crate::fetch::Fetcher;
use crate::models::{AuthorInfo, ChapterInfo, StoryInfo, StorySource};
use crate::sites::ScrapeError;
use crate::utils::fold_string_indiscriminately;

static STORY_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://(?P<host>[^/]+)/s/(?P<sid>\d+)(?:/(?P<chapter>\d+))?/?").unwrap());
static USER_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://(?P<host>[^/]+)/u/(?P<aid>\d+)/?").unwrap());
static AUTHOR_HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/u/(\d+)").unwrap());
static CHAPTER_OPTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s*(.*)").unwrap());
static WORDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Words:\s*([\d,]+)").unwrap());
static CHAPTERS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Chapters:\s*(\d+)").unwrap());
static REVIEWS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Reviews:\s*([\d,]+)").unwrap());
static STORY_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"id:\s*(\d+)").unwrap());
static UPDATED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Updated:\s*<span[^>]*data-xutime=['"](\d+)['"]"#).unwrap());
static PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Published:\s*<span[^>]*data-xutime=['"](\d+)['"]"#).unwrap());
static GENRE_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z/-]+$").unwrap());
static STAT_FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Chapters|Words|Reviews|Favs|Follows|Updated|Published|Status|id):").unwrap()
});
static LIST_GENRE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Rated:\s*\S{1,2}\s*-\s*.+?\s*-\s*(?P<genre>.+?)\s*-\s*").unwrap());
static LIST_CHARS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*-\s*(.+?)\s*(-.*)?$").unwrap());
static STORYTEXT_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<div[^>]*id=['"]?storytext['"]?[^>]*>"#).unwrap());
static HR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<hr[^>]*>").unwrap());

static PROFILE_TOP_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#profile_top").unwrap());
static BOLD_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("b").unwrap());
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SUMMARY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.xcontrast_txt").unwrap());
static STATS_SPAN_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("span.xcontrast_txt").unwrap());
static CHAP_OPTION_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("select#chap_select option").unwrap());
static PRE_STORY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("#pre_story_links a").unwrap());
static CONTENT_WRAPPER_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#content_wrapper_inner span").unwrap());
static Z_LIST_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.z-list").unwrap());
static DIV_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div").unwrap());

/// Options for [`FFNet::compile_story`] output.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Emit the story title and per-chapter headings.
    pub headers: bool,
    /// Emit a linked table of contents after the title.
    pub contents: bool,
    /// Replace `<hr>` scene breaks with a `* * *` paragraph for readers
    /// that render rules badly.
    pub kindle: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            headers: true,
            contents: false,
            kindle: false,
        }
    }
}

/// Scraper for FanFiction.net-style archives.
#[derive(Debug, Clone)]
pub struct FFNet {
    hostname: String,
    site: &'static str,
}

impl FFNet {
    pub fn ffnet() -> Self {
        Self {
            hostname: "www.fanfiction.net".to_string(),
            site: "ffnet",
        }
    }

    pub fn fictionpress() -> Self {
        Self {
            hostname: "www.fictionpress.com".to_string(),
            site: "fictionpress",
        }
    }

    /// Dispatch on a pasted story or profile URL.
    ///
    /// The hostname from the URL is kept for subsequent requests. Returns
    /// `None` for URLs that match neither site.
    pub fn for_url(url: &str) -> Option<Self> {
        let caps = STORY_URL_RE.captures(url).or_else(|| USER_URL_RE.captures(url))?;
        let host = caps.name("host")?.as_str();
        let site = if host.contains("fictionpress") {
            "fictionpress"
        } else if host.contains("fanfiction") {
            "ffnet"
        } else {
            return None;
        };
        Some(Self {
            hostname: host.to_string(),
            site,
        })
    }

    /// Dispatch on a stored site tag, as found in mirror metadata.
    pub fn by_name(site: &str) -> Result<Self, ScrapeError> {
        match site {
            "ffnet" => Ok(Self::ffnet()),
            "fictionpress" => Ok(Self::fictionpress()),
            other => Err(ScrapeError::UnknownSite(other.to_string())),
        }
    }

    pub fn site(&self) -> &'static str {
        self.site
    }

    /// Extract the story id from a story URL.
    pub fn story_id_from_url(url: &str) -> Option<String> {
        STORY_URL_RE
            .captures(url)
            .map(|c| c["sid"].to_string())
    }

    /// Extract the author id from a profile URL.
    pub fn author_id_from_url(url: &str) -> Option<String> {
        USER_URL_RE.captures(url).map(|c| c["aid"].to_string())
    }

    /// Canonical URL for one chapter of a story.
    pub fn story_url(&self, sid: &str, chapter: u32) -> String {
        format!("https://{}/s/{}/{}/", self.hostname, sid, chapter)
    }

    /// Canonical URL for an author's profile.
    pub fn user_url(&self, aid: &str) -> String {
        format!("https://{}/u/{}/", self.hostname, aid)
    }

    /// Download a story's metadata and chapter list from its first chapter
    /// page.
    #[instrument(level = "info", skip(self, fetcher))]
    pub async fn download_metadata(
        &self,
        fetcher: &Fetcher,
        sid: &str,
    ) -> Result<(StoryInfo, Vec<ChapterInfo>), Box<dyn Error>> {
        let url = self.story_url(sid, 1);
        let page = fetcher.get(&url).await?;
        let (story, titles) = self.parse_story_page(&page)?;
        let toc = titles
            .into_iter()
            .enumerate()
            .map(|(n, title)| ChapterInfo {
                title,
                url: self.story_url(&story.id, n as u32 + 1),
            })
            .collect::<Vec<_>>();
        info!(title = %story.title, chapters = toc.len(), "Downloaded story metadata");
        Ok((story, toc))
    }

    /// Download an author's listing: their stories, their favorites, and
    /// the author identity itself.
    #[instrument(level = "info", skip(self, fetcher))]
    pub async fn download_list(
        &self,
        fetcher: &Fetcher,
        aid: &str,
    ) -> Result<(Vec<StoryInfo>, Vec<StoryInfo>, AuthorInfo), Box<dyn Error>> {
        let url = self.user_url(aid);
        let page = fetcher.get(&url).await?;
        let (authored, faved, info) = self.parse_author_page(&page, aid)?;
        info!(
            author = %info.name,
            authored = authored.len(),
            faved = faved.len(),
            "Downloaded author listing"
        );
        Ok((authored, faved, info))
    }

    /// Download every chapter of a story and render the standalone HTML
    /// document, metadata comment block included.
    #[instrument(level = "info", skip_all, fields(title = %story.title, chapters = toc.len()))]
    pub async fn compile_story(
        &self,
        fetcher: &Fetcher,
        story: &StoryInfo,
        toc: &[ChapterInfo],
        opts: &CompileOptions,
    ) -> Result<String, Box<dyn Error>> {
        let mut doc = render_document_head(story);
        if opts.headers {
            doc.push_str(&format!("<h1>{}</h1>\n", story.title));
        }
        if opts.contents {
            doc.push_str(&render_toc(toc));
        }
        for (n, chapter) in toc.iter().enumerate() {
            info!(chapter = n + 1, total = toc.len(), title = %chapter.title, "Fetching chapter");
            let page = fetcher.get(&chapter.url).await?;
            let mut text = extract_storytext(&page)?.to_string();
            if opts.headers {
                doc.push_str(&format!(
                    "<h2 id=\"ch{}\" class=\"chapter\">{}</h2>\n",
                    n + 1,
                    chapter.title
                ));
            }
            if opts.kindle {
                text = HR_RE.replace_all(&text, "<p>* * *</p>").into_owned();
            }
            doc.push_str(&fold_string_indiscriminately(&text, 80));
            doc.push_str("\n\n");
        }
        doc.push_str("</body>\n</html>\n");
        Ok(doc)
    }

    /// Fandom tag set for a story, derived from its category string.
    pub fn tags_for(&self, story: &StoryInfo) -> BTreeSet<String> {
        cat_to_tagset(&story.category)
    }

    /// Parse a story's first chapter page into metadata plus chapter titles.
    pub fn parse_story_page(&self, page: &str) -> Result<(StoryInfo, Vec<String>), ScrapeError> {
        let doc = Html::parse_document(page);
        let profile = doc
            .select(&PROFILE_TOP_SEL)
            .next()
            .ok_or(ScrapeError::MissingElement("#profile_top"))?;

        let title = profile
            .select(&BOLD_SEL)
            .next()
            .ok_or(ScrapeError::MissingElement("story title"))?
            .text()
            .collect::<String>()
            .trim()
            .to_string();

        let author_link = profile
            .select(&ANCHOR_SEL)
            .find_map(|a| {
                let href = a.value().attr("href")?;
                let aid = AUTHOR_HREF_RE.captures(href)?[1].to_string();
                Some((a.text().collect::<String>().trim().to_string(), aid))
            })
            .ok_or(ScrapeError::MissingElement("author link"))?;
        let (author_name, author_id) = author_link;

        let summary = profile
            .select(&SUMMARY_SEL)
            .next()
            .map(|d| d.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        // The "By:" span next to the author link carries the same class as
        // the stats span, so the class alone does not identify it.
        let stats_el = profile
            .select(&STATS_SPAN_SEL)
            .find(|s| s.text().any(|t| t.contains("Rated:")))
            .ok_or(ScrapeError::MissingElement("stats line"))?;
        let stats_text = stats_el.text().collect::<String>();
        let stats = parse_stats(&stats_text)?;
        let sid = stats
            .id
            .clone()
            .ok_or_else(|| ScrapeError::Malformed("story id missing from stats".to_string()))?;

        let stats_html = stats_el.inner_html();
        let published = PUBLISHED_RE
            .captures(&stats_html)
            .and_then(|c| c[1].parse::<i64>().ok())
            .ok_or_else(|| ScrapeError::Malformed("publication date".to_string()))?;
        let updated = UPDATED_RE
            .captures(&stats_html)
            .and_then(|c| c[1].parse::<i64>().ok())
            .unwrap_or(published);

        // The second link under #pre_story_links is the fandom; a missing
        // one means the story is filed under the crossover meta-category.
        let category = doc
            .select(&PRE_STORY_SEL)
            .nth(1)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "crossover".to_string());

        let mut chapters = doc
            .select(&CHAP_OPTION_SEL)
            .map(|o| {
                let raw = o.text().collect::<String>();
                CHAPTER_OPTION_RE
                    .captures(raw.trim())
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| raw.trim().to_string())
            })
            .collect::<Vec<_>>();
        if chapters.is_empty() {
            // Oneshots have no chapter selector at all.
            chapters.push("Chapter 1".to_string());
        }

        let author = AuthorInfo {
            name: author_name,
            url: self.user_url(&author_id),
            id: author_id,
            site: self.site.to_string(),
        };
        let story = StoryInfo {
            title,
            summary,
            category,
            story_url: self.story_url(&sid, 1),
            id: sid,
            reviews: stats.reviews,
            chapters: stats.chapters.max(chapters.len() as u32),
            words: stats.words,
            characters: stats.characters,
            source: StorySource::Story,
            author,
            genre: stats.genre,
            site: self.site.to_string(),
            updated: timestamp(updated)?,
            published: timestamp(published)?,
            complete: stats.complete,
        };
        Ok((story, chapters))
    }

    /// Parse an author's profile page into (authored, favorites, author).
    ///
    /// Individual listing entries that fail to parse are logged and
    /// skipped; one broken entry should not lose the rest of the listing.
    pub fn parse_author_page(
        &self,
        page: &str,
        aid: &str,
    ) -> Result<(Vec<StoryInfo>, Vec<StoryInfo>, AuthorInfo), ScrapeError> {
        let doc = Html::parse_document(page);
        let name = doc
            .select(&CONTENT_WRAPPER_SEL)
            .next()
            .ok_or(ScrapeError::MissingElement("author name"))?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        let info = AuthorInfo {
            name,
            id: aid.to_string(),
            url: self.user_url(aid),
            site: self.site.to_string(),
        };

        let mut authored = Vec::new();
        let mut faved = Vec::new();
        for el in doc.select(&Z_LIST_SEL) {
            match self.parse_list_entry(el) {
                Ok(mut story) => {
                    if story.source == StorySource::Authored {
                        story.author = info.clone();
                        authored.push(story);
                    } else {
                        faved.push(story);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unparseable listing entry");
                }
            }
        }
        Ok((authored, faved, info))
    }

    /// Parse one `div.z-list` listing entry.
    fn parse_list_entry(&self, el: ElementRef<'_>) -> Result<StoryInfo, ScrapeError> {
        let attr = |name: &'static str| -> Result<&str, ScrapeError> {
            el.value()
                .attr(name)
                .ok_or(ScrapeError::MissingElement(name))
        };
        let title = attr("data-title")?.replace("\\'", "'");
        let category = attr("data-category")?.replace("\\'", "'");
        let sid = attr("data-storyid")?.to_string();
        let published = parse_num::<i64>(attr("data-datesubmit")?)?;
        let updated = parse_num::<i64>(attr("data-dateupdate")?)?;
        let reviews = parse_num::<u32>(attr("data-ratingtimes")?)?;
        let chapters = parse_num::<u32>(attr("data-chapters")?)?;
        let words = parse_num::<u64>(attr("data-wordcount")?)?;
        let complete = attr("data-statusid")? == "2";

        let is_fav = el
            .value()
            .attr("class")
            .map(|c| c.contains("favstories"))
            .unwrap_or(false);

        let summary_div = el
            .select(&DIV_SEL)
            .next()
            .ok_or(ScrapeError::MissingElement("summary block"))?;
        let summary = first_text(summary_div).unwrap_or_default();

        let stats_div = summary_div
            .select(&DIV_SEL)
            .next()
            .ok_or(ScrapeError::MissingElement("stats block"))?;
        let stats_head = first_text(stats_div).unwrap_or_default();
        let mut genre = LIST_GENRE_RE
            .captures(&stats_head)
            .map(|c| c["genre"].to_string())
            .unwrap_or_default();
        if genre.contains("Chapters") {
            // No genre on this story; the lazy match ate the next field.
            genre.clear();
        }
        let mut characters = last_text(stats_div)
            .and_then(|t| LIST_CHARS_RE.captures(&t).map(|c| c[1].to_string()))
            .unwrap_or_default();
        if characters == "Complete" {
            characters.clear();
        }

        // Favorited entries carry their own author link; authored entries
        // get stamped with the profile's author by the caller.
        let author = if is_fav {
            el.select(&ANCHOR_SEL)
                .find_map(|a| {
                    let href = a.value().attr("href")?;
                    let fav_aid = AUTHOR_HREF_RE.captures(href)?[1].to_string();
                    Some(AuthorInfo {
                        name: a.text().collect::<String>().trim().to_string(),
                        url: self.user_url(&fav_aid),
                        id: fav_aid,
                        site: self.site.to_string(),
                    })
                })
                .ok_or(ScrapeError::MissingElement("favorite author link"))?
        } else {
            AuthorInfo {
                name: String::new(),
                id: String::new(),
                url: String::new(),
                site: self.site.to_string(),
            }
        };

        Ok(StoryInfo {
            title,
            summary,
            category,
            story_url: self.story_url(&sid, 1),
            id: sid,
            reviews,
            chapters,
            words,
            characters,
            source: if is_fav {
                StorySource::Favorites
            } else {
                StorySource::Authored
            },
            author,
            genre,
            site: self.site.to_string(),
            updated: timestamp(updated)?,
            published: timestamp(published)?,
            complete,
        })
    }
}

/// Cut the story text out of a raw chapter page.
///
/// The markup inside `#storytext` is malformed often enough that a DOM
/// round trip mangles it, so the div's contents are sliced out of the raw
/// page instead.
pub fn extract_storytext(page: &str) -> Result<&str, ScrapeError> {
    let open = STORYTEXT_OPEN_RE
        .find(page)
        .ok_or_else(|| ScrapeError::Malformed("storytext not found".to_string()))?;
    let rest = &page[open.end()..];
    let close = rest
        .find("</div>")
        .ok_or_else(|| ScrapeError::Malformed("storytext end not found".to_string()))?;
    Ok(&rest[..close])
}

/// Split a category string into a set of fandom tags.
///
/// Crossover categories are split on `" & "`; tag names are the lowercased
/// category names with commas stripped.
pub fn cat_to_tagset(category: &str) -> BTreeSet<String> {
    category
        .split(" & ")
        .map(|c| c.to_lowercase().replace(',', ""))
        .collect()
}

/// Render the document head and metadata comment block for a compiled
/// story, up to and including the opening `<body>`.
pub fn render_document_head(story: &StoryInfo) -> String {
    let mut doc = format!(
        "<html>\n<head>\n<meta charset=\"UTF-8\" />\n\
         <meta name=\"Author\" content=\"{author}\" />\n\
         <title>{title}</title>\n\
         <style type=\"text/css\">\nbody {{ font-family: sans-serif }}\n</style>\n\
         </head>\n<!-- Story metadata\n",
        author = story.author.name,
        title = story.title,
    );
    for (k, v) in story.meta_map() {
        doc.push_str(&format!("{}: {}\n", k, v));
    }
    doc.push_str("-->\n<body>\n");
    doc
}

/// Render the linked table of contents.
pub fn render_toc(toc: &[ChapterInfo]) -> String {
    let mut rs = String::from("<h2>Contents</h2>\n<ol>\n");
    for (n, chapter) in toc.iter().enumerate() {
        rs.push_str(&format!(
            "<li><a href=\"#ch{}\">{}</a></li>\n",
            n + 1,
            chapter.title
        ));
    }
    rs.push_str("</ol>\n");
    rs
}

#[derive(Debug, Default)]
struct Stats {
    genre: String,
    characters: String,
    chapters: u32,
    words: u64,
    reviews: u32,
    complete: bool,
    id: Option<String>,
}

/// Parse the free-form stats line from a story page.
///
/// The line reads like `Rated: Fiction T - English - Adventure/Romance -
/// Naruto U., Hinata H. - Chapters: 3 - Words: 40,211 - ... - id: 987654`.
/// Genre and characters are both optional and unlabeled; a genre is a
/// single slash-joined token immediately after the language, anything else
/// before the labeled fields is the character list.
fn parse_stats(text: &str) -> Result<Stats, ScrapeError> {
    let words = WORDS_RE
        .captures(text)
        .and_then(|c| c[1].replace(',', "").parse::<u64>().ok())
        .ok_or_else(|| ScrapeError::Malformed(format!("word count in stats: {:?}", text)))?;
    let chapters = CHAPTERS_RE
        .captures(text)
        .and_then(|c| c[1].parse::<u32>().ok())
        .unwrap_or(1);
    let reviews = REVIEWS_RE
        .captures(text)
        .and_then(|c| c[1].replace(',', "").parse::<u32>().ok())
        .unwrap_or(0);
    let id = STORY_ID_RE.captures(text).map(|c| c[1].to_string());
    let complete = text.contains("Status: Complete");

    let tokens: Vec<&str> = text.split(" - ").map(str::trim).collect();
    let mut genre = String::new();
    let mut characters = String::new();
    if let Some(rated) = tokens.iter().position(|t| t.starts_with("Rated:")) {
        let mut free = Vec::new();
        for tok in tokens.iter().skip(rated + 2) {
            if STAT_FIELD_RE.is_match(tok) {
                break;
            }
            free.push(*tok);
        }
        if let Some(first) = free.first() {
            if GENRE_TOKEN_RE.is_match(first) {
                genre = first.to_string();
                characters = free[1..].join(" - ");
            } else {
                characters = free.join(" - ");
            }
        }
    }

    Ok(Stats {
        genre,
        characters,
        chapters,
        words,
        reviews,
        complete,
        id,
    })
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Result<T, ScrapeError> {
    s.parse::<T>()
        .map_err(|_| ScrapeError::Malformed(format!("expected integer, got {:?}", s)))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, ScrapeError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ScrapeError::Malformed(format!("timestamp out of range: {}", secs)))
}

/// First non-whitespace direct text child of an element.
fn first_text(el: ElementRef<'_>) -> Option<String> {
    el.children().find_map(|c| {
        let t = c.value().as_text()?;
        let s = t.trim();
        if s.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Last non-whitespace direct text child of an element.
fn last_text(el: ElementRef<'_>) -> Option<String> {
    el.children()
        .filter_map(|c| {
            let t = c.value().as_text()?;
            if t.trim().is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORY_PAGE: &str = r#"<html><body>
<div id="pre_story_links"><span class="lc-left"><a class="xcontrast_txt" href="/anime/">Anime</a><a class="xcontrast_txt" href="/anime/Naruto/">Naruto</a></span></div>
<div id="profile_top">
<b class="xcontrast_txt">The Longest Road</b>
<span class="xcontrast_txt">By:</span> <a class="xcontrast_txt" href="/u/12345/Some-Writer">Some Writer</a>
<div class="xcontrast_txt" style="margin-top:2px">A story about walking.</div>
<span class="xgray xcontrast_txt">Rated: <a class="xcontrast_txt" href="https://www.fictionratings.com/" target="rating">Fiction  T</a> - English - Adventure/Romance - Naruto U., Hinata H. - Chapters: 3 - Words: 40,211 - Reviews: 12 - Favs: 5 - Follows: 7 - Updated: <span data-xutime="1585699200">Apr 1, 2020</span> - Published: <span data-xutime="1546300800">Jan 1, 2019</span> - id: 987654 </span>
</div>
<select id="chap_select" title="Chapter Navigation"><option value="1">1. The First Step</option><option value="2">2. The Second Step</option><option value="3">3. Homecoming</option></select>
<div class="storytext xcontrast_txt nocopy" id="storytext"><p>It was a long road.</p></div>
</body></html>"#;

    const ONESHOT_PAGE: &str = r#"<html><body>
<div id="pre_story_links"><span><a href="/book/">Books</a></span></div>
<div id="profile_top">
<b class="xcontrast_txt">Small Moments</b>
<span class="xcontrast_txt">By:</span> <a class="xcontrast_txt" href="/u/777/">Other Author</a>
<div class="xcontrast_txt">One quiet scene.</div>
<span class="xgray xcontrast_txt">Rated: <a href="https://www.fictionratings.com/">Fiction  K</a> - English - Words: 1,503 - Published: <span data-xutime='1500000000'>Jul 14</span> - Status: Complete - id: 555 </span>
</div>
<div id='storytext'><p>Quiet.</p></div>
</body></html>"#;

    const AUTHOR_PAGE: &str = r#"<html><body>
<div id="content_wrapper_inner"><span>Some Writer</span>
<div class="z-list zhover zpointer" data-category="Naruto" data-storyid="987654" data-title="The Longest Road" data-wordcount="40211" data-datesubmit="1546300800" data-dateupdate="1585699200" data-ratingtimes="12" data-chapters="3" data-statusid="1">
<a class="stitle" href="/s/987654/1/The-Longest-Road">The Longest Road</a>
<div class="z-indent z-padtop">A story about walking.<div class="z-padtop2 xgray">Naruto - Rated: T - English - Adventure/Romance - Chapters: 3 - Words: 40,211 - Reviews: 12 - Updated: <span data-xutime="1585699200">Apr 1</span> - Published: <span data-xutime="1546300800">Jan 1</span> - Naruto U., Hinata H.</div></div>
</div>
<div class="z-list favstories" data-category="Bleach" data-storyid="555" data-title="Borrowed\'s Time" data-wordcount="1000" data-datesubmit="1500000000" data-dateupdate="1500000000" data-ratingtimes="3" data-chapters="1" data-statusid="2">
<a class="stitle" href="/s/555/1/Borrowed-Time">Borrowed Time</a> by <a href="/u/777/Other-Author">Other Author</a>
<div class="z-indent z-padtop">Short one.<div class="z-padtop2 xgray">Bleach - Rated: K - English - Chapters: 1 - Words: 1,000 - Reviews: 3 - Published: <span data-xutime="1500000000">Jul 14</span> - Complete</div></div>
</div>
</div></body></html>"#;

    #[test]
    fn test_url_builders() {
        let site = FFNet::ffnet();
        assert_eq!(
            site.story_url("987654", 2),
            "https://www.fanfiction.net/s/987654/2/"
        );
        assert_eq!(site.user_url("12345"), "https://www.fanfiction.net/u/12345/");
    }

    #[test]
    fn test_for_url_dispatch() {
        let site = FFNet::for_url("https://www.fanfiction.net/s/987654/1/The-Longest-Road").unwrap();
        assert_eq!(site.site(), "ffnet");

        let site = FFNet::for_url("https://www.fictionpress.com/u/44/Somebody").unwrap();
        assert_eq!(site.site(), "fictionpress");
        assert_eq!(site.user_url("44"), "https://www.fictionpress.com/u/44/");

        // Mobile hostname is kept for subsequent requests.
        let site = FFNet::for_url("https://m.fanfiction.net/s/987654/3/").unwrap();
        assert_eq!(site.story_url("987654", 3), "https://m.fanfiction.net/s/987654/3/");

        assert!(FFNet::for_url("https://example.com/s/1/1/").is_none());
        assert!(FFNet::for_url("not a url").is_none());
    }

    #[test]
    fn test_id_extraction() {
        assert_eq!(
            FFNet::story_id_from_url("https://www.fanfiction.net/s/987654/1/X").as_deref(),
            Some("987654")
        );
        assert_eq!(
            FFNet::author_id_from_url("https://www.fanfiction.net/u/12345/Some-Writer").as_deref(),
            Some("12345")
        );
        assert!(FFNet::story_id_from_url("https://www.fanfiction.net/u/12345/").is_none());
    }

    #[test]
    fn test_parse_story_page() {
        let (story, chapters) = FFNet::ffnet().parse_story_page(STORY_PAGE).unwrap();
        assert_eq!(story.title, "The Longest Road");
        assert_eq!(story.id, "987654");
        assert_eq!(story.author.name, "Some Writer");
        assert_eq!(story.author.id, "12345");
        assert_eq!(story.summary, "A story about walking.");
        assert_eq!(story.category, "Naruto");
        assert_eq!(story.genre, "Adventure/Romance");
        assert_eq!(story.characters, "Naruto U., Hinata H.");
        assert_eq!(story.chapters, 3);
        assert_eq!(story.words, 40211);
        assert_eq!(story.reviews, 12);
        assert!(!story.complete);
        assert_eq!(story.updated.timestamp(), 1585699200);
        assert_eq!(story.published.timestamp(), 1546300800);
        assert_eq!(story.story_url, "https://www.fanfiction.net/s/987654/1/");
        assert_eq!(
            chapters,
            vec!["The First Step", "The Second Step", "Homecoming"]
        );
    }

    #[test]
    fn test_parse_oneshot_page() {
        let (story, chapters) = FFNet::ffnet().parse_story_page(ONESHOT_PAGE).unwrap();
        assert_eq!(story.id, "555");
        assert_eq!(story.chapters, 1);
        assert_eq!(story.words, 1503);
        assert_eq!(story.reviews, 0);
        assert!(story.complete);
        assert!(story.genre.is_empty());
        assert!(story.characters.is_empty());
        // Published only: updated falls back to the publication date.
        assert_eq!(story.updated, story.published);
        assert_eq!(story.published.timestamp(), 1500000000);
        // No fandom link: filed as a crossover.
        assert_eq!(story.category, "crossover");
        assert_eq!(chapters, vec!["Chapter 1"]);
    }

    #[test]
    fn test_stats_span_is_not_the_byline() {
        // The "By:" span shares class xcontrast_txt with the stats span on
        // the live site; the parser must pick the span with the stats text.
        let (story, _) = FFNet::ffnet().parse_story_page(STORY_PAGE).unwrap();
        assert_eq!(story.words, 40211);
        assert_eq!(story.genre, "Adventure/Romance");
    }

    #[test]
    fn test_parse_story_page_rejects_empty() {
        let err = FFNet::ffnet().parse_story_page("<html></html>").unwrap_err();
        assert!(matches!(err, ScrapeError::MissingElement("#profile_top")));
    }

    #[test]
    fn test_parse_author_page() {
        let (authored, faved, info) = FFNet::ffnet().parse_author_page(AUTHOR_PAGE, "12345").unwrap();
        assert_eq!(info.name, "Some Writer");
        assert_eq!(info.id, "12345");
        assert_eq!(info.mirror_dirname(), "some_writer-ffnet-12345");

        assert_eq!(authored.len(), 1);
        let s = &authored[0];
        assert_eq!(s.title, "The Longest Road");
        assert_eq!(s.author.name, "Some Writer");
        assert_eq!(s.author.id, "12345");
        assert_eq!(s.source, StorySource::Authored);
        assert_eq!(s.genre, "Adventure/Romance");
        assert_eq!(s.characters, "Naruto U., Hinata H.");
        assert_eq!(s.summary, "A story about walking.");
        assert_eq!(s.words, 40211);
        assert!(!s.complete);

        assert_eq!(faved.len(), 1);
        let f = &faved[0];
        assert_eq!(f.title, "Borrowed's Time");
        assert_eq!(f.source, StorySource::Favorites);
        assert_eq!(f.author.name, "Other Author");
        assert_eq!(f.author.id, "777");
        assert!(f.genre.is_empty());
        assert!(f.characters.is_empty());
        assert!(f.complete);
        assert_eq!(f.updated.timestamp(), 1500000000);
    }

    #[test]
    fn test_list_entry_rejects_negative_counts() {
        // A negative count attribute must fail the entry, not wrap into a
        // huge unsigned value. The broken entry is skipped, not fatal.
        let page = AUTHOR_PAGE.replace("data-wordcount=\"40211\"", "data-wordcount=\"-1\"");
        let (authored, faved, _) = FFNet::ffnet().parse_author_page(&page, "12345").unwrap();
        assert!(authored.is_empty());
        assert_eq!(faved.len(), 1);
    }

    #[test]
    fn test_extract_storytext() {
        assert_eq!(
            extract_storytext(STORY_PAGE).unwrap(),
            "<p>It was a long road.</p>"
        );
        assert_eq!(extract_storytext(ONESHOT_PAGE).unwrap(), "<p>Quiet.</p>");
        assert!(extract_storytext("<html><body>nope</body></html>").is_err());
    }

    #[test]
    fn test_parse_stats_variants() {
        // Characters but no genre.
        let s = parse_stats("Rated: Fiction T - English - Naruto U. - Words: 5,000 - id: 1").unwrap();
        assert!(s.genre.is_empty());
        assert_eq!(s.characters, "Naruto U.");
        assert_eq!(s.words, 5000);
        assert_eq!(s.chapters, 1);

        // Genre but no characters.
        let s = parse_stats("Rated: Fiction K - English - Humor - Chapters: 2 - Words: 9,999 - id: 1")
            .unwrap();
        assert_eq!(s.genre, "Humor");
        assert!(s.characters.is_empty());
        assert_eq!(s.chapters, 2);

        // Neither.
        let s = parse_stats("Rated: Fiction M - English - Words: 123 - id: 1").unwrap();
        assert!(s.genre.is_empty());
        assert!(s.characters.is_empty());

        // A single unslashed token right after the language reads as a genre,
        // even when it is actually a character name.
        let s = parse_stats("Rated: Fiction K - English - OC - Words: 10 - id: 1").unwrap();
        assert_eq!(s.genre, "OC");

        assert!(parse_stats("Rated: Fiction K - English").is_err());
    }

    #[test]
    fn test_cat_to_tagset() {
        let tags = cat_to_tagset("Naruto");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["naruto"]);

        let tags = cat_to_tagset("Harry Potter & Avatar: Last Airbender");
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["avatar: last airbender", "harry potter"]
        );

        let tags = cat_to_tagset("House, M.D.");
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["house m.d."]);
    }

    #[test]
    fn test_render_document_head() {
        let story = crate::models::tests::sample_story();
        let head = render_document_head(&story);
        assert!(head.contains("<title>The Longest Road</title>"));
        assert!(head.contains("<!-- Story metadata\n"));
        assert!(head.contains("id: 987654\n"));
        assert!(head.contains("words: 40211\n"));
        assert!(head.contains("updated: 1585699200\n"));
        assert!(head.ends_with("-->\n<body>\n"));
        // Keys are emitted in sorted order so the block diffs cleanly.
        let author_pos = head.find("\nauthor:").unwrap();
        let words_pos = head.find("\nwords:").unwrap();
        assert!(author_pos < words_pos);
    }

    #[test]
    fn test_render_toc() {
        let toc = vec![
            ChapterInfo {
                title: "One".to_string(),
                url: String::new(),
            },
            ChapterInfo {
                title: "Two".to_string(),
                url: String::new(),
            },
        ];
        let rendered = render_toc(&toc);
        assert!(rendered.contains("<li><a href=\"#ch1\">One</a></li>"));
        assert!(rendered.contains("<li><a href=\"#ch2\">Two</a></li>"));
    }

    #[test]
    fn test_kindle_hr_replacement() {
        let text = "before<hr size=1 noshade>after";
        let replaced = HR_RE.replace_all(text, "<p>* * *</p>");
        assert_eq!(replaced, "before<p>* * *</p>after");
    }
}
