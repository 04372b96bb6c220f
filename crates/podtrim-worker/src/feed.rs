//! RSS feed downloader.
//!
//! Fetches a podcast feed, picks the newest episodes and stores them as
//! `<library>/<show>/<YYYY-MM-DD> - <title>.mp3`. Existing files are left
//! alone; failed downloads leave nothing behind.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::DateTime;
use futures_util::StreamExt;
use metrics::counter;
use podtrim_media::{fs_utils, MediaError};
use podtrim_models::artifact::partial_path;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::env_parse;

pub type FeedResult<T> = Result<T, FeedError>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Not an RSS feed: {0}")]
    InvalidFeed(String),

    #[error("Download stalled: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub const UNTITLED_PODCAST: &str = "Untitled Podcast";
pub const UNTITLED_EPISODE: &str = "Untitled Episode";
pub const NO_DATE: &str = "NODATE";

static INVALID_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).unwrap());
static CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<channel\b[^>]*>(.*)</channel>").unwrap());
static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").unwrap());
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").unwrap());
static PUB_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pubDate\b[^>]*>(.*?)</pubDate>").unwrap());
static ENCLOSURE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<enclosure\b[^>]*?\burl\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|lt|gt|quot|apos|amp);").unwrap());

/// Strip characters most filesystems reject.
pub fn sanitize_filename(name: &str) -> String {
    INVALID_FILENAME_CHARS
        .replace_all(name, "")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Sanitized single path component, or `fallback` when nothing usable is left.
///
/// Empty and all-dot names (`.`, `..`) would resolve outside the show or
/// library directory.
fn path_component(name: &str, fallback: &str) -> String {
    let name = sanitize_filename(name);
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One downloadable episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEpisode {
    pub title: String,
    /// `YYYY-MM-DD`, or `NODATE` when missing or unparseable
    pub date_prefix: String,
    pub audio_url: String,
}

impl FeedEpisode {
    pub fn file_name(&self) -> String {
        format!(
            "{} - {}.mp3",
            self.date_prefix,
            path_component(&self.title, UNTITLED_EPISODE)
        )
    }
}

/// A parsed feed, items newest first as published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub title: String,
    pub episodes: Vec<FeedEpisode>,
    /// Items without an enclosure URL
    pub skipped_items: usize,
}

impl Feed {
    /// Directory name for this show.
    pub fn dir_name(&self) -> String {
        path_component(&self.title, UNTITLED_PODCAST)
    }
}

/// Parse RSS 2.0 XML.
pub fn parse_feed(xml: &str) -> FeedResult<Feed> {
    let channel = CHANNEL
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| FeedError::InvalidFeed("no <channel> element".to_string()))?;

    // The channel title precedes the first item
    let header = match channel.find("<item") {
        Some(idx) => &channel[..idx],
        None => channel,
    };
    let title = first_text(&TITLE, header).unwrap_or_else(|| UNTITLED_PODCAST.to_string());

    let mut episodes = Vec::new();
    let mut skipped_items = 0;
    for item in ITEM.captures_iter(channel) {
        let body = item.get(1).map(|m| m.as_str()).unwrap_or_default();
        let Some(audio_url) = ENCLOSURE_URL
            .captures(body)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|u| !u.is_empty())
        else {
            skipped_items += 1;
            continue;
        };

        let date_prefix = first_text(&PUB_DATE, body)
            .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NO_DATE.to_string());

        episodes.push(FeedEpisode {
            title: first_text(&TITLE, body).unwrap_or_else(|| UNTITLED_EPISODE.to_string()),
            date_prefix,
            audio_url,
        });
    }

    Ok(Feed {
        title,
        episodes,
        skipped_items,
    })
}

fn first_text(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| element_text(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn element_text(raw: &str) -> String {
    let text = CDATA.replace_all(raw, "$1");
    decode_entities(text.trim())
}

// Single pass, so decoded text is never decoded again
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| match &caps[1] {
            "lt" => "<".to_string(),
            "gt" => ">".to_string(),
            "quot" => "\"".to_string(),
            "apos" => "'".to_string(),
            "amp" => "&".to_string(),
            code => {
                let code = &code[1..];
                let value = match code.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => code.parse().ok(),
                };
                value
                    .and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_default()
            }
        })
        .into_owned()
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Timeout for fetching the feed document
    pub fetch_timeout_secs: u64,
    /// Longest wait for the next chunk of an episode download
    pub read_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 15,
            read_timeout_secs: 30,
            user_agent: concat!("podtrim/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fetch_timeout_secs: env_parse("PODTRIM_FEED_TIMEOUT_SECS").unwrap_or(defaults.fetch_timeout_secs),
            read_timeout_secs: env_parse("PODTRIM_DOWNLOAD_TIMEOUT_SECS").unwrap_or(defaults.read_timeout_secs),
            user_agent: defaults.user_agent,
        }
    }
}

/// Outcome of one feed download.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    pub show_dir: PathBuf,
    pub downloaded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    /// `(episode title, error)`
    pub failed: Vec<(String, String)>,
}

pub struct FeedDownloader {
    client: Client,
    config: FeedConfig,
    library_dir: PathBuf,
}

impl FeedDownloader {
    pub fn new(library_dir: impl Into<PathBuf>, config: FeedConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            library_dir: library_dir.into(),
        })
    }

    /// Fetch and parse the feed at `url`.
    pub async fn fetch(&self, url: &str) -> FeedResult<Feed> {
        let parsed = url::Url::parse(url).map_err(|e| FeedError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FeedError::InvalidUrl(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let response = self
            .client
            .get(parsed)
            .timeout(Duration::from_secs(self.config.fetch_timeout_secs))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await?;
        parse_feed(&body)
    }

    /// Download the newest `num_episodes` episodes (all when `None` or zero).
    pub async fn download(&self, url: &str, num_episodes: Option<usize>) -> FeedResult<DownloadReport> {
        let feed = self.fetch(url).await?;
        let show_dir = self.library_dir.join(feed.dir_name());
        tokio::fs::create_dir_all(&show_dir).await?;

        let take = match num_episodes {
            Some(n) if n > 0 => n,
            _ => feed.episodes.len(),
        };
        info!(
            show = %feed.title,
            available = feed.episodes.len(),
            selected = take.min(feed.episodes.len()),
            without_audio = feed.skipped_items,
            "Downloading feed episodes"
        );

        let mut report = DownloadReport {
            show_dir: show_dir.clone(),
            ..Default::default()
        };
        for episode in feed.episodes.iter().take(take) {
            let dest = show_dir.join(episode.file_name());
            if fs_utils::file_exists(&dest).await {
                info!(file = %dest.display(), "Episode already downloaded, skipping");
                report.skipped.push(dest);
                continue;
            }
            match self.download_episode(&episode.audio_url, &dest).await {
                Ok(bytes) => {
                    counter!("podtrim_episodes_downloaded_total").increment(1);
                    info!(file = %dest.display(), bytes, "Episode downloaded");
                    report.downloaded.push(dest);
                }
                Err(e) => {
                    counter!("podtrim_episode_download_failures_total").increment(1);
                    warn!(title = %episode.title, error = %e, "Episode download failed");
                    report.failed.push((episode.title.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Stream `url` into `dest` via a partial file.
    async fn download_episode(&self, url: &str, dest: &Path) -> FeedResult<u64> {
        let partial = partial_path(dest);
        let result = self.stream_to(url, &partial).await;
        match result {
            Ok(bytes) => {
                fs_utils::rename_into_place(&partial, dest).await?;
                Ok(bytes)
            }
            Err(e) => {
                fs_utils::remove_quietly(&partial).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, path: &Path) -> FeedResult<u64> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let read_timeout = Duration::from_secs(self.config.read_timeout_secs);
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        loop {
            let next = tokio::time::timeout(read_timeout, stream.next())
                .await
                .map_err(|_| FeedError::Timeout(url.to_string()))?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}
