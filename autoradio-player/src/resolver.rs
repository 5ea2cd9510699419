//! Source resolver
//!
//! Turns a free-text "title artist" query into a concrete playable source.
//! The production implementation shells out to `yt-dlp` and parses its
//! `--dump-json` output; tests substitute a table-driven resolver.

use crate::error::{Error, Result};
use crate::track::{ResolvedSource, WATCH_URL_PREFIX};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Resolves text queries to playable sources
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Look up a playable source.
    ///
    /// `Ok(None)` means the lookup ran but found nothing. Errors are lookup
    /// failures (missing program, timeout). Callers treat both as a
    /// resolution failure.
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedSource>>;
}

/// One entry of `yt-dlp --dump-json` output (one JSON object per line)
#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<YtDlpThumbnail>,
    /// Seconds; yt-dlp reports fractional values for some extractors
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YtDlpThumbnail {
    pub url: String,
}

impl YtDlpEntry {
    /// Parse newline-delimited JSON, skipping malformed lines
    pub fn parse_lines(output: &str) -> Vec<YtDlpEntry> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping malformed yt-dlp line: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Uploader, falling back to channel
    pub fn artist(&self) -> Option<&str> {
        self.uploader
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.channel.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn to_source(&self) -> ResolvedSource {
        let thumbnail_url = self
            .thumbnail
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| self.thumbnails.first().map(|t| t.url.clone()));

        ResolvedSource {
            url: self
                .webpage_url
                .clone()
                .unwrap_or_else(|| format!("{}{}", WATCH_URL_PREFIX, self.id)),
            source_id: self.id.clone(),
            thumbnail_url,
            duration_secs: self.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            title: self.title.clone(),
            uploader: self.artist().map(str::to_string),
        }
    }
}

/// Resolver backed by `yt-dlp` search
pub struct YtDlpResolver {
    program: String,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn search_term(query: &str) -> String {
        format!("ytsearch1:{} official audio", query.trim())
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Option<ResolvedSource>> {
        let mut command = Command::new(&self.program);
        command
            .arg("--dump-json")
            .arg("--no-playlist")
            .arg(Self::search_term(query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Error::Resolution(format!(
                    "failed to run {}: {}",
                    self.program, e
                )))
            }
            Err(_) => {
                warn!(query, "Source lookup timed out after {:?}", self.timeout);
                return Err(Error::Resolution(format!("lookup timed out for '{}'", query)));
            }
        };

        if !output.status.success() {
            warn!(query, status = %output.status, "Source lookup failed");
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let source = YtDlpEntry::parse_lines(&stdout)
            .into_iter()
            .next()
            .map(|entry| entry.to_source());

        debug!(query, found = source.is_some(), "Source lookup finished");
        Ok(source)
    }
}
