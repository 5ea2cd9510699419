//! yt-dlp search catalog source
//!
//! Runs `yt-dlp --flat-playlist --dump-json "ytsearch20:<query>"` for each
//! configured query and keeps the first occurrence of every title.

use super::{CatalogEntry, CatalogSource};
use crate::error::Result;
use crate::resolver::YtDlpEntry;
use async_trait::async_trait;
use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const RESULTS_PER_QUERY: usize = 20;

pub struct YtDlpSearchCatalog {
    program: String,
    queries: Vec<String>,
    max_songs: usize,
    timeout: Duration,
}

impl YtDlpSearchCatalog {
    pub fn new(
        program: impl Into<String>,
        queries: Vec<String>,
        max_songs: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            queries,
            max_songs,
            timeout,
        }
    }

    async fn search(&self, query: &str) -> Option<Vec<YtDlpEntry>> {
        let mut command = Command::new(&self.program);
        command
            .arg("--flat-playlist")
            .arg("--dump-json")
            .arg(format!("ytsearch{}:{}", RESULTS_PER_QUERY, query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Some(YtDlpEntry::parse_lines(&String::from_utf8_lossy(
                &output.stdout,
            ))),
            Ok(Err(e)) => {
                warn!(query, "Search failed: {}", e);
                None
            }
            Err(_) => {
                warn!(query, "Search timed out");
                None
            }
        }
    }
}

/// Merge search results into ranked entries, first title wins
pub(crate) fn merge_results<I>(batches: I, max_songs: usize) -> Vec<CatalogEntry>
where
    I: IntoIterator<Item = Vec<YtDlpEntry>>,
{
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for batch in batches {
        for item in batch {
            let Some(title) = item.title.clone().filter(|t| !t.is_empty()) else {
                continue;
            };
            if !seen.insert(title.clone()) {
                continue;
            }
            entries.push(CatalogEntry {
                artist: item.artist().unwrap_or("Unknown").to_string(),
                title,
                genre: Some("pop".to_string()),
                rank: (entries.len() + 1) as u32,
                source: Some(item.to_source()),
            });
        }
    }

    entries.truncate(max_songs);
    entries
}

#[async_trait]
impl CatalogSource for YtDlpSearchCatalog {
    fn name(&self) -> &str {
        "youtube_search"
    }

    async fn fetch_candidates(&self) -> Result<Vec<CatalogEntry>> {
        let mut batches = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            if let Some(batch) = self.search(query).await {
                debug!(query, results = batch.len(), "Search finished");
                batches.push(batch);
            }
        }
        Ok(merge_results(batches, self.max_songs))
    }
}
