// Metadata resolver - descriptive info without downloading
//
// Every entry point classifies the URL first, so a foreign or oversized URL
// never reaches the engine.

use std::sync::Arc;

use serde_json::Value;

use super::config::{FetchConfig, SleepBounds};
use super::diagnostics::{classify_failure, FailureContext};
use super::errors::FetchError;
use super::format_selector::FormatSelector;
use super::models::{CollectionEntry, CollectionInfo, ContentInfo, HybridInfo, VideoInfo};
use super::profiles::collection_profile;
use super::traits::{EngineOptions, ExtractionEngine};
use super::url::{classify, extract_canonical_video_url, ContentKind, ContentReference};

/// Minutes spent pausing between `count` items, using the midpoint of `bounds`
pub fn estimate_minutes(count: usize, bounds: SleepBounds) -> f64 {
    count as f64 * bounds.midpoint() / 60.0
}

pub struct MetadataResolver {
    engine: Arc<dyn ExtractionEngine>,
    config: FetchConfig,
}

impl MetadataResolver {
    pub fn new(engine: Arc<dyn ExtractionEngine>, config: FetchConfig) -> Self {
        Self { engine, config }
    }

    fn options(&self, no_playlist: bool) -> EngineOptions {
        EngineOptions {
            no_playlist,
            proxy: self.config.proxy.clone(),
            cookies_path: self.config.cookies_path.clone(),
            ..EngineOptions::metadata(self.config.socket_timeout())
        }
    }

    async fn fetch_info(
        &self,
        url: &str,
        no_playlist: bool,
        context: FailureContext,
    ) -> Result<Value, FetchError> {
        self.engine
            .extract_info(url, &self.options(no_playlist))
            .await
            .map_err(|failure| {
                let kind = classify_failure(&failure.message, context);
                tracing::debug!(url = %url, kind = ?kind, error = %failure, "metadata request failed");
                FetchError::from_engine(kind, &failure, self.config.socket_timeout_secs)
            })
    }

    /// Title, uploader, duration and formats of one video
    pub async fn describe_video(&self, url: &str) -> Result<VideoInfo, FetchError> {
        let reference = classify(url)?;
        let target = reference.single_item_url();
        let json = self
            .fetch_info(&target, true, FailureContext::Metadata)
            .await?;
        Ok(parse_video_info(&json, &target))
    }

    /// Playlist summary; refuses empty and oversized playlists
    pub async fn describe_collection(&self, url: &str) -> Result<CollectionInfo, FetchError> {
        let reference = classify(url)?;
        self.resolve_collection(&reference, true).await
    }

    /// Playlist summary for an already classified reference.
    /// `enforce_limit` off skips the size threshold, not the empty check.
    pub async fn resolve_collection(
        &self,
        reference: &ContentReference,
        enforce_limit: bool,
    ) -> Result<CollectionInfo, FetchError> {
        let json = self
            .fetch_info(&reference.url, false, FailureContext::Collection)
            .await?;
        let info = parse_collection_info(&json, self.config.preview_count);
        self.check_collection(info, enforce_limit)
    }

    fn check_collection(
        &self,
        info: CollectionInfo,
        enforce_limit: bool,
    ) -> Result<CollectionInfo, FetchError> {
        if info.item_count == 0 {
            return Err(FetchError::CollectionEmpty);
        }
        let threshold = self.config.collection_size_threshold;
        if enforce_limit && info.item_count > threshold {
            tracing::info!(count = info.item_count, threshold, "playlist over size limit");
            return Err(FetchError::CollectionTooLarge {
                count: info.item_count,
                threshold,
            });
        }
        Ok(info)
    }

    /// Auto-detect from the engine's own type tag
    pub async fn describe_content(&self, url: &str) -> Result<ContentInfo, FetchError> {
        let reference = classify(url)?;
        let context = match reference.kind {
            ContentKind::Video => FailureContext::Metadata,
            ContentKind::Collection | ContentKind::VideoInCollection => FailureContext::Collection,
        };
        let hybrid = reference.kind == ContentKind::VideoInCollection;
        let json = self
            .fetch_info(&reference.url, false, context)
            .await
            .map_err(|e| if hybrid { e.context("playlist") } else { e })?;

        if json["_type"].as_str() != Some("playlist") {
            return Ok(ContentInfo::Video(parse_video_info(&json, &reference.url)));
        }

        let collection = self
            .check_collection(parse_collection_info(&json, self.config.preview_count), true)
            .map_err(|e| e.context("playlist"))?;

        if !hybrid {
            return Ok(ContentInfo::Collection(collection));
        }

        let canonical = extract_canonical_video_url(&reference.url);
        let video = self
            .describe_video(&canonical)
            .await
            .map_err(|e| e.context("video"))?;

        Ok(ContentInfo::Hybrid(HybridInfo { video, collection }))
    }
}

fn parse_video_info(json: &Value, requested_url: &str) -> VideoInfo {
    VideoInfo {
        id: json["id"].as_str().unwrap_or("").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"]
            .as_str()
            .or_else(|| json["channel"].as_str())
            .unwrap_or("Unknown")
            .to_string(),
        duration_seconds: json["duration"].as_f64().map(|d| d.max(0.0) as u64),
        formats: FormatSelector::video_formats(json),
        webpage_url: json["webpage_url"]
            .as_str()
            .unwrap_or(requested_url)
            .to_string(),
    }
}

fn parse_collection_info(json: &Value, preview_count: usize) -> CollectionInfo {
    let entries = json["entries"].as_array();
    let item_count = json["playlist_count"]
        .as_u64()
        .map(|n| n as usize)
        .or_else(|| entries.map(Vec::len))
        .unwrap_or(0);

    let preview_entries = entries
        .map(|entries| {
            entries
                .iter()
                .take(preview_count)
                .enumerate()
                .map(|(i, e)| CollectionEntry {
                    index: i + 1,
                    id: e["id"].as_str().unwrap_or("").to_string(),
                    title: e["title"].as_str().unwrap_or("Unknown").to_string(),
                    duration_seconds: e["duration"].as_f64().map(|d| d.max(0.0) as u64),
                })
                .collect()
        })
        .unwrap_or_default();

    let pacing = collection_profile(false)
        .sleep
        .unwrap_or(SleepBounds::new(0, 0));

    CollectionInfo {
        id: json["id"].as_str().unwrap_or("").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        uploader: json["uploader"]
            .as_str()
            .or_else(|| json["channel"].as_str())
            .unwrap_or("Unknown")
            .to_string(),
        item_count,
        preview_entries,
        estimated_minutes: estimate_minutes(item_count, pacing),
    }
}
