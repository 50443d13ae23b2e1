// URL classification - single video, playlist, or video opened from a playlist
//
// Pure string work against the static allowlists in config.rs. Nothing here
// touches the network; the engine confirms the real shape later.

use serde::{Deserialize, Serialize};
use url::Url;

use super::config::{ACCEPTED_DOMAINS, COLLECTION_INDICATORS, MAX_URL_LENGTH, VIDEO_MARKERS};
use super::errors::FetchError;

/// Shape of the content a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Video,
    Collection,
    /// `watch?v=...&list=...`: one video plus the playlist it was opened from
    VideoInCollection,
}

/// A validated URL and its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    pub url: String,
    pub kind: ContentKind,
}

impl ContentReference {
    pub fn is_collection(&self) -> bool {
        matches!(
            self.kind,
            ContentKind::Collection | ContentKind::VideoInCollection
        )
    }

    /// URL to hand the engine for a single-item fetch
    pub fn single_item_url(&self) -> String {
        match self.kind {
            ContentKind::VideoInCollection => extract_canonical_video_url(&self.url),
            ContentKind::Video | ContentKind::Collection => self.url.clone(),
        }
    }
}

/// Parse leniently: a missing scheme means https
fn parse_lenient(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", raw)).ok()
        }
        Err(_) => None,
    }
}

fn is_accepted_host(url: &Url) -> bool {
    url.host_str()
        .map(|host| {
            let host = host.to_ascii_lowercase();
            ACCEPTED_DOMAINS.iter().any(|d| *d == host)
        })
        .unwrap_or(false)
}

/// Validate and classify a URL
pub fn classify(url: &str) -> Result<ContentReference, FetchError> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        return Err(FetchError::invalid_url(url, "empty URL"));
    }
    if trimmed.len() > MAX_URL_LENGTH {
        return Err(FetchError::invalid_url(
            format!("{}...", trimmed.chars().take(64).collect::<String>()),
            format!("longer than {} characters", MAX_URL_LENGTH),
        ));
    }

    let parsed = parse_lenient(trimmed)
        .ok_or_else(|| FetchError::invalid_url(trimmed, "not a valid URL"))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(FetchError::invalid_url(trimmed, "unsupported scheme"));
    }
    if !is_accepted_host(&parsed) {
        return Err(FetchError::invalid_url(trimmed, "not a YouTube domain"));
    }

    let lower = trimmed.to_lowercase();
    let in_collection = COLLECTION_INDICATORS.iter().any(|i| lower.contains(i));
    let names_video = VIDEO_MARKERS.iter().any(|m| lower.contains(m));

    let kind = match (in_collection, names_video) {
        (true, true) => ContentKind::VideoInCollection,
        (true, false) => ContentKind::Collection,
        (false, _) => ContentKind::Video,
    };

    Ok(ContentReference {
        url: trimmed.to_string(),
        kind,
    })
}

fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reduce a hybrid URL to `https://www.youtube.com/watch?v=<id>`.
/// Returns the input unchanged when no video id can be found.
pub fn extract_canonical_video_url(url: &str) -> String {
    let Some(parsed) = parse_lenient(url.trim()) else {
        return url.to_string();
    };

    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    let id = if host == "youtu.be" {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string)
    } else {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
    };

    match id {
        Some(id) if is_valid_video_id(&id) => format!("https://www.youtube.com/watch?v={}", id),
        _ => {
            tracing::debug!(url = %url, "no video id found, keeping URL as is");
            url.to_string()
        }
    }
}
