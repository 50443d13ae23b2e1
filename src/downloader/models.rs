// Common data models for the fetch pipeline

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::config::DEFAULT_SOCKET_TIMEOUT_SECS;
use super::diagnostics::ErrorKind;
use super::errors::FetchError;
use super::traits::CancellationFlag;

/// Quality preference for a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Best,
    Worst,
    /// Best stream no taller than this many pixels
    HeightCeiling(u32),
}

impl Default for Quality {
    fn default() -> Self {
        Self::Best
    }
}

impl FromStr for Quality {
    type Err = String;

    /// Accepts "best", "worst", "720", "720p" and format labels like "720p - mp4"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "best" => return Ok(Self::Best),
            "worst" => return Ok(Self::Worst),
            _ => {}
        }

        let head = normalized.split(" - ").next().unwrap_or("").trim();
        let digits = head.strip_suffix('p').unwrap_or(head);
        match digits.parse::<u32>() {
            Ok(h) if h > 0 => Ok(Self::HeightCeiling(h)),
            _ => Err(format!("unrecognized quality: {}", s)),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => write!(f, "best"),
            Self::Worst => write!(f, "worst"),
            Self::HeightCeiling(h) => write!(f, "{}p", h),
        }
    }
}

/// 1-based inclusive collection index range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub end: usize,
}

impl IndexRange {
    /// Both bounds positive and `start <= end`
    pub fn new(start: usize, end: usize) -> Result<Self, FetchError> {
        if start == 0 || end == 0 || start > end {
            return Err(FetchError::InvalidRange {
                start,
                end,
                item_count: 0,
            });
        }
        Ok(Self { start, end })
    }

    /// Number of items covered
    pub fn span(&self) -> usize {
        self.end - self.start + 1
    }
}

/// What the caller wants fetched and where
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub quality: Quality,
    pub audio_only: bool,
    pub output_dir: PathBuf,
    /// Socket timeout per engine call
    pub timeout_secs: u64,
    pub range: Option<IndexRange>,
    pub cancel: CancellationFlag,
}

impl Default for DownloadRequest {
    fn default() -> Self {
        Self {
            quality: Quality::Best,
            audio_only: false,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads")),
            timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            range: None,
            cancel: CancellationFlag::new(),
        }
    }
}

impl DownloadRequest {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_audio_only(mut self, audio_only: bool) -> Self {
        self.audio_only = audio_only;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn with_range(mut self, range: IndexRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }
}

/// One downloadable (height, container) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatEntry {
    pub height: u32,
    pub ext: String,
}

impl FormatEntry {
    /// "720p - mp4"; parses back through `Quality::from_str`
    pub fn label(&self) -> String {
        format!("{}p - {}", self.height, self.ext)
    }
}

/// Video information extracted from YouTube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_seconds: Option<u64>,
    pub formats: Vec<FormatEntry>,
    pub webpage_url: String,
}

/// One entry of a flat playlist listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// 1-based position in the playlist
    pub index: usize,
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<u64>,
}

/// Playlist information extracted from YouTube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub item_count: usize,
    pub preview_entries: Vec<CollectionEntry>,
    /// Time spent pausing between items alone
    pub estimated_minutes: f64,
}

impl CollectionInfo {
    /// Stand-in used when resolution fails; the engine still gets the URL
    pub fn placeholder() -> Self {
        Self {
            id: String::new(),
            title: "Unknown".to_string(),
            uploader: String::new(),
            item_count: 1,
            preview_entries: Vec::new(),
            estimated_minutes: 0.0,
        }
    }
}

/// Both halves of a `watch?v=...&list=...` URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridInfo {
    pub video: VideoInfo,
    pub collection: CollectionInfo,
}

/// Result of content auto-detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentInfo {
    Video(VideoInfo),
    Collection(CollectionInfo),
    Hybrid(HybridInfo),
}

/// How a single ladder rung ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Success,
    /// Access denied; the next rung gets a go
    RetryableFailure(ErrorKind),
    /// Anything else; the ladder stops here
    FatalFailure(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub rung: &'static str,
    pub outcome: AttemptOutcome,
}

/// Result of a single-item fetch
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub success: bool,
    pub url: String,
    /// Final file as reported by the engine, when it reported one
    pub path: Option<PathBuf>,
    pub attempts: Vec<AttemptRecord>,
    pub audio_only: bool,
}

/// Result of a playlist download
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub success: bool,
    pub title: String,
    pub total_videos: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
    pub errors: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

/// Normalized progress event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    Downloading {
        bytes_done: u64,
        bytes_total: Option<u64>,
        /// Bytes per second
        speed: Option<f64>,
        /// Seconds remaining
        eta: Option<u64>,
    },
    PostProcessing {
        stage: String,
    },
    Finished {
        path: PathBuf,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    /// Percentage done, when the total is known
    pub fn percent(&self) -> Option<f32> {
        match self {
            Self::Downloading {
                bytes_done,
                bytes_total: Some(total),
                ..
            } if *total > 0 => Some((*bytes_done as f64 / *total as f64 * 100.0) as f32),
            _ => None,
        }
    }
}

/// Batch snapshot attached to events emitted during a playlist download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchContext {
    pub collection_title: String,
    /// 1-based index of the item the event belongs to
    pub item_index: Option<usize>,
    pub total_items: usize,
    pub downloaded: usize,
    pub failed: usize,
}

/// What the caller's progress callback receives
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub event: ProgressEvent,
    pub batch: Option<BatchContext>,
}
