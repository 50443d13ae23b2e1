// Failure diagnostics - maps raw yt-dlp error text onto the closed ErrorKind set
//
// yt-dlp only hands back a human-readable message, so classification is plain
// case-insensitive substring matching. Rules are checked in a fixed precedence
// order and the first match wins: a 403 that also mentions a timeout is still a
// block, not a network problem.

use serde::{Deserialize, Serialize};

/// Every failure a caller can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidUrl,
    NetworkTimeout,
    VideoUnavailable,
    CollectionTooLarge,
    CollectionPrivateOrUnavailable,
    CollectionEmpty,
    CollectionGeneric,
    InvalidRange,
    /// HTTP 403 or equivalent anti-automation block
    AccessDenied,
    InsufficientDiskSpace,
    PostProcessorMissing,
    Cancelled,
    Unexpected,
}

impl ErrorKind {
    /// Only a block is worth routing around with another identity or format
    pub fn is_escalatable(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }

    /// Validation failures never reach the engine
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidUrl | Self::InvalidRange)
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "Invalid YouTube URL",
            Self::NetworkTimeout => "Network timeout",
            Self::VideoUnavailable => "Video unavailable",
            Self::CollectionTooLarge => "Playlist too large",
            Self::CollectionPrivateOrUnavailable => "Playlist private or unavailable",
            Self::CollectionEmpty => "Playlist empty",
            Self::CollectionGeneric => "Playlist error",
            Self::InvalidRange => "Invalid playlist range",
            Self::AccessDenied => "Access denied (HTTP 403)",
            Self::InsufficientDiskSpace => "Insufficient disk space",
            Self::PostProcessorMissing => "FFmpeg not available",
            Self::Cancelled => "Cancelled",
            Self::Unexpected => "Unexpected error",
        }
    }

    /// Short remediation hint for the presentation layer
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::InvalidUrl => {
                "Use a youtube.com, youtu.be, m.youtube.com or music.youtube.com link."
            }
            Self::NetworkTimeout => "Check your internet connection and try again.",
            Self::VideoUnavailable => {
                "The video may be private, deleted, age-restricted or blocked in your region."
            }
            Self::CollectionTooLarge => {
                "Select a smaller range of items (for example 1-50) and download in batches."
            }
            Self::CollectionPrivateOrUnavailable => {
                "Make sure the playlist is public and the link is correct."
            }
            Self::CollectionEmpty => "The playlist has no downloadable items.",
            Self::CollectionGeneric => "Check the playlist link and try again.",
            Self::InvalidRange => "Pick a start index not greater than the end index.",
            Self::AccessDenied => {
                "Wait 10-15 minutes, update yt-dlp, or try a different quality."
            }
            Self::InsufficientDiskSpace => "Free up disk space or choose another folder.",
            Self::PostProcessorMissing => "Install FFmpeg to enable audio conversion.",
            Self::Cancelled => "The download was cancelled.",
            Self::Unexpected => "Try again; update yt-dlp if the problem persists.",
        }
    }
}

/// Where the failure happened; decides between video and playlist kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureContext {
    SingleItem,
    Collection,
    Metadata,
}

const ACCESS_DENIED_PATTERNS: &[&str] = &["403", "forbidden"];

const UNAVAILABLE_PATTERNS: &[&str] = &[
    "unavailable",
    "private",
    "not available",
    "has been removed",
    "does not exist",
];

const TIMEOUT_PATTERNS: &[&str] = &["timed out", "timeout"];

const DISK_SPACE_PATTERNS: &[&str] = &[
    "no space left",
    "disk full",
    "not enough space",
    "insufficient disk space",
    "errno 28",
];

const POST_PROCESSOR_PATTERNS: &[&str] = &[
    "ffmpeg",
    "ffprobe",
    "postprocessing",
    "post-processing",
];

fn matches_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Classify a raw engine failure message
pub fn classify_failure(raw: &str, context: FailureContext) -> ErrorKind {
    let lower = raw.to_lowercase();

    if matches_any(&lower, ACCESS_DENIED_PATTERNS) {
        return ErrorKind::AccessDenied;
    }

    if matches_any(&lower, UNAVAILABLE_PATTERNS) {
        return match context {
            FailureContext::Collection => ErrorKind::CollectionPrivateOrUnavailable,
            FailureContext::SingleItem | FailureContext::Metadata => ErrorKind::VideoUnavailable,
        };
    }

    if matches_any(&lower, TIMEOUT_PATTERNS) {
        return ErrorKind::NetworkTimeout;
    }

    if matches_any(&lower, DISK_SPACE_PATTERNS) {
        return ErrorKind::InsufficientDiskSpace;
    }

    if matches_any(&lower, POST_PROCESSOR_PATTERNS) {
        return ErrorKind::PostProcessorMissing;
    }

    match context {
        FailureContext::Collection => ErrorKind::CollectionGeneric,
        FailureContext::SingleItem | FailureContext::Metadata => ErrorKind::Unexpected,
    }
}

/// True when yt-dlp reports that a playlist URL resolved to a single video
pub fn is_not_a_collection(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    lower.contains("not a playlist") || lower.contains("single video")
}

/// First line worth showing from a multi-line stderr dump
pub fn primary_error_line(raw: &str) -> &str {
    raw.lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| raw.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("")
}
