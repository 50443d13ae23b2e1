// Error types surfaced to callers

use thiserror::Error;

use super::diagnostics::ErrorKind;
use super::traits::EngineFailure;

/// Guidance attached when every audio rung was blocked
pub const AUDIO_LADDER_EXHAUSTED: &str = "YouTube blocked every audio download attempt.\n\
     Audio requests are blocked more often than video. What you can do:\n\
     1) Wait 15-30 minutes before trying again\n\
     2) Update yt-dlp (yt-dlp -U)\n\
     3) Download the video instead and extract the audio locally\n\
     4) Try a different network or a VPN\n\
     5) Export browser cookies and configure a cookies file";

/// Guidance attached when every video rung was blocked
pub const VIDEO_LADDER_EXHAUSTED: &str = "YouTube blocked every download attempt.\n\
     What you can do:\n\
     1) Wait 10-15 minutes before trying again\n\
     2) Update yt-dlp (yt-dlp -U)\n\
     3) Try a lower quality";

/// Guidance attached when a playlist download gets blocked
pub const BATCH_ACCESS_DENIED: &str = "YouTube blocked the playlist download.\n\
     Wait 15-30 minutes, then retry with a smaller range of items.";

/// Errors that can occur while resolving or fetching content
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("network timeout after {timeout_secs}s: {message}")]
    NetworkTimeout { timeout_secs: u64, message: String },

    #[error("video unavailable: {message}")]
    VideoUnavailable { message: String },

    /// The caller has to pick a range before downloading
    #[error("playlist has {count} items, more than the limit of {threshold}")]
    CollectionTooLarge { count: usize, threshold: usize },

    #[error("playlist private or unavailable: {message}")]
    CollectionPrivateOrUnavailable { message: String },

    #[error("playlist is empty")]
    CollectionEmpty,

    #[error("playlist error: {message}")]
    CollectionGeneric { message: String },

    #[error("invalid range {start}-{end} for a playlist of {item_count} items")]
    InvalidRange {
        start: usize,
        end: usize,
        item_count: usize,
    },

    /// HTTP 403 or another anti-automation block
    #[error("access denied: {message}")]
    AccessDenied {
        message: String,
        guidance: Option<&'static str>,
    },

    #[error("insufficient disk space: {message}")]
    InsufficientDiskSpace { message: String },

    #[error("FFmpeg not available: {message}")]
    PostProcessorMissing { message: String },

    #[error("cancelled")]
    Cancelled,

    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

impl FetchError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Build the typed error for an already classified engine failure
    pub fn from_engine(kind: ErrorKind, failure: &EngineFailure, timeout_secs: u64) -> Self {
        let message = failure.message.clone();
        match kind {
            ErrorKind::InvalidUrl => Self::InvalidUrl {
                url: String::new(),
                reason: message,
            },
            ErrorKind::NetworkTimeout => Self::NetworkTimeout {
                timeout_secs,
                message,
            },
            ErrorKind::VideoUnavailable => Self::VideoUnavailable { message },
            ErrorKind::CollectionPrivateOrUnavailable => {
                Self::CollectionPrivateOrUnavailable { message }
            }
            ErrorKind::CollectionGeneric => Self::CollectionGeneric { message },
            ErrorKind::AccessDenied => Self::AccessDenied {
                message,
                guidance: None,
            },
            ErrorKind::InsufficientDiskSpace => Self::InsufficientDiskSpace { message },
            ErrorKind::PostProcessorMissing => Self::PostProcessorMissing { message },
            ErrorKind::Cancelled => Self::Cancelled,
            // Size/range/empty kinds carry counts the engine text does not have
            ErrorKind::CollectionTooLarge
            | ErrorKind::CollectionEmpty
            | ErrorKind::InvalidRange
            | ErrorKind::Unexpected => Self::Unexpected { message },
        }
    }

    /// The field-less kind, for matching and remediation lookup
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            Self::NetworkTimeout { .. } => ErrorKind::NetworkTimeout,
            Self::VideoUnavailable { .. } => ErrorKind::VideoUnavailable,
            Self::CollectionTooLarge { .. } => ErrorKind::CollectionTooLarge,
            Self::CollectionPrivateOrUnavailable { .. } => {
                ErrorKind::CollectionPrivateOrUnavailable
            }
            Self::CollectionEmpty => ErrorKind::CollectionEmpty,
            Self::CollectionGeneric { .. } => ErrorKind::CollectionGeneric,
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::InsufficientDiskSpace { .. } => ErrorKind::InsufficientDiskSpace,
            Self::PostProcessorMissing { .. } => ErrorKind::PostProcessorMissing,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Attach guidance to an access denial; other kinds pass through
    pub fn with_guidance(self, text: &'static str) -> Self {
        match self {
            Self::AccessDenied { message, .. } => Self::AccessDenied {
                message,
                guidance: Some(text),
            },
            other => other,
        }
    }

    /// Prefix the raw message, keeping the kind. Used to wrap hybrid sub-resolutions.
    pub fn context(self, prefix: &str) -> Self {
        let wrap = |message: String| format!("{}: {}", prefix, message);
        match self {
            Self::InvalidUrl { url, reason } => Self::InvalidUrl {
                url,
                reason: wrap(reason),
            },
            Self::NetworkTimeout {
                timeout_secs,
                message,
            } => Self::NetworkTimeout {
                timeout_secs,
                message: wrap(message),
            },
            Self::VideoUnavailable { message } => Self::VideoUnavailable {
                message: wrap(message),
            },
            Self::CollectionPrivateOrUnavailable { message } => {
                Self::CollectionPrivateOrUnavailable {
                    message: wrap(message),
                }
            }
            Self::CollectionGeneric { message } => Self::CollectionGeneric {
                message: wrap(message),
            },
            Self::AccessDenied { message, guidance } => Self::AccessDenied {
                message: wrap(message),
                guidance,
            },
            Self::InsufficientDiskSpace { message } => Self::InsufficientDiskSpace {
                message: wrap(message),
            },
            Self::PostProcessorMissing { message } => Self::PostProcessorMissing {
                message: wrap(message),
            },
            Self::Unexpected { message } => Self::Unexpected {
                message: wrap(message),
            },
            other @ (Self::CollectionTooLarge { .. }
            | Self::CollectionEmpty
            | Self::InvalidRange { .. }
            | Self::Cancelled) => other,
        }
    }

    /// Remediation text: explicit guidance when present, otherwise the kind's default
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::AccessDenied {
                guidance: Some(text),
                ..
            } => *text,
            other => other.kind().remediation(),
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        if e.raw_os_error() == Some(28) {
            return Self::InsufficientDiskSpace {
                message: e.to_string(),
            };
        }
        Self::Unexpected {
            message: e.to_string(),
        }
    }
}
