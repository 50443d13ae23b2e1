// Configuration registry - static timing, identity and format tables
//
// Everything here is data: the ladder in profiles.rs, the classifier in url.rs and
// the resolver in metadata.rs all read from these tables. FetchConfig is the only
// runtime-adjustable piece.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Socket timeout handed to every engine invocation
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 30;

/// Collections above this size need an explicit range
pub const COLLECTION_SIZE_THRESHOLD: usize = 200;

/// Number of entries kept in `CollectionInfo::preview_entries`
pub const COLLECTION_PREVIEW_COUNT: usize = 5;

pub const MAX_URL_LENGTH: usize = 2048;

/// Retry counts per rung family
pub const DEFAULT_RETRIES: u32 = 5;
pub const PRIMARY_RETRIES: u32 = 3;
pub const FRAGMENT_RETRIES: u32 = 5;
pub const EXTRACTOR_RETRIES: u32 = 3;
pub const CONSERVATIVE_RETRIES: u32 = 2;
pub const MINIMAL_RETRIES: u32 = 1;

/// Download speed limits (bytes per second)
pub const DEFAULT_RATE_LIMIT: u64 = 150_000;
pub const CONSERVATIVE_RATE_LIMIT: u64 = 75_000;

/// Delay between HTTP requests during extraction (seconds)
pub const DEFAULT_REQUEST_DELAY: u32 = 3;
pub const AUDIO_REQUEST_DELAY: u32 = 8;

/// Audio extraction bitrates (kbps)
pub const DEFAULT_AUDIO_QUALITY: u32 = 192;
pub const CONSERVATIVE_AUDIO_QUALITY: u32 = 128;
pub const MINIMAL_AUDIO_QUALITY: u32 = 64;

/// Codec used when extracting audio
pub const AUDIO_CODEC: &str = "mp3";

/// Inclusive bounds (seconds) of the randomized pause the engine takes between
/// downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepBounds {
    pub min_secs: u32,
    pub max_secs: u32,
}

impl SleepBounds {
    pub const fn new(min_secs: u32, max_secs: u32) -> Self {
        Self { min_secs, max_secs }
    }

    /// Average pause, used for time estimates
    pub fn midpoint(&self) -> f64 {
        (f64::from(self.min_secs) + f64::from(self.max_secs)) / 2.0
    }
}

/// Pacing profiles
pub mod pacing {
    use super::SleepBounds;

    /// One-off single video, first try
    pub const PRIMARY: SleepBounds = SleepBounds::new(2, 5);
    /// Universal conservative rung
    pub const CONSERVATIVE: SleepBounds = SleepBounds::new(10, 25);
    /// Last-resort rung
    pub const LAST_RESORT: SleepBounds = SleepBounds::new(30, 60);
    /// Between playlist items (video)
    pub const COLLECTION_VIDEO: SleepBounds = SleepBounds::new(15, 25);
    /// Between playlist items (audio) - audio requests get blocked more often
    pub const COLLECTION_AUDIO: SleepBounds = SleepBounds::new(25, 45);
}

/// User agent strings for different client types
pub mod user_agents {
    pub const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
    pub const MOBILE_ANDROID: &str = "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36";
    pub const MOBILE_FIREFOX: &str = "Mozilla/5.0 (Android 10; Mobile; rv:91.0) Gecko/91.0 Firefox/91.0";
    pub const DESKTOP_CHROME_LATEST: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const IOS_YOUTUBE: &str = "com.google.ios.youtube/19.29.1 (iPhone16,2; U; CPU iOS 17_5_1 like Mac OS X;)";
}

/// YouTube player clients the extractor can impersonate
pub mod player_clients {
    pub const ANDROID: &str = "android";
    pub const IOS: &str = "ios";
    pub const WEB: &str = "web";
    pub const TV_EMBEDDED: &str = "tv_embedded";
}

/// yt-dlp format selector strings
pub mod format_selectors {
    pub const BEST_VIDEO: &str = "best";
    pub const WORST_VIDEO: &str = "worst";
    pub const BEST_AUDIO: &str = "bestaudio/best";
    pub const WORST_AUDIO: &str = "worstaudio/worst";

    pub const AUDIO_M4A: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio";
    pub const AUDIO_WEBM: &str = "bestaudio[ext=webm]/bestaudio";

    pub const LOW_QUALITY_VIDEO: &str = "worst[height<=480]/worst";
    pub const VERY_LOW_QUALITY_VIDEO: &str = "worst[height<=360]/worst";
    pub const MINIMAL_QUALITY_VIDEO: &str = "worst[height<=240]/worst";
    pub const ULTRA_LOW_QUALITY_VIDEO: &str = "worst[height<=144]/worst";

    pub const SMALL_AUDIO_FILE: &str = "bestaudio[filesize<50M]/bestaudio";
}

/// Headers sent along with a desktop browser identity
pub const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate"),
    ("DNT", "1"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
];

/// Hosts the URL classifier accepts
pub const ACCEPTED_DOMAINS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "m.youtube.com",
    "music.youtube.com",
];

/// Substrings that mark a URL as pointing at a playlist
pub const COLLECTION_INDICATORS: &[&str] = &["list=", "/playlist?", "&list=", "playlist/"];

/// Substrings that mark a URL as naming one specific video
pub const VIDEO_MARKERS: &[&str] = &["watch?v=", "youtu.be/"];

/// Runtime configuration shared by the resolver, the ladder and the batch controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Explicit path to the yt-dlp binary
    pub engine_path: Option<PathBuf>,
    /// Per-request socket timeout in seconds
    pub socket_timeout_secs: u64,
    /// Collections larger than this are refused by `describe_collection`
    pub collection_size_threshold: usize,
    /// How many entries to keep for previews
    pub preview_count: usize,
    /// Proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
    /// Path to a Netscape cookies.txt file
    pub cookies_path: Option<PathBuf>,
    /// Keep going when a single playlist item fails
    pub ignore_errors: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            engine_path: None,
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            collection_size_threshold: COLLECTION_SIZE_THRESHOLD,
            preview_count: COLLECTION_PREVIEW_COUNT,
            proxy: None,
            cookies_path: None,
            ignore_errors: true,
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `YTDLP_PATH`, `YTFETCH_SOCKET_TIMEOUT`,
    /// `YTFETCH_PROXY` and `YTFETCH_COOKIES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("YTDLP_PATH") {
            config.engine_path = Some(PathBuf::from(path));
        }
        if let Ok(raw) = std::env::var("YTFETCH_SOCKET_TIMEOUT") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.socket_timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "ignoring invalid YTFETCH_SOCKET_TIMEOUT"),
            }
        }
        if let Ok(proxy) = std::env::var("YTFETCH_PROXY") {
            if !proxy.trim().is_empty() {
                config.proxy = Some(proxy);
            }
        }
        if let Ok(cookies) = std::env::var("YTFETCH_COOKIES") {
            config.cookies_path = Some(PathBuf::from(cookies));
        }

        config
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    pub fn with_engine_path(mut self, path: Option<PathBuf>) -> Self {
        self.engine_path = path;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u64) -> Self {
        self.socket_timeout_secs = seconds;
        self
    }

    pub fn with_collection_size_threshold(mut self, threshold: usize) -> Self {
        self.collection_size_threshold = threshold;
        self
    }

    pub fn with_preview_count(mut self, count: usize) -> Self {
        self.preview_count = count;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_ignore_errors(mut self, enabled: bool) -> Self {
        self.ignore_errors = enabled;
        self
    }
}
