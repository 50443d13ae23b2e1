// Extraction engine trait definition
//
// The engine is the black box that talks to YouTube. Everything the core needs
// from it goes through `EngineOptions`; everything it reports back is either a
// JSON info document, a stream of `RawProgress` events, or an `EngineFailure`.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::config::SleepBounds;

/// Trait for extraction engine implementations
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Metadata-only call; returns the engine's info document
    async fn extract_info(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<serde_json::Value, EngineFailure>;

    /// Download under `options.output_template`, reporting through `options.progress_hook`
    async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), EngineFailure>;
}

/// Opaque engine failure; the message is all the classifier gets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for EngineFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Transfer progress as reported by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferEvent {
    /// "downloading", "finished" or "error"
    pub status: String,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
    pub filename: Option<PathBuf>,
    /// 1-based collection index when downloading a playlist
    pub playlist_index: Option<usize>,
    /// Error text for status "error"
    pub message: Option<String>,
}

/// Post-processor progress as reported by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostProcessEvent {
    /// "started", "processing" or "finished"
    pub status: String,
    /// e.g. "ExtractAudio", "Merger"
    pub postprocessor: String,
    pub filename: Option<PathBuf>,
    pub playlist_index: Option<usize>,
}

/// The two event families an engine emits
#[derive(Debug, Clone, PartialEq)]
pub enum RawProgress {
    Transfer(TransferEvent),
    PostProcess(PostProcessEvent),
}

impl RawProgress {
    pub fn playlist_index(&self) -> Option<usize> {
        match self {
            Self::Transfer(t) => t.playlist_index,
            Self::PostProcess(p) => p.playlist_index,
        }
    }
}

/// Hook invoked by the engine for every raw event
pub type ProgressHook = Arc<dyn Fn(RawProgress) + Send + Sync>;

/// Cooperative, caller-owned cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    own: Arc<AtomicBool>,
    parent: Option<Box<CancellationFlag>>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that also reads as cancelled when `self` is; cancelling it leaves `self` alone
    pub fn child(&self) -> Self {
        Self {
            own: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.is_cancelled())
    }
}

/// Local post-processing directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// Extract the audio track with the given codec and bitrate (kbps)
    ExtractAudio { codec: &'static str, quality: u32 },
}

/// Options handed to the engine for one invocation
#[derive(Clone, Default)]
pub struct EngineOptions {
    pub format: Option<String>,
    pub output_template: Option<PathBuf>,

    // Identity
    pub user_agent: Option<&'static str>,
    pub player_client: Option<&'static str>,
    pub headers: Vec<(&'static str, &'static str)>,
    /// Skip HLS/DASH sub-formats
    pub skip_streaming_protocols: bool,

    // Pacing and retries
    pub sleep: Option<SleepBounds>,
    pub sleep_requests: Option<u32>,
    pub retries: Option<u32>,
    pub fragment_retries: Option<u32>,
    pub extractor_retries: Option<u32>,
    pub socket_timeout: Duration,
    /// Bytes per second
    pub rate_limit: Option<u64>,

    pub post_processor: Option<PostProcess>,
    pub progress_hook: Option<ProgressHook>,

    // Playlist handling
    pub metadata_only: bool,
    pub flat_playlist: bool,
    pub no_playlist: bool,
    /// 1-based inclusive item range
    pub playlist_items: Option<(usize, usize)>,
    pub ignore_errors: bool,
    pub cancel: Option<CancellationFlag>,

    // Network
    pub proxy: Option<String>,
    pub cookies_path: Option<PathBuf>,
}

impl EngineOptions {
    /// Options for an info-only call
    pub fn metadata(socket_timeout: Duration) -> Self {
        Self {
            metadata_only: true,
            flat_playlist: true,
            socket_timeout,
            ..Default::default()
        }
    }

    pub fn with_hook(mut self, hook: ProgressHook) -> Self {
        self.progress_hook = Some(hook);
        self
    }

    /// Deliver an event to the hook, if any
    pub fn report(&self, event: RawProgress) {
        if let Some(hook) = &self.progress_hook {
            hook(event);
        }
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("format", &self.format)
            .field("output_template", &self.output_template)
            .field("user_agent", &self.user_agent)
            .field("player_client", &self.player_client)
            .field("headers", &self.headers.len())
            .field("skip_streaming_protocols", &self.skip_streaming_protocols)
            .field("sleep", &self.sleep)
            .field("sleep_requests", &self.sleep_requests)
            .field("retries", &self.retries)
            .field("socket_timeout", &self.socket_timeout)
            .field("rate_limit", &self.rate_limit)
            .field("post_processor", &self.post_processor)
            .field("progress_hook", &self.progress_hook.is_some())
            .field("metadata_only", &self.metadata_only)
            .field("playlist_items", &self.playlist_items)
            .field("ignore_errors", &self.ignore_errors)
            .finish_non_exhaustive()
    }
}
