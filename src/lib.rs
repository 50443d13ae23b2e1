//! Adaptive fetch orchestration over yt-dlp.
//!
//! Classify a URL, optionally resolve its metadata, then fetch a single video
//! through an escalating ladder of attempt profiles or a whole playlist with
//! batch pacing. Progress is relayed through one callback; failures come back
//! as a closed `FetchError` set.
//!
//! ```no_run
//! use youtube_fetch::{classify, DownloadRequest, Downloader, FetchConfig, ProgressEmitter};
//!
//! # async fn run() -> Result<(), youtube_fetch::FetchError> {
//! let downloader = Downloader::with_ytdlp(FetchConfig::from_env());
//! let reference = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ")?;
//! let request = DownloadRequest::default().with_audio_only(true);
//! let result = downloader
//!     .fetch_one(&reference, &request, ProgressEmitter::noop())
//!     .await?;
//! println!("saved to {:?}", result.path);
//! # Ok(())
//! # }
//! ```

pub mod downloader;

pub use downloader::{
    classify, classify_failure, extract_canonical_video_url, AttemptOutcome, AttemptRecord,
    BatchContext, BatchController, BatchResult, BatchState, CancellationFlag, CollectionEntry,
    CollectionInfo, ContentInfo, ContentKind, ContentReference, DownloadRequest, Downloader,
    EngineFailure, EngineOptions, ErrorKind, ExtractionEngine, FailureContext, FetchConfig,
    FetchError, FetchOutcome, FetchResult, FormatEntry, HybridInfo, IndexRange, MetadataResolver,
    PostProcess, PostProcessEvent, ProgressEmitter, ProgressEvent, ProgressHook, ProgressRelay,
    ProgressUpdate, Quality, RawProgress, SleepBounds, TransferEvent, VideoInfo,
};
