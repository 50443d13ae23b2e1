// Downloader module - adaptive fetch orchestration over an extraction engine

pub mod backends;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod profiles;
pub mod progress;
pub mod traits;
pub mod url;
pub mod utils;

pub use batch::{BatchController, BatchState};
pub use config::{FetchConfig, SleepBounds};
pub use diagnostics::{classify_failure, ErrorKind, FailureContext};
pub use errors::FetchError;
pub use metadata::MetadataResolver;
pub use models::{
    AttemptOutcome, AttemptRecord, BatchContext, BatchResult, CollectionEntry, CollectionInfo,
    ContentInfo, DownloadRequest, FetchResult, FormatEntry, HybridInfo, IndexRange,
    ProgressEvent, ProgressUpdate, Quality, VideoInfo,
};
pub use orchestrator::{Downloader, FetchOutcome};
pub use progress::{ProgressEmitter, ProgressRelay};
pub use traits::{
    CancellationFlag, EngineFailure, EngineOptions, ExtractionEngine, PostProcess,
    PostProcessEvent, ProgressHook, RawProgress, TransferEvent,
};
pub use url::{classify, extract_canonical_video_url, ContentKind, ContentReference};
