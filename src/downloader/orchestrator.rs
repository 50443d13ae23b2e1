// Orchestrator with fallback logic
//
// `fetch_one` walks the attempt ladder for one video. Only an access denial
// moves on to the next rung; every other failure is final.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::backends::YtDlpEngine;
use super::batch::BatchController;
use super::config::FetchConfig;
use super::diagnostics::{classify_failure, FailureContext};
use super::errors::{FetchError, AUDIO_LADDER_EXHAUSTED, VIDEO_LADDER_EXHAUSTED};
use super::metadata::MetadataResolver;
use super::models::{
    AttemptOutcome, AttemptRecord, BatchResult, CollectionInfo, DownloadRequest, FetchResult,
    ProgressEvent,
};
use super::profiles::ladder;
use super::progress::{ProgressEmitter, ProgressRelay};
use super::traits::{ExtractionEngine, ProgressHook, RawProgress};
use super::url::{classify, ContentKind, ContentReference};
use super::utils::{ensure_output_dir, single_item_template};

/// What `fetch` ended up doing for a URL
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Single(FetchResult),
    Batch(BatchResult),
}

pub struct Downloader {
    engine: Arc<dyn ExtractionEngine>,
    config: FetchConfig,
}

impl Downloader {
    pub fn new(engine: Arc<dyn ExtractionEngine>, config: FetchConfig) -> Self {
        Self { engine, config }
    }

    /// Downloader backed by the yt-dlp binary
    pub fn with_ytdlp(config: FetchConfig) -> Self {
        let engine = Arc::new(YtDlpEngine::new(&config));
        Self::new(engine, config)
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn resolver(&self) -> MetadataResolver {
        MetadataResolver::new(self.engine.clone(), self.config.clone())
    }

    /// Classify, then fetch one video or a whole playlist.
    /// A video opened from a playlist is fetched as the single video.
    pub async fn fetch(
        &self,
        url: &str,
        request: &DownloadRequest,
        emitter: ProgressEmitter,
    ) -> Result<FetchOutcome, FetchError> {
        let reference = classify(url)?;
        match reference.kind {
            ContentKind::Video | ContentKind::VideoInCollection => self
                .fetch_one(&reference, request, emitter)
                .await
                .map(FetchOutcome::Single),
            ContentKind::Collection => self
                .fetch_collection(&reference, request, None, emitter)
                .await
                .map(FetchOutcome::Batch),
        }
    }

    /// Download a playlist with batch pacing
    pub async fn fetch_collection(
        &self,
        reference: &ContentReference,
        request: &DownloadRequest,
        info: Option<CollectionInfo>,
        emitter: ProgressEmitter,
    ) -> Result<BatchResult, FetchError> {
        BatchController::new(self.engine.clone(), self.config.clone())
            .fetch_collection(reference, request, info, emitter)
            .await
    }

    /// Download one video, escalating through the ladder on access denial
    pub async fn fetch_one(
        &self,
        reference: &ContentReference,
        request: &DownloadRequest,
        emitter: ProgressEmitter,
    ) -> Result<FetchResult, FetchError> {
        if reference.kind == ContentKind::Collection {
            return Err(FetchError::invalid_url(
                &reference.url,
                "playlist URL, use fetch_collection",
            ));
        }
        if request.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        ensure_output_dir(&request.output_dir).await?;

        let url = reference.single_item_url();
        let template = single_item_template(&request.output_dir, request.audio_only);
        let (hook, final_path) = path_capturing_hook(ProgressRelay::new(emitter));

        let rungs = ladder(request.audio_only);
        let mut attempts: Vec<AttemptRecord> = Vec::with_capacity(rungs.len());
        let mut last_message = String::new();

        for (i, profile) in rungs.iter().enumerate() {
            if request.cancel.is_cancelled() {
                tracing::info!(url = %url, rung = profile.name, "cancelled before rung");
                return Err(FetchError::Cancelled);
            }

            tracing::info!(
                url = %url,
                rung = profile.name,
                attempt = i + 1,
                total = rungs.len(),
                engine = self.engine.name(),
                "starting attempt"
            );

            let mut options = profile
                .to_engine_options(request, &self.config, template.clone())
                .with_hook(hook.clone());
            options.cancel = Some(request.cancel.clone());

            let failure = match self.engine.download(&url, &options).await {
                Ok(()) => {
                    attempts.push(AttemptRecord {
                        rung: profile.name,
                        outcome: AttemptOutcome::Success,
                    });
                    tracing::info!(url = %url, rung = profile.name, attempt = i + 1, "attempt succeeded");
                    let path = final_path.lock().ok().and_then(|p| p.clone());
                    return Ok(FetchResult {
                        success: true,
                        url,
                        path,
                        attempts,
                        audio_only: request.audio_only,
                    });
                }
                Err(failure) => failure,
            };

            if request.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let kind = classify_failure(&failure.message, FailureContext::SingleItem);
            if kind.is_escalatable() {
                tracing::warn!(url = %url, rung = profile.name, kind = ?kind, "attempt blocked, escalating");
                attempts.push(AttemptRecord {
                    rung: profile.name,
                    outcome: AttemptOutcome::RetryableFailure(kind),
                });
                last_message = failure.message;
                continue;
            }

            tracing::warn!(url = %url, rung = profile.name, kind = ?kind, error = %failure, "attempt failed, giving up");
            attempts.push(AttemptRecord {
                rung: profile.name,
                outcome: AttemptOutcome::FatalFailure(kind),
            });
            return Err(FetchError::from_engine(kind, &failure, request.timeout_secs));
        }

        tracing::warn!(url = %url, attempts = attempts.len(), "every rung was blocked");
        Err(FetchError::AccessDenied {
            message: last_message,
            guidance: Some(if request.audio_only {
                AUDIO_LADDER_EXHAUSTED
            } else {
                VIDEO_LADDER_EXHAUSTED
            }),
        })
    }
}

/// Hook that relays every event and remembers the last finished path.
/// Post-processor output arrives after the raw transfer, so it wins.
fn path_capturing_hook(relay: ProgressRelay) -> (ProgressHook, Arc<Mutex<Option<PathBuf>>>) {
    let final_path: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let writer = final_path.clone();

    let hook: ProgressHook = Arc::new(move |raw: RawProgress| {
        if let Some(ProgressEvent::Finished { path }) = relay.emit(&raw) {
            if let Ok(mut guard) = writer.lock() {
                *guard = Some(path);
            }
        }
    });

    (hook, final_path)
}
