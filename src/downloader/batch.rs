// Batch controller - paced playlist downloads with per-item statistics
//
// The engine downloads the playlist natively; we only interpose a hook that
// counts terminal events per playlist index and watches for blocks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;

use super::config::FetchConfig;
use super::diagnostics::{classify_failure, is_not_a_collection, ErrorKind, FailureContext};
use super::errors::{FetchError, BATCH_ACCESS_DENIED};
use super::metadata::MetadataResolver;
use super::models::{BatchContext, BatchResult, CollectionInfo, DownloadRequest, IndexRange};
use super::profiles::collection_profile;
use super::progress::{ProgressEmitter, ProgressRelay};
use super::traits::{CancellationFlag, EngineFailure, ExtractionEngine, ProgressHook, RawProgress};
use super::url::ContentReference;
use super::utils::{collection_template, ensure_output_dir, single_item_template};

/// Terminal state of one playlist index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Downloaded,
    Failed,
}

/// Mutable statistics for one playlist download. Never shared across batches.
#[derive(Debug)]
pub struct BatchState {
    pub title: String,
    pub total: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub started_at: OffsetDateTime,
    outcomes: HashMap<usize, ItemOutcome>,
    access_denied: Option<String>,
}

impl BatchState {
    pub fn new(title: impl Into<String>, total: usize) -> Self {
        Self {
            title: title.into(),
            total,
            downloaded: 0,
            failed: 0,
            errors: Vec::new(),
            started_at: OffsetDateTime::now_utc(),
            outcomes: HashMap::new(),
            access_denied: None,
        }
    }

    /// Update counters from a raw event. Returns true when the event is an
    /// item-level access denial.
    ///
    /// Each index counts once; a later error (a failed post-processor, say)
    /// moves an already finished item to `failed`. An error without an index
    /// is kept in `errors` but is not an item.
    pub fn record(&mut self, raw: &RawProgress) -> bool {
        let RawProgress::Transfer(event) = raw else {
            return false;
        };

        match event.status.as_str() {
            "finished" => {
                match event.playlist_index {
                    Some(index) => {
                        if !self.outcomes.contains_key(&index) {
                            self.outcomes.insert(index, ItemOutcome::Downloaded);
                            self.downloaded += 1;
                        }
                    }
                    None => self.downloaded += 1,
                }
                false
            }
            "error" => {
                let message = event
                    .message
                    .clone()
                    .unwrap_or_else(|| "unknown download error".to_string());
                if let Some(index) = event.playlist_index {
                    match self.outcomes.insert(index, ItemOutcome::Failed) {
                        None => self.failed += 1,
                        Some(ItemOutcome::Downloaded) => {
                            self.downloaded = self.downloaded.saturating_sub(1);
                            self.failed += 1;
                        }
                        Some(ItemOutcome::Failed) => {}
                    }
                }
                let denied =
                    classify_failure(&message, FailureContext::SingleItem) == ErrorKind::AccessDenied;
                if denied && self.access_denied.is_none() {
                    self.access_denied = Some(message.clone());
                }
                self.errors.push(message);
                denied
            }
            _ => false,
        }
    }

    /// Forget per-item progress before re-running the URL as a single video
    pub fn reset_items(&mut self) {
        self.downloaded = 0;
        self.failed = 0;
        self.errors.clear();
        self.outcomes.clear();
    }

    /// Items that reached a terminal state
    pub fn processed(&self) -> usize {
        self.downloaded + self.failed
    }

    /// Announced total, raised when the engine processed more than that
    pub fn effective_total(&self) -> usize {
        self.total.max(self.processed())
    }

    /// Snapshot attached to progress events
    pub fn context(&self, item_index: Option<usize>) -> BatchContext {
        BatchContext {
            collection_title: self.title.clone(),
            item_index,
            total_items: self.effective_total(),
            downloaded: self.downloaded,
            failed: self.failed,
        }
    }

    pub fn elapsed_seconds(&self) -> f64 {
        (OffsetDateTime::now_utc() - self.started_at)
            .as_seconds_f64()
            .max(0.0)
    }

    pub fn to_result(&self) -> BatchResult {
        let total = self.effective_total();
        BatchResult {
            success: self.downloaded > 0,
            title: self.title.clone(),
            total_videos: total,
            downloaded: self.downloaded,
            failed: self.failed,
            skipped: total - self.processed(),
            elapsed_seconds: self.elapsed_seconds(),
            errors: self.errors.clone(),
            started_at: self.started_at,
        }
    }
}

/// Clamp a requested range to `[1, item_count]`
pub fn refine_range(range: IndexRange, item_count: usize) -> Result<IndexRange, FetchError> {
    let invalid = || FetchError::InvalidRange {
        start: range.start,
        end: range.end,
        item_count,
    };

    if item_count == 0 || range.start > item_count {
        return Err(invalid());
    }
    let start = range.start.clamp(1, item_count);
    let end = range.end.clamp(1, item_count);
    if start > end {
        return Err(invalid());
    }
    Ok(IndexRange { start, end })
}

pub struct BatchController {
    engine: Arc<dyn ExtractionEngine>,
    config: FetchConfig,
}

impl BatchController {
    pub fn new(engine: Arc<dyn ExtractionEngine>, config: FetchConfig) -> Self {
        Self { engine, config }
    }

    /// Download a playlist (or a range of it) in one paced engine run
    pub async fn fetch_collection(
        &self,
        reference: &ContentReference,
        request: &DownloadRequest,
        info: Option<CollectionInfo>,
        emitter: ProgressEmitter,
    ) -> Result<BatchResult, FetchError> {
        if request.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        ensure_output_dir(&request.output_dir).await?;

        let (info, degraded) = match info {
            Some(info) => (info, false),
            None => {
                let resolver = MetadataResolver::new(self.engine.clone(), self.config.clone());
                match resolver.resolve_collection(reference, false).await {
                    Ok(info) => (info, false),
                    Err(e) => {
                        tracing::warn!(url = %reference.url, error = %e, "playlist resolution failed, continuing with placeholder");
                        (CollectionInfo::placeholder(), true)
                    }
                }
            }
        };

        let (playlist_items, total) = match request.range {
            None => (None, info.item_count),
            // The placeholder count means nothing; let the engine apply the range
            Some(range) if degraded => {
                let range = IndexRange::new(range.start, range.end)?;
                (Some((range.start, range.end)), range.span())
            }
            Some(range) => {
                let refined = refine_range(range, info.item_count)?;
                (Some((refined.start, refined.end)), refined.span())
            }
        };

        let state = Arc::new(Mutex::new(BatchState::new(info.title.clone(), total)));
        let stop = request.cancel.child();
        let hook = stats_hook(
            state.clone(),
            stop.clone(),
            ProgressRelay::for_batch(emitter, state.clone()),
        );

        let profile = collection_profile(request.audio_only);
        let mut options = profile
            .to_engine_options(
                request,
                &self.config,
                collection_template(&request.output_dir, request.audio_only),
            )
            .with_hook(hook.clone());
        options.no_playlist = false;
        options.playlist_items = playlist_items;
        options.ignore_errors = self.config.ignore_errors;
        options.cancel = Some(stop.clone());

        tracing::info!(
            url = %reference.url,
            title = %info.title,
            total,
            range = ?playlist_items,
            audio_only = request.audio_only,
            "starting playlist download"
        );

        let outcome = self.engine.download(&reference.url, &options).await;

        let outcome = match outcome {
            Err(failure) if is_not_a_collection(&failure.message) => {
                tracing::info!(url = %reference.url, "not a playlist, falling back to single download");
                if let Ok(mut s) = state.lock() {
                    s.reset_items();
                }
                let mut single = options.clone();
                single.no_playlist = true;
                single.playlist_items = None;
                single.output_template =
                    Some(single_item_template(&request.output_dir, request.audio_only));
                let result = self
                    .engine
                    .download(&reference.single_item_url(), &single)
                    .await;
                if result.is_ok() {
                    if let Ok(mut s) = state.lock() {
                        // One video, however many streams it was fetched as
                        s.downloaded = 1;
                        s.total = s.total.max(1);
                    }
                }
                result
            }
            other => other,
        };

        let state = state
            .lock()
            .map_err(|_| FetchError::unexpected("batch state lock poisoned"))?;

        if request.cancel.is_cancelled() {
            tracing::info!(url = %reference.url, downloaded = state.downloaded, "playlist download cancelled");
            return Err(FetchError::Cancelled);
        }

        if let Some(message) = &state.access_denied {
            tracing::warn!(url = %reference.url, "playlist item blocked, aborting batch");
            return Err(FetchError::AccessDenied {
                message: message.clone(),
                guidance: Some(BATCH_ACCESS_DENIED),
            });
        }

        if let Err(failure) = outcome {
            return self.finish_with_failure(&state, failure, request.timeout_secs);
        }

        let result = state.to_result();
        tracing::info!(
            title = %result.title,
            downloaded = result.downloaded,
            failed = result.failed,
            skipped = result.skipped,
            elapsed = result.elapsed_seconds,
            "playlist download finished"
        );
        Ok(result)
    }

    fn finish_with_failure(
        &self,
        state: &BatchState,
        failure: EngineFailure,
        timeout_secs: u64,
    ) -> Result<BatchResult, FetchError> {
        let kind = classify_failure(&failure.message, FailureContext::Collection);

        if kind == ErrorKind::AccessDenied {
            return Err(FetchError::from_engine(kind, &failure, timeout_secs)
                .with_guidance(BATCH_ACCESS_DENIED));
        }

        let processed = state.processed();
        if processed > 0 && self.config.ignore_errors {
            tracing::warn!(kind = ?kind, error = %failure, processed, "engine failed after partial progress, keeping results");
            let mut result = state.to_result();
            if !result.errors.iter().any(|e| *e == failure.message) {
                result.errors.push(failure.message);
            }
            return Ok(result);
        }

        tracing::warn!(kind = ?kind, error = %failure, "playlist download failed");
        Err(FetchError::from_engine(kind, &failure, timeout_secs))
    }
}

/// Counts terminal events, trips `stop` on a block, then relays the event
fn stats_hook(
    state: Arc<Mutex<BatchState>>,
    stop: CancellationFlag,
    relay: ProgressRelay,
) -> ProgressHook {
    Arc::new(move |raw: RawProgress| {
        let denied = match state.lock() {
            Ok(mut state) => state.record(&raw),
            Err(_) => {
                tracing::warn!("batch state lock poisoned, event not counted");
                false
            }
        };
        if denied {
            tracing::warn!(item = ?raw.playlist_index(), "item blocked, stopping at next item");
            stop.cancel();
        }
        relay.emit(&raw);
    })
}
