// Progress relay - one callback contract for transfer and post-processor events
//
// Nothing in here may fail the download: a malformed event, a poisoned batch
// lock or a panicking caller callback is logged and dropped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use super::batch::BatchState;
use super::models::{ProgressEvent, ProgressUpdate};
use super::traits::{PostProcessEvent, RawProgress, TransferEvent};

type Callback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Progress emitter helper; cheap to clone
#[derive(Clone, Default)]
pub struct ProgressEmitter {
    callback: Option<Callback>,
}

impl ProgressEmitter {
    pub fn new(callback: impl Fn(&ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    /// Emitter that drops everything
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn emit(&self, update: ProgressUpdate) {
        let Some(callback) = &self.callback else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| callback(&update))).is_err() {
            tracing::warn!("progress callback panicked, event dropped");
        }
    }
}

/// Normalizes raw engine events and forwards them to the caller
#[derive(Clone)]
pub struct ProgressRelay {
    emitter: ProgressEmitter,
    batch: Option<Arc<Mutex<BatchState>>>,
}

impl ProgressRelay {
    /// Relay for a single-item fetch
    pub fn new(emitter: ProgressEmitter) -> Self {
        Self {
            emitter,
            batch: None,
        }
    }

    /// Relay that attaches a batch snapshot to every event
    pub fn for_batch(emitter: ProgressEmitter, batch: Arc<Mutex<BatchState>>) -> Self {
        Self {
            emitter,
            batch: Some(batch),
        }
    }

    /// Normalize and forward one raw event. Returns what was delivered, if anything.
    pub fn emit(&self, raw: &RawProgress) -> Option<ProgressEvent> {
        let event = normalize(raw)?;

        let batch = match &self.batch {
            None => None,
            Some(state) => match state.lock() {
                Ok(state) => Some(state.context(raw.playlist_index())),
                Err(_) => {
                    tracing::warn!("batch state lock poisoned, progress event dropped");
                    return None;
                }
            },
        };

        self.emitter.emit(ProgressUpdate {
            event: event.clone(),
            batch,
        });
        Some(event)
    }
}

fn normalize_transfer(t: &TransferEvent) -> Option<ProgressEvent> {
    match t.status.as_str() {
        "downloading" => Some(ProgressEvent::Downloading {
            bytes_done: t.downloaded_bytes.unwrap_or(0),
            bytes_total: t.total_bytes.or(t.total_bytes_estimate),
            speed: t.speed,
            eta: t.eta,
        }),
        "finished" => match &t.filename {
            Some(path) => Some(ProgressEvent::Finished { path: path.clone() }),
            None => {
                tracing::warn!("transfer finished without a filename, event dropped");
                None
            }
        },
        "error" => Some(ProgressEvent::Error {
            message: t
                .message
                .clone()
                .unwrap_or_else(|| "unknown download error".to_string()),
        }),
        other => {
            tracing::warn!(status = %other, "unknown transfer status, event dropped");
            None
        }
    }
}

fn normalize_post_process(p: &PostProcessEvent) -> Option<ProgressEvent> {
    match p.status.as_str() {
        "started" | "processing" => Some(ProgressEvent::PostProcessing {
            stage: if p.postprocessor.is_empty() {
                "postprocessing".to_string()
            } else {
                p.postprocessor.clone()
            },
        }),
        "finished" => match &p.filename {
            Some(path) => Some(ProgressEvent::Finished { path: path.clone() }),
            None => {
                tracing::warn!(postprocessor = %p.postprocessor, "post-processor finished without a filename, event dropped");
                None
            }
        },
        other => {
            tracing::warn!(status = %other, "unknown post-processor status, event dropped");
            None
        }
    }
}

/// Map a raw engine event onto `ProgressEvent`
pub fn normalize(raw: &RawProgress) -> Option<ProgressEvent> {
    match raw {
        RawProgress::Transfer(t) => normalize_transfer(t),
        RawProgress::PostProcess(p) => normalize_post_process(p),
    }
}
