//! Shared helpers for integration tests: a scripted in-memory engine.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use youtube_fetch::{
    EngineFailure, EngineOptions, ExtractionEngine, PostProcessEvent, ProgressEmitter,
    ProgressUpdate, RawProgress, TransferEvent,
};

/// Honors RUST_LOG; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted download call
pub struct Step {
    pub events: Vec<RawProgress>,
    pub result: Result<(), String>,
}

impl Step {
    pub fn ok() -> Self {
        Self {
            events: Vec::new(),
            result: Ok(()),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            events: Vec::new(),
            result: Err(message.to_string()),
        }
    }

    pub fn with_events(mut self, events: Vec<RawProgress>) -> Self {
        self.events = events;
        self
    }
}

/// Engine that replays scripted responses and records every call
#[derive(Default)]
pub struct ScriptedEngine {
    info: Mutex<VecDeque<Result<Value, String>>>,
    downloads: Mutex<VecDeque<Step>>,
    info_calls: AtomicUsize,
    download_calls: AtomicUsize,
    recorded: Mutex<Vec<(String, EngineOptions)>>,
    info_urls: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_info(&self, json: Value) {
        self.info.lock().unwrap().push_back(Ok(json));
    }

    pub fn push_info_failure(&self, message: &str) {
        self.info.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn push_download(&self, step: Step) {
        self.downloads.lock().unwrap().push_back(step);
    }

    pub fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.info_calls() + self.download_calls()
    }

    pub fn recorded(&self) -> Vec<(String, EngineOptions)> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn info_urls(&self) -> Vec<String> {
        self.info_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn extract_info(
        &self,
        url: &str,
        _options: &EngineOptions,
    ) -> Result<Value, EngineFailure> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.info_urls.lock().unwrap().push(url.to_string());
        match self.info.lock().unwrap().pop_front() {
            Some(Ok(json)) => Ok(json),
            Some(Err(message)) => Err(EngineFailure::new(message)),
            None => Err(EngineFailure::new("ERROR: no scripted info response")),
        }
    }

    async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), EngineFailure> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.recorded
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        let step = self.downloads.lock().unwrap().pop_front().unwrap_or_else(Step::ok);
        for event in step.events {
            options.report(event);
        }
        step.result.map_err(EngineFailure::new)
    }
}

pub fn downloading(index: Option<usize>, done: u64, total: u64) -> RawProgress {
    RawProgress::Transfer(TransferEvent {
        status: "downloading".into(),
        downloaded_bytes: Some(done),
        total_bytes: Some(total),
        playlist_index: index,
        ..Default::default()
    })
}

pub fn finished(index: Option<usize>, path: &str) -> RawProgress {
    RawProgress::Transfer(TransferEvent {
        status: "finished".into(),
        filename: Some(PathBuf::from(path)),
        playlist_index: index,
        ..Default::default()
    })
}

pub fn item_error(index: usize, message: &str) -> RawProgress {
    RawProgress::Transfer(TransferEvent {
        status: "error".into(),
        playlist_index: Some(index),
        message: Some(message.into()),
        ..Default::default()
    })
}

pub fn post_processed(path: &str) -> RawProgress {
    RawProgress::PostProcess(PostProcessEvent {
        status: "finished".into(),
        postprocessor: "ExtractAudio".into(),
        filename: Some(PathBuf::from(path)),
        playlist_index: None,
    })
}

/// Emitter that stores every update
pub fn collecting_emitter() -> (ProgressEmitter, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let emitter = ProgressEmitter::new(move |update: &ProgressUpdate| {
        sink.lock().unwrap().push(update.clone());
    });
    (emitter, seen)
}
