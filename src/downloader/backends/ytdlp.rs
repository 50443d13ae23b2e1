// yt-dlp binary as an ExtractionEngine
//
// Metadata comes from `yt-dlp -J`. Downloads stream stdout line by line; a
// machine-readable --progress-template turns every progress report into a
// `RawProgress` event. Playlist item boundaries are where cancellation is
// honored.

use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::Notify;

use crate::downloader::config::FetchConfig;
use crate::downloader::traits::{
    EngineFailure, EngineOptions, ExtractionEngine, PostProcess, PostProcessEvent, RawProgress,
    TransferEvent,
};
use crate::downloader::utils::run_output_with_timeout;

const TRANSFER_TAG: &str = "[ytf]";
const POSTPROCESS_TAG: &str = "[ytf-pp]";

const DOWNLOAD_PROGRESS_TEMPLATE: &str = "download:[ytf] %(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s|%(info.playlist_index)s|%(progress.filename)s";

const POSTPROCESS_PROGRESS_TEMPLATE: &str = "postprocess:[ytf-pp] %(progress.status)s|%(progress.postprocessor)s|%(info.playlist_index)s|%(info.filepath)s";

/// Floor for the metadata wall-clock timeout (seconds)
const MIN_METADATA_TIMEOUT_SECS: u64 = 60;

lazy_static::lazy_static! {
    static ref ITEM_RE: Regex =
        Regex::new(r"\[download\] Downloading (?:item|video) (\d+) of (\d+)").unwrap();
    static ref ALREADY_RE: Regex =
        Regex::new(r"\[download\]\s+(.+) has already been downloaded").unwrap();
}

// Find yt-dlp executable: explicit path, YTDLP_PATH, common paths, then PATH
pub fn find_ytdlp(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("YTDLP_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",
    ];
    for path in common_paths {
        if Path::new(path).exists() {
            return PathBuf::from(path);
        }
    }

    if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !found.is_empty() {
                return PathBuf::from(found);
            }
        }
    }

    PathBuf::from("yt-dlp")
}

/// Drives the yt-dlp command-line program
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl YtDlpEngine {
    pub fn new(config: &FetchConfig) -> Self {
        let binary = find_ytdlp(config.engine_path.as_deref());
        tracing::debug!(binary = %binary.display(), "using yt-dlp");
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// Translate engine options into yt-dlp arguments
pub fn build_args(url: &str, options: &EngineOptions) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();

    if options.metadata_only {
        args.push("-J".to_string());
        args.push("--no-warnings".to_string());
        if options.flat_playlist {
            args.push("--flat-playlist".to_string());
        }
    } else {
        args.push("--newline".to_string());
        args.push("--no-colors".to_string());
        push(&mut args, "--progress-template", DOWNLOAD_PROGRESS_TEMPLATE);
        push(&mut args, "--progress-template", POSTPROCESS_PROGRESS_TEMPLATE);

        if let Some(format) = &options.format {
            push(&mut args, "-f", format);
        }
        if let Some(template) = &options.output_template {
            push(&mut args, "-o", template.to_string_lossy());
        }
    }

    if !options.socket_timeout.is_zero() {
        push(&mut args, "--socket-timeout", options.socket_timeout.as_secs());
    }

    // Retries and pacing
    if let Some(n) = options.retries {
        push(&mut args, "--retries", n);
    }
    if let Some(n) = options.fragment_retries {
        push(&mut args, "--fragment-retries", n);
    }
    if let Some(n) = options.extractor_retries {
        push(&mut args, "--extractor-retries", n);
    }
    if let Some(sleep) = options.sleep {
        push(&mut args, "--sleep-interval", sleep.min_secs);
        push(&mut args, "--max-sleep-interval", sleep.max_secs);
    }
    if let Some(secs) = options.sleep_requests {
        push(&mut args, "--sleep-requests", secs);
    }
    if let Some(rate) = options.rate_limit {
        push(&mut args, "--limit-rate", rate);
    }

    // Identity
    if let Some(ua) = options.user_agent {
        push(&mut args, "--user-agent", ua);
    }
    for (name, value) in &options.headers {
        push(&mut args, "--add-headers", format!("{}:{}", name, value));
    }
    let mut extractor_args = Vec::new();
    if let Some(client) = options.player_client {
        extractor_args.push(format!("player_client={}", client));
    }
    if options.skip_streaming_protocols {
        extractor_args.push("skip=hls,dash".to_string());
    }
    if !extractor_args.is_empty() {
        push(
            &mut args,
            "--extractor-args",
            format!("youtube:{}", extractor_args.join(";")),
        );
    }

    if let Some(PostProcess::ExtractAudio { codec, quality }) = &options.post_processor {
        args.push("-x".to_string());
        push(&mut args, "--audio-format", codec);
        push(&mut args, "--audio-quality", format!("{}K", quality));
    }

    // Playlist handling
    if options.no_playlist {
        args.push("--no-playlist".to_string());
    } else if !options.metadata_only {
        args.push("--yes-playlist".to_string());
        if options.ignore_errors {
            args.push("--ignore-errors".to_string());
        } else {
            args.push("--abort-on-error".to_string());
        }
    }
    if let Some((start, end)) = options.playlist_items {
        push(&mut args, "-I", format!("{}:{}", start, end));
    }

    // Network
    if let Some(proxy) = &options.proxy {
        push(&mut args, "--proxy", proxy);
    }
    if let Some(cookies) = &options.cookies_path {
        push(&mut args, "--cookies", cookies.to_string_lossy());
    }

    args.push("--".to_string());
    args.push(url.to_string());
    args
}

fn field<'a>(raw: Option<&'a str>) -> Option<&'a str> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty() && *s != "NA" && *s != "None")
}

fn field_u64(raw: Option<&str>) -> Option<u64> {
    field(raw)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

fn field_f64(raw: Option<&str>) -> Option<f64> {
    field(raw).and_then(|s| s.parse::<f64>().ok())
}

fn field_usize(raw: Option<&str>) -> Option<usize> {
    field_u64(raw).and_then(|v| usize::try_from(v).ok())
}

/// Parse one line of our progress templates into a raw event
pub fn parse_progress_line(line: &str) -> Option<RawProgress> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(POSTPROCESS_TAG) {
        let mut parts = rest.trim_start().splitn(4, '|');
        return Some(RawProgress::PostProcess(PostProcessEvent {
            status: parts.next()?.trim().to_string(),
            postprocessor: field(parts.next()).unwrap_or("").to_string(),
            playlist_index: field_usize(parts.next()),
            filename: field(parts.next()).map(PathBuf::from),
        }));
    }

    if let Some(rest) = line.strip_prefix(TRANSFER_TAG) {
        let mut parts = rest.trim_start().splitn(8, '|');
        return Some(RawProgress::Transfer(TransferEvent {
            status: parts.next()?.trim().to_string(),
            downloaded_bytes: field_u64(parts.next()),
            total_bytes: field_u64(parts.next()),
            total_bytes_estimate: field_u64(parts.next()),
            speed: field_f64(parts.next()),
            eta: field_u64(parts.next()),
            playlist_index: field_usize(parts.next()),
            filename: field(parts.next()).map(PathBuf::from),
            message: None,
        }));
    }

    None
}

/// `[download] Downloading item 3 of 12` -> (3, 12)
pub fn parse_item_boundary(line: &str) -> Option<(usize, usize)> {
    let caps = ITEM_RE.captures(line)?;
    let current = caps.get(1)?.as_str().parse().ok()?;
    let total = caps.get(2)?.as_str().parse().ok()?;
    Some((current, total))
}

/// Collapse stderr to the lines the classifier needs
fn failure_message(stderr: &str, status: std::process::ExitStatus) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("yt-dlp exited with {}", status))
}

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Turns yt-dlp output into raw events. Owns the current playlist item, so
/// an `ERROR:` line is charged to the item that was running when it arrived.
#[derive(Debug, Default)]
struct OutputTracker {
    current_item: Option<usize>,
    stderr: String,
}

/// What the caller should do after a line
#[derive(Debug, PartialEq)]
enum LineAction {
    Continue,
    Stop,
}

impl OutputTracker {
    fn handle(&mut self, stream: Stream, line: &str, options: &EngineOptions) -> LineAction {
        match stream {
            Stream::Stdout => self.handle_stdout(line, options),
            Stream::Stderr => {
                self.handle_stderr(line, options);
                LineAction::Continue
            }
        }
    }

    fn handle_stdout(&mut self, line: &str, options: &EngineOptions) -> LineAction {
        if let Some((item, total)) = parse_item_boundary(line) {
            tracing::debug!(item, total, "playlist item boundary");
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return LineAction::Stop;
            }
            self.current_item = Some(item);
            return LineAction::Continue;
        }

        if let Some(event) = parse_progress_line(line) {
            options.report(event);
            return LineAction::Continue;
        }

        if let Some(caps) = ALREADY_RE.captures(line) {
            options.report(RawProgress::Transfer(TransferEvent {
                status: "finished".to_string(),
                filename: caps.get(1).map(|m| PathBuf::from(m.as_str().trim())),
                playlist_index: self.current_item,
                ..Default::default()
            }));
        }
        LineAction::Continue
    }

    fn handle_stderr(&mut self, line: &str, options: &EngineOptions) {
        let trimmed = line.trim();
        // Errors outside an item concern the whole run; they surface through the exit status
        if options.ignore_errors && trimmed.starts_with("ERROR:") {
            if let Some(index) = self.current_item {
                options.report(RawProgress::Transfer(TransferEvent {
                    status: "error".to_string(),
                    playlist_index: Some(index),
                    message: Some(trimmed.to_string()),
                    ..Default::default()
                }));
            }
        }
        self.stderr.push_str(line);
        self.stderr.push('\n');
    }
}

/// Read both pipes from one task. stderr is polled first: yt-dlp writes an
/// item's error before it announces the next item on stdout.
async fn read_output<O, E>(
    stdout: O,
    stderr: E,
    options: EngineOptions,
    stop: Arc<Notify>,
) -> String
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_open = true;
    let mut err_open = true;
    let mut tracker = OutputTracker::default();

    while out_open || err_open {
        let (stream, line) = tokio::select! {
            biased;
            line = err_lines.next_line(), if err_open => (Stream::Stderr, line),
            line = out_lines.next_line(), if out_open => (Stream::Stdout, line),
        };

        match line {
            Ok(Some(line)) => {
                if tracker.handle(stream, &line, &options) == LineAction::Stop {
                    stop.notify_one();
                    return tracker.stderr;
                }
            }
            Ok(None) | Err(_) => match stream {
                Stream::Stdout => out_open = false,
                Stream::Stderr => err_open = false,
            },
        }
    }

    tracker.stderr
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(
        &self,
        url: &str,
        options: &EngineOptions,
    ) -> Result<serde_json::Value, EngineFailure> {
        let mut options = options.clone();
        options.metadata_only = true;
        let args = build_args(url, &options);
        let timeout_secs = (options.socket_timeout.as_secs() * 4).max(MIN_METADATA_TIMEOUT_SECS);

        tracing::debug!(url = %url, timeout_secs, "yt-dlp metadata request");
        let output = run_output_with_timeout(&self.binary, &args, timeout_secs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineFailure::new(failure_message(&stderr, output.status)));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineFailure::new(format!("Failed to parse yt-dlp JSON: {}", e)))
    }

    async fn download(&self, url: &str, options: &EngineOptions) -> Result<(), EngineFailure> {
        let args = build_args(url, options);
        tracing::debug!(url = %url, args = ?args, "starting yt-dlp download");

        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineFailure::new(format!("Failed to start {}: {}", self.binary.display(), e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineFailure::new("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineFailure::new("Failed to capture stderr"))?;

        let stop = Arc::new(Notify::new());
        let reader = tokio::spawn(read_output(stdout, stderr, options.clone(), stop.clone()));

        let status = tokio::select! {
            s = child.wait() => s.map_err(|e| EngineFailure::new(format!("yt-dlp process failed: {}", e)))?,
            _ = stop.notified() => {
                tracing::info!(url = %url, "stop requested at item boundary, killing yt-dlp");
                let _ = child.kill().await;
                reader.abort();
                return Err(EngineFailure::new("Download cancelled"));
            }
        };

        let stderr_output = reader.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let message = failure_message(&stderr_output, status);
        tracing::debug!(url = %url, error = %message, "yt-dlp exited with failure");
        Err(EngineFailure::new(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::config::SleepBounds;
    use std::time::Duration;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_parse_transfer_line() {
        let line = "[ytf] downloading|1048576|4194304|NA|524288.5|6|2|/tmp/out/Song.webm";
        let Some(RawProgress::Transfer(t)) = parse_progress_line(line) else {
            panic!("expected transfer event");
        };
        assert_eq!(t.status, "downloading");
        assert_eq!(t.downloaded_bytes, Some(1_048_576));
        assert_eq!(t.total_bytes, Some(4_194_304));
        assert_eq!(t.total_bytes_estimate, None);
        assert_eq!(t.speed, Some(524288.5));
        assert_eq!(t.eta, Some(6));
        assert_eq!(t.playlist_index, Some(2));
        assert_eq!(t.filename, Some(PathBuf::from("/tmp/out/Song.webm")));
    }

    #[test]
    fn test_parse_transfer_line_keeps_pipes_in_filename() {
        let line = "[ytf] finished|10|10|NA|NA|NA|NA|/tmp/a|b.mp4";
        let Some(RawProgress::Transfer(t)) = parse_progress_line(line) else {
            panic!("expected transfer event");
        };
        assert_eq!(t.playlist_index, None);
        assert_eq!(t.filename, Some(PathBuf::from("/tmp/a|b.mp4")));
    }

    #[test]
    fn test_parse_postprocess_line() {
        let line = "[ytf-pp] finished|ExtractAudio|NA|/tmp/out/Song [audio].mp3";
        let Some(RawProgress::PostProcess(p)) = parse_progress_line(line) else {
            panic!("expected post-process event");
        };
        assert_eq!(p.status, "finished");
        assert_eq!(p.postprocessor, "ExtractAudio");
        assert_eq!(p.filename, Some(PathBuf::from("/tmp/out/Song [audio].mp3")));
    }

    #[test]
    fn test_parse_ignores_other_lines() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("").is_none());
    }

    #[test]
    fn test_item_boundary() {
        assert_eq!(
            parse_item_boundary("[download] Downloading item 3 of 12"),
            Some((3, 12))
        );
        assert_eq!(
            parse_item_boundary("[download] Downloading video 1 of 2"),
            Some((1, 2))
        );
        assert_eq!(parse_item_boundary("[download] 50.0% of 3MiB"), None);
    }

    #[test]
    fn test_metadata_args() {
        let options = EngineOptions::metadata(Duration::from_secs(30));
        let args = build_args("https://youtu.be/x", &options);
        assert!(args.contains(&"-J".to_string()));
        assert!(args.contains(&"--flat-playlist".to_string()));
        assert!(!args.contains(&"--newline".to_string()));
        assert!(has_pair(&args, "--socket-timeout", "30"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_download_args() {
        let options = EngineOptions {
            format: Some("bestaudio/best".into()),
            output_template: Some(PathBuf::from("/tmp/%(title)s [audio].%(ext)s")),
            user_agent: Some("UA"),
            player_client: Some("ios"),
            skip_streaming_protocols: true,
            sleep: Some(SleepBounds::new(2, 5)),
            retries: Some(3),
            rate_limit: Some(75_000),
            post_processor: Some(PostProcess::ExtractAudio {
                codec: "mp3",
                quality: 128,
            }),
            no_playlist: true,
            socket_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let args = build_args("https://www.youtube.com/watch?v=x", &options);

        assert!(has_pair(&args, "-f", "bestaudio/best"));
        assert!(has_pair(&args, "--sleep-interval", "2"));
        assert!(has_pair(&args, "--max-sleep-interval", "5"));
        assert!(has_pair(&args, "--retries", "3"));
        assert!(has_pair(&args, "--limit-rate", "75000"));
        assert!(has_pair(&args, "--extractor-args", "youtube:player_client=ios;skip=hls,dash"));
        assert!(has_pair(&args, "--audio-quality", "128K"));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--newline".to_string()));
    }

    #[test]
    fn test_playlist_args() {
        let options = EngineOptions {
            playlist_items: Some((2, 7)),
            ignore_errors: true,
            ..Default::default()
        };
        let args = build_args("https://www.youtube.com/playlist?list=PL1", &options);
        assert!(has_pair(&args, "-I", "2:7"));
        assert!(args.contains(&"--yes-playlist".to_string()));
        assert!(args.contains(&"--ignore-errors".to_string()));
        assert!(!args.contains(&"--socket-timeout".to_string()));
    }

    fn collecting_options(ignore_errors: bool) -> (EngineOptions, Arc<std::sync::Mutex<Vec<RawProgress>>>) {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = EngineOptions {
            ignore_errors,
            ..Default::default()
        }
        .with_hook(Arc::new(move |event: RawProgress| {
            sink.lock().unwrap().push(event)
        }));
        (options, seen)
    }

    #[test]
    fn test_error_before_first_item_is_not_an_item_failure() {
        let (options, seen) = collecting_options(true);
        let mut tracker = OutputTracker::default();

        tracker.handle(
            Stream::Stderr,
            "ERROR: [youtube:tab] PLxyz: This playlist is private",
            &options,
        );

        assert!(seen.lock().unwrap().is_empty());
        assert!(tracker.stderr.contains("This playlist is private"));
    }

    #[test]
    fn test_error_is_charged_to_running_item() {
        let (options, seen) = collecting_options(true);
        let mut tracker = OutputTracker::default();

        tracker.handle(Stream::Stdout, "[download] Downloading item 1 of 3", &options);
        tracker.handle(Stream::Stderr, "ERROR: [youtube] a: Video unavailable", &options);
        tracker.handle(Stream::Stdout, "[download] Downloading item 2 of 3", &options);
        tracker.handle(Stream::Stdout, "[ytf] finished|1|1|NA|NA|NA|2|/out/2.mp4", &options);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].playlist_index(), Some(1));
        assert_eq!(seen[1].playlist_index(), Some(2));
    }

    #[test]
    fn test_errors_not_forwarded_without_tolerance() {
        let (options, seen) = collecting_options(false);
        let mut tracker = OutputTracker::default();

        tracker.handle(Stream::Stdout, "[download] Downloading item 1 of 1", &options);
        tracker.handle(Stream::Stderr, "ERROR: boom", &options);

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_flag_stops_at_boundary() {
        let cancel = crate::downloader::traits::CancellationFlag::new();
        cancel.cancel();
        let options = EngineOptions {
            cancel: Some(cancel),
            ..Default::default()
        };
        let mut tracker = OutputTracker::default();

        let action = tracker.handle(Stream::Stdout, "[download] Downloading item 2 of 3", &options);

        assert_eq!(action, LineAction::Stop);
        assert_eq!(tracker.current_item, None);
    }

    #[test]
    fn test_find_ytdlp_prefers_explicit_path() {
        let path = find_ytdlp(Some(Path::new("/custom/yt-dlp")));
        assert_eq!(path, PathBuf::from("/custom/yt-dlp"));
    }
}
