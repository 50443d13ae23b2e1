// FormatSelector - quality preference to yt-dlp format selector, and the
// caller-facing format list
//
// The list is deliberately coarse: one entry per (height, container) pair.
// Entries yt-dlp reports without a height or extension are dropped instead of
// being shown as "Unknown".

use std::collections::HashSet;

use serde_json::Value;

use super::config::format_selectors;
use super::models::{FormatEntry, Quality};

/// Format selection helpers
pub struct FormatSelector;

impl FormatSelector {
    /// yt-dlp format selector for the caller's own preference
    pub fn selector_for(quality: Quality, audio_only: bool) -> String {
        if audio_only {
            return format_selectors::BEST_AUDIO.to_string();
        }
        match quality {
            Quality::Best => format_selectors::BEST_VIDEO.to_string(),
            Quality::Worst => format_selectors::WORST_VIDEO.to_string(),
            Quality::HeightCeiling(h) => format!("best[height<={}]/best", h),
        }
    }

    /// Order-preserving de-duplication by (height, ext)
    pub fn dedupe_formats<I>(formats: I) -> Vec<FormatEntry>
    where
        I: IntoIterator<Item = (Option<u32>, Option<String>)>,
    {
        let mut seen = HashSet::new();
        let mut result = Vec::new();

        for (height, ext) in formats {
            let (Some(height), Some(ext)) = (height, ext) else {
                continue;
            };
            if ext.is_empty() {
                continue;
            }
            let entry = FormatEntry { height, ext };
            if seen.insert(entry.clone()) {
                result.push(entry);
            }
        }

        result
    }

    /// Video formats from a yt-dlp info document.
    /// A missing `vcodec` counts as video; `"none"` marks audio-only streams.
    pub fn video_formats(info: &Value) -> Vec<FormatEntry> {
        let Some(formats) = info["formats"].as_array() else {
            return Vec::new();
        };

        let candidates = formats
            .iter()
            .filter(|f| f["vcodec"].as_str().map_or(true, |v| v != "none"))
            .map(|f| {
                let height = f["height"].as_u64().and_then(|h| u32::try_from(h).ok());
                let ext = f["ext"].as_str().map(str::to_string);
                (height, ext)
            });

        Self::dedupe_formats(candidates)
    }
}
