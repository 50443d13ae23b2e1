// Attempt profiles - the fallback ladder as data
//
// Each rung changes one axis at a time (identity, format, pacing) so the
// cheapest change that gets past a block is the one that is used. The fetch
// loop in orchestrator.rs walks these tables in order.

use std::path::PathBuf;

use super::config::{
    format_selectors, pacing, player_clients, user_agents, FetchConfig, SleepBounds, AUDIO_CODEC,
    AUDIO_REQUEST_DELAY, BROWSER_HEADERS, CONSERVATIVE_AUDIO_QUALITY, CONSERVATIVE_RATE_LIMIT,
    CONSERVATIVE_RETRIES, DEFAULT_AUDIO_QUALITY, DEFAULT_RATE_LIMIT, DEFAULT_REQUEST_DELAY,
    DEFAULT_RETRIES, EXTRACTOR_RETRIES, FRAGMENT_RETRIES, MINIMAL_AUDIO_QUALITY, MINIMAL_RETRIES,
    PRIMARY_RETRIES,
};
use super::format_selector::FormatSelector;
use super::models::DownloadRequest;
use super::traits::{EngineOptions, PostProcess};

/// Client identity presented to YouTube
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: Option<&'static str>,
    pub player_client: Option<&'static str>,
    /// Send the full desktop browser header set
    pub browser_headers: bool,
}

impl Identity {
    const fn desktop() -> Self {
        Self {
            user_agent: Some(user_agents::DESKTOP_CHROME),
            player_client: None,
            browser_headers: false,
        }
    }

    const fn client(user_agent: Option<&'static str>, player_client: &'static str) -> Self {
        Self {
            user_agent,
            player_client: Some(player_client),
            browser_headers: false,
        }
    }

    const fn bare() -> Self {
        Self {
            user_agent: None,
            player_client: None,
            browser_headers: false,
        }
    }
}

/// Which format selector a rung asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    /// The caller's own quality preference
    Requested,
    Fixed(&'static str),
    /// Worst audio or worst video, depending on the request
    Worst,
}

/// Whether a rung extracts audio locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessChoice {
    None,
    /// Extract at this bitrate when the request is audio-only
    WhenAudio(u32),
}

/// One rung of the fallback ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptProfile {
    pub name: &'static str,
    pub identity: Identity,
    pub format: FormatChoice,
    pub post_process: PostProcessChoice,
    pub sleep: Option<SleepBounds>,
    pub retries: u32,
    pub fragment_retries: Option<u32>,
    pub extractor_retries: Option<u32>,
    pub skip_streaming_protocols: bool,
    /// Bytes per second
    pub rate_limit: Option<u64>,
    /// Seconds between requests during extraction
    pub sleep_requests: Option<u32>,
}

const PRIMARY: AttemptProfile = AttemptProfile {
    name: "primary",
    identity: Identity::desktop(),
    format: FormatChoice::Requested,
    post_process: PostProcessChoice::WhenAudio(DEFAULT_AUDIO_QUALITY),
    sleep: Some(pacing::PRIMARY),
    retries: PRIMARY_RETRIES,
    fragment_retries: Some(FRAGMENT_RETRIES),
    extractor_retries: Some(EXTRACTOR_RETRIES),
    skip_streaming_protocols: false,
    rate_limit: None,
    sleep_requests: None,
};

const CONSERVATIVE: AttemptProfile = AttemptProfile {
    name: "conservative",
    identity: Identity::client(Some(user_agents::MOBILE_ANDROID), player_clients::ANDROID),
    post_process: PostProcessChoice::WhenAudio(CONSERVATIVE_AUDIO_QUALITY),
    sleep: Some(pacing::CONSERVATIVE),
    retries: MINIMAL_RETRIES,
    fragment_retries: Some(MINIMAL_RETRIES),
    extractor_retries: Some(MINIMAL_RETRIES),
    ..PRIMARY
};

const BYPASS: AttemptProfile = AttemptProfile {
    name: "bypass",
    identity: Identity::client(Some(user_agents::MOBILE_FIREFOX), player_clients::ANDROID),
    format: FormatChoice::Fixed(format_selectors::WORST_AUDIO),
    post_process: PostProcessChoice::WhenAudio(MINIMAL_AUDIO_QUALITY),
    sleep: Some(pacing::CONSERVATIVE),
    retries: MINIMAL_RETRIES,
    fragment_retries: Some(MINIMAL_RETRIES),
    extractor_retries: Some(MINIMAL_RETRIES),
    skip_streaming_protocols: true,
    ..PRIMARY
};

const LAST_RESORT: AttemptProfile = AttemptProfile {
    name: "last_resort",
    identity: Identity::bare(),
    format: FormatChoice::Worst,
    post_process: PostProcessChoice::WhenAudio(MINIMAL_AUDIO_QUALITY),
    sleep: Some(pacing::LAST_RESORT),
    retries: MINIMAL_RETRIES,
    fragment_retries: None,
    extractor_retries: None,
    skip_streaming_protocols: false,
    rate_limit: None,
    sleep_requests: None,
};

const AUDIO_M4A: AttemptProfile = AttemptProfile {
    name: "audio_m4a",
    format: FormatChoice::Fixed(format_selectors::AUDIO_M4A),
    post_process: PostProcessChoice::None,
    ..PRIMARY
};

const AUDIO_FROM_VIDEO: AttemptProfile = AttemptProfile {
    name: "audio_from_low_video",
    format: FormatChoice::Fixed(format_selectors::LOW_QUALITY_VIDEO),
    post_process: PostProcessChoice::WhenAudio(CONSERVATIVE_AUDIO_QUALITY),
    ..PRIMARY
};

const AUDIO_ANDROID: AttemptProfile = AttemptProfile {
    name: "audio_android",
    identity: Identity::client(Some(user_agents::MOBILE_ANDROID), player_clients::ANDROID),
    format: FormatChoice::Fixed(format_selectors::BEST_AUDIO),
    post_process: PostProcessChoice::WhenAudio(CONSERVATIVE_AUDIO_QUALITY),
    retries: CONSERVATIVE_RETRIES,
    ..PRIMARY
};

const AUDIO_IOS: AttemptProfile = AttemptProfile {
    name: "audio_ios",
    identity: Identity::client(Some(user_agents::IOS_YOUTUBE), player_clients::IOS),
    format: FormatChoice::Fixed(format_selectors::SMALL_AUDIO_FILE),
    ..AUDIO_ANDROID
};

const AUDIO_WEB: AttemptProfile = AttemptProfile {
    name: "audio_web",
    identity: Identity {
        user_agent: Some(user_agents::DESKTOP_CHROME_LATEST),
        player_client: Some(player_clients::WEB),
        browser_headers: true,
    },
    format: FormatChoice::Fixed(format_selectors::AUDIO_WEBM),
    ..AUDIO_ANDROID
};

const AUDIO_TV_EMBEDDED: AttemptProfile = AttemptProfile {
    name: "audio_tv_embedded",
    identity: Identity::client(None, player_clients::TV_EMBEDDED),
    format: FormatChoice::Fixed(format_selectors::BEST_AUDIO),
    retries: MINIMAL_RETRIES,
    fragment_retries: Some(MINIMAL_RETRIES),
    extractor_retries: Some(MINIMAL_RETRIES),
    ..AUDIO_ANDROID
};

/// Ladder for video requests
pub const VIDEO_LADDER: &[AttemptProfile] = &[PRIMARY, CONSERVATIVE, LAST_RESORT];

/// Ladder for audio-only requests
pub const AUDIO_LADDER: &[AttemptProfile] = &[
    PRIMARY,
    AUDIO_M4A,
    AUDIO_FROM_VIDEO,
    AUDIO_ANDROID,
    AUDIO_IOS,
    AUDIO_WEB,
    AUDIO_TV_EMBEDDED,
    CONSERVATIVE,
    BYPASS,
    LAST_RESORT,
];

const COLLECTION_VIDEO: AttemptProfile = AttemptProfile {
    name: "collection",
    sleep: Some(pacing::COLLECTION_VIDEO),
    retries: DEFAULT_RETRIES,
    rate_limit: Some(DEFAULT_RATE_LIMIT),
    sleep_requests: Some(DEFAULT_REQUEST_DELAY),
    ..PRIMARY
};

const COLLECTION_AUDIO: AttemptProfile = AttemptProfile {
    sleep: Some(pacing::COLLECTION_AUDIO),
    rate_limit: Some(CONSERVATIVE_RATE_LIMIT),
    sleep_requests: Some(AUDIO_REQUEST_DELAY),
    ..COLLECTION_VIDEO
};

/// Rungs to walk for a request, in order
pub fn ladder(audio_only: bool) -> &'static [AttemptProfile] {
    if audio_only {
        AUDIO_LADDER
    } else {
        VIDEO_LADDER
    }
}

/// Single profile used for a whole playlist download
pub fn collection_profile(audio_only: bool) -> &'static AttemptProfile {
    if audio_only {
        &COLLECTION_AUDIO
    } else {
        &COLLECTION_VIDEO
    }
}

impl AttemptProfile {
    fn resolve_format(&self, request: &DownloadRequest) -> String {
        match self.format {
            FormatChoice::Requested => {
                FormatSelector::selector_for(request.quality, request.audio_only)
            }
            FormatChoice::Fixed(selector) => selector.to_string(),
            FormatChoice::Worst if request.audio_only => format_selectors::WORST_AUDIO.to_string(),
            FormatChoice::Worst => format_selectors::WORST_VIDEO.to_string(),
        }
    }

    fn resolve_post_process(&self, audio_only: bool) -> Option<PostProcess> {
        match self.post_process {
            PostProcessChoice::WhenAudio(quality) if audio_only => Some(PostProcess::ExtractAudio {
                codec: AUDIO_CODEC,
                quality,
            }),
            PostProcessChoice::WhenAudio(_) | PostProcessChoice::None => None,
        }
    }

    /// Engine options for one single-item attempt with this profile
    pub fn to_engine_options(
        &self,
        request: &DownloadRequest,
        config: &FetchConfig,
        output_template: PathBuf,
    ) -> EngineOptions {
        EngineOptions {
            format: Some(self.resolve_format(request)),
            output_template: Some(output_template),
            user_agent: self.identity.user_agent,
            player_client: self.identity.player_client,
            headers: if self.identity.browser_headers {
                BROWSER_HEADERS.to_vec()
            } else {
                Vec::new()
            },
            skip_streaming_protocols: self.skip_streaming_protocols,
            sleep: self.sleep,
            sleep_requests: self.sleep_requests,
            retries: Some(self.retries),
            fragment_retries: self.fragment_retries,
            extractor_retries: self.extractor_retries,
            socket_timeout: std::time::Duration::from_secs(request.timeout_secs),
            rate_limit: self.rate_limit,
            post_processor: self.resolve_post_process(request.audio_only),
            no_playlist: true,
            proxy: config.proxy.clone(),
            cookies_path: config.cookies_path.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::Quality;

    fn names(ladder: &[AttemptProfile]) -> Vec<&'static str> {
        ladder.iter().map(|p| p.name).collect()
    }

    #[test]
    fn test_video_ladder_shape() {
        assert_eq!(
            names(ladder(false)),
            vec!["primary", "conservative", "last_resort"]
        );
    }

    #[test]
    fn test_audio_ladder_shape() {
        let audio = names(ladder(true));
        assert_eq!(audio.len(), 10);
        assert_eq!(audio[0], "primary");
        assert_eq!(audio.iter().filter(|n| n.starts_with("audio_")).count(), 6);
        assert_eq!(&audio[7..], &["conservative", "bypass", "last_resort"]);
    }

    #[test]
    fn test_pacing_escalates() {
        assert_eq!(PRIMARY.sleep, Some(pacing::PRIMARY));
        assert_eq!(CONSERVATIVE.sleep, Some(SleepBounds::new(10, 25)));
        assert_eq!(LAST_RESORT.sleep, Some(SleepBounds::new(30, 60)));
        assert_eq!(PRIMARY.retries, 3);
        assert_eq!(CONSERVATIVE.retries, 1);
        assert_eq!(BYPASS.retries, 1);
        assert_eq!(LAST_RESORT.retries, 1);
    }

    #[test]
    fn test_primary_uses_requested_quality() {
        let request = DownloadRequest::default().with_quality(Quality::HeightCeiling(480));
        let options = PRIMARY.to_engine_options(&request, &FetchConfig::default(), "out".into());
        assert_eq!(options.format.as_deref(), Some("best[height<=480]/best"));
        assert!(options.post_processor.is_none());
        assert!(options.no_playlist);
        assert_eq!(options.retries, Some(3));
    }

    #[test]
    fn test_audio_primary_extracts_mp3() {
        let request = DownloadRequest::default().with_audio_only(true);
        let options = PRIMARY.to_engine_options(&request, &FetchConfig::default(), "out".into());
        assert_eq!(
            options.post_processor,
            Some(PostProcess::ExtractAudio {
                codec: "mp3",
                quality: 192
            })
        );
    }

    #[test]
    fn test_bypass_skips_streaming_protocols() {
        let request = DownloadRequest::default().with_audio_only(true);
        let options = BYPASS.to_engine_options(&request, &FetchConfig::default(), "out".into());
        assert!(options.skip_streaming_protocols);
        assert_eq!(options.format.as_deref(), Some(format_selectors::WORST_AUDIO));
    }

    #[test]
    fn test_last_resort_is_stripped_down() {
        let video = DownloadRequest::default();
        let options = LAST_RESORT.to_engine_options(&video, &FetchConfig::default(), "out".into());
        assert_eq!(options.format.as_deref(), Some("worst"));
        assert!(options.user_agent.is_none());
        assert!(options.player_client.is_none());
        assert!(options.fragment_retries.is_none());
    }

    #[test]
    fn test_web_rung_sends_browser_headers() {
        let request = DownloadRequest::default().with_audio_only(true);
        let options = AUDIO_WEB.to_engine_options(&request, &FetchConfig::default(), "out".into());
        assert_eq!(options.headers.len(), BROWSER_HEADERS.len());
        assert_eq!(options.player_client, Some("web"));
    }

    #[test]
    fn test_collection_profiles() {
        let video = collection_profile(false);
        let audio = collection_profile(true);
        assert_eq!(video.sleep, Some(SleepBounds::new(15, 25)));
        assert_eq!(audio.sleep, Some(SleepBounds::new(25, 45)));
        assert_eq!(video.rate_limit, Some(150_000));
        assert_eq!(audio.rate_limit, Some(75_000));
        assert_eq!(audio.sleep_requests, Some(8));
    }

    #[test]
    fn test_network_settings_pass_through() {
        let config = FetchConfig::default().with_proxy(Some("socks5://127.0.0.1:1080".into()));
        let request = DownloadRequest::default().with_timeout(12);
        let options = CONSERVATIVE.to_engine_options(&request, &config, "out".into());
        assert_eq!(options.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(options.socket_timeout.as_secs(), 12);
    }
}
