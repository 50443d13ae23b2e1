//! Integration tests for metadata resolution.

use std::sync::Arc;

use serde_json::json;
use youtube_fetch::{ContentInfo, ErrorKind, FetchConfig, FetchError, MetadataResolver};

mod support;
use support::{init_tracing, ScriptedEngine};

const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=PLtest123";
const HYBRID_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLtest123";

fn resolver(engine: &Arc<ScriptedEngine>) -> MetadataResolver {
    MetadataResolver::new(engine.clone(), FetchConfig::default())
}

fn video_json() -> serde_json::Value {
    json!({
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "uploader": "Rick Astley",
        "duration": 212,
        "webpage_url": VIDEO_URL,
        "formats": [
            {"height": 360, "ext": "mp4", "vcodec": "avc1"},
            {"height": 720, "ext": "mp4", "vcodec": "avc1"},
            {"height": 720, "ext": "mp4", "vcodec": "avc1"},
            {"ext": "m4a", "vcodec": "none"}
        ]
    })
}

fn playlist_json(count: usize) -> serde_json::Value {
    json!({
        "_type": "playlist",
        "id": "PLtest123",
        "title": "Mix",
        "playlist_count": count,
        "entries": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}]
    })
}

#[tokio::test]
async fn test_describe_video() {
    init_tracing();
    let engine = ScriptedEngine::new();
    engine.push_info(video_json());

    let info = resolver(&engine).describe_video(VIDEO_URL).await.unwrap();

    assert_eq!(info.title, "Never Gonna Give You Up");
    assert_eq!(info.uploader, "Rick Astley");
    assert_eq!(info.duration_seconds, Some(212));
    let heights: Vec<u32> = info.formats.iter().map(|f| f.height).collect();
    assert_eq!(heights.len(), 2);
    assert!(heights.contains(&720));
    assert!(heights.contains(&360));
}

#[tokio::test]
async fn test_describe_video_strips_playlist_context() {
    let engine = ScriptedEngine::new();
    engine.push_info(video_json());

    resolver(&engine).describe_video(HYBRID_URL).await.unwrap();

    assert_eq!(engine.info_urls(), vec![VIDEO_URL.to_string()]);
}

#[tokio::test]
async fn test_collection_over_limit_is_refused() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(250));

    let err = resolver(&engine)
        .describe_collection(PLAYLIST_URL)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::CollectionTooLarge {
            count: 250,
            threshold: 200
        }
    );
}

#[tokio::test]
async fn test_collection_at_limit_is_accepted() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(200));

    let info = resolver(&engine)
        .describe_collection(PLAYLIST_URL)
        .await
        .unwrap();

    assert_eq!(info.item_count, 200);
}

#[tokio::test]
async fn test_empty_collection_is_refused() {
    let engine = ScriptedEngine::new();
    engine.push_info(json!({"_type": "playlist", "title": "Nothing", "entries": []}));

    let err = resolver(&engine)
        .describe_collection(PLAYLIST_URL)
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::CollectionEmpty);
}

#[tokio::test]
async fn test_collection_estimate_and_preview() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(30));

    let info = resolver(&engine)
        .describe_collection(PLAYLIST_URL)
        .await
        .unwrap();

    assert_eq!(info.title, "Mix");
    assert_eq!(info.estimated_minutes, 10.0);
    assert_eq!(info.preview_entries.len(), 2);
    assert_eq!(info.preview_entries[0].index, 1);
}

#[tokio::test]
async fn test_private_collection() {
    let engine = ScriptedEngine::new();
    engine.push_info_failure("ERROR: [youtube:tab] PLtest123: This playlist is private");

    let err = resolver(&engine)
        .describe_collection(PLAYLIST_URL)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CollectionPrivateOrUnavailable);
}

#[tokio::test]
async fn test_timeout_reports_configured_seconds() {
    let engine = ScriptedEngine::new();
    engine.push_info_failure("ERROR: Read timed out.");

    let config = FetchConfig::default().with_socket_timeout(17);
    let err = MetadataResolver::new(engine.clone(), config)
        .describe_video(VIDEO_URL)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FetchError::NetworkTimeout {
            timeout_secs: 17,
            ..
        }
    ));
}

#[tokio::test]
async fn test_invalid_urls_never_reach_engine() {
    let engine = ScriptedEngine::new();
    let r = resolver(&engine);

    let err = r.describe_video("https://example.com/watch?v=x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    let err = r.describe_collection("ftp://youtube.com/playlist?list=PL1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    let err = r.describe_content("").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUrl);

    assert_eq!(engine.total_calls(), 0);
}

#[tokio::test]
async fn test_describe_content_video() {
    let engine = ScriptedEngine::new();
    engine.push_info(video_json());

    match resolver(&engine).describe_content(VIDEO_URL).await.unwrap() {
        ContentInfo::Video(info) => assert_eq!(info.id, "dQw4w9WgXcQ"),
        other => panic!("expected video, got {other:?}"),
    }
}

#[tokio::test]
async fn test_describe_content_collection() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(12));

    match resolver(&engine).describe_content(PLAYLIST_URL).await.unwrap() {
        ContentInfo::Collection(info) => assert_eq!(info.item_count, 12),
        other => panic!("expected collection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_describe_content_hybrid() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(4));
    engine.push_info(video_json());

    match resolver(&engine).describe_content(HYBRID_URL).await.unwrap() {
        ContentInfo::Hybrid(info) => {
            assert_eq!(info.collection.item_count, 4);
            assert_eq!(info.video.title, "Never Gonna Give You Up");
        }
        other => panic!("expected hybrid, got {other:?}"),
    }

    let urls = engine.info_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0], HYBRID_URL);
    assert_eq!(urls[1], VIDEO_URL);
}

#[tokio::test]
async fn test_describe_content_hybrid_video_failure_names_the_part() {
    let engine = ScriptedEngine::new();
    engine.push_info(playlist_json(4));
    engine.push_info_failure("ERROR: [youtube] dQw4w9WgXcQ: Video unavailable");

    let err = resolver(&engine)
        .describe_content(HYBRID_URL)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::VideoUnavailable);
    assert!(err.to_string().contains("video: ERROR"));
}

#[tokio::test]
async fn test_describe_content_hybrid_playlist_failure_names_the_part() {
    let engine = ScriptedEngine::new();
    engine.push_info_failure("ERROR: [youtube:tab] PLtest123: This playlist is private");

    let err = resolver(&engine)
        .describe_content(HYBRID_URL)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CollectionPrivateOrUnavailable);
    assert!(err.to_string().contains("playlist: ERROR"));
    assert_eq!(engine.info_calls(), 1);
}

#[tokio::test]
async fn test_describe_content_plain_playlist_failure_is_not_prefixed() {
    let engine = ScriptedEngine::new();
    engine.push_info_failure("ERROR: [youtube:tab] PLtest123: This playlist is private");

    let err = resolver(&engine)
        .describe_content(PLAYLIST_URL)
        .await
        .unwrap_err();

    assert!(!err.to_string().contains("playlist: ERROR"));
}
