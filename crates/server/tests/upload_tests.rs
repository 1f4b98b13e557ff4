//! Upload endpoint: multipart in, NDJSON progress out, record and media
//! retrievable afterwards.

mod common;

use axum::http::StatusCode;
use common::{Part, TestConfig, TestFixture};
use reelpipe_core::testing::MOCK_FRAME_BYTES;
use reelpipe_core::VideoCatalog;

#[tokio::test]
async fn test_upload_streams_progress_until_done() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload(
            &[
                Part::file("video", "clip.mp4", b"raw video bytes"),
                Part::text("title", "Morning run"),
                Part::text("description", "Along the river #Running #morning"),
            ],
            None,
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("application/x-ndjson"));

    let lines = response.lines();
    assert!(lines.len() >= 3, "too few progress lines: {}", response.text());

    let (last, rest) = lines.split_last().unwrap();
    assert_eq!(last["done"], true);
    assert_eq!(last["percent"], 100);
    assert_eq!(last["outcome"]["result"], "succeeded");
    assert!(rest.iter().all(|line| line["done"] == false));

    let job_id = last["job_id"].as_str().unwrap();
    assert!(!job_id.is_empty());
    assert!(rest.iter().all(|line| line["job_id"] == job_id));

    let percents: Vec<u64> = lines.iter().map(|l| l["percent"].as_u64().unwrap()).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);

    assert_eq!(
        last["stream_url"],
        format!("/api/v1/stream/{}/master.m3u8", job_id)
    );
}

#[tokio::test]
async fn test_uploaded_video_is_cataloged() {
    let fixture = TestFixture::new().await;
    let id = fixture
        .upload_video("Morning run", "Along the river #Running #morning")
        .await;

    let response = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_json_path!(response.body, "title", "Morning run");
    assert_json_path!(response.body, "owner", "anonymous");
    assert_json_path!(response.body, "views", 0);
    assert_eq!(
        response.body["hashtags"],
        serde_json::json!(["running", "morning"])
    );
    assert_eq!(
        response.body["available_qualities"],
        serde_json::json!(["360p", "720p", "1080p"])
    );
}

#[tokio::test]
async fn test_uploaded_renditions_are_served() {
    let fixture = TestFixture::new().await;
    let id = fixture.upload_video("Served", "").await;
    let record = fixture.catalog.get(&id).unwrap();
    let folder = record.storage_folder;

    let master = fixture
        .get(&format!("/api/v1/stream/{}/master.m3u8", folder))
        .await;
    assert_status!(master, StatusCode::OK);
    assert_eq!(
        master.content_type.as_deref(),
        Some("application/vnd.apple.mpegurl")
    );
    let text = master.text();
    assert!(text.starts_with("#EXTM3U"));
    assert!(text.contains("360p/index.m3u8"));
    assert!(text.contains("1080p/index.m3u8"));

    let playlist = fixture
        .get(&format!("/api/v1/stream/{}/720p/index.m3u8", folder))
        .await;
    assert_status!(playlist, StatusCode::OK);

    let segment = fixture
        .get(&format!("/api/v1/stream/{}/720p/000.ts", folder))
        .await;
    assert_status!(segment, StatusCode::OK);
    assert_eq!(segment.content_type.as_deref(), Some("video/MP2T"));
    assert!(!segment.bytes.is_empty());

    let file = record.thumbnail.rsplit('/').next().unwrap().to_string();
    let poster = fixture.get(&format!("/api/v1/thumbnails/{}", file)).await;
    assert_status!(poster, StatusCode::OK);
    assert_eq!(poster.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(poster.bytes, MOCK_FRAME_BYTES);
}

#[tokio::test]
async fn test_upload_with_partial_encode_failure() {
    let fixture = TestFixture::new().await;
    fixture.encoder.fail_label("1080p").await;

    let id = fixture.upload_video("Partial", "").await;

    let record = fixture.get(&format!("/api/v1/videos/{}", id)).await;
    assert_eq!(
        record.body["available_qualities"],
        serde_json::json!(["360p", "720p"])
    );

    let folder = record.body["storage_folder"].as_str().unwrap();
    let missing = fixture
        .get(&format!("/api/v1/stream/{}/1080p/index.m3u8", folder))
        .await;
    assert_status!(missing, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_total_encode_failure() {
    let fixture = TestFixture::new().await;
    for label in ["360p", "720p", "1080p"] {
        fixture.encoder.fail_label(label).await;
    }

    let response = fixture
        .upload(
            &[
                Part::file("video", "clip.mp4", b"raw"),
                Part::text("title", "Doomed"),
            ],
            None,
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let last = response.lines().pop().unwrap();
    assert_eq!(last["done"], true);
    assert_eq!(last["outcome"]["result"], "failed");
    assert_eq!(last["outcome"]["error"], "total_encode_failure");
    assert!(last.get("stream_url").is_none());

    let list = fixture.get("/api/v1/videos").await;
    assert_json_path!(list.body, "total", 0);
}

#[tokio::test]
async fn test_upload_without_video_is_input_error() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .upload(&[Part::text("title", "No file")], None)
        .await;

    assert_status!(response, StatusCode::OK);
    let lines = response.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["done"], true);
    assert_eq!(lines[0]["job_id"], "");
    assert_eq!(lines[0]["outcome"]["error"], "input_error");
}

#[tokio::test]
async fn test_supplied_thumbnail_is_used() {
    let fixture = TestFixture::new().await;
    let png = b"\x89PNG\r\n\x1a\nfake";

    let response = fixture
        .upload(
            &[
                Part::file("video", "clip.mp4", b"raw"),
                Part::file("thumbnail", "cover.png", png),
                Part::text("title", "Covered"),
            ],
            None,
        )
        .await;
    let last = response.lines().pop().unwrap();
    let id = last["outcome"]["record_id"].as_str().unwrap().to_string();

    let record = fixture.catalog.get(&id).unwrap();
    assert!(record.thumbnail.ends_with(".png"), "{}", record.thumbnail);
    assert!(fixture.encoder.captures().await.is_empty());

    let file = record.thumbnail.rsplit('/').next().unwrap().to_string();
    let poster = fixture.get(&format!("/api/v1/thumbnails/{}", file)).await;
    assert_eq!(poster.content_type.as_deref(), Some("image/png"));
    assert_eq!(poster.bytes, png);
}

#[tokio::test]
async fn test_upload_requires_api_key_when_configured() {
    let fixture = TestFixture::with_config(TestConfig::with_api_key("k-1", "alice")).await;
    let parts = [
        Part::file("video", "clip.mp4", b"raw"),
        Part::text("title", "Keyed"),
    ];

    let rejected = fixture.upload(&parts, None).await;
    assert_status!(rejected, StatusCode::UNAUTHORIZED);

    let accepted = fixture.upload(&parts, Some("k-1")).await;
    assert_status!(accepted, StatusCode::OK);
    let last = accepted.lines().pop().unwrap();
    let id = last["outcome"]["record_id"].as_str().unwrap();

    assert_eq!(fixture.catalog.get(id).unwrap().owner, "alice");
}

#[tokio::test]
async fn test_concurrent_uploads_get_distinct_folders() {
    let fixture = TestFixture::new().await;

    let (a, b) = tokio::join!(
        fixture.upload_video("First", ""),
        fixture.upload_video("Second", "")
    );

    let a = fixture.catalog.get(&a).unwrap();
    let b = fixture.catalog.get(&b).unwrap();
    assert_ne!(a.storage_folder, b.storage_folder);
    assert_ne!(a.thumbnail, b.thumbnail);
}
