use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use video_compositor::Config;

/// Test harness that runs the service in-process on a free port.
struct TestServer {
    _handle: JoinHandle<()>,
    port: u16,
    client: reqwest::Client,
    workspace: String,
}

impl TestServer {
    async fn start() -> Self {
        // Only open when debugging
        // tracing_subscriber::fmt::init();

        let port = portpicker::pick_unused_port().expect("No available port");

        let test_id = uuid::Uuid::new_v4().to_string();
        let workspace = format!("/tmp/test-workspace-{test_id}");
        std::fs::create_dir_all(&workspace).expect("Failed to create test workspace");

        let config = Config {
            listen_on_port: port,
            workspace: workspace.clone(),
            download_timeout_secs: 2,
            ..Default::default()
        };

        let handle = tokio::spawn(async move {
            video_compositor::run(config).await;
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        sleep(Duration::from_millis(1)).await;
        // Poll until the server is ready
        for _ in 0..50 {
            if let Ok(response) = client
                .get(format!("http://127.0.0.1:{port}/health"))
                .send()
                .await
                && response.status().is_success()
            {
                break;
            }

            sleep(Duration::from_millis(10)).await;
        }

        TestServer {
            _handle: handle,
            port,
            client,
            workspace,
        }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.workspace);
    }
}

#[tokio::test]
async fn health_endpoint_responds() {
    let server = TestServer::start().await;

    let response = server
        .client
        .get(format!("{}/health", server.url()))
        .send()
        .await
        .expect("Health request failed");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn stitch_requires_at_least_two_videos() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(format!("{}/stitch", server.url()))
        .json(&serde_json::json!({ "video_urls": ["http://example.com/only.mp4"] }))
        .send()
        .await
        .expect("Stitch request failed");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "At least 2 videos are required");
}

#[tokio::test]
async fn extract_frames_requires_timestamps() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(format!("{}/extract-frames", server.url()))
        .json(&serde_json::json!({
            "video_url": "http://example.com/video.mp4",
            "timestamps": []
        }))
        .send()
        .await
        .expect("Extract-frames request failed");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "At least one timestamp is required");
}

#[tokio::test]
async fn merge_reports_unfetchable_input_as_client_error() {
    let server = TestServer::start().await;

    // Nothing listens on the discard port, so the download fails fast.
    let response = server
        .client
        .post(format!("{}/merge", server.url()))
        .json(&serde_json::json!({
            "video_url": "http://127.0.0.1:9/video.mp4",
            "audio_url": "http://127.0.0.1:9/audio.mp3"
        }))
        .send()
        .await
        .expect("Merge request failed");

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("failed to download file"),
        "unexpected detail: {}",
        body["detail"]
    );
}

#[tokio::test]
async fn merge_rejects_malformed_body() {
    let server = TestServer::start().await;

    let response = server
        .client
        .post(format!("{}/merge", server.url()))
        .json(&serde_json::json!({ "video_url": "http://example.com/v.mp4" }))
        .send()
        .await
        .expect("Merge request failed");

    // Missing audio_url is rejected by body deserialization.
    assert_eq!(response.status(), 422);
}
