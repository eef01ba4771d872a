//! End-to-end pipeline tests for posts and reels.
//!
//! These drive [`Pipeline::process_message`] with a scripted content
//! client, a recording delivery sink, mock HTTP media endpoints, and a
//! temporary staging root.

mod support;

use std::sync::Arc;

use gramfetch::client::{ClientError, ContentClient, DeclaredType, MediaKind, Rendition};
use gramfetch::deliver::{ButtonAction, DeliverySink};
use gramfetch::pipeline::{Credentials, Pipeline};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{RecordingSink, ScriptedClient, photo_info};

const CHAT: i64 = 1001;

fn make_pipeline(
    client: Arc<ScriptedClient>,
    sink: Arc<RecordingSink>,
    root: &TempDir,
) -> Pipeline {
    let client_dyn: Arc<dyn ContentClient> = client;
    let sink_dyn: Arc<dyn DeliverySink> = sink;
    Pipeline::new(
        client_dyn,
        sink_dyn,
        Credentials {
            username: "bot-account".to_string(),
            password: "hunter2".to_string(),
        },
        root.path().to_path_buf(),
        root.path().join("session.json"),
    )
}

#[tokio::test]
async fn test_photo_post_end_to_end() {
    let root = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient {
        photo_bytes: Some(b"jpeg bytes".to_vec()),
        ..ScriptedClient::with_info(photo_info(Some("golden hour #nofilter")))
    });
    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CxyzAbc123/")
        .await;

    // Exactly one image delivered, bare filename without an index suffix.
    let documents = sink.documents.lock().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document.filename, "CxyzAbc123.jpg");
    assert_eq!(documents[0].document.kind, MediaKind::Image);
    assert_eq!(documents[0].document.caption, "Image");
    assert_eq!(documents[0].bytes, b"jpeg bytes");
    drop(documents);

    // Summary message with hashtags stripped and a profile URL button.
    let texts = sink.texts.lock().unwrap();
    let summary = texts
        .iter()
        .find(|(_, text, _)| text.contains("📝 Caption:"))
        .expect("summary message sent");
    assert!(summary.1.contains("golden hour"));
    assert!(!summary.1.contains('#'));
    let keyboard = summary.2.as_ref().expect("summary carries a keyboard");
    assert!(matches!(
        &keyboard[0][0].action,
        ButtonAction::Url(url) if url == "https://instagram.com/somebody"
    ));
    drop(texts);

    // Final status names the content kind and counts one image.
    let final_text = sink.last_edit().unwrap();
    assert!(final_text.contains("✅ Downloaded post 📑 from @somebody!"));
    assert!(final_text.contains("👉 1 image(s)"));

    // Delivered file removed, empty staging directory removed.
    assert!(!root.path().join("CxyzAbc123").exists());
}

#[tokio::test]
async fn test_invalid_url_is_rejected_without_processing() {
    let root = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::default());
    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline.process_message(CHAT, "not a link at all").await;

    let texts = sink.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].1, "Please send a valid Instagram URL.");
    assert!(sink.documents.lock().unwrap().is_empty());
    // No staging directory was created for a rejected message.
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_video_post_selects_highest_width_rendition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v_720.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"720p bytes"))
        .mount(&server)
        .await;

    let mut info = photo_info(None);
    info.declared = DeclaredType::Video;
    info.video_versions = [480u32, 720, 360]
        .iter()
        .map(|w| Rendition {
            url: format!("{}/v_{w}.mp4", server.uri()),
            width: *w,
        })
        .collect();

    let root = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient::with_info(info));
    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/reel/Dq1w2e3r4/")
        .await;

    let documents = sink.documents.lock().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document.filename, "Dq1w2e3r4.mp4");
    assert_eq!(documents[0].document.kind, MediaKind::Video);
    assert_eq!(documents[0].bytes, b"720p bytes");
    drop(documents);

    let final_text = sink.last_edit().unwrap();
    assert!(final_text.contains("✅ Downloaded reel 📱 from @somebody!"));
    assert!(final_text.contains("👉 1 video(s)"));
}

#[tokio::test]
async fn test_album_delivers_indexed_filenames_in_api_order() {
    let root = TempDir::new().unwrap();
    let mut info = photo_info(Some("trip"));
    info.declared = DeclaredType::Album;

    let client = Arc::new(ScriptedClient {
        album_files: vec![
            ("first.jpg".to_string(), b"one".to_vec()),
            ("second.jpg".to_string(), b"two".to_vec()),
            ("third.jpg".to_string(), b"three".to_vec()),
        ],
        ..ScriptedClient::with_info(info)
    });
    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CalbumCode/")
        .await;

    assert_eq!(
        sink.sent_filenames(),
        vec!["CalbumCode_1.jpg", "CalbumCode_2.jpg", "CalbumCode_3.jpg"]
    );
    let documents = sink.documents.lock().unwrap();
    assert_eq!(documents[1].document.caption, "Image 2/3");
}

#[tokio::test]
async fn test_empty_batch_shows_not_found_message() {
    let root = TempDir::new().unwrap();
    // Photo post whose downloaded file turns out to be empty.
    let client = Arc::new(ScriptedClient {
        photo_bytes: Some(Vec::new()),
        ..ScriptedClient::with_info(photo_info(None))
    });
    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CxyzAbc123/")
        .await;

    assert!(sink.documents.lock().unwrap().is_empty());
    let final_text = sink.last_edit().unwrap();
    assert!(final_text.contains("⚠️ Could not download"));
    assert!(final_text.contains("The account is private"));
}

#[tokio::test]
async fn test_login_required_triggers_exactly_one_relogin_and_retry() {
    let root = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient {
        photo_bytes: Some(b"jpeg bytes".to_vec()),
        ..ScriptedClient::default()
    });
    client.push_info(Err(ClientError::LoginRequired));
    client.push_info(Ok(photo_info(None)));

    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CxyzAbc123/")
        .await;

    assert_eq!(client.login_count(), 1, "exactly one re-login");
    assert_eq!(
        *client.session_saves.lock().unwrap(),
        1,
        "refreshed session is persisted"
    );
    assert_eq!(sink.documents.lock().unwrap().len(), 1);
    assert!(sink.last_edit().unwrap().contains("✅ Downloaded"));
}

#[tokio::test]
async fn test_second_login_failure_is_terminal() {
    let root = TempDir::new().unwrap();
    let client = Arc::new(ScriptedClient {
        reject_login: true,
        ..ScriptedClient::default()
    });
    client.push_info(Err(ClientError::LoginRequired));

    let sink = Arc::new(RecordingSink::default());
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CxyzAbc123/")
        .await;

    assert_eq!(client.login_count(), 1, "no second retry");
    assert!(sink.documents.lock().unwrap().is_empty());
    let final_text = sink.last_edit().unwrap();
    assert!(final_text.contains("❌ Something went wrong"));
}

#[tokio::test]
async fn test_failed_delivery_leaves_file_for_inspection() {
    let root = TempDir::new().unwrap();
    let mut info = photo_info(None);
    info.declared = DeclaredType::Album;

    let client = Arc::new(ScriptedClient {
        album_files: vec![
            ("a.jpg".to_string(), b"one".to_vec()),
            ("b.jpg".to_string(), b"two".to_vec()),
        ],
        ..ScriptedClient::with_info(info)
    });
    let sink = Arc::new(RecordingSink {
        fail_documents: vec!["CalbumCode_2.jpg".to_string()],
        ..RecordingSink::default()
    });
    let pipeline = make_pipeline(client.clone(), sink.clone(), &root);

    pipeline
        .process_message(CHAT, "https://www.instagram.com/p/CalbumCode/")
        .await;

    // One delivered, one failed; the batch was not aborted.
    assert_eq!(sink.sent_filenames(), vec!["CalbumCode_1.jpg"]);
    let staging = root.path().join("CalbumCode");
    assert!(
        staging.join("b.jpg").exists(),
        "failed-to-deliver file stays on disk"
    );
    assert!(
        !staging.join("a.jpg").exists(),
        "delivered file is removed"
    );
    assert!(staging.exists(), "non-empty staging directory is kept");

    let final_text = sink.last_edit().unwrap();
    assert!(final_text.contains("👉 1 image(s)"));
}
