//! Store behaviour against a mocked Firestore REST endpoint.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vpipe_firestore::{FirestoreClient, FirestoreConfig, FirestoreJobStore, FirestoreVideoStore};
use vpipe_models::{JobId, JobStatus, JobTask, Quality, VideoId};
use vpipe_store::{JobStore, StoreError, VideoStore};

async fn client(server: &MockServer) -> FirestoreClient {
    let config = FirestoreConfig::emulator(server.address().to_string(), "test");
    FirestoreClient::new(config).unwrap()
}

fn job_document(id: &str, status: &str, created_at: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/test/databases/(default)/documents/jobs/{}", id),
        "fields": {
            "id": {"stringValue": id},
            "video_id": {"stringValue": "v1"},
            "type": {"stringValue": "transcode"},
            "status": {"stringValue": status},
            "progress": {"integerValue": "30"},
            "payload": {"mapValue": {"fields": {"quality": {"stringValue": "720p"}}}},
            "created_at": {"timestampValue": created_at},
            "updated_at": {"timestampValue": created_at}
        }
    })
}

#[tokio::test]
async fn test_get_job_parses_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/jobs/j1$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(job_document(
                "j1",
                "processing",
                "2024-05-01T10:00:00Z",
            )),
        )
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    let job = store.get_by_id(&JobId::from("j1")).await.unwrap();

    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 30);
    assert_eq!(
        job.task,
        JobTask::Transcode {
            quality: Quality::P720
        }
    );
}

#[tokio::test]
async fn test_get_missing_job_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/jobs/missing$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    let err = store.get_by_id(&JobId::from("missing")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_create_conflict_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents/jobs$"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": 409, "status": "ALREADY_EXISTS"}
        })))
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    let job = vpipe_models::Job::new(VideoId::from("v1"), JobTask::Thumbnail);
    let err = store.create(&job).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_update_missing_job_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"/documents/jobs/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    let job = vpipe_models::Job::new(VideoId::from("v1"), JobTask::Thumbnail);
    assert!(store.update(&job).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_pending_jobs_query_skips_read_time_only_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":runQuery$"))
        .and(body_string_contains("\"pending\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": job_document("a", "pending", "2024-05-01T10:00:00Z"), "readTime": "x"},
            {"document": job_document("b", "pending", "2024-05-01T10:05:00Z"), "readTime": "x"},
            {"readTime": "x"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    let pending = store.get_pending_jobs(10).await.unwrap();

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, JobId::from("a"));
}

#[tokio::test]
async fn test_update_progress_uses_field_mask() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"/documents/jobs/j1$"))
        .and(query_param("updateMask.fieldPaths", "progress"))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = FirestoreJobStore::new(client(&server).await);
    store.update_progress(&JobId::from("j1"), 80).await.unwrap();
}

#[tokio::test]
async fn test_append_thumbnail_is_server_side_transform() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":batchWrite$"))
        .and(body_string_contains("appendMissingElements"))
        .and(body_string_contains("v1_thumb.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{}],
            "status": [{}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = FirestoreVideoStore::new(client(&server).await);
    store
        .append_thumbnail(&VideoId::from("v1"), "v1_thumb.jpg")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_append_to_missing_video_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":batchWrite$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{}],
            "status": [{"code": 5, "message": "no entity to update"}]
        })))
        .mount(&server)
        .await;

    let store = FirestoreVideoStore::new(client(&server).await);
    let err = store
        .append_thumbnail(&VideoId::from("gone"), "gone_thumb.jpg")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
