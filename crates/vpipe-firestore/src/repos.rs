//! Firestore-backed job and video stores.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use vpipe_models::{
    Job, JobId, JobPayload, JobRecord, JobStatus, JobType, Video, VideoFormat, VideoId,
    VideoStatus,
};
use vpipe_store::{JobStore, StoreResult, VideoStore};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    Direction, Document, DocumentMask, FieldTransform, FromFirestoreValue, Precondition,
    StructuredQuery, ToFirestoreValue, Value, Write,
};

/// Collection holding job documents.
pub const JOBS_COLLECTION: &str = "jobs";

/// Collection holding video documents.
pub const VIDEOS_COLLECTION: &str = "videos";

/// Job store over the `jobs` collection.
#[derive(Clone)]
pub struct FirestoreJobStore {
    client: FirestoreClient,
}

impl FirestoreJobStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    async fn query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Job>> {
        self.client
            .run_query(query)
            .await?
            .iter()
            .map(document_to_job)
            .collect()
    }
}

#[async_trait]
impl JobStore for FirestoreJobStore {
    async fn create(&self, job: &Job) -> StoreResult<()> {
        self.client
            .create_document(JOBS_COLLECTION, job.id.as_str(), job_to_fields(job))
            .await?;
        debug!(job_id = %job.id, "Created job document");
        Ok(())
    }

    async fn get_by_id(&self, id: &JobId) -> StoreResult<Job> {
        let doc = self
            .client
            .get_document(JOBS_COLLECTION, id.as_str())
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", JOBS_COLLECTION, id)))?;
        Ok(document_to_job(&doc)?)
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        self.client
            .update_document(JOBS_COLLECTION, job.id.as_str(), job_to_fields(job), None)
            .await?;
        Ok(())
    }

    async fn get_by_video_id(&self, video_id: &VideoId) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(JOBS_COLLECTION)
            .where_eq("video_id", video_id.as_str().to_firestore_value());
        Ok(self.query(query).await?)
    }

    async fn get_pending_jobs(&self, limit: usize) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(JOBS_COLLECTION)
            .where_eq("status", JobStatus::Pending.as_str().to_firestore_value())
            .order_by("created_at", Direction::Ascending)
            .limit(limit);
        Ok(self.query(query).await?)
    }

    async fn get_active_jobs(&self) -> StoreResult<Vec<Job>> {
        let query = StructuredQuery::collection(JOBS_COLLECTION)
            .where_eq("status", JobStatus::Processing.as_str().to_firestore_value());
        Ok(self.query(query).await?)
    }

    async fn update_progress(&self, id: &JobId, progress: u8) -> StoreResult<()> {
        vpipe_models::validate_progress(i64::from(progress))?;
        let mut fields = HashMap::new();
        fields.insert("progress".to_string(), progress.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                JOBS_COLLECTION,
                id.as_str(),
                fields,
                Some(&["progress", "updated_at"]),
            )
            .await?;
        Ok(())
    }
}

/// Video store over the `videos` collection.
#[derive(Clone)]
pub struct FirestoreVideoStore {
    client: FirestoreClient,
}

impl FirestoreVideoStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Append `value` to an array field and bump `updated_at` in one write.
    async fn append(&self, id: &VideoId, field: &str, value: Value) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        let write = Write {
            update: Some(Document::named(
                self.client.full_document_name(VIDEOS_COLLECTION, id.as_str()),
                fields,
            )),
            update_mask: Some(DocumentMask {
                field_paths: vec!["updated_at".to_string()],
            }),
            update_transforms: vec![FieldTransform::append(field, vec![value])],
            current_document: Some(Precondition::exists()),
        };

        self.client.batch_write(vec![write]).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoStore for FirestoreVideoStore {
    async fn create(&self, video: &Video) -> StoreResult<()> {
        self.client
            .create_document(VIDEOS_COLLECTION, video.id.as_str(), video_to_fields(video))
            .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &VideoId) -> StoreResult<Video> {
        let doc = self
            .client
            .get_document(VIDEOS_COLLECTION, id.as_str())
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", VIDEOS_COLLECTION, id)))?;
        Ok(document_to_video(&doc)?)
    }

    async fn update(&self, video: &Video) -> StoreResult<()> {
        self.client
            .update_document(VIDEOS_COLLECTION, video.id.as_str(), video_to_fields(video), None)
            .await?;
        Ok(())
    }

    async fn set_status(
        &self,
        id: &VideoId,
        status: VideoStatus,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        let mut mask = vec!["status", "updated_at"];
        if let Some(msg) = error_message {
            fields.insert("error_message".to_string(), msg.to_firestore_value());
            mask.push("error_message");
        }

        self.client
            .update_document(VIDEOS_COLLECTION, id.as_str(), fields, Some(&mask))
            .await?;
        Ok(())
    }

    async fn append_format(&self, id: &VideoId, format: &VideoFormat) -> StoreResult<()> {
        self.append(id, "formats", format_to_value(format)).await?;
        Ok(())
    }

    async fn append_thumbnail(&self, id: &VideoId, filename: &str) -> StoreResult<()> {
        self.append(id, "thumbnails", filename.to_firestore_value())
            .await?;
        Ok(())
    }

    async fn list_by_status(&self, status: VideoStatus) -> StoreResult<Vec<Video>> {
        let query = StructuredQuery::collection(VIDEOS_COLLECTION)
            .where_eq("status", status.as_str().to_firestore_value());
        let docs = self.client.run_query(query).await?;
        Ok(docs
            .iter()
            .map(document_to_video)
            .collect::<FirestoreResult<Vec<_>>>()?)
    }
}

// =============================================================================
// Field mapping
// =============================================================================

fn job_to_fields(job: &Job) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), job.id.as_str().to_firestore_value());
    fields.insert("video_id".to_string(), job.video_id.as_str().to_firestore_value());
    fields.insert("type".to_string(), job.job_type().as_str().to_firestore_value());
    fields.insert("status".to_string(), job.status.as_str().to_firestore_value());
    fields.insert("progress".to_string(), job.progress.to_firestore_value());
    fields.insert("payload".to_string(), payload_to_value(&job.task.payload()));
    fields.insert("created_at".to_string(), job.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), job.updated_at.to_firestore_value());

    if let Some(ref error) = job.error_message {
        fields.insert("error_message".to_string(), error.to_firestore_value());
    }
    if let Some(ref worker) = job.worker_id {
        fields.insert("worker_id".to_string(), worker.to_firestore_value());
    }
    if let Some(started) = job.started_at {
        fields.insert("started_at".to_string(), started.to_firestore_value());
    }
    if let Some(completed) = job.completed_at {
        fields.insert("completed_at".to_string(), completed.to_firestore_value());
    }

    fields
}

fn payload_to_value(payload: &JobPayload) -> Value {
    let mut fields = HashMap::new();
    if let Some(ref quality) = payload.quality {
        fields.insert("quality".to_string(), quality.to_firestore_value());
    }
    Value::map(fields)
}

fn document_to_job(doc: &Document) -> FirestoreResult<Job> {
    let fields = doc.fields()?;
    let reader = FieldReader::new(fields);

    let job_type = match reader.string("type").as_deref() {
        Some("transcode") => JobType::Transcode,
        Some("thumbnail") => JobType::Thumbnail,
        other => {
            return Err(FirestoreError::invalid_response(format!(
                "job document has unknown type {:?}",
                other
            )))
        }
    };

    let status = reader
        .string("status")
        .as_deref()
        .and_then(JobStatus::parse)
        .ok_or_else(|| FirestoreError::invalid_response("job document has no valid status"))?;

    let id = reader
        .string("id")
        .or_else(|| doc.id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("job document has no id"))?;

    let payload = JobPayload {
        quality: fields
            .get("payload")
            .and_then(Value::as_map)
            .and_then(|m| m.get("quality"))
            .and_then(String::from_firestore_value),
    };

    let record = JobRecord {
        id: JobId::from_string(id),
        video_id: VideoId::from_string(reader.string("video_id").unwrap_or_default()),
        job_type,
        status,
        progress: reader.u64("progress").unwrap_or(0).min(100) as u8,
        error_message: reader.string("error_message"),
        worker_id: reader.string("worker_id"),
        payload,
        created_at: reader.timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: reader.timestamp("updated_at").unwrap_or_else(Utc::now),
        started_at: reader.timestamp("started_at"),
        completed_at: reader.timestamp("completed_at"),
    };

    Job::try_from(record).map_err(|e| FirestoreError::invalid_response(e.to_string()))
}

fn video_to_fields(video: &Video) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), video.id.as_str().to_firestore_value());
    fields.insert("title".to_string(), video.title.to_firestore_value());
    fields.insert("description".to_string(), video.description.to_firestore_value());
    fields.insert("uploaded_by".to_string(), video.uploaded_by.to_firestore_value());
    fields.insert(
        "original_filename".to_string(),
        video.original_filename.to_firestore_value(),
    );
    fields.insert("duration".to_string(), video.duration.to_firestore_value());
    fields.insert("size".to_string(), video.size.to_firestore_value());
    fields.insert("status".to_string(), video.status.as_str().to_firestore_value());
    fields.insert(
        "formats".to_string(),
        Value::ArrayValue(crate::types::ArrayValue {
            values: Some(video.formats.iter().map(format_to_value).collect()),
        }),
    );
    fields.insert("thumbnails".to_string(), video.thumbnails.to_firestore_value());
    fields.insert("created_at".to_string(), video.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), video.updated_at.to_firestore_value());

    if let Some(ref error) = video.error_message {
        fields.insert("error_message".to_string(), error.to_firestore_value());
    }

    fields
}

fn format_to_value(format: &VideoFormat) -> Value {
    let mut fields = HashMap::new();
    fields.insert("quality".to_string(), format.quality.to_firestore_value());
    fields.insert("filename".to_string(), format.filename.to_firestore_value());
    fields.insert("size".to_string(), format.size.to_firestore_value());
    Value::map(fields)
}

fn document_to_video(doc: &Document) -> FirestoreResult<Video> {
    let fields = doc.fields()?;
    let reader = FieldReader::new(fields);

    let id = reader
        .string("id")
        .or_else(|| doc.id().map(str::to_string))
        .ok_or_else(|| FirestoreError::invalid_response("video document has no id"))?;

    let formats = fields
        .get("formats")
        .map(Value::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .map(|m| {
            let f = FieldReader::new(m);
            VideoFormat {
                quality: f.string("quality").unwrap_or_default(),
                filename: f.string("filename").unwrap_or_default(),
                size: f.u64("size").unwrap_or(0),
            }
        })
        .collect();

    let thumbnails = fields
        .get("thumbnails")
        .map(Value::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(String::from_firestore_value)
        .collect();

    Ok(Video {
        id: VideoId::from_string(id),
        title: reader.string("title").unwrap_or_default(),
        description: reader.string("description").unwrap_or_default(),
        uploaded_by: reader.string("uploaded_by").unwrap_or_default(),
        original_filename: reader.string("original_filename").unwrap_or_default(),
        duration: fields
            .get("duration")
            .and_then(f64::from_firestore_value)
            .unwrap_or(0.0),
        size: reader.u64("size").unwrap_or(0),
        status: reader
            .string("status")
            .as_deref()
            .and_then(VideoStatus::parse)
            .unwrap_or_default(),
        formats,
        thumbnails,
        error_message: reader.string("error_message"),
        created_at: reader.timestamp("created_at").unwrap_or_else(Utc::now),
        updated_at: reader.timestamp("updated_at").unwrap_or_else(Utc::now),
    })
}

/// Typed lookups over a field map.
struct FieldReader<'a> {
    fields: &'a HashMap<String, Value>,
}

impl<'a> FieldReader<'a> {
    fn new(fields: &'a HashMap<String, Value>) -> Self {
        Self { fields }
    }

    fn string(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(String::from_firestore_value)
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(u64::from_firestore_value)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.fields.get(key).and_then(DateTime::<Utc>::from_firestore_value)
    }
}
