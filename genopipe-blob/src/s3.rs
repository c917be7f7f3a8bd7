use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::retry::with_retry;
use crate::{
    BlobConfig, BlobError, BlobResult, BlobStore, BlobWriter, ByteStream, ObjectHead, PutOutcome,
    RetryPolicy,
};

/// S3-compatible blob store.
///
/// Reads map to `GetObject` and are consumed as a forward-only stream.
/// Writes buffer to part size and go through the multipart upload protocol,
/// so nothing is visible at the destination key until
/// `CompleteMultipartUpload` (or, for objects that fit a single buffer, one
/// atomic `PutObject`).
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    config: BlobConfig,
}

impl S3BlobStore {
    /// Create a store over an existing SDK client
    pub fn new(client: Client, config: BlobConfig) -> Self {
        Self { client, config }
    }

    /// Create a store from ambient AWS configuration (env/instance profile)
    pub async fn from_env(config: BlobConfig) -> Self {
        let aws_config =
            aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&aws_config), config)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn open_read(&self, bucket: &str, key: &str) -> BlobResult<ByteStream> {
        let client = self.client.clone();
        let (bucket_owned, key_owned) = (bucket.to_string(), key.to_string());

        // The open itself is retry-safe: no bytes have been delivered yet.
        let output = with_retry(&self.config.retry, "get_object", || {
            let client = client.clone();
            let (bucket, key) = (bucket_owned.clone(), key_owned.clone());
            async move {
                client
                    .get_object()
                    .bucket(&bucket)
                    .key(&key)
                    .send()
                    .await
                    .map_err(|err| classify_error(&bucket, &key, err))
            }
        })
        .await?;

        debug!(bucket, key, size = ?output.content_length(), "opened blob read stream");

        let mut body = output.body;
        let stream = async_stream::stream! {
            loop {
                match body.try_next().await {
                    Ok(Some(chunk)) => yield Ok(chunk),
                    Ok(None) => break,
                    Err(err) => {
                        // A broken in-flight body is not resumable without
                        // range requests, so it surfaces as fatal.
                        yield Err(std::io::Error::new(std::io::ErrorKind::Other, err));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn open_write(&self, bucket: &str, key: &str) -> BlobResult<Box<dyn BlobWriter>> {
        Ok(Box::new(S3Writer {
            client: self.client.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            part_size: self.config.part_size as usize,
            retry: self.config.retry.clone(),
            buffer: BytesMut::new(),
            upload_id: None,
            parts: Vec::new(),
            bytes_written: 0,
        }))
    }

    async fn head(&self, bucket: &str, key: &str) -> BlobResult<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify_error(bucket, key, err))?;

        Ok(ObjectHead {
            size_bytes: output.content_length().unwrap_or(0) as u64,
            etag: output.e_tag().map(str::to_string),
        })
    }
}

/// Buffered multipart writer. The multipart upload is created lazily on the
/// first part flush; until `commit` succeeds the destination key is
/// untouched. An abandoned multipart upload never publishes an object.
struct S3Writer {
    client: Client,
    bucket: String,
    key: String,
    part_size: usize,
    retry: RetryPolicy,
    buffer: BytesMut,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    bytes_written: u64,
}

impl S3Writer {
    async fn ensure_upload(&mut self) -> BlobResult<String> {
        if let Some(id) = &self.upload_id {
            return Ok(id.clone());
        }
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|err| classify_error(&self.bucket, &self.key, err))?;

        let id = output
            .upload_id()
            .ok_or_else(|| BlobError::invalid("backend returned no multipart upload id"))?
            .to_string();
        debug!(bucket = %self.bucket, key = %self.key, upload_id = %id, "created multipart upload");
        self.upload_id = Some(id.clone());
        Ok(id)
    }

    /// Upload one fully buffered part. Safe to retry: the part bytes stay
    /// owned here until the upload succeeds.
    async fn flush_part(&mut self, data: Bytes) -> BlobResult<()> {
        let upload_id = self.ensure_upload().await?;
        let part_number = self.parts.len() as i32 + 1;

        let client = self.client.clone();
        let (bucket, key) = (self.bucket.clone(), self.key.clone());
        let output = with_retry(&self.retry, "upload_part", || {
            let client = client.clone();
            let (bucket, key, upload_id) = (bucket.clone(), key.clone(), upload_id.clone());
            let body = data.clone();
            async move {
                client
                    .upload_part()
                    .bucket(&bucket)
                    .key(&key)
                    .upload_id(&upload_id)
                    .part_number(part_number)
                    .body(S3Body::from(body))
                    .send()
                    .await
                    .map_err(|err| classify_error(&bucket, &key, err))
            }
        })
        .await?;

        self.parts.push(
            CompletedPart::builder()
                .part_number(part_number)
                .set_e_tag(output.e_tag().map(str::to_string))
                .build(),
        );
        Ok(())
    }

    async fn abort_upload(&self) {
        if let Some(upload_id) = &self.upload_id {
            let result = self
                .client
                .abort_multipart_upload()
                .bucket(&self.bucket)
                .key(&self.key)
                .upload_id(upload_id)
                .send()
                .await;
            if let Err(err) = result {
                warn!(bucket = %self.bucket, key = %self.key, error = %err, "failed to abort multipart upload");
            }
        }
    }
}

#[async_trait]
impl BlobWriter for S3Writer {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        self.bytes_written += chunk.len() as u64;
        self.buffer.extend_from_slice(&chunk);

        while self.buffer.len() >= self.part_size {
            let part = self.buffer.split_to(self.part_size).freeze();
            if let Err(err) = self.flush_part(part).await {
                self.abort_upload().await;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> BlobResult<PutOutcome> {
        // Everything fit in one buffer: a plain PutObject is already atomic.
        let Some(upload_id) = self.upload_id.clone() else {
            let body = self.buffer.split().freeze();
            let output = with_retry(&self.retry, "put_object", || {
                let client = self.client.clone();
                let (bucket, key) = (self.bucket.clone(), self.key.clone());
                let body = body.clone();
                async move {
                    client
                        .put_object()
                        .bucket(&bucket)
                        .key(&key)
                        .body(S3Body::from(body))
                        .send()
                        .await
                        .map_err(|err| classify_error(&bucket, &key, err))
                }
            })
            .await?;

            return Ok(PutOutcome {
                bytes_written: self.bytes_written,
                etag: output.e_tag().map(str::to_string),
            });
        };

        if !self.buffer.is_empty() {
            let tail = self.buffer.split().freeze();
            if let Err(err) = self.flush_part(tail).await {
                self.abort_upload().await;
                return Err(err);
            }
        }
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(self.parts.clone()))
            .build();

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await;

        match result {
            Ok(output) => Ok(PutOutcome {
                bytes_written: self.bytes_written,
                etag: output.e_tag().map(str::to_string),
            }),
            Err(err) => {
                let err = classify_error(&self.bucket, &self.key, err);
                self.abort_upload().await;
                Err(err)
            }
        }
    }

    async fn abort(self: Box<Self>) -> BlobResult<()> {
        self.abort_upload().await;
        Ok(())
    }
}

/// Map an SDK error onto the crate taxonomy: 404 → NotFound, 401/403 →
/// AccessDenied, connection/timeout and 5xx → Transient, the rest → Backend.
fn classify_error<E>(bucket: &str, key: &str, err: SdkError<E>) -> BlobError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            return BlobError::transient(format!("{bucket}/{key}: {err}"));
        }
        SdkError::ServiceError(ctx) => Some(ctx.raw().status().as_u16()),
        _ => None,
    };

    match status {
        Some(404) => BlobError::not_found(bucket, key),
        Some(401) | Some(403) => {
            BlobError::access_denied(format!("{bucket}/{key}: {err}"))
        }
        Some(500) | Some(502) | Some(503) | Some(504) => {
            BlobError::transient(format!("{bucket}/{key}: {err}"))
        }
        _ => BlobError::backend(err),
    }
}
