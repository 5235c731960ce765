//! Post media uploads.
//!
//! Blob storage and image transcoding are external collaborators behind
//! seams; this module owns only bucket/key naming and the
//! optimize-then-upload order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Bounding box and quality applied to images before upload
#[derive(Debug, Clone, Copy)]
pub struct ImageSpec {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
}

/// Spec applied to post images
pub const POST_IMAGE_SPEC: ImageSpec = ImageSpec {
    max_width: 1200,
    max_height: 800,
    quality: 0.85,
};

/// A file handed in by the embedding app
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. "image/jpeg" or "video/mp4"
    pub content_type: String,
}

/// A transcoded image ready for upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

/// External blob storage: store an object, get back a public URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ServiceResult<String>;
}

/// External image transcoder (resize to bounding box, re-encode web-efficient).
pub trait ImageOptimizer: Send + Sync {
    fn optimize(&self, file: &MediaFile, spec: &ImageSpec) -> ServiceResult<EncodedImage>;
}

/// Uploads bytes as-is; stands in where no transcoder is wired up.
pub struct PassthroughOptimizer;

impl ImageOptimizer for PassthroughOptimizer {
    fn optimize(&self, file: &MediaFile, _spec: &ImageSpec) -> ServiceResult<EncodedImage> {
        let extension = extension_for(&file.content_type)?;
        Ok(EncodedImage {
            bytes: file.bytes.clone(),
            content_type: file.content_type.clone(),
            extension,
        })
    }
}

fn extension_for(content_type: &str) -> ServiceResult<String> {
    content_type
        .split('/')
        .nth(1)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("unrecognized content type {}", content_type))
        })
}

pub struct MediaUploader<B, O> {
    blobs: Arc<B>,
    optimizer: Arc<O>,
}

impl<B: BlobStore, O: ImageOptimizer> MediaUploader<B, O> {
    pub fn new(blobs: Arc<B>, optimizer: Arc<O>) -> Self {
        Self { blobs, optimizer }
    }

    /// Upload one media file for a post and return its public URL.
    /// Images are transcoded first; videos go up unchanged. Keys are
    /// `{user_id}/{timestamp}-{uuid}.{ext}` in a bucket per kind; the random
    /// component keeps two uploads inside one clock tick from overwriting
    /// each other.
    pub async fn upload_post_media(
        &self,
        user_id: Uuid,
        file: MediaFile,
    ) -> ServiceResult<String> {
        let (bucket, bytes, content_type, extension) =
            if file.content_type.starts_with("image/") {
                let encoded = self.optimizer.optimize(&file, &POST_IMAGE_SPEC)?;
                (
                    "post-images",
                    encoded.bytes,
                    encoded.content_type,
                    encoded.extension,
                )
            } else if file.content_type.starts_with("video/") {
                let extension = extension_for(&file.content_type)?;
                ("post-videos", file.bytes, file.content_type, extension)
            } else {
                return Err(ServiceError::InvalidInput(format!(
                    "unsupported media type {}",
                    file.content_type
                )));
            };

        let key = format!(
            "{}/{}-{}.{}",
            user_id,
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            extension
        );
        let url = self.blobs.put(bucket, &key, bytes, &content_type).await?;
        debug!(bucket, key = %key, "media uploaded");
        Ok(url)
    }
}

/// In-memory blob store used by tests
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("blob store lock poisoned").len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> ServiceResult<String> {
        let path = format!("{}/{}", bucket, key);
        self.objects
            .lock()
            .expect("blob store lock poisoned")
            .insert(path.clone(), bytes);
        Ok(format!("https://storage.local/{}", path))
    }
}
