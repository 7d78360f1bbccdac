//! S3 backend built on `aws-sdk-s3`.

use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::types::ChecksumMode;
use aws_sdk_s3::Client;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::object::{
    unquote_etag, ChecksumAlgorithm, ListPage, ObjectBody, ObjectHead, ObjectSummary,
};
use crate::traits::ObjectStore;

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...).
    pub endpoint: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`.
    pub path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "my-bucket".into(),
            region: "us-east-1".into(),
            endpoint: None,
            path_style: false,
        }
    }
}

/// [`ObjectStore`] over one S3 bucket. Credentials come from the default
/// provider chain (environment, profile, instance metadata).
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Load shared AWS configuration and build a client for `config.bucket`.
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.path_style)
            .build();
        Self::from_client(Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn to_chrono(t: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

fn decode_checksum(
    head: &mut ObjectHead,
    algo: ChecksumAlgorithm,
    encoded: Option<&str>,
) {
    // Multipart objects report "<b64>-<parts>"; only the digest part decodes.
    let Some(encoded) = encoded else { return };
    let digest = encoded.split('-').next().unwrap_or(encoded);
    match B64.decode(digest) {
        Ok(raw) => {
            head.checksums.insert(algo, raw);
        }
        Err(e) => tracing::debug!(%algo, error = %e, "ignoring undecodable checksum"),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_page(&self, continuation: Option<&str>) -> StoreResult<ListPage> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(&e)))?;

        let objects = out
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                Some(ObjectSummary {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                    etag: obj.e_tag().map(unquote_etag).unwrap_or_default().to_string(),
                    storage_class: obj.storage_class().map(|c| c.as_str().to_string()),
                })
            })
            .collect();

        let next_token = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage { objects, next_token })
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        let out = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .checksum_mode(ChecksumMode::Enabled)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::backend(DisplayErrorContext(&e))
                }
            })?;

        let mut head = ObjectHead {
            size: out.content_length().unwrap_or(0).max(0) as u64,
            last_modified: out.last_modified().and_then(to_chrono),
            etag: out.e_tag().map(unquote_etag).unwrap_or_default().to_string(),
            metadata: out
                .metadata()
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            ..Default::default()
        };
        decode_checksum(&mut head, ChecksumAlgorithm::Sha256, out.checksum_sha256());
        decode_checksum(&mut head, ChecksumAlgorithm::Sha1, out.checksum_sha1());
        decode_checksum(&mut head, ChecksumAlgorithm::Crc32c, out.checksum_crc32_c());
        decode_checksum(&mut head, ChecksumAlgorithm::Crc32, out.checksum_crc32());
        Ok(head)
    }

    async fn get(&self, key: &str) -> StoreResult<ObjectBody> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::backend(DisplayErrorContext(&e))
                }
            })?;

        let content_type = out.content_type().map(str::to_string);
        let last_modified = out.last_modified().and_then(to_chrono);
        let data = out
            .body
            .collect()
            .await
            .map_err(StoreError::backend)?
            .into_bytes();
        Ok(ObjectBody {
            data,
            content_type,
            last_modified,
        })
    }

    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::backend(DisplayErrorContext(&e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_time_converts_to_chrono() {
        let t = AwsDateTime::from_secs(1_700_000_000);
        let c = to_chrono(&t).unwrap();
        assert_eq!(c.timestamp(), 1_700_000_000);
    }

    #[test]
    fn multipart_checksum_suffix_is_ignored() {
        let mut head = ObjectHead::default();
        let encoded = B64.encode([0xde, 0xad, 0xbe, 0xef]);
        decode_checksum(
            &mut head,
            ChecksumAlgorithm::Crc32,
            Some(&format!("{encoded}-3")),
        );
        assert_eq!(
            head.checksums.get(&ChecksumAlgorithm::Crc32).unwrap(),
            &vec![0xde, 0xad, 0xbe, 0xef]
        );
    }

    #[test]
    fn garbage_checksum_is_skipped() {
        let mut head = ObjectHead::default();
        decode_checksum(&mut head, ChecksumAlgorithm::Sha1, Some("!!not base64!!"));
        assert!(head.checksums.is_empty());
    }

    #[test]
    fn default_config() {
        let c = S3Config::default();
        assert_eq!(c.region, "us-east-1");
        assert!(c.endpoint.is_none());
        assert!(!c.path_style);
    }
}
