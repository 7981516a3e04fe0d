//! S3-backed search cache.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client;
use chrono::Utc;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

use super::{CacheStats, SearchCache, StoredSearch};

/// Stores each search as a JSON object at `<prefix>/<search_id>.json`.
pub struct S3SearchCache {
    client: Client,
    bucket: String,
    prefix: String,
    ttl_secs: u64,
}

impl S3SearchCache {
    /// Create a cache from configuration using the default AWS credential chain.
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        let s3 = &config.s3;
        if s3.bucket.is_empty() {
            return Err(CacheError::S3("no bucket configured".to_string()).into());
        }

        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());
        if let Some(ref region) = s3.region {
            aws_config_builder = aws_config_builder.region(Region::new(region.clone()));
        }
        let aws_config = aws_config_builder.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);
        // MinIO, LocalStack
        if let Some(ref endpoint) = s3.endpoint_url {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        info!(bucket = %s3.bucket, prefix = %s3.prefix, "S3 search cache ready");
        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: s3.bucket.clone(),
            prefix: s3.prefix.trim_end_matches('/').to_string(),
            ttl_secs: config.ttl_secs,
        })
    }

    fn object_key(&self, search_id: &str) -> String {
        object_key(&self.prefix, search_id)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(CacheError::S3(service.to_string()).into())
                }
            }
        }
    }
}

fn object_key(prefix: &str, search_id: &str) -> String {
    if prefix.is_empty() {
        format!("{}.json", search_id)
    } else {
        format!("{}/{}.json", prefix, search_id)
    }
}

/// Search ids are generated UUIDs; anything else could escape the prefix.
fn is_valid_search_id(search_id: &str) -> bool {
    uuid::Uuid::parse_str(search_id).is_ok()
}

#[async_trait]
impl SearchCache for S3SearchCache {
    async fn save(&self, record: StoredSearch) -> Result<String> {
        let key = self.object_key(&record.search_id);
        let body = serde_json::to_vec(&record)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| CacheError::S3(e.to_string()))?;

        debug!(key = %key, "Stored search response");
        Ok(record.search_id)
    }

    async fn load(&self, search_id: &str) -> Result<Option<StoredSearch>> {
        if !is_valid_search_id(search_id) {
            return Ok(None);
        }
        let key = self.object_key(search_id);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    return Ok(None);
                }
                return Err(CacheError::S3(service.to_string()).into());
            }
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| CacheError::S3(e.to_string()))?;

        let record: StoredSearch =
            serde_json::from_slice(&body.into_bytes()).map_err(|e| CacheError::Corrupt {
                id: search_id.to_string(),
                reason: e.to_string(),
            })?;

        if record.is_expired(self.ttl_secs, Utc::now().timestamp()) {
            debug!(search_id, "Stored search expired");
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn delete(&self, search_id: &str) -> Result<bool> {
        if !is_valid_search_id(search_id) {
            return Ok(false);
        }
        let key = self.object_key(search_id);
        if !self.exists(&key).await? {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| CacheError::S3(e.to_string()))?;
        Ok(true)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut paginator = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix((!self.prefix.is_empty()).then(|| format!("{}/", self.prefix)))
            .into_paginator()
            .send();

        let mut entries = 0u64;
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CacheError::S3(e.to_string()))?;
            entries += page
                .contents()
                .iter()
                .filter(|o| o.key().is_some_and(|k| k.ends_with(".json")))
                .count() as u64;
        }

        Ok(CacheStats {
            backend: self.name().to_string(),
            entries,
            ttl_secs: self.ttl_secs,
            location: Some(format!("s3://{}/{}", self.bucket, self.prefix)),
        })
    }

    fn name(&self) -> &str {
        "s3"
    }
}
