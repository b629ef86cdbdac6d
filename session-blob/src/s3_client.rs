use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as AwsCompletedPart, ObjectCannedAcl};
use aws_sdk_s3::Client;
use bytes::Bytes;
use serde::Deserialize;
use std::env;
use tokio_util::io::ReaderStream;

use crate::client::{
    CompletedPart, GetObject, ObjectAcl, ObjectHead, ObjectStoreClient, ProbeStatus, PutObjectRequest, PutResult,
};
use crate::config::parse_flag;
use crate::{StoreError, StoreResult, UploadId};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct S3ClientConfig {
    /// Region; falls back to the default provider chain
    pub region: Option<String>,
    /// Custom endpoint URL (MinIO, RustFS, R2, ...)
    pub endpoint_url: Option<String>,
    /// Static credentials; both must be set or the default chain is used
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Force path-style addressing
    pub force_path_style: bool,
    /// Honour the per-request acceleration hint
    pub allow_acceleration: bool,
}

impl S3ClientConfig {
    /// Read `SESSION_BLOB_S3_*` variables. All are optional.
    pub fn from_env() -> Self {
        fn opt_env(key: &str) -> Option<String> {
            env::var(key).ok().filter(|v| !v.trim().is_empty())
        }

        Self {
            region: opt_env("SESSION_BLOB_S3_REGION"),
            endpoint_url: opt_env("SESSION_BLOB_S3_ENDPOINT_URL"),
            access_key_id: opt_env("SESSION_BLOB_S3_ACCESS_KEY_ID"),
            secret_access_key: opt_env("SESSION_BLOB_S3_SECRET_ACCESS_KEY"),
            force_path_style: opt_env("SESSION_BLOB_S3_FORCE_PATH_STYLE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            allow_acceleration: opt_env("SESSION_BLOB_S3_ACCELERATE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }
}

/// Object store client backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct S3ObjectClient {
    client: Client,
    allow_acceleration: bool,
}

impl S3ObjectClient {
    /// Build an SDK client from the given settings
    pub async fn connect(config: S3ClientConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "session-blob",
            ));
        }
        let shared_config = loader.load().await;

        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&shared_config)
                .force_path_style(config.force_path_style)
                .build(),
        );

        Self {
            client,
            allow_acceleration: config.allow_acceleration,
        }
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, allow_acceleration: bool) -> Self {
        Self {
            client,
            allow_acceleration,
        }
    }

    fn map_sdk_error<E>(key: &str, err: SdkError<E, HttpResponse>) -> StoreError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match err.raw_response().map(|response| response.status().as_u16()) {
            Some(404) => StoreError::not_found(key),
            Some(status @ (401 | 403)) => StoreError::Rejected { status },
            _ => StoreError::backend(err),
        }
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectClient {
    async fn list_bucket(&self, bucket: &str) -> StoreResult<ProbeStatus> {
        self.client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(bucket, e))?;

        // the SDK turns every non-2xx into an error
        Ok(ProbeStatus::new(200))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        let result = self.client.head_object().bucket(bucket).key(key).send().await;

        match result {
            Ok(output) => Ok(ObjectHead {
                size_bytes: output.content_length().unwrap_or(0).max(0) as u64,
                content_type: output.content_type().map(str::to_string),
                etag: output.e_tag().map(str::to_string),
                last_modified: output.last_modified().map(|dt| dt.secs()),
            }),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Err(StoreError::not_found(key));
                }
                Err(Self::map_sdk_error(key, err))
            }
        }
    }

    async fn put_object(&self, request: PutObjectRequest) -> StoreResult<PutResult> {
        let body = AwsByteStream::from_path(&request.source)
            .await
            .map_err(StoreError::backend)?;

        let mut put = self
            .client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .content_type(&request.content_type)
            .content_length(request.content_length as i64)
            .body(body);

        if let Some(encoding) = &request.content_encoding {
            put = put.content_encoding(encoding);
        }

        let result = if request.accelerate && self.allow_acceleration {
            put.customize()
                .config_override(aws_sdk_s3::config::Builder::default().accelerate(true))
                .send()
                .await
        } else {
            put.send().await
        };
        let output = result.map_err(|e| Self::map_sdk_error(&request.key, e))?;

        Ok(PutResult {
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<GetObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;

        let size_bytes = output.content_length().map(|len| len.max(0) as u64);
        let etag = output.e_tag().map(str::to_string);
        let stream = ReaderStream::new(output.body.into_async_read());

        Ok(GetObject {
            stream: Box::pin(stream),
            size_bytes,
            etag,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        acl: ObjectAcl,
        content_type: &str,
    ) -> StoreResult<UploadId> {
        let canned = match acl {
            ObjectAcl::Private => ObjectCannedAcl::Private,
        };

        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .acl(canned)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| StoreError::transfer(key, "CreateMultipartUpload returned no upload_id"))?;

        Ok(UploadId::from_string(upload_id.to_string()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .part_number(part_number as i32)
            .body(AwsByteStream::from(body))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;

        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| StoreError::transfer(key, format!("part {} returned no etag", part_number)))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
        parts: Vec<CompletedPart>,
    ) -> StoreResult<PutResult> {
        let parts = parts
            .into_iter()
            .map(|part| {
                AwsCompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(part.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;

        Ok(PutResult {
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &UploadId,
    ) -> StoreResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id.as_str())
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(key, e))?;
        Ok(())
    }
}
