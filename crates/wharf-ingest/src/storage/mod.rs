//! Object-store access for the landing surface
//!
//! Thin wrapper over the S3 client: exhaustive prefix listing for
//! discovery and whole-object retrieval for the applier. Keys are built
//! with [`build_key`], the layout shared with the upstream producers.

use anyhow::{Context, Result};
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::{debug, instrument};

pub mod config;

pub use config::StorageConfig;

use crate::locator::object_store::RUN_TS_FORMAT;

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(config: StorageConfig) -> Result<Self> {
        debug!("Initializing storage with config: {:?}", config);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "wharf-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        debug!("Storage client initialized for bucket: {}", config.bucket);

        Ok(Self {
            client,
            bucket: config.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Download a whole object into memory.
    #[instrument(skip(self))]
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to download from S3: {}", key))?;

        let data = response
            .body
            .collect()
            .await
            .context("Failed to read S3 response body")?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }

    /// List every key under a prefix, draining pagination to exhaustion.
    ///
    /// The listing is not complete until the store stops signalling
    /// truncation; discovery must never act on a partial page.
    #[instrument(skip(self))]
    pub async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let prefix = prefix.to_string();

        drain_listing(move |token| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            async move {
                let mut request = client.list_objects_v2().bucket(&bucket).prefix(&prefix);
                if let Some(token) = token {
                    request = request.continuation_token(token);
                }

                let response = request
                    .send()
                    .await
                    .context("Failed to list S3 objects")?;

                let keys = response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string()))
                    .collect();

                let next_token = if response.is_truncated() == Some(true) {
                    response.next_continuation_token().map(|t| t.to_string())
                } else {
                    None
                };

                Ok(ListPage { keys, next_token })
            }
        })
        .await
    }
}

/// One page of an object listing
#[derive(Debug, Clone)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Continuation token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Drain a paginated listing to completion via continuation tokens.
///
/// `next_page` is called with `None` first, then with each continuation
/// token the previous page returned, until a page comes back without one.
pub async fn drain_listing<F, Fut>(mut next_page: F) -> Result<Vec<String>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListPage>>,
{
    let mut keys = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = next_page(token.take()).await?;
        keys.extend(page.keys);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(keys)
}

/// Build an object key under the layout shared with upstream producers:
/// `<schema>/source=<source>[_<apiVersion>]/report=<report>/run_ts=<ts>/<file>`
pub fn build_key(
    schema: &str,
    source: &str,
    api_version: Option<&str>,
    report: &str,
    run_ts: &DateTime<Utc>,
    file_name: &str,
) -> String {
    let source = match api_version {
        Some(version) => format!("{source}_{version}"),
        None => source.to_string(),
    };

    format!(
        "{schema}/source={source}/report={report}/run_ts={}/{file_name}",
        run_ts.format(RUN_TS_FORMAT)
    )
}
