//! Re-publishing stored images to an external image host.

use crate::error::{ErrorKind, Result};
use crate::fetch;
use crate::{Identifier, Resolver};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tgimg_config::UploadConfig;
use tracing::instrument;

/// Publishes an image somewhere public and returns where it ended up.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Name of the host, for logging.
    fn name(&self) -> &str;

    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<String>;
}

/// Uploads to ImgBB (or anything speaking its upload API).
pub struct ImgbbUploader {
    client: Client,
    endpoint: String,
    api_key: String,
    expiration_secs: Option<u64>,
}

#[derive(Deserialize)]
struct ImgbbResponse {
    success: bool,
    data: Option<ImgbbData>,
}

#[derive(Deserialize)]
struct ImgbbData {
    url: String,
}

impl ImgbbUploader {
    pub fn new(client: Client, config: &UploadConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            expiration_secs: config.expiration_secs,
        }
    }
}

#[async_trait]
impl Uploader for ImgbbUploader {
    fn name(&self) -> &str {
        "imgbb"
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let rejected = || ErrorKind::Upload { name: name.to_string() };
        let mut form = Form::new()
            .part("image", Part::bytes(data).file_name(name.to_string()))
            .text("key", self.api_key.clone())
            .text("name", name.to_string());
        if let Some(expiration) = self.expiration_secs.filter(|secs| *secs > 0) {
            form = form.text("expiration", expiration.to_string());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| fetch::transport(&self.endpoint, e))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        let body: ImgbbResponse = response.json().await.or_raise(rejected)?;
        match body {
            ImgbbResponse { success: true, data: Some(ImgbbData { url }) } => {
                tracing::info!(%url, "Image uploaded");
                Ok(url)
            },
            _ => exn::bail!(rejected()),
        }
    }
}

impl Resolver {
    /// Reads `identifier` back from the store and hands it to `uploader`.
    pub async fn publish(&self, uploader: &dyn Uploader, identifier: &Identifier) -> Result<String> {
        let data = self.backend().read(identifier.as_path()).await.or_raise(|| ErrorKind::Storage {
            identifier: identifier.to_string(),
        })?;
        tracing::debug!(host = uploader.name(), %identifier, "Publishing image");
        uploader.upload(identifier.as_str(), data).await
    }
}
