//! REST client for the Q&A board backend.

use std::future::Future;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::auth::AuthContext;
use crate::config::Config;
use crate::error::ApiError;
use crate::images::{FetchedImage, ImageFetcher};
use crate::payload::PostPayload;

/// Multipart field name the upload endpoint expects.
const UPLOAD_FIELD: &str = "image";

/// An image picked by the user, before it is embedded.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Board endpoints the composer talks to.
pub trait BoardApi {
    /// Create a post. Returns the server's JSON response (`null` when empty).
    fn create_post(
        &self,
        payload: &PostPayload,
        auth: &AuthContext,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>>;

    /// Upload an image. Returns `imageUrl` exactly as the server sent it.
    fn upload_image(
        &self,
        upload: ImageUpload,
        auth: &AuthContext,
    ) -> impl Future<Output = Result<String, ApiError>>;
}

/// [`BoardApi`] and [`ImageFetcher`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBoardClient {
    pub client: reqwest::Client,
    config: Config,
}

impl HttpBoardClient {
    pub fn new(config: Config) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: Config) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl BoardApi for HttpBoardClient {
    #[tracing::instrument(skip_all, fields(url = %self.config.create_url()))]
    async fn create_post(
        &self,
        payload: &PostPayload,
        auth: &AuthContext,
    ) -> Result<serde_json::Value, ApiError> {
        let response = auth
            .apply(self.client.post(self.config.create_url()))
            .json(payload)
            .send()
            .await?;
        read_json(response).await
    }

    #[tracing::instrument(skip(self, upload, auth), fields(file = %upload.file_name, bytes = upload.data.len()))]
    async fn upload_image(
        &self,
        upload: ImageUpload,
        auth: &AuthContext,
    ) -> Result<String, ApiError> {
        let part = Part::bytes(upload.data.to_vec())
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = auth
            .apply(self.client.post(self.config.upload_url()))
            .multipart(form)
            .send()
            .await?;
        let body = read_json(response).await?;

        body.get("imageUrl")
            .and_then(|url| url.as_str())
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ApiError::Decode(format!("upload response has no imageUrl: {body}")))
    }
}

impl ImageFetcher for HttpBoardClient {
    async fn fetch_image(&self, url: &str) -> Result<FetchedImage, ApiError> {
        let url = self.config.asset_link(url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: serde_json::Value::Null,
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = response.bytes().await?;
        Ok(FetchedImage { data, content_type })
    }
}

/// Read a JSON body, mapping non-2xx statuses to [`ApiError::Status`].
///
/// Empty bodies become `null`; bodies that are not JSON are kept as a string.
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
    let status = response.status();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    };

    if status.is_success() {
        Ok(body)
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
