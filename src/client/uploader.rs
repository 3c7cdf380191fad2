//! Transport between the upload client and `POST /api/upload`.

use crate::{
    client::records::SelectedFile,
    handlers::upload_handlers::{BUCKET_FIELD, IMAGE_FIELD},
    models::{bucket::BucketName, upload::UploadResponse},
};
use async_trait::async_trait;
use reqwest::{
    Body, Client,
    multipart::{Form, Part},
};
use std::io;
use thiserror::Error;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("server response did not include a url")]
    MissingUrl,
    #[error("could not read {path}: {source}")]
    ReadFile { path: String, source: io::Error },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Sends one file to the server and returns its public URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, bucket: &BucketName, file: &SelectedFile) -> Result<String, ClientError>;
}

/// `Uploader` backed by the HTTP endpoint.
#[derive(Clone, Debug)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    /// `server` is the base URL, e.g. `http://localhost:3000`.
    pub fn new(server: &str) -> Self {
        Self::with_client(Client::new(), server)
    }

    pub fn with_client(client: Client, server: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/upload", server.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, bucket: &BucketName, file: &SelectedFile) -> Result<String, ClientError> {
        let handle = File::open(&file.path)
            .await
            .map_err(|source| ClientError::ReadFile {
                path: file.path.display().to_string(),
                source,
            })?;
        let body = Body::wrap_stream(ReaderStream::new(handle));
        let part = Part::stream_with_length(body, file.size_bytes)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = Form::new()
            .text(BUCKET_FIELD, bucket.to_string())
            .part(IMAGE_FIELD, part);

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let text = response.text().await?;

        // failures may come from outside the handler (body limit, proxies) and not be JSON
        let parsed = serde_json::from_str::<UploadResponse>(&text).ok();
        match parsed {
            Some(UploadResponse {
                success: true,
                url: Some(url),
                ..
            }) if status.is_success() => Ok(url),
            Some(UploadResponse { success: true, .. }) if status.is_success() => {
                Err(ClientError::MissingUrl)
            }
            Some(UploadResponse { message, .. }) => Err(ClientError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| status.to_string()),
            }),
            None => Err(ClientError::Rejected {
                status: status.as_u16(),
                message: if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text
                },
            }),
        }
    }
}
