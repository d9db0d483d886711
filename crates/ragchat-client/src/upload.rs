use ragchat_notify::ClientId;
use ragchat_stream::extract_detail;
use ragchat_types::UploadReceipt;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Uploads documents into a knowledge base
///
/// The socket's client id is sent along so the server can push ingestion progress for the
/// upload to that socket.
#[derive(Debug, Clone)]
pub struct Uploader {
    http_client: reqwest::Client,
    base_url: String,
}

impl Uploader {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub async fn upload_file(
        &self,
        kb_id: i64,
        path: &Path,
        client_id: &ClientId,
    ) -> Result<UploadReceipt> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        self.upload_bytes(kb_id, file_name, bytes, client_id).await
    }

    /// `POST /knowledge-bases/{kb_id}/upload?client_id=...` with multipart field `file`
    pub async fn upload_bytes(
        &self,
        kb_id: i64,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        client_id: &ClientId,
    ) -> Result<UploadReceipt> {
        let file_name = file_name.into();
        let url = format!("{}/knowledge-bases/{}/upload", self.base_url, kb_id);
        tracing::info!(kb_id, file = %file_name, size = bytes.len(), "Uploading document");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http_client
            .post(&url)
            .query(&[("client_id", client_id.as_str())])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = extract_detail(&body);
            tracing::warn!(kb_id, status = status.as_u16(), "Upload rejected: {}", detail);
            return Err(ClientError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        let receipt = response.json::<UploadReceipt>().await?;
        tracing::info!(kb_id, "Upload accepted: {}", receipt.message);
        Ok(receipt)
    }
}
