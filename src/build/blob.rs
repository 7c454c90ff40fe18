//! Azure Blob storage access through SAS URLs
//!
//! Build sources are uploaded to, and build logs downloaded from, one-time SAS
//! URLs handed out by the registry. No storage account key is ever involved.

use crate::error::handlers::HttpErrorHandler;
use crate::error::{AcrError, Result};
use crate::logging::Logger;
use reqwest::Client;
use std::path::Path;
use url::Url;

/// A SAS URL split into its storage coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub scheme: String,
    pub host: String,
    /// Storage account, when the host has the `<account>.blob.<suffix>` shape
    pub account: Option<String>,
    pub endpoint_suffix: Option<String>,
    pub container: String,
    pub blob_name: String,
    pub sas_token: String,
}

impl BlobLocation {
    pub fn parse(upload_url: &str) -> Result<Self> {
        let malformed = |reason: &str| AcrError::MalformedUploadUrl(format!("{}: {}", reason, upload_url));

        let url = Url::parse(upload_url).map_err(|e| malformed(&e.to_string()))?;
        let host_name = url.host_str().ok_or_else(|| malformed("missing host"))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };

        let (account, endpoint_suffix) = match host_name.split_once(".blob.") {
            Some((account, suffix)) if !account.is_empty() && !suffix.is_empty() => {
                (Some(account.to_string()), Some(suffix.to_string()))
            }
            _ => (None, None),
        };

        let mut segments = url
            .path_segments()
            .ok_or_else(|| malformed("missing path"))?
            .filter(|segment| !segment.is_empty());
        let container = segments
            .next()
            .ok_or_else(|| malformed("missing container"))?
            .to_string();
        let blob_name = segments.collect::<Vec<_>>().join("/");
        if blob_name.is_empty() {
            return Err(malformed("missing blob name"));
        }

        let sas_token = url
            .query()
            .filter(|query| !query.is_empty())
            .ok_or_else(|| malformed("missing SAS token"))?
            .to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            account,
            endpoint_suffix,
            container,
            blob_name,
            sas_token,
        })
    }

    /// Full URL of the blob including the SAS token
    pub fn blob_url(&self) -> String {
        format!(
            "{}://{}/{}/{}?{}",
            self.scheme, self.host, self.container, self.blob_name, self.sas_token
        )
    }
}

pub struct BlobClient {
    client: Client,
    output: Logger,
}

impl BlobClient {
    pub fn new(client: Client, output: Logger) -> Self {
        Self { client, output }
    }

    /// Upload a file as a single block blob
    pub async fn upload_block_blob(&self, location: &BlobLocation, file: &Path) -> Result<()> {
        let data = tokio::fs::read(file).await?;
        let size = data.len() as u64;
        self.output.detail(&format!(
            "Uploading {} to container {}",
            self.output.format_size(size),
            location.container
        ));

        let response = self
            .client
            .put(location.blob_url())
            .header("x-ms-blob-type", "BlockBlob")
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = HttpErrorHandler::error_text(response).await;
            return Err(HttpErrorHandler::handle_blob_error(status, &error_text, "source upload"));
        }

        tracing::debug!(blob = %location.blob_name, size, "source archive uploaded");
        Ok(())
    }

    /// Download a blob as text
    pub async fn download_text(&self, url: &str) -> Result<String> {
        self.output.detail("Downloading blob");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = HttpErrorHandler::error_text(response).await;
            return Err(HttpErrorHandler::handle_blob_error(status, &error_text, "blob download"));
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_storage_sas_url() {
        let location = BlobLocation::parse(
            "https://acct.blob.core.windows.net/source/202001/abc.tar.gz?sv=2017&sig=xyz",
        )
        .unwrap();
        assert_eq!(location.account.as_deref(), Some("acct"));
        assert_eq!(location.endpoint_suffix.as_deref(), Some("core.windows.net"));
        assert_eq!(location.container, "source");
        assert_eq!(location.blob_name, "202001/abc.tar.gz");
        assert_eq!(location.sas_token, "sv=2017&sig=xyz");
        assert_eq!(
            location.blob_url(),
            "https://acct.blob.core.windows.net/source/202001/abc.tar.gz?sv=2017&sig=xyz"
        );
    }

    #[test]
    fn test_parse_non_storage_host() {
        let location = BlobLocation::parse("http://127.0.0.1:9000/uploads/src.tar.gz?sig=1").unwrap();
        assert!(location.account.is_none());
        assert_eq!(location.host, "127.0.0.1:9000");
        assert_eq!(location.blob_url(), "http://127.0.0.1:9000/uploads/src.tar.gz?sig=1");
    }

    #[test]
    fn test_parse_rejects_incomplete_urls() {
        for url in [
            "not a url",
            "https://acct.blob.core.windows.net/?sig=1",
            "https://acct.blob.core.windows.net/container?sig=1",
            "https://acct.blob.core.windows.net/container/blob",
        ] {
            assert!(
                matches!(BlobLocation::parse(url), Err(AcrError::MalformedUploadUrl(_))),
                "{} should be rejected",
                url
            );
        }
    }
}
