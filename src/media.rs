//! Media ingestion — downloads KYC document attachments to local storage.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::error::MediaError;
use crate::event::Identity;

/// Which KYC document an attachment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Identity,
    UtilityBill,
}

impl DocumentKind {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Identity => "id",
            Self::UtilityBill => "utility",
        }
    }
}

/// Downloads attachments referenced by inbound events and returns a stable
/// local path. Used only by the KYC upload states.
pub struct MediaStore {
    root: PathBuf,
    http: reqwest::Client,
    timeout: Duration,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Result<Self, MediaError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            http: reqwest::Client::new(),
            timeout,
        })
    }

    /// Download the attachment at `url` into a file keyed by the sanitized
    /// identity and the inferred extension, overwriting any previous upload
    /// of the same document kind.
    pub async fn ingest(
        &self,
        identity: &Identity,
        kind: DocumentKind,
        url: &str,
        content_type: &str,
    ) -> Result<PathBuf, MediaError> {
        let ext = extension_for(content_type)?;
        let path = self
            .root
            .join(format!("{}-{}.{ext}", identity.sanitized(), kind.suffix()));

        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| MediaError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            })??;

        tokio::fs::write(&path, &bytes).await?;
        info!(identity = %identity, path = %path.display(), size = bytes.len(), "Stored KYC document");
        Ok(path)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(MediaError::Download {
                url: url.to_string(),
                reason: format!("status {}", resp.status()),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| MediaError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Map an attachment content type to a file extension.
fn extension_for(content_type: &str) -> Result<&'static str, MediaError> {
    // Parameters like `; charset=...` are ignored.
    let base = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/webp" => Ok("webp"),
        "application/pdf" => Ok("pdf"),
        _ => Err(MediaError::UnsupportedContentType(content_type.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::from_channel_address("whatsapp:+961 333-4444")
    }

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for("image/jpeg").unwrap(), "jpg");
        assert_eq!(extension_for("image/png; charset=binary").unwrap(), "png");
        assert_eq!(extension_for("application/pdf").unwrap(), "pdf");
        assert!(matches!(
            extension_for("audio/ogg"),
            Err(MediaError::UnsupportedContentType(_))
        ));
    }

    #[tokio::test]
    async fn unsupported_content_type_fails_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), Duration::from_secs(1)).unwrap();

        let err = store
            .ingest(
                &identity(),
                DocumentKind::Identity,
                "https://example.invalid/voice.ogg",
                "audio/ogg",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedContentType(_)));
    }

    #[test]
    fn document_paths_are_identity_keyed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), Duration::from_secs(1)).unwrap();

        let expected = store.root().join("9613334444-id.jpg");
        assert_eq!(
            store
                .root()
                .join(format!("{}-id.jpg", identity().sanitized())),
            expected
        );
    }
}
