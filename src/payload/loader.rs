//! Payload loading from an inline secret or a file.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PayloadSource;

/// Errors produced while resolving the payload.
#[derive(Debug, Error)]
pub enum DataLoadError {
    /// The file does not exist or could not be read as text.
    #[error("file {} does not exist or is not readable", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No inline secret and no file were provided.
    #[error("no data provided")]
    Missing,

    /// The file exists but holds nothing to share.
    #[error("file {} is empty", path.display())]
    Empty { path: PathBuf },
}

/// Where a payload came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadOrigin {
    Inline,
    File(PathBuf),
}

impl fmt::Display for PayloadOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadOrigin::Inline => write!(f, "inline secret"),
            PayloadOrigin::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Payload content ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPayload {
    content: String,
    origin: PayloadOrigin,
}

impl ResolvedPayload {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn origin(&self) -> &PayloadOrigin {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Resolve the payload for the given source.
pub async fn load(source: &PayloadSource) -> Result<ResolvedPayload, DataLoadError> {
    match source {
        PayloadSource::Inline(secret) => {
            if secret.is_empty() {
                return Err(DataLoadError::Missing);
            }
            Ok(ResolvedPayload {
                content: secret.clone(),
                origin: PayloadOrigin::Inline,
            })
        }
        PayloadSource::File(path) => load_file(path).await,
    }
}

async fn load_file(path: &Path) -> Result<ResolvedPayload, DataLoadError> {
    let resolved = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let content = tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|source| DataLoadError::NotFound {
            path: path.to_path_buf(),
            source,
        })?;

    if content.is_empty() {
        return Err(DataLoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(ResolvedPayload {
        content,
        origin: PayloadOrigin::File(resolved),
    })
}

/// Hands out the payload for each served request.
#[derive(Debug, Clone)]
pub struct PayloadLoader {
    source: PayloadSource,
    initial: ResolvedPayload,
}

impl PayloadLoader {
    /// Load the payload once, failing if it cannot be produced.
    pub async fn new(source: PayloadSource) -> Result<Self, DataLoadError> {
        let initial = load(&source).await?;
        tracing::debug!(origin = %initial.origin(), bytes = initial.len(), "Payload loaded");
        Ok(Self { source, initial })
    }

    /// Payload to serve right now. File-backed sources are re-read.
    pub async fn current(&self) -> Result<ResolvedPayload, DataLoadError> {
        match &self.source {
            PayloadSource::Inline(_) => Ok(self.initial.clone()),
            PayloadSource::File(_) => load(&self.source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn inline_secret_resolves() {
        let payload = load(&PayloadSource::Inline("hello".into())).await.unwrap();
        assert_eq!(payload.content(), "hello");
        assert_eq!(payload.origin(), &PayloadOrigin::Inline);
    }

    #[tokio::test]
    async fn empty_secret_is_missing() {
        let err = load(&PayloadSource::Inline(String::new())).await.unwrap_err();
        assert!(matches!(err, DataLoadError::Missing));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = load(&PayloadSource::File("/nonexistent/shh-secret".into()))
            .await
            .unwrap_err();
        match err {
            DataLoadError::NotFound { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/shh-secret"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load(&PayloadSource::File(file.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(err, DataLoadError::Empty { .. }));
    }

    #[tokio::test]
    async fn file_payload_is_reread() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first").unwrap();

        let loader = PayloadLoader::new(PayloadSource::File(file.path().to_path_buf()))
            .await
            .unwrap();
        assert_eq!(loader.current().await.unwrap().content(), "first");

        std::fs::write(file.path(), "second").unwrap();
        assert_eq!(loader.current().await.unwrap().content(), "second");
    }

    #[tokio::test]
    async fn inline_payload_is_fixed() {
        let loader = PayloadLoader::new(PayloadSource::Inline("fixed".into()))
            .await
            .unwrap();
        assert_eq!(loader.current().await.unwrap().content(), "fixed");
    }
}
