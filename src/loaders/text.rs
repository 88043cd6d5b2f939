use async_trait::async_trait;

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, LoaderError, read_limited};

/// Loads UTF-8 plain text files as a single document.
pub struct TextLoader {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[async_trait]
impl DocumentLoader for TextLoader {
    async fn extract(&self, location: &str) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_limited(location, self.max_file_size).await?;
        let mut content =
            String::from_utf8(bytes).map_err(|_| LoaderError::Encoding(location.to_string()))?;
        if content.starts_with('\u{feff}') {
            content.drain(..'\u{feff}'.len_utf8());
        }

        Ok(vec![Document::new(content, location, "text/plain")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("test.txt");
        std::fs::write(&file, "hello world").unwrap();
        let location = file.display().to_string();

        let docs = TextLoader::default().extract(&location).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello world");
        assert_eq!(docs[0].source(), location);
        assert_eq!(docs[0].metadata["content_type"], "text/plain");
    }

    #[tokio::test]
    async fn byte_order_mark_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bom.txt");
        std::fs::write(&file, "\u{feff}hello").unwrap();

        let docs = TextLoader::default()
            .extract(&file.display().to_string())
            .await
            .unwrap();
        assert_eq!(docs[0].text, "hello");
    }

    #[tokio::test]
    async fn invalid_utf8_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("latin1.txt");
        std::fs::write(&file, [0x63, 0x61, 0x66, 0xe9]).unwrap();

        let error = TextLoader::default()
            .extract(&file.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::Encoding(_)));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let error = TextLoader::default()
            .extract("/nonexistent/file.txt")
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::Io { .. }));
    }

    #[tokio::test]
    async fn file_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "xy").unwrap();

        let loader = TextLoader { max_file_size: 1 };
        let error = loader
            .extract(&file.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::FileTooLarge { size: 2, limit: 1 }));
    }
}
