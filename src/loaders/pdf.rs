use async_trait::async_trait;

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, LoaderError, read_limited};

/// Loads PDF files, yielding one document per page with a 0-based `page` field.
pub struct PdfLoader {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[async_trait]
impl DocumentLoader for PdfLoader {
    async fn extract(&self, location: &str) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_limited(location, self.max_file_size).await?;

        // pdf-extract is synchronous and may panic on malformed input; both surface as errors.
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
                .map_err(|error| LoaderError::Pdf(error.to_string()))
        })
        .await
        .map_err(|error| LoaderError::Pdf(format!("extraction aborted: {error}")))??;

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(page, text)| {
                Document::new(text, location, "application/pdf").with_metadata("page", page)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn corrupt_pdf_is_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, b"this is not a pdf").unwrap();

        let error = PdfLoader::default()
            .extract(&file.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::Pdf(_)));
    }

    #[tokio::test]
    async fn missing_pdf_is_an_io_error() {
        let error = PdfLoader::default()
            .extract("/nonexistent/file.pdf")
            .await
            .unwrap_err();
        assert!(matches!(error, LoaderError::Io { .. }));
    }
}
