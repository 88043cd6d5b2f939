//! Source loaders: turn files and web pages into [`Document`]s.
//!
//! The set of source kinds is closed. [`SourceKind`] is decided from the declared file
//! extension (or from the source being a URL) and [`Loaders::load`] dispatches with an
//! exhaustive match, so adding a kind is a compile-time change rather than a runtime probe.

mod docx;
mod pdf;
mod text;
mod web;

pub use docx::DocxLoader;
pub use pdf::PdfLoader;
pub use text::TextLoader;
pub use web::WebLoader;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Free-form metadata attached to documents, chunks, and stored records.
pub type Metadata = Map<String, Value>;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// File extensions accepted for upload and local ingestion.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "doc", "docx"];

/// Errors raised while extracting text from a source.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// File extension is not one of [`SUPPORTED_EXTENSIONS`].
    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),
    /// File exceeds the configured size ceiling.
    #[error("file too large: {size} bytes (max: {limit})")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Configured ceiling in bytes.
        limit: u64,
    },
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Text file was not valid UTF-8.
    #[error("{0} is not valid UTF-8 text")]
    Encoding(String),
    /// PDF parsing failed.
    #[error("failed to extract PDF text: {0}")]
    Pdf(String),
    /// Word document parsing failed.
    #[error("failed to extract Word document text: {0}")]
    Docx(String),
    /// URL could not be parsed or uses a scheme other than http(s).
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Network request did not complete in time.
    #[error("timed out fetching {0}")]
    Timeout(String),
    /// Network request failed before a response arrived.
    #[error("request to {url} failed: {source}")]
    Http {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// HTTP client for web loads could not be configured.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Source was read successfully but contained no text.
    #[error("no extractable text in {0}")]
    NoText(String),
    /// Server answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    UnexpectedStatus {
        /// Requested URL.
        url: String,
        /// Returned status code.
        status: u16,
    },
}

/// Text extracted from a single source unit (a file, a PDF page, or a web page).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Extracted plain text.
    pub text: String,
    /// Provenance metadata; always carries `source` and `content_type`.
    pub metadata: Metadata,
}

impl Document {
    /// Build a document with the mandatory provenance fields.
    pub fn new(text: impl Into<String>, source: &str, content_type: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), Value::String(source.to_string()));
        metadata.insert("content_type".into(), Value::String(content_type.to_string()));
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Attach an extra metadata field.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Source identifier recorded at extraction time.
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Declared type of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Portable Document Format file.
    Pdf,
    /// UTF-8 plain text file.
    Text,
    /// Word document (`.docx`, or `.doc` saved in the Office Open XML format).
    Word,
    /// HTML page fetched over HTTP(S).
    WebPage,
}

impl SourceKind {
    /// Resolve a file extension (with or without the leading dot, any case).
    pub fn from_extension(extension: &str) -> Result<Self, LoaderError> {
        let normalized = extension.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Text),
            "doc" | "docx" => Ok(Self::Word),
            _ => Err(LoaderError::UnsupportedFormat(normalized)),
        }
    }

    /// Resolve the kind of a file from the extension of its name.
    pub fn from_file_name(name: &Path) -> Result<Self, LoaderError> {
        let extension = name
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        Self::from_extension(extension)
    }

    /// MIME type recorded in document metadata.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain",
            Self::Word => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::WebPage => "text/html",
        }
    }
}

/// A source to ingest, together with its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Local file.
    File {
        /// Location on disk.
        path: PathBuf,
        /// Kind declared by the file extension.
        kind: SourceKind,
    },
    /// Web page.
    Url(String),
}

impl Source {
    /// Build a file source, rejecting unsupported extensions up front.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self, LoaderError> {
        let path = path.into();
        let kind = SourceKind::from_file_name(&path)?;
        Ok(Self::File { path, kind })
    }

    /// Build a web page source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Declared kind of this source.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::File { kind, .. } => *kind,
            Self::Url(_) => SourceKind::WebPage,
        }
    }

    /// Human-readable location used in logs and messages.
    pub fn location(&self) -> String {
        match self {
            Self::File { path, .. } => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Capability shared by every loader: extract documents from a location.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Extract one or more documents from a file path or URL.
    async fn extract(&self, location: &str) -> Result<Vec<Document>, LoaderError>;
}

/// The closed set of loaders, one per [`SourceKind`].
pub struct Loaders {
    text: TextLoader,
    pdf: PdfLoader,
    docx: DocxLoader,
    web: WebLoader,
}

impl Loaders {
    /// Build all loaders with a shared file-size ceiling and web timeout.
    pub fn new(max_file_size: u64, web_timeout: Duration) -> Result<Self, LoaderError> {
        Ok(Self {
            text: TextLoader { max_file_size },
            pdf: PdfLoader { max_file_size },
            docx: DocxLoader { max_file_size },
            web: WebLoader::new(web_timeout, max_file_size)?,
        })
    }

    /// Extract documents from a source using the loader for its declared kind.
    pub async fn load(&self, source: &Source) -> Result<Vec<Document>, LoaderError> {
        let location = source.location();
        let documents = self.loader_for(source.kind()).extract(&location).await?;
        tracing::debug!(
            source = %location,
            kind = ?source.kind(),
            documents = documents.len(),
            "Source extracted"
        );
        Ok(documents)
    }

    fn loader_for(&self, kind: SourceKind) -> &dyn DocumentLoader {
        match kind {
            SourceKind::Text => &self.text,
            SourceKind::Pdf => &self.pdf,
            SourceKind::Word => &self.docx,
            SourceKind::WebPage => &self.web,
        }
    }
}

/// Read a file fully after checking it against the size ceiling.
pub(crate) async fn read_limited(path: &str, limit: u64) -> Result<Vec<u8>, LoaderError> {
    let io_error = |source| LoaderError::Io {
        path: path.to_string(),
        source,
    };
    let meta = tokio::fs::metadata(path).await.map_err(io_error)?;
    if meta.len() > limit {
        return Err(LoaderError::FileTooLarge {
            size: meta.len(),
            limit,
        });
    }
    tokio::fs::read(path).await.map_err(io_error)
}
