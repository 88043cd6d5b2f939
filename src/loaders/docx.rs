use async_trait::async_trait;
use regex::{Captures, Regex};
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentLoader, LoaderError, SourceKind, read_limited};

const DOCUMENT_PART: &str = "word/document.xml";

static RUN_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\b[^>]*/>|<w:br\b[^>]*/>|</w:p>|<w:p\b[^>]*/>")
        .expect("valid run token pattern")
});

static ENTITIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("valid entity pattern")
});

/// Loads Office Open XML word-processing documents.
///
/// Legacy binary `.doc` files are not zip archives and fail with [`LoaderError::Docx`].
pub struct DocxLoader {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
}

impl Default for DocxLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[async_trait]
impl DocumentLoader for DocxLoader {
    async fn extract(&self, location: &str) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_limited(location, self.max_file_size).await?;
        let text = tokio::task::spawn_blocking(move || extract_docx_text(&bytes))
            .await
            .map_err(|error| LoaderError::Docx(format!("extraction aborted: {error}")))??;

        Ok(vec![Document::new(
            text,
            location,
            SourceKind::Word.content_type(),
        )])
    }
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, LoaderError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|error| LoaderError::Docx(format!("not an Office Open XML document: {error}")))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|error| LoaderError::Docx(format!("missing {DOCUMENT_PART}: {error}")))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|error| LoaderError::Docx(format!("unreadable {DOCUMENT_PART}: {error}")))?;
    Ok(plaintext_from_document_xml(&xml))
}

/// Flatten `word/document.xml` into plain text: one line per paragraph, tabs and breaks kept.
pub(crate) fn plaintext_from_document_xml(xml: &str) -> String {
    let mut text = String::with_capacity(xml.len() / 4);
    for token in RUN_TOKENS.captures_iter(xml) {
        if let Some(run) = token.get(1) {
            text.push_str(&decode_entities(run.as_str()));
            continue;
        }
        let raw = token.get(0).map(|m| m.as_str()).unwrap_or_default();
        if raw.starts_with("<w:tab") {
            text.push('\t');
        } else {
            text.push('\n');
        }
    }
    text.trim_end().to_string()
}

fn decode_entities(raw: &str) -> String {
    ENTITIES
        .replace_all(raw, |caps: &Captures<'_>| {
            let entity = &caps[1];
            match entity {
                "amp" => "&".to_string(),
                "lt" => "<".to_string(),
                "gt" => ">".to_string(),
                "quot" => "\"".to_string(),
                "apos" => "'".to_string(),
                numeric => {
                    let code = match numeric.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => numeric.trim_start_matches('#').parse().ok(),
                    };
                    code.and_then(char::from_u32)
                        .map(String::from)
                        .unwrap_or_else(|| caps[0].to_string())
                }
            }
        })
        .into_owned()
}
