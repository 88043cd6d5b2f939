//! Question-answering pipeline: chunking, ingestion orchestration, and grounded synthesis.

pub mod chunking;
mod mappers;
pub mod sanitize;
mod service;
pub mod synthesis;
pub mod types;

pub use chunking::{Chunk, Chunker};
pub use service::{RagApi, RagEngine};
pub use synthesis::AnswerSynthesizer;
pub use types::{
    Answer, AnswerOutcome, AnswerReport, ChunkingError, ErrorKind, IngestOutcome, IngestReport,
    RagError, SourcePreview, Status,
};
