#![deny(missing_docs)]

//! Core library for the Ragline grounded question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion clients used for answer synthesis.
pub mod llm;
/// Source loaders that turn files and web pages into documents.
pub mod loaders;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and query metrics helpers.
pub mod metrics;
/// Chunking, synthesis, and the ingestion/query orchestrator.
pub mod processing;
/// Durable on-disk vector store.
pub mod store;
