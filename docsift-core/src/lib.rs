//! Docsift core library: OCR, LLM extraction, and validation of scanned documents.
//!
//! The main entry point is [`pipeline::DocsiftPipeline`], which runs the
//! OCR → Extract → Validate pipeline over one document or a batch and
//! produces a [`pipeline::PipelineResult`] per document.

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod ocr;
pub mod pipeline;
pub mod progress;
pub mod types;
pub mod validate;
