//! # docqa
//!
//! Document question answering: upload a PDF, Word or text document, then
//! ask natural-language questions about it and get answers grounded in the
//! document's own text, with page citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────┐   ┌──────────┐
//! │  Extractor │──▶│  Chunker │──▶│  Index   │
//! │ PDF/DOCX/  │   │ sentence │   │ one ns   │
//! │ text       │   │ + pages  │   │ per doc  │
//! └────────────┘   └──────────┘   └────┬─────┘
//!                                      │
//!        ┌───────────┐   ┌──────────┐  │
//!        │  Session  │◀──│ Answerer │◀─┤ Retriever
//!        │  history  │   │ extract. │  │
//!        └───────────┘   └──────────┘
//! ```
//!
//! The retrieval and answering logic lives in the `docqa-core` crate; this
//! crate adds configuration, logging, file-format extraction and the async
//! [`engine::Engine`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`engine`] | Ingest, query, delete and library/history access |
//! | [`extract`] | Text and page extraction from uploaded bytes |
//! | [`logging`] | `tracing` subscriber setup |

pub mod config;
pub mod engine;
pub mod extract;
pub mod logging;

pub use docqa_core as core;
pub use engine::{Engine, QueryResult, RetrievedChunk, Upload};
