//! # docqa core
//!
//! Retrieval and answering logic for document question answering: data
//! models, chunking, scoring, the chunk index, retrieval, extractive answer
//! composition, chat sessions and the document library.
//!
//! This crate contains no tokio runtime, filesystem I/O, or file-format
//! parsers. Extraction of uploaded bytes and the async engine live in the
//! `docqa` application crate.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod library;
pub mod models;
pub mod retrieve;
pub mod scoring;
pub mod session;

pub use error::{Error, Result};
