//! Ingestion and question answering over uploaded documents.
//!
//! The [`Engine`] owns explicit handles to the [`Library`], the chunk
//! [`Index`], the [`SessionStore`] and the [`Answerer`]. It is cheap to
//! clone and safe to share across tasks: ingests of different documents run
//! in parallel and queries read immutable index snapshots.
//!
//! # Ingest
//!
//! ```text
//! Upload ─▶ size cap ─▶ media type ─▶ register (pending)
//!        ─▶ extract + chunk (blocking worker) ─▶ index add   [time budget]
//!        ─▶ ready          (any failure ─▶ failed, namespace dropped)
//! ```
//!
//! # Query
//!
//! ```text
//! question ─▶ retrieve (document scope) ─▶ answer ─▶ session log
//! ```

use std::sync::Arc;
use std::time::Duration;

use docqa_core::answer::{Answerer, ExtractiveAnswerer};
use docqa_core::chunk::chunk_text;
use docqa_core::index::{InMemoryIndex, Index, Scope, ScoredChunk};
use docqa_core::library::Library;
use docqa_core::models::{ChatMessage, Chunk, Citation, Document, DocumentState, MediaType};
use docqa_core::retrieve::retrieve;
use docqa_core::session::SessionStore;
use docqa_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::extract;

/// A file handed over by the upload surface.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// Declared MIME type. May be empty or `application/octet-stream`, in
    /// which case the filename extension decides.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    /// True when nothing in the document was relevant enough to answer from.
    pub insufficient_evidence: bool,
    /// Chunks the answer was composed from, best first.
    pub retrieved: Vec<RetrievedChunk>,
    /// Id of the [`ChatMessage`] recording this exchange.
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

impl From<ScoredChunk> for RetrievedChunk {
    fn from(hit: ScoredChunk) -> Self {
        Self {
            chunk: hit.chunk,
            score: hit.score,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    config: Arc<Config>,
    library: Arc<Library>,
    index: Arc<dyn Index>,
    sessions: Arc<SessionStore>,
    answerer: Arc<dyn Answerer>,
}

impl Engine {
    /// Engine with the in-memory index and the extractive answerer.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let scoring = config.retrieval.scoring()?;
        let answerer = ExtractiveAnswerer::new(config.answer.max_sentences);
        Self::with_components(
            config,
            Arc::new(InMemoryIndex::new(scoring)),
            Arc::new(answerer),
        )
    }

    /// Engine over caller-supplied index and answerer backends.
    pub fn with_components(
        config: Config,
        index: Arc<dyn Index>,
        answerer: Arc<dyn Answerer>,
    ) -> anyhow::Result<Self> {
        config::validate(&config)?;
        Ok(Self {
            config: Arc::new(config),
            library: Arc::new(Library::new()),
            index,
            sessions: Arc::new(SessionStore::new()),
            answerer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest an upload and return the resulting document.
    ///
    /// Oversized uploads and unresolvable media types are rejected before
    /// anything is recorded. Once registered, a document ends up `ready`
    /// with all its chunks indexed, or `failed` with none.
    pub async fn ingest(&self, upload: Upload) -> Result<Document> {
        let limits = &self.config.limits;
        let size = upload.bytes.len() as u64;
        if size > limits.max_upload_bytes {
            warn!(
                filename = %upload.filename,
                size,
                limit = limits.max_upload_bytes,
                "upload rejected: too large"
            );
            return Err(Error::SizeLimitExceeded {
                size,
                limit: limits.max_upload_bytes,
            });
        }

        let media_type = match MediaType::resolve(&upload.media_type, &upload.filename) {
            Some(m) => m,
            None => {
                warn!(
                    filename = %upload.filename,
                    media_type = %upload.media_type,
                    "upload rejected: unsupported media type"
                );
                return Err(Error::UnsupportedFormat(format!(
                    "{} ({})",
                    upload.filename, upload.media_type
                )));
            }
        };

        let document = Document::new(&upload.filename, media_type, size);
        let id = document.id.clone();
        self.library.insert(document);
        self.sessions.open(&id);
        info!(
            document_id = %id,
            filename = %upload.filename,
            media_type = %media_type,
            size,
            "ingest started"
        );

        let secs = limits.ingest_timeout_secs;
        let indexed = tokio::time::timeout(Duration::from_secs(secs), async {
            let (chunks, pages) = self.prepare(&id, media_type, upload.bytes).await?;
            // Deleted while extracting: nothing to index.
            if !self.library.contains(&id) {
                return Err(Error::not_found(&id));
            }
            let chunk_count = chunks.len();
            self.index.add(&id, chunks).await?;
            Ok::<_, Error>((chunk_count, pages))
        })
        .await
        .unwrap_or_else(|_| {
            Err(Error::Timeout {
                operation: "ingest",
                secs,
            })
        });

        let (chunk_count, pages) = match indexed {
            Ok(indexed) => indexed,
            Err(err) => return Err(self.fail(&id, err).await),
        };

        match self.library.set_state(&id, DocumentState::Ready, pages) {
            Ok(document) => {
                info!(document_id = %id, pages, chunks = chunk_count, "ingest complete");
                Ok(document)
            }
            Err(err) => {
                // Deleted while indexing: drop what was just indexed.
                self.index.remove(&id).await;
                self.sessions.remove(&id);
                debug!(document_id = %id, "document deleted during ingest");
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        id: &str,
        media_type: MediaType,
        bytes: Vec<u8>,
    ) -> Result<(Vec<Chunk>, u32)> {
        let document_id = id.to_string();
        let params = self.config.chunking.params();
        tokio::task::spawn_blocking(move || -> Result<(Vec<Chunk>, u32)> {
            let extracted = extract::extract(&bytes, media_type)?;
            let chunks = chunk_text(
                &document_id,
                &extracted.text,
                &extracted.page_starts,
                &params,
            );
            Ok((chunks, extracted.page_count()))
        })
        .await
        .map_err(|e| Error::DecodingFailed(format!("extraction worker failed: {}", e)))?
    }

    /// Mark a document failed and drop any chunks a timed-out add left behind.
    async fn fail(&self, id: &str, err: Error) -> Error {
        if self.library.set_state(id, DocumentState::Failed, 0).is_ok() {
            warn!(document_id = %id, error = %err, "ingest failed");
        } else {
            self.sessions.remove(id);
            debug!(document_id = %id, error = %err, "document deleted during ingest");
        }
        self.index.remove(id).await;
        err
    }

    /// Answer a question about one document and record the exchange.
    ///
    /// Documents that are still pending or failed have no indexed chunks and
    /// get the insufficient-evidence answer.
    pub async fn query(&self, document_id: &str, question: &str) -> Result<QueryResult> {
        let document = self.library.get(document_id)?;
        let secs = self.config.limits.query_timeout_secs;

        let (answer, retrieved) = tokio::time::timeout(Duration::from_secs(secs), async {
            let retrieved = if document.is_ready() {
                retrieve(
                    self.index.as_ref(),
                    document_id,
                    question,
                    &self.config.retrieval.params(),
                )
                .await?
            } else {
                Vec::new()
            };
            let answer = self.answerer.answer(question, &retrieved);
            Ok::<_, Error>((answer, retrieved))
        })
        .await
        .map_err(|_| Error::Timeout {
            operation: "query",
            secs,
        })??;

        let message = self.sessions.append(
            document_id,
            question,
            answer.text.clone(),
            answer.citations.clone(),
        )?;
        info!(
            document_id,
            retrieved = retrieved.len(),
            citations = answer.citations.len(),
            insufficient_evidence = answer.insufficient_evidence,
            "query answered"
        );

        Ok(QueryResult {
            question: question.to_string(),
            answer: answer.text,
            citations: answer.citations,
            insufficient_evidence: answer.insufficient_evidence,
            retrieved: retrieved.into_iter().map(RetrievedChunk::from).collect(),
            message_id: message.id,
        })
    }

    /// Ranked chunk search without answering or recording anything.
    ///
    /// Use [`Scope::All`] to search across every indexed document.
    pub async fn search(
        &self,
        scope: &Scope,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if let Scope::Document(id) = scope {
            self.library.get(id)?;
        }
        let hits = self.index.search(scope, query, k).await?;
        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Delete a document with its chunks and chat history.
    pub async fn delete(&self, document_id: &str) -> Result<Document> {
        // Library first so new queries fail fast.
        let document = self
            .library
            .remove(document_id)
            .ok_or_else(|| Error::not_found(document_id))?;
        let indexed = self.index.remove(document_id).await;
        self.sessions.remove(document_id);
        info!(document_id, indexed, "document deleted");
        Ok(document)
    }

    /// Documents in ingestion order whose title or filename contains
    /// `filter` (case-insensitive).
    pub fn documents(&self, filter: &str) -> Vec<Document> {
        self.library.list(filter)
    }

    pub fn document(&self, document_id: &str) -> Result<Document> {
        self.library.get(document_id)
    }

    /// Indexed chunks of a document in page order.
    pub async fn chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        self.library.get(document_id)?;
        Ok(self.index.chunks(document_id).await)
    }

    pub fn history(&self, document_id: &str) -> Result<Vec<ChatMessage>> {
        self.library.get(document_id)?;
        self.sessions.history(document_id)
    }

    pub fn clear_history(&self, document_id: &str) -> Result<()> {
        self.library.get(document_id)?;
        self.sessions.clear(document_id)
    }
}
