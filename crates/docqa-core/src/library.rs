//! Document metadata registry.
//!
//! Holds every uploaded [`Document`] with its processing state. Listing
//! preserves ingestion order and supports the case-insensitive title or
//! filename filter used by the library view.

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::models::{Document, DocumentState};

#[derive(Default)]
pub struct Library {
    documents: RwLock<Vec<Document>>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. A document with the same id is replaced in place.
    pub fn insert(&self, document: Document) {
        let mut docs = self.documents.write();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        self.documents
            .read()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.read().iter().any(|d| d.id == id)
    }

    /// Record the outcome of ingestion and return the updated document.
    pub fn set_state(&self, id: &str, state: DocumentState, page_count: u32) -> Result<Document> {
        let mut docs = self.documents.write();
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        doc.state = state;
        doc.page_count = page_count;
        Ok(doc.clone())
    }

    pub fn remove(&self, id: &str) -> Option<Document> {
        let mut docs = self.documents.write();
        let pos = docs.iter().position(|d| d.id == id)?;
        Some(docs.remove(pos))
    }

    /// Documents whose title or filename contains `filter`, ignoring case.
    /// An empty filter matches everything.
    pub fn list(&self, filter: &str) -> Vec<Document> {
        let needle = filter.trim().to_lowercase();
        self.documents
            .read()
            .iter()
            .filter(|d| {
                needle.is_empty()
                    || d.title.to_lowercase().contains(&needle)
                    || d.filename.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
