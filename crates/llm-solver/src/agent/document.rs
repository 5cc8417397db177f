//! Document collaborator used for document-grounded requests.
//!
//! A document is uploaded once before a solve call, referenced by handle in
//! every prompt payload, and deleted once the call finishes.

use crate::agent::AgentError;
use async_trait::async_trait;
use std::path::Path;

/// A document supplied alongside a problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display name, usually the original file name.
    pub name: String,
    /// The MIME type of the content.
    pub mime_type: String,
    /// The raw bytes.
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Reads a document from disk, guessing its MIME type from the extension.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self {
            name,
            mime_type,
            data,
        })
    }
}

/// Reference to a document held by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    /// Store-assigned identifier (e.g. a file URI).
    pub id: String,
    /// The MIME type reported at upload time.
    pub mime_type: String,
}

impl DocumentHandle {
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Upload/delete collaborator for documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Uploads a document and returns a handle usable in payloads.
    async fn upload(&self, document: &Document) -> Result<DocumentHandle, AgentError>;

    /// Deletes a previously uploaded document.
    async fn delete(&self, handle: &DocumentHandle) -> Result<(), AgentError>;
}
