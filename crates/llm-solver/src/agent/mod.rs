//! Collaborator abstractions: the LLM call and document storage.
//!
//! The solver never talks to a vendor API directly. It depends on an
//! [`Agent`] whose `Output` is the model's raw response text, and optionally
//! on a [`DocumentStore`] for document-grounded requests.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use llm_solver::agent::{Agent, AgentError, Payload};
//!
//! pub struct MyBackend {
//!     client: reqwest::Client,
//!     api_key: String,
//! }
//!
//! #[async_trait::async_trait]
//! impl Agent for MyBackend {
//!     type Output = String;
//!
//!     fn expertise(&self) -> &str {
//!         "my-vendor/multimodal-large"
//!     }
//!
//!     async fn execute(&self, payload: Payload) -> Result<String, AgentError> {
//!         // Send payload.to_text() plus payload.images() to the vendor API.
//!         todo!()
//!     }
//! }
//! ```

pub mod document;
pub mod error;
pub mod payload;

pub use document::{Document, DocumentHandle, DocumentStore};
pub use error::AgentError;
pub use payload::{Payload, PayloadContent};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

/// The LLM call a solver depends on.
///
/// One `execute` is one model round trip: the prompt is the payload's text,
/// and the problem image or uploaded document travel as further content
/// items. The solver applies no timeout of its own, so implementations
/// should bound their requests and report [`AgentError::Timeout`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Reply type. The solver requires `String`: the raw model text.
    type Output: Serialize + DeserializeOwned;

    /// Short description of the backend, recorded on the `solve` span.
    fn expertise(&self) -> &str;

    /// Sends one payload and waits for the reply.
    async fn execute(&self, payload: Payload) -> Result<Self::Output, AgentError>;
}

#[async_trait]
impl<T: Agent + ?Sized> Agent for std::sync::Arc<T> {
    type Output = T::Output;

    fn expertise(&self) -> &str {
        (**self).expertise()
    }

    async fn execute(&self, payload: Payload) -> Result<Self::Output, AgentError> {
        (**self).execute(payload).await
    }
}
