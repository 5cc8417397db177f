//! What a single model call receives.
//!
//! A payload bundles the prompt text with an optional problem image and an
//! optional reference to an uploaded document.

use crate::agent::document::DocumentHandle;
use crate::multimodal::ImageData;
use std::sync::Arc;

/// One item of a payload, in the order the model should see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadContent {
    /// Prompt text
    Text(String),
    /// Inline image bytes with their media type
    Image(ImageData),
    /// A document previously uploaded through a `DocumentStore`
    Document(DocumentHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PayloadInner {
    contents: Vec<PayloadContent>,
}

/// Ordered prompt text and attachments for one call.
///
/// Cloning is cheap: the item list sits behind an `Arc` and is only copied
/// when a builder method appends to it.
///
/// # Examples
///
/// ```rust
/// use llm_solver::agent::Payload;
/// use llm_solver::ImageData;
///
/// let payload = Payload::text("What is shown here?")
///     .with_image(ImageData::new("image/png", vec![0x89, 0x50]));
/// assert!(payload.has_images());
/// assert_eq!(payload.to_text(), "What is shown here?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    inner: Arc<PayloadInner>,
}

impl Payload {
    /// An empty payload.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PayloadInner {
                contents: Vec::new(),
            }),
        }
    }

    /// A payload holding only `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    /// Every item, in insertion order.
    pub fn contents(&self) -> &[PayloadContent] {
        &self.inner.contents
    }

    fn push(self, content: PayloadContent) -> Self {
        let mut contents = self.inner.contents.clone();
        contents.push(content);
        Self {
            inner: Arc::new(PayloadInner { contents }),
        }
    }

    /// Appends prompt text.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(PayloadContent::Text(text.into()))
    }

    /// Appends an inline image.
    pub fn with_image(self, image: ImageData) -> Self {
        self.push(PayloadContent::Image(image))
    }

    /// Appends a reference to an uploaded document.
    pub fn with_document(self, handle: DocumentHandle) -> Self {
        self.push(PayloadContent::Document(handle))
    }

    /// The prompt: every text item joined with `\n`.
    pub fn to_text(&self) -> String {
        self.inner
            .contents
            .iter()
            .filter_map(|item| match item {
                PayloadContent::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Inline images, in insertion order.
    pub fn images(&self) -> impl Iterator<Item = &ImageData> {
        self.inner.contents.iter().filter_map(|item| match item {
            PayloadContent::Image(image) => Some(image),
            _ => None,
        })
    }

    /// Document references, in insertion order.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentHandle> {
        self.inner.contents.iter().filter_map(|item| match item {
            PayloadContent::Document(handle) => Some(handle),
            _ => None,
        })
    }

    pub fn has_images(&self) -> bool {
        self.images().next().is_some()
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_payload() {
        let payload = Payload::from("hello");
        assert_eq!(payload.to_text(), "hello");
        assert!(!payload.has_images());
        assert_eq!(payload.documents().count(), 0);
    }

    #[test]
    fn test_mixed_payload_keeps_order() {
        let handle = DocumentHandle::new("files/abc", "application/pdf");
        let payload = Payload::text("first")
            .with_image(ImageData::new("image/png", vec![1, 2, 3]))
            .with_document(handle.clone())
            .with_text("second");

        assert_eq!(payload.contents().len(), 4);
        assert_eq!(payload.to_text(), "first\nsecond");
        assert_eq!(payload.images().count(), 1);
        assert_eq!(payload.documents().next(), Some(&handle));
    }

    #[test]
    fn test_clone_shares_contents() {
        let payload = Payload::text("shared");
        let cloned = payload.clone();
        assert!(Arc::ptr_eq(&payload.inner, &cloned.inner));
    }
}
