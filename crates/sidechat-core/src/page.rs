//! Live page context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the page-content extractor reports about the current page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Page body rendered as markdown.
    pub content: String,
}

impl PageContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Source of the live page context.
///
/// The engine never inspects the document itself; the host supplies an
/// implementation.
#[async_trait]
pub trait PageContextProvider: Send + Sync {
    async fn current(&self) -> PageContext;
}
