//! WC-010: Session collaborator contract.
//!
//! The engine only ever opens, navigates and closes a session. The page
//! primitives exist for plugins; a real browser driver implements the same
//! traits as [`memory::MemorySession`].

pub mod memory;

use crate::core::config::BrowserConfig;
use crate::core::error::SessionError;
use async_trait::async_trait;
use std::time::Duration;

/// A live browser page.
#[async_trait]
pub trait Session: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Release the session. The engine calls this exactly once per opened session.
    async fn close(&self) -> Result<(), SessionError>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), SessionError>;

    async fn fill(&self, selector: &str, text: &str, timeout: Duration)
        -> Result<(), SessionError>;

    /// Inner text of every element matching `selector`.
    async fn inner_texts(&self, selector: &str, timeout: Duration)
        -> Result<Vec<String>, SessionError>;

    /// Whether any element matching `selector` currently contains `text`.
    /// A missing element is `Ok(false)`, not an error.
    async fn text_contains(&self, selector: &str, text: &str) -> Result<bool, SessionError>;
}

/// Opens sessions from launch configuration.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, config: &BrowserConfig) -> Result<Box<dyn Session>, SessionError>;
}
