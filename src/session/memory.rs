//! WC-011: Deterministic in-memory page session.
//!
//! Backs the CLI and the tests. A page fixture declares which selectors exist
//! and what text they hold; every interaction is recorded so callers can
//! inspect what a recipe did after the run.

use super::{Session, SessionProvider};
use crate::core::config::BrowserConfig;
use crate::core::error::SessionError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Text of one selector: a single element or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElementText {
    One(String),
    Many(Vec<String>),
}

impl ElementText {
    fn texts(&self) -> Vec<String> {
        match self {
            Self::One(t) => vec![t.clone()],
            Self::Many(ts) => ts.clone(),
        }
    }
}

/// Declarative page model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    #[serde(default)]
    pub elements: IndexMap<String, ElementText>,

    /// URLs whose navigation fails
    #[serde(default)]
    pub unreachable: Vec<String>,
}

impl PageFixture {
    /// Load a YAML (or JSON) fixture file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        serde_yaml_ng::from_str(&text)
            .map_err(|e| format!("page fixture {}: {}", path.display(), e))
    }

    pub fn with_element(mut self, selector: &str, text: &str) -> Self {
        self.elements
            .insert(selector.to_string(), ElementText::One(text.to_string()));
        self
    }
}

/// One recorded session interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    Open,
    Navigate(String),
    Click(String),
    Fill { selector: String, text: String },
    Close,
}

#[derive(Debug, Default)]
struct PageState {
    elements: IndexMap<String, ElementText>,
    log: Vec<Interaction>,
    closed: bool,
}

fn lock(state: &Mutex<PageState>) -> MutexGuard<'_, PageState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Provider handing out sessions over one shared page model.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    unreachable: Vec<String>,
    state: Arc<Mutex<PageState>>,
}

impl MemoryProvider {
    pub fn new(fixture: PageFixture) -> Self {
        Self {
            unreachable: fixture.unreachable,
            state: Arc::new(Mutex::new(PageState {
                elements: fixture.elements,
                ..PageState::default()
            })),
        }
    }

    /// Everything the sessions of this provider have done, in order.
    pub fn interactions(&self) -> Vec<Interaction> {
        lock(&self.state).log.clone()
    }

    /// Current text of `selector` (reflects `fill`).
    pub fn element_texts(&self, selector: &str) -> Option<Vec<String>> {
        lock(&self.state).elements.get(selector).map(ElementText::texts)
    }
}

#[async_trait]
impl SessionProvider for MemoryProvider {
    async fn open(&self, config: &BrowserConfig) -> Result<Box<dyn Session>, SessionError> {
        tracing::debug!(
            width = config.viewport.width,
            height = config.viewport.height,
            "Opening in-memory session"
        );
        let mut state = lock(&self.state);
        state.closed = false;
        state.log.push(Interaction::Open);
        Ok(Box::new(MemorySession {
            unreachable: self.unreachable.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MemorySession {
    unreachable: Vec<String>,
    state: Arc<Mutex<PageState>>,
}

impl MemorySession {
    fn live(&self) -> Result<MutexGuard<'_, PageState>, SessionError> {
        let state = lock(&self.state);
        if state.closed {
            return Err(SessionError::Page("session is closed".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut state = self.live()?;
        state.log.push(Interaction::Navigate(url.to_string()));
        if self.unreachable.iter().any(|u| u == url) {
            return Err(SessionError::Navigate {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        let mut state = self.live()?;
        state.closed = true;
        state.log.push(Interaction::Close);
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), SessionError> {
        let mut state = self.live()?;
        if !state.elements.contains_key(selector) {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        state.log.push(Interaction::Click(selector.to_string()));
        Ok(())
    }

    async fn fill(
        &self,
        selector: &str,
        text: &str,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        let mut state = self.live()?;
        let Some(element) = state.elements.get_mut(selector) else {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        };
        *element = ElementText::One(text.to_string());
        state.log.push(Interaction::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn inner_texts(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Vec<String>, SessionError> {
        let state = self.live()?;
        state
            .elements
            .get(selector)
            .map(ElementText::texts)
            .ok_or_else(|| SessionError::ElementNotFound(selector.to_string()))
    }

    async fn text_contains(&self, selector: &str, text: &str) -> Result<bool, SessionError> {
        let state = self.live()?;
        Ok(state
            .elements
            .get(selector)
            .is_some_and(|e| e.texts().iter().any(|t| t.contains(text))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"
elements:
  "#title": Welcome
  "li.item": [one, two, three]
  "#name": ""
unreachable:
  - https://down.example.com
"##;

    fn provider() -> MemoryProvider {
        MemoryProvider::new(serde_yaml_ng::from_str(FIXTURE).unwrap())
    }

    #[tokio::test]
    async fn test_wc011_open_navigate_close_recorded() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        s.navigate("https://example.com").await.unwrap();
        s.close().await.unwrap();
        assert_eq!(
            p.interactions(),
            vec![
                Interaction::Open,
                Interaction::Navigate("https://example.com".into()),
                Interaction::Close
            ]
        );
    }

    #[tokio::test]
    async fn test_wc011_unreachable_navigation() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        let err = s.navigate("https://down.example.com").await.unwrap_err();
        assert!(matches!(err, SessionError::Navigate { .. }));
    }

    #[tokio::test]
    async fn test_wc011_inner_texts() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        let t = Duration::from_millis(10);
        assert_eq!(s.inner_texts("#title", t).await.unwrap(), vec!["Welcome"]);
        assert_eq!(
            s.inner_texts("li.item", t).await.unwrap(),
            vec!["one", "two", "three"]
        );
        assert!(matches!(
            s.inner_texts("#missing", t).await,
            Err(SessionError::ElementNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_wc011_fill_updates_page() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        s.fill("#name", "ada", Duration::from_millis(10)).await.unwrap();
        assert_eq!(p.element_texts("#name"), Some(vec!["ada".to_string()]));
        assert!(s.text_contains("#name", "ad").await.unwrap());
        assert!(!s.text_contains("#missing", "ad").await.unwrap());
    }

    #[tokio::test]
    async fn test_wc011_click_missing_element() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        let err = s.click("#nope", Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SessionError::ElementNotFound(ref sel) if sel == "#nope"));
        assert_eq!(p.interactions(), vec![Interaction::Open]);
    }

    #[tokio::test]
    async fn test_wc011_closed_session_rejects_calls() {
        let p = provider();
        let s = p.open(&BrowserConfig::default()).await.unwrap();
        s.close().await.unwrap();
        assert!(matches!(
            s.click("#title", Duration::from_millis(10)).await,
            Err(SessionError::Page(_))
        ));
        assert!(s.close().await.is_err());
    }

    #[test]
    fn test_wc011_fixture_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.yaml");
        std::fs::write(&path, FIXTURE).unwrap();
        let fixture = PageFixture::load(&path).unwrap();
        assert_eq!(fixture.elements.len(), 3);
        assert_eq!(fixture.unreachable, vec!["https://down.example.com"]);
        assert!(PageFixture::load(&dir.path().join("missing.yaml")).is_err());
    }
}
