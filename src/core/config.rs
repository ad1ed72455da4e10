//! WC-008: Runner configuration (`webchefrc`).
//!
//! A small JSON file next to the recipe. Everything is optional: browser
//! launch options are opaque and handed to the session provider untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Default rc file name, looked up in the working directory.
pub const DEFAULT_RC_FILE: &str = "webchefrc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// What a session provider needs to open a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserConfig {
    /// Opaque launch options (headless, args, executable path, ...)
    pub options: Map<String, Value>,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChefConfig {
    #[serde(default)]
    pub browser: Map<String, Value>,

    #[serde(default)]
    pub viewport: Viewport,

    /// Append run events to this JSONL file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<PathBuf>,

    /// Page fixture for the in-memory session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PathBuf>,
}

impl ChefConfig {
    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            options: self.browser.clone(),
            viewport: self.viewport,
        }
    }

    /// Make relative `journal`/`page` paths relative to `base`.
    fn anchor(mut self, base: &Path) -> Self {
        let anchor = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        self.journal = self.journal.map(anchor);
        self.page = self.page.map(anchor);
        self
    }
}

/// Parse rc file text.
pub fn parse_config(text: &str) -> Result<ChefConfig, String> {
    serde_json::from_str(text).map_err(|e| format!("rc parse error: {}", e))
}

/// Load an rc file. A missing file is an error only when `required`; paths
/// inside it are resolved against the file's directory.
pub fn load_config(path: &Path, required: bool) -> Result<ChefConfig, String> {
    if !required && !path.exists() {
        return Ok(ChefConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let config = parse_config(&text).map_err(|e| format!("{}: {}", path.display(), e))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    Ok(config.anchor(base))
}
