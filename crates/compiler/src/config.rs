//! Compiler configuration.
//!
//! Options that change how the pipeline runs but not what it accepts:
//! whether the driver stops at the first failing phase, whether
//! diagnostics use color, and the tab width used for column tracking.
//! A configuration can be loaded from a TOML file and is merged with
//! command-line flags by the driver.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Stop the pipeline after the first phase that reports an error
    /// instead of running every phase the inputs allow.
    pub abort_on_error: bool,
    /// ANSI color in rendered diagnostics.
    pub color: bool,
    /// Tabs advance the column counter to the next multiple of this.
    pub tab_width: u32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            abort_on_error: false,
            color: true,
            tab_width: 8,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abort_on_error(mut self, abort: bool) -> Self {
        self.abort_on_error = abort;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_tab_width(mut self, width: u32) -> Self {
        self.tab_width = width.max(1);
        self
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("invalid configuration: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        Self::from_toml(&content)
    }
}
