//! Configuration file support for mdeck
//!
//! Config is loaded from `~/.mdeck/config.toml` (or `$MDECK_HOME/config.toml`).
//! Deck frontmatter overrides config values for the one deck being shown.

use crate::deck::DeckMeta;
use crate::highlight::HighlightOptions;
use crate::logging;
use crate::render::{RenderOptions, TabStop};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root of mdeck's state (config, logs).
pub fn mdeck_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MDECK_HOME") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".mdeck"))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub highlight: HighlightConfig,
}

/// Display/rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Fixed render width; unset means the terminal width.
    pub width: Option<u16>,
    /// Fixed render height; unset means the terminal height.
    pub height: Option<u16>,
    /// Rewrap text to the render width.
    pub reflow: bool,
    /// Prefix headings with their `#` markers.
    pub heading_prefix: bool,
    /// Replace `:shortcode:` with emoji.
    pub emoji: bool,
    /// Tab rendering: a space count or a literal tab string.
    pub tab: TabStop,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            reflow: true,
            heading_prefix: true,
            emoji: true,
            tab: TabStop::default(),
        }
    }
}

/// Syntax-highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Language identifiers expected in decks.
    pub langs: Vec<String>,
    /// Theme identifiers expected in decks.
    pub themes: Vec<String>,
    /// Theme used for rendering.
    pub theme: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        let opts = HighlightOptions::default();
        Self {
            langs: opts.langs,
            themes: opts.themes,
            theme: opts.theme,
        }
    }
}

impl Config {
    /// Load from disk; missing file or parse failure falls back to
    /// defaults (the failure is logged, not fatal).
    pub fn load() -> Self {
        let Some(path) = mdeck_dir().map(|dir| dir.join("config.toml")) else {
            return Self::default();
        };
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(err) => {
                logging::warn(&format!("invalid {}: {}", path.display(), err));
                Self::default()
            }
        }
    }

    /// Render options for one deck at the given terminal size. Frontmatter
    /// wins over config, config over the measured terminal.
    pub fn render_options(&self, meta: &DeckMeta, term_width: u16) -> RenderOptions {
        let width = meta.width.or(self.display.width).unwrap_or(term_width);
        RenderOptions {
            width: width as usize,
            reflow: self.display.reflow,
            show_heading_prefix: self.display.heading_prefix,
            emoji: self.display.emoji,
            tab: self.display.tab.clone(),
            ..RenderOptions::default()
        }
    }

    /// Highlighter options for one deck: candidate lists are unioned with
    /// the frontmatter's, the theme is overridden when the deck names one.
    pub fn highlight_options(&self, meta: &DeckMeta) -> HighlightOptions {
        let mut opts = HighlightOptions {
            langs: self.highlight.langs.clone(),
            themes: self.highlight.themes.clone(),
            theme: self.highlight.theme.clone(),
        };
        let incoming = HighlightOptions {
            langs: meta.langs.clone(),
            themes: meta.themes.clone(),
            theme: meta.theme.clone().unwrap_or_else(|| opts.theme.clone()),
        };
        opts.merge(&incoming);
        opts
    }

    /// Viewport dimensions for the cache key, after overrides.
    pub fn viewport(&self, meta: &DeckMeta, term: (u16, u16)) -> (u16, u16) {
        let width = meta.width.or(self.display.width).unwrap_or(term.0);
        let height = meta.height.or(self.display.height).unwrap_or(term.1);
        (width, height)
    }
}
