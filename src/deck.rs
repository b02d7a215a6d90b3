//! Deck loading
//!
//! A deck is one markdown file: an optional YAML frontmatter block with
//! per-deck overrides, then slides separated by `---` lines. Pointing mdeck
//! at a directory picks the most likely deck file in it.

use crate::logging;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Per-deck overrides from the frontmatter block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeckMeta {
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub theme: Option<String>,
    pub langs: Vec<String>,
    pub themes: Vec<String>,
}

/// Split a leading frontmatter block from the body. Returns defaults and
/// the whole input when there is no block; a malformed block is logged and
/// ignored rather than failing the deck.
pub fn split_metadata(md: &str) -> (DeckMeta, &str) {
    if !md.starts_with("---") {
        return (DeckMeta::default(), md);
    }
    let Some((end, terminator_len)) = frontmatter_end(md) else {
        return (DeckMeta::default(), md);
    };

    let meta_src = &md[..end];
    let body = &md[end + terminator_len..];
    match serde_yaml::from_str::<DeckMeta>(meta_src) {
        Ok(meta) => (meta, body),
        Err(err) => {
            logging::warn(&format!("deck metadata ignored: {}", err));
            (DeckMeta::default(), body)
        }
    }
}

// Frontmatter closes at the first "---" or "..." line after the opener.
fn frontmatter_end(md: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in md.split_inclusive('\n') {
        if offset > 0 {
            let trimmed = line.trim_end();
            if trimmed == "---" || trimmed == "..." {
                return Some((offset, line.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Split the body into slides on `---` separator lines, dropping empty
/// slides.
pub fn split_slides(body: &str) -> Vec<String> {
    body.trim()
        .split("\n---\n")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Resolve the input path to a deck file. A directory input picks a
/// contained `.md` file, preferring readme/home/index names.
pub fn resolve_input(input: Option<PathBuf>) -> Result<PathBuf> {
    let path = input.unwrap_or(std::env::current_dir()?);
    if !path.exists() {
        return Err(anyhow!(
            "markdown file is required. example: mdeck path/of/deck.md"
        ));
    }
    if path.is_file() {
        return Ok(path);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    if candidates.is_empty() {
        return Err(anyhow!("no markdown file found in {}", path.display()));
    }
    candidates.sort_by_key(|p| (!is_preferred_name(p), p.clone()));
    if candidates.len() > 1 {
        logging::info(&format!(
            "multiple markdown files found, using {}",
            candidates[0].display()
        ));
    }
    Ok(candidates.remove(0))
}

fn is_preferred_name(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| {
            let lower = s.to_lowercase();
            lower.contains("readme") || lower.contains("home") || lower.contains("index")
        })
        .unwrap_or(false)
}
