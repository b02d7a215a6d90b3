//! Syntax highlighting for fenced code blocks
//!
//! Built on syntect. Grammar and theme resources live in an explicit
//! [`GrammarThemeCache`] owned by the [`Highlighter`], not a hidden global.
//! The cache grows monotonically: a grammar/theme pair is resolved at most
//! once, repeated requests are lookups.

use crate::error::HighlightError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, ThemeSet};
use syntect::parsing::SyntaxSet;

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Highlighter configuration surface. Merging is additive for the candidate
/// lists and overwriting for scalars; the lists never shrink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightOptions {
    /// Language identifiers expected in this session.
    pub langs: Vec<String>,
    /// Theme identifiers expected in this session.
    pub themes: Vec<String>,
    /// Theme used for rendering.
    pub theme: String,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            langs: ["console", "bash", "js", "jsx", "ts", "tsx", "json", "yaml", "md", "html", "css"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            themes: vec![DEFAULT_THEME.to_string()],
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl HighlightOptions {
    /// Field-by-field merge: `langs` and `themes` are unioned preserving
    /// first-seen order, `theme` is overwritten. Implicit "merge the two
    /// structs" semantics are exactly what this exists to avoid.
    pub fn merge(&mut self, incoming: &HighlightOptions) {
        union_into(&mut self.langs, &incoming.langs);
        union_into(&mut self.themes, &incoming.themes);
        self.theme = incoming.theme.clone();
    }
}

fn union_into(dest: &mut Vec<String>, src: &[String]) {
    for item in src {
        if !dest.iter().any(|d| d == item) {
            dest.push(item.clone());
        }
    }
}

/// One styled span of a highlighted source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub fg: (u8, u8, u8),
    pub font: FontStyle,
}

impl StyledRun {
    fn from_syntect(style: SynStyle, text: &str) -> Self {
        Self {
            text: text.to_string(),
            fg: (style.foreground.r, style.foreground.g, style.foreground.b),
            font: style.font_style,
        }
    }

    /// Serialize to an SGR prefix plus text plus reset.
    pub fn to_ansi(&self) -> String {
        let mut codes = Vec::new();
        if self.font.contains(FontStyle::BOLD) {
            codes.push("1".to_string());
        }
        if self.font.contains(FontStyle::ITALIC) {
            codes.push("3".to_string());
        }
        if self.font.contains(FontStyle::UNDERLINE) {
            codes.push("4".to_string());
        }
        let (r, g, b) = self.fg;
        codes.push(format!("38;2;{};{};{}", r, g, b));
        format!("\x1b[{}m{}\x1b[0m", codes.join(";"), self.text)
    }
}

/// Lazily-built grammar and theme store. Load-once, append-only.
struct GrammarThemeCache {
    syntaxes: Option<SyntaxSet>,
    themes: Option<ThemeSet>,
    resolved_grammars: HashSet<String>,
    resolved_themes: HashSet<String>,
    grammar_loads: usize,
    theme_loads: usize,
}

impl GrammarThemeCache {
    fn new() -> Self {
        Self {
            syntaxes: None,
            themes: None,
            resolved_grammars: HashSet::new(),
            resolved_themes: HashSet::new(),
            grammar_loads: 0,
            theme_loads: 0,
        }
    }

    fn ensure_sets(&mut self) {
        if self.syntaxes.is_none() {
            self.syntaxes = Some(SyntaxSet::load_defaults_newlines());
        }
        if self.themes.is_none() {
            self.themes = Some(ThemeSet::load_defaults());
        }
    }

    /// Validate the pair and record first-time loads. Idempotent.
    fn ensure_loaded(&mut self, lang: &str, theme: &str) -> Result<(), HighlightError> {
        self.ensure_sets();
        let syntaxes = self.syntaxes.as_ref().expect("sets ensured");
        let themes = self.themes.as_ref().expect("sets ensured");

        let syntax = syntaxes
            .find_syntax_by_token(lang)
            .ok_or_else(|| HighlightError::UnknownLanguage(lang.to_string()))?;
        if self.resolved_grammars.insert(syntax.name.clone()) {
            self.grammar_loads += 1;
        }

        if !themes.themes.contains_key(theme) {
            return Err(HighlightError::UnknownTheme(theme.to_string()));
        }
        if self.resolved_themes.insert(theme.to_string()) {
            self.theme_loads += 1;
        }
        Ok(())
    }
}

/// Tokenizes code into styled runs and serializes them to ANSI lines.
pub struct Highlighter {
    options: Mutex<HighlightOptions>,
    cache: Mutex<GrammarThemeCache>,
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new(HighlightOptions::default())
    }
}

impl Highlighter {
    pub fn new(options: HighlightOptions) -> Self {
        Self {
            options: Mutex::new(options),
            cache: Mutex::new(GrammarThemeCache::new()),
        }
    }

    /// Merge `incoming` into this highlighter's configuration.
    pub fn configure(&self, incoming: &HighlightOptions) {
        self.options.lock().unwrap().merge(incoming);
    }

    /// Theme used when the caller does not pick one per call.
    pub fn theme(&self) -> String {
        self.options.lock().unwrap().theme.clone()
    }

    /// Highlight `code` as `lang` under `theme`. Empty input is returned
    /// unchanged. Unknown identifiers fail; the document pipeline catches
    /// that and keeps the raw text.
    pub fn highlight(
        &self,
        code: &str,
        lang: &str,
        theme: &str,
    ) -> Result<String, HighlightError> {
        if code.is_empty() {
            return Ok(code.to_string());
        }

        {
            let mut opts = self.options.lock().unwrap();
            union_into(&mut opts.langs, std::slice::from_ref(&lang.to_string()));
            union_into(&mut opts.themes, std::slice::from_ref(&theme.to_string()));
        }

        let mut cache = self.cache.lock().unwrap();
        cache.ensure_loaded(lang, theme)?;
        let syntaxes = cache.syntaxes.as_ref().expect("sets ensured");
        let themes = cache.themes.as_ref().expect("sets ensured");
        let syntax = syntaxes
            .find_syntax_by_token(lang)
            .ok_or_else(|| HighlightError::UnknownLanguage(lang.to_string()))?;
        let theme_ref = themes
            .themes
            .get(theme)
            .ok_or_else(|| HighlightError::UnknownTheme(theme.to_string()))?;

        let mut highlighter = HighlightLines::new(syntax, theme_ref);
        let mut out = Vec::new();
        for line in code.lines() {
            let ranges = highlighter
                .highlight_line(line, syntaxes)
                .map_err(|e| HighlightError::Tokenize(e.to_string()))?;
            let rendered: String = ranges
                .into_iter()
                .map(|(style, text)| StyledRun::from_syntect(style, text).to_ansi())
                .collect();
            out.push(rendered);
        }
        Ok(out.join("\n"))
    }

    /// Distinct grammars resolved so far.
    pub fn grammar_loads(&self) -> usize {
        self.cache.lock().unwrap().grammar_loads
    }

    /// Distinct themes resolved so far.
    pub fn theme_loads(&self) -> usize {
        self.cache.lock().unwrap().theme_loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::strip_ansi;

    #[test]
    fn test_empty_code_unchanged() {
        let hl = Highlighter::default();
        assert_eq!(hl.highlight("", "js", DEFAULT_THEME).unwrap(), "");
        assert_eq!(hl.grammar_loads(), 0);
    }

    #[test]
    fn test_highlight_is_deterministic() {
        let hl = Highlighter::default();
        let a = hl.highlight("const x = 1;", "js", DEFAULT_THEME).unwrap();
        let b = hl.highlight("const x = 1;", "js", DEFAULT_THEME).unwrap();
        assert_eq!(a, b);
        assert_eq!(strip_ansi(&a), "const x = 1;");
    }

    #[test]
    fn test_grammar_and_theme_load_once() {
        let hl = Highlighter::default();
        for _ in 0..3 {
            hl.highlight("let y = 2", "js", DEFAULT_THEME).unwrap();
        }
        // "javascript" resolves to the same grammar as "js".
        hl.highlight("let z = 3", "javascript", DEFAULT_THEME).unwrap();
        assert_eq!(hl.grammar_loads(), 1);
        assert_eq!(hl.theme_loads(), 1);

        hl.highlight("echo hi", "bash", DEFAULT_THEME).unwrap();
        assert_eq!(hl.grammar_loads(), 2);
    }

    #[test]
    fn test_unknown_language_fails() {
        let hl = Highlighter::default();
        let err = hl.highlight("x", "not-a-language", DEFAULT_THEME).unwrap_err();
        assert!(matches!(err, HighlightError::UnknownLanguage(_)));
    }

    #[test]
    fn test_unknown_theme_fails() {
        let hl = Highlighter::default();
        let err = hl.highlight("x", "js", "no-such-theme").unwrap_err();
        assert!(matches!(err, HighlightError::UnknownTheme(_)));
    }

    #[test]
    fn test_multiline_output_preserves_lines() {
        let hl = Highlighter::default();
        let out = hl.highlight("a = 1\nb = 2", "py", DEFAULT_THEME).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert_eq!(strip_ansi(&out), "a = 1\nb = 2");
    }

    #[test]
    fn test_options_merge_unions_lists() {
        let mut base = HighlightOptions {
            langs: vec!["js".into(), "ts".into()],
            themes: vec![DEFAULT_THEME.into()],
            theme: DEFAULT_THEME.into(),
        };
        let incoming = HighlightOptions {
            langs: vec!["ts".into(), "rust".into()],
            themes: vec![DEFAULT_THEME.into(), "InspiredGitHub".into()],
            theme: "InspiredGitHub".into(),
        };
        base.merge(&incoming);
        assert_eq!(base.langs, vec!["js", "ts", "rust"]);
        assert_eq!(base.themes, vec![DEFAULT_THEME, "InspiredGitHub"]);
        assert_eq!(base.theme, "InspiredGitHub");
    }
}
