//! ANSI text styling
//!
//! Small SGR-sequence builder used by the renderer. Styles nest: painting a
//! string that already contains styled spans re-opens the outer style after
//! each inner reset, so a bold word inside a colored heading keeps the
//! heading's color on both sides.

use regex::Regex;
use std::sync::LazyLock;
use unicode_width::UnicodeWidthStr;

const RESET: &str = "\x1b[0m";

static SGR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid SGR regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    /// Bright black, what chalk calls gray.
    Gray,
    Rgb(u8, u8, u8),
}

impl Color {
    fn fg_code(self) -> String {
        match self {
            Color::Black => "30".into(),
            Color::Red => "31".into(),
            Color::Green => "32".into(),
            Color::Yellow => "33".into(),
            Color::Blue => "34".into(),
            Color::Magenta => "35".into(),
            Color::Cyan => "36".into(),
            Color::White => "37".into(),
            Color::Gray => "90".into(),
            Color::Rgb(r, g, b) => format!("38;2;{};{};{}", r, g, b),
        }
    }

    fn bg_code(self) -> String {
        match self {
            Color::Rgb(r, g, b) => format!("48;2;{};{};{}", r, g, b),
            Color::Black => "40".into(),
            Color::Red => "41".into(),
            Color::Green => "42".into(),
            Color::Yellow => "43".into(),
            Color::Blue => "44".into(),
            Color::Magenta => "45".into(),
            Color::Cyan => "46".into(),
            Color::White => "47".into(),
            Color::Gray => "100".into(),
        }
    }
}

/// A terminal text style. The default style is a no-op: `paint` returns its
/// input unchanged, which is how "reset" colorizers are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    fg: Option<Color>,
    bg: Option<Color>,
    bold: bool,
    italic: bool,
    underline: bool,
    dim: bool,
    strikethrough: bool,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    pub fn dim(mut self) -> Self {
        self.dim = true;
        self
    }

    pub fn strikethrough(mut self) -> Self {
        self.strikethrough = true;
        self
    }

    fn prefix(&self) -> String {
        let mut codes: Vec<String> = Vec::new();
        if self.bold {
            codes.push("1".into());
        }
        if self.dim {
            codes.push("2".into());
        }
        if self.italic {
            codes.push("3".into());
        }
        if self.underline {
            codes.push("4".into());
        }
        if self.strikethrough {
            codes.push("9".into());
        }
        if let Some(fg) = self.fg {
            codes.push(fg.fg_code());
        }
        if let Some(bg) = self.bg {
            codes.push(bg.bg_code());
        }
        if codes.is_empty() {
            String::new()
        } else {
            format!("\x1b[{}m", codes.join(";"))
        }
    }

    /// Wrap `text` in this style's escape sequences. Inner resets are
    /// reopened so nested styles compose.
    pub fn paint(&self, text: &str) -> String {
        let prefix = self.prefix();
        if prefix.is_empty() {
            return text.to_string();
        }
        let reopened = text.replace(RESET, &format!("{}{}", RESET, prefix));
        format!("{}{}{}", prefix, reopened, RESET)
    }
}

/// Remove all SGR escape sequences.
pub fn strip_ansi(text: &str) -> String {
    SGR_RE.replace_all(text, "").into_owned()
}

/// Printable character count, escape sequences excluded.
pub fn printable_len(text: &str) -> usize {
    strip_ansi(text).chars().count()
}

/// Terminal cell width of the printable text.
pub fn display_width(text: &str) -> usize {
    strip_ansi(text).width()
}

/// Split into alternating text and escape-sequence fragments so an escape
/// sequence is never divided by the reflow machinery. Fragments may be empty.
pub fn split_ansi(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut last = 0;
    for m in SGR_RE.find_iter(text) {
        parts.push(text[last..m.start()].to_string());
        parts.push(m.as_str().to_string());
        last = m.end();
    }
    parts.push(text[last..].to_string());
    parts
}

/// OSC 8 clickable hyperlink wrapping the display text.
pub fn hyperlink(text: &str, url: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// Whether the terminal advertises OSC 8 hyperlink support.
pub fn supports_hyperlinks() -> bool {
    if std::env::var_os("FORCE_HYPERLINK").is_some() {
        return true;
    }
    if let Ok(program) = std::env::var("TERM_PROGRAM") {
        if matches!(
            program.as_str(),
            "iTerm.app" | "WezTerm" | "vscode" | "ghostty" | "Hyper"
        ) {
            return true;
        }
    }
    if let Ok(vte) = std::env::var("VTE_VERSION") {
        if vte.parse::<u32>().map(|v| v >= 5000).unwrap_or(false) {
            return true;
        }
    }
    std::env::var_os("WT_SESSION").is_some() || std::env::var_os("DOMTERM").is_some()
}
