//! ANSI markdown rendering
//!
//! Pure mapping from a parsed markdown document plus [`RenderOptions`] to a
//! styled terminal string. The pulldown-cmark event stream is first folded
//! into an explicit block tree; lists and tables are carried as structure
//! until the final serialization step, so no sentinel substrings ever pass
//! through the text pipeline.

pub mod list;
pub mod reflow;
pub mod table;

use crate::style::{self, Color, Style};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use table::CellAlign;

static EMOJI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z0-9_+-]+):").expect("valid emoji regex"));

/// Tab rendering: a space count or a literal whitespace string. Literal
/// strings are only honored if they consist of actual tab characters;
/// anything else falls back to the default silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TabStop {
    Width(usize),
    Literal(String),
}

impl Default for TabStop {
    fn default() -> Self {
        TabStop::Width(2)
    }
}

impl TabStop {
    pub fn sanitize(&self) -> String {
        match self {
            TabStop::Width(n) => " ".repeat(*n),
            TabStop::Literal(s) if !s.is_empty() && s.chars().all(|c| c == '\t') => s.clone(),
            TabStop::Literal(_) => " ".repeat(2),
        }
    }
}

/// Full renderer configuration. Every node type has a named colorizer;
/// `Style::new()` (a no-op) is the "reset" choice.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub code: Style,
    pub blockquote: Style,
    pub html: Style,
    pub heading: Style,
    pub first_heading: Style,
    pub hr: Style,
    pub listitem: Style,
    pub table: Style,
    pub paragraph: Style,
    pub strong: Style,
    pub em: Style,
    pub codespan: Style,
    pub del: Style,
    pub link: Style,
    pub href: Style,
    /// Undo residual HTML entity escaping in raw html text.
    pub unescape: bool,
    /// Replace `:shortcode:` with the emoji it names.
    pub emoji: bool,
    /// Target printable width for reflow, rules and tables.
    pub width: usize,
    /// Prefix headings with their `#` markers.
    pub show_heading_prefix: bool,
    /// Rewrap paragraph and heading text to `width`.
    pub reflow: bool,
    pub tab: TabStop,
    /// Emit OSC 8 clickable links instead of `text (url)`.
    pub hyperlinks: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            code: Style::new().fg(Color::Yellow),
            blockquote: Style::new().fg(Color::Gray).italic(),
            html: Style::new().fg(Color::Gray),
            heading: Style::new().fg(Color::Green).bold(),
            first_heading: Style::new().fg(Color::Magenta).underline().bold(),
            hr: Style::new(),
            listitem: Style::new(),
            table: Style::new(),
            paragraph: Style::new(),
            strong: Style::new().bold(),
            em: Style::new().italic(),
            codespan: Style::new().fg(Color::Yellow),
            del: Style::new().dim().fg(Color::Gray).strikethrough(),
            link: Style::new().fg(Color::Blue),
            href: Style::new().fg(Color::Blue).underline(),
            unescape: true,
            emoji: true,
            width: 80,
            show_heading_prefix: true,
            reflow: true,
            tab: TabStop::default(),
            hyperlinks: style::supports_hyperlinks(),
        }
    }
}

/// Parser extensions the renderer consumes. Shared with the code-block
/// collection pass so both walks see identical event streams.
pub fn md_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
}

pub fn parser(source: &str) -> Parser<'_> {
    Parser::new_ext(source, md_options())
}

#[derive(Debug, Clone)]
enum Block {
    Heading { level: u8, text: String },
    Paragraph(String),
    Code { text: String, highlighted: bool },
    List { ordered: bool, items: Vec<Vec<Block>> },
    Quote(Vec<Block>),
    Table {
        aligns: Vec<CellAlign>,
        head: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Rule,
    Html(String),
}

/// Render `source` to the final ANSI string. `highlights` carries one entry
/// per fenced code block in document order: `Some` replaces the block's
/// text with the pre-highlighted ANSI form, `None` keeps the raw text.
pub fn render(source: &str, opts: &RenderOptions, highlights: Vec<Option<String>>) -> String {
    let mut builder = TreeBuilder {
        opts,
        highlights: highlights.into_iter(),
    };
    let mut events = parser(source);
    let blocks = builder.blocks(&mut events);

    let tab = opts.tab.sanitize();
    let rendered = serialize(&blocks, opts, &tab, opts.width);
    if rendered.is_empty() {
        rendered
    } else {
        format!("{}\n", rendered)
    }
}

struct TreeBuilder<'o> {
    opts: &'o RenderOptions,
    highlights: std::vec::IntoIter<Option<String>>,
}

impl<'o> TreeBuilder<'o> {
    fn blocks<'e, I>(&mut self, events: &mut I) -> Vec<Block>
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut blocks = Vec::new();
        let mut pending = String::new();

        macro_rules! flush {
            () => {
                if !pending.is_empty() {
                    blocks.push(Block::Paragraph(std::mem::take(&mut pending)));
                }
            };
        }

        while let Some(ev) = events.next() {
            match ev {
                Event::Start(Tag::Paragraph) => {
                    flush!();
                    blocks.push(Block::Paragraph(self.inlines(events)));
                }
                Event::Start(Tag::Heading { level, .. }) => {
                    flush!();
                    blocks.push(Block::Heading {
                        level: heading_depth(level),
                        text: self.inlines(events),
                    });
                }
                Event::Start(Tag::BlockQuote(_)) => {
                    flush!();
                    blocks.push(Block::Quote(self.blocks(events)));
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    flush!();
                    blocks.push(self.code_block(kind, events));
                }
                Event::Start(Tag::List(start)) => {
                    flush!();
                    blocks.push(self.list(start.is_some(), events));
                }
                Event::Start(Tag::Table(aligns)) => {
                    flush!();
                    blocks.push(self.table(&aligns, events));
                }
                Event::Start(Tag::HtmlBlock) => {
                    flush!();
                    let raw = self.raw_text(events);
                    blocks.push(Block::Html(raw));
                }
                // Inline container opening at block level: a tight list item.
                Event::Start(tag) => {
                    pending.push_str(&self.inline_container(tag, events));
                }
                Event::Text(t) => pending.push_str(&self.text(&t)),
                Event::Code(c) => pending.push_str(&self.codespan(&c)),
                Event::InlineHtml(h) => pending.push_str(&self.html_text(&h)),
                Event::Html(h) => {
                    flush!();
                    blocks.push(Block::Html(h.to_string()));
                }
                Event::SoftBreak => pending.push(self.soft_break()),
                Event::HardBreak => pending.push(self.hard_break()),
                Event::Rule => {
                    flush!();
                    blocks.push(Block::Rule);
                }
                Event::TaskListMarker(done) => {
                    pending.push_str(checkbox(done));
                }
                Event::End(_) => break,
                _ => {}
            }
        }

        if !pending.is_empty() {
            blocks.push(Block::Paragraph(pending));
        }
        blocks
    }

    fn inlines<'e, I>(&mut self, events: &mut I) -> String
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut out = String::new();
        while let Some(ev) = events.next() {
            match ev {
                Event::Start(tag) => out.push_str(&self.inline_container(tag, events)),
                Event::Text(t) => out.push_str(&self.text(&t)),
                Event::Code(c) => out.push_str(&self.codespan(&c)),
                Event::InlineHtml(h) | Event::Html(h) => out.push_str(&self.html_text(&h)),
                Event::SoftBreak => out.push(self.soft_break()),
                Event::HardBreak => out.push(self.hard_break()),
                Event::TaskListMarker(done) => out.push_str(checkbox(done)),
                Event::End(_) => break,
                _ => {}
            }
        }
        out
    }

    fn inline_container<'e, I>(&mut self, tag: Tag<'e>, events: &mut I) -> String
    where
        I: Iterator<Item = Event<'e>>,
    {
        match tag {
            Tag::Strong => self.opts.strong.paint(&self.inlines(events)),
            Tag::Emphasis => self.opts.em.paint(&self.inlines(events)),
            Tag::Strikethrough => self.opts.del.paint(&self.inlines(events)),
            Tag::Link { dest_url, .. } => {
                let text = self.inlines(events);
                self.link(&text, &dest_url)
            }
            Tag::Image { dest_url, title, .. } => {
                let alt = self.inlines(events);
                let mut out = format!("![{}", alt);
                if !title.is_empty() {
                    out.push_str(&format!(" – {}", title));
                }
                out.push_str(&format!("]({})", dest_url));
                out
            }
            // Unknown container: render its content unstyled.
            _ => self.inlines(events),
        }
    }

    fn code_block<'e, I>(&mut self, kind: CodeBlockKind<'e>, events: &mut I) -> Block
    where
        I: Iterator<Item = Event<'e>>,
    {
        let raw = self.raw_text(events);
        let raw = raw.trim_end_matches('\n').to_string();
        match kind {
            CodeBlockKind::Fenced(_) => match self.highlights.next().flatten() {
                Some(ansi) => Block::Code {
                    text: ansi,
                    highlighted: true,
                },
                None => Block::Code {
                    text: raw,
                    highlighted: false,
                },
            },
            CodeBlockKind::Indented => Block::Code {
                text: raw,
                highlighted: false,
            },
        }
    }

    fn list<'e, I>(&mut self, ordered: bool, events: &mut I) -> Block
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut items = Vec::new();
        while let Some(ev) = events.next() {
            match ev {
                Event::Start(Tag::Item) => items.push(self.blocks(events)),
                Event::End(_) => break,
                _ => {}
            }
        }
        Block::List { ordered, items }
    }

    fn table<'e, I>(&mut self, aligns: &[Alignment], events: &mut I) -> Block
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut head = Vec::new();
        let mut rows = Vec::new();
        while let Some(ev) = events.next() {
            match ev {
                Event::Start(Tag::TableHead) => head = self.row(events),
                Event::Start(Tag::TableRow) => rows.push(self.row(events)),
                Event::End(_) => break,
                _ => {}
            }
        }
        Block::Table {
            aligns: aligns.iter().map(cell_align).collect(),
            head,
            rows,
        }
    }

    fn row<'e, I>(&mut self, events: &mut I) -> Vec<String>
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut cells = Vec::new();
        while let Some(ev) = events.next() {
            match ev {
                Event::Start(Tag::TableCell) => cells.push(self.inlines(events)),
                Event::End(_) => break,
                _ => {}
            }
        }
        cells
    }

    fn raw_text<'e, I>(&mut self, events: &mut I) -> String
    where
        I: Iterator<Item = Event<'e>>,
    {
        let mut out = String::new();
        for ev in events.by_ref() {
            match ev {
                Event::Text(t) => out.push_str(&t),
                Event::Html(h) | Event::InlineHtml(h) => out.push_str(&h),
                Event::End(_) => break,
                _ => {}
            }
        }
        out
    }

    fn text(&self, text: &str) -> String {
        if self.opts.emoji {
            insert_emojis(text)
        } else {
            text.to_string()
        }
    }

    fn html_text(&self, html: &str) -> String {
        let text = if self.opts.unescape {
            unescape_entities(html)
        } else {
            html.to_string()
        };
        self.opts.html.paint(&text)
    }

    fn codespan(&self, code: &str) -> String {
        self.opts.codespan.paint(code)
    }

    fn link(&self, text: &str, url: &str) -> String {
        let has_text = !text.is_empty() && text != url;
        if self.opts.hyperlinks {
            let label = if has_text { text } else { url };
            let inner = self.opts.href.paint(label);
            return self.opts.link.paint(&style::hyperlink(&inner, url));
        }
        let mut out = String::new();
        if has_text {
            out.push_str(text);
            out.push_str(" (");
        }
        out.push_str(&self.opts.href.paint(url));
        if has_text {
            out.push(')');
        }
        self.opts.link.paint(&out)
    }

    fn soft_break(&self) -> char {
        if self.opts.reflow { ' ' } else { '\n' }
    }

    fn hard_break(&self) -> char {
        if self.opts.reflow {
            reflow::HARD_BREAK
        } else {
            '\n'
        }
    }
}

fn serialize(blocks: &[Block], opts: &RenderOptions, tab: &str, width: usize) -> String {
    let sections: Vec<String> = blocks
        .iter()
        .map(|b| render_block(b, opts, tab, width))
        .filter(|s| !s.is_empty())
        .collect();
    sections.join("\n\n")
}

fn render_block(block: &Block, opts: &RenderOptions, tab: &str, width: usize) -> String {
    match block {
        Block::Heading { level, text } => {
            let prefix = if opts.show_heading_prefix {
                format!("{} ", "#".repeat(*level as usize))
            } else {
                String::new()
            };
            let mut text = format!("{}{}", prefix, text);
            if opts.reflow {
                text = reflow::reflow(&text, width);
            }
            if *level == 1 {
                opts.first_heading.paint(&text)
            } else {
                opts.heading.paint(&text)
            }
        }
        Block::Paragraph(text) => {
            let styled = opts.paragraph.paint(text);
            if opts.reflow {
                reflow::reflow(&styled, width)
            } else {
                styled.replace(reflow::HARD_BREAK, "\n")
            }
        }
        Block::Code { text, highlighted } => {
            let body = if *highlighted {
                text.clone()
            } else {
                text.lines()
                    .map(|l| opts.code.paint(l))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            indent_all(tab, &body)
        }
        Block::List { ordered, items } => render_list(items, *ordered, opts, tab, width),
        Block::Quote(inner) => {
            let body = serialize(inner, opts, tab, width.saturating_sub(tab.chars().count()));
            opts.blockquote.paint(&indent_all(tab, body.trim()))
        }
        Block::Table { aligns, head, rows } => {
            opts.table.paint(&table::render_table(head, rows, aligns))
        }
        Block::Rule => opts.hr.paint(&"-".repeat(width.max(1))),
        Block::Html(text) => {
            let text = if opts.unescape {
                unescape_entities(text)
            } else {
                text.clone()
            };
            opts.html.paint(text.trim_end())
        }
    }
}

fn render_list(
    items: &[Vec<Block>],
    ordered: bool,
    opts: &RenderOptions,
    tab: &str,
    width: usize,
) -> String {
    let indent_width = tab.chars().count();
    let mut lines = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        let marker = if ordered {
            list::numbered(idx + 1)
        } else {
            list::BULLET.to_string()
        };
        let inner_width = width.saturating_sub(indent_width + marker.chars().count());

        // Blocks inside one item are joined without blank separator lines;
        // a wrapped paragraph keeps its continuation lines.
        let body: String = item
            .iter()
            .map(|b| render_block(b, opts, tab, inner_width))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let body = opts.listitem.paint(&body);
        lines.push(list::attach_marker(&marker, &body));
    }

    list::indent_lines(tab, &lines.join("\n"))
}

fn indent_all(indent: &str, text: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", indent, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn cell_align(align: &Alignment) -> CellAlign {
    match align {
        Alignment::Center => CellAlign::Center,
        Alignment::Right => CellAlign::Right,
        Alignment::None | Alignment::Left => CellAlign::Left,
    }
}

fn checkbox(checked: bool) -> &'static str {
    if checked { "[X] " } else { "[ ] " }
}

fn insert_emojis(text: &str) -> String {
    EMOJI_RE
        .replace_all(text, |caps: &Captures| {
            match emojis::get_by_shortcode(&caps[1]) {
                Some(emoji) => emoji.as_str().to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn unescape_entities(html: &str) -> String {
    html.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
