//! Terminal presenter
//!
//! Raw-mode slide loop: draws the current slide's cached render, navigates
//! on keys, and hosts the execution pane. Rendering and subprocess output
//! share one event loop; nothing here blocks.

use crate::cache::{CacheKey, RenderCache};
use crate::config::Config;
use crate::deck::DeckMeta;
use crate::exec::{runnable_ext, ExecEvent, Sandbox};
use crate::highlight::Highlighter;
use crate::pipeline::{self, CodeObserver};
use crate::style::{Color, Style};
use anyhow::Result;
use chrono::Local;
use crossterm::cursor;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use futures::StreamExt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;

/// How close two `g` presses must be to count as `gg`.
const DOUBLE_KEY_WINDOW: Duration = Duration::from_millis(500);

/// A code block the current slide offers for execution.
#[derive(Debug, Clone)]
struct RunnableRef {
    code: String,
    ext: String,
}

enum Tick {
    Term(Option<std::io::Result<Event>>),
    Exec(Option<ExecEvent>),
}

pub struct App {
    slides: Vec<String>,
    page: usize,
    term: (u16, u16),
    config: Config,
    meta: DeckMeta,
    cache: RenderCache,
    highlighter: Arc<Highlighter>,
    sandbox: Sandbox,
    /// Replaced wholesale on page change so stale observer callbacks from
    /// a superseded render land in an orphaned list, not this one.
    runnable: Arc<Mutex<Vec<RunnableRef>>>,
    outputs: Vec<String>,
    exec_rx: Option<UnboundedReceiver<ExecEvent>>,
    /// (page, width, height) of the render currently on screen.
    current_view: Option<(usize, u16, u16)>,
    rendered: String,
    last_g: Option<Instant>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config, meta: DeckMeta, slides: Vec<String>, term: (u16, u16)) -> Self {
        let highlighter = Arc::new(Highlighter::new(config.highlight_options(&meta)));
        Self {
            slides,
            page: 0,
            term,
            config,
            meta,
            cache: RenderCache::new(),
            highlighter,
            sandbox: Sandbox::new(),
            runnable: Arc::new(Mutex::new(Vec::new())),
            outputs: Vec::new(),
            exec_rx: None,
            current_view: None,
            rendered: String::new(),
            last_g: None,
            should_quit: false,
        }
    }

    /// Run the presenter until quit.
    pub async fn run(mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let result = self.event_loop().await;

        let mut stdout = std::io::stdout();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
        let _ = terminal::disable_raw_mode();
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        let mut events = EventStream::new();
        loop {
            self.draw().await?;
            if self.should_quit {
                break;
            }

            let tick = if let Some(rx) = self.exec_rx.as_mut() {
                tokio::select! {
                    ev = events.next() => Tick::Term(ev),
                    ev = rx.recv() => Tick::Exec(ev),
                }
            } else {
                Tick::Term(events.next().await)
            };

            match tick {
                Tick::Term(Some(Ok(Event::Key(key)))) => self.handle_key(key),
                Tick::Term(Some(Ok(Event::Resize(w, h)))) => {
                    self.term = (w, h);
                    // Wrap-width-dependent output is stale now.
                    self.cache = RenderCache::new();
                    self.current_view = None;
                }
                Tick::Term(None) => break,
                Tick::Term(_) => {}
                Tick::Exec(Some(event)) => self.push_output(event),
                Tick::Exec(None) => self.exec_rx = None,
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('e') if ctrl => self.start_execution(),
            KeyCode::Char('g') => {
                let now = Instant::now();
                if self
                    .last_g
                    .is_some_and(|prev| now.duration_since(prev) < DOUBLE_KEY_WINDOW)
                {
                    self.goto(0);
                    self.last_g = None;
                } else {
                    self.last_g = Some(now);
                }
            }
            KeyCode::Char('G') => self.goto(self.slides.len().saturating_sub(1)),
            code => {
                self.last_g = None;
                let to = target_page(code, key.modifiers, self.slides.len(), self.page);
                self.goto(to);
            }
        }
    }

    fn goto(&mut self, page: usize) {
        if page == self.page {
            return;
        }
        self.page = page;
        // The new slide gets a fresh runnable list and a quiet pane.
        self.runnable = Arc::new(Mutex::new(Vec::new()));
        self.outputs.clear();
        self.exec_rx = None;
        self.current_view = None;
    }

    fn start_execution(&mut self) {
        let Some(candidate) = self.runnable.lock().unwrap().first().cloned() else {
            return;
        };
        self.outputs.clear();
        self.exec_rx = Some(self.sandbox.execute(&candidate.code, &candidate.ext));
    }

    fn push_output(&mut self, event: ExecEvent) {
        let line = match event {
            ExecEvent::Stdout(line) => {
                let stamp = Local::now().format("%H:%M:%S%.3f");
                format!("{} {}", Style::new().fg(Color::Gray).paint(&stamp.to_string()), line)
            }
            ExecEvent::Stderr(line) => Style::new().bg(Color::Red).paint(&format!("ERROR: {}", line)),
            ExecEvent::Failed(message) => {
                Style::new().bg(Color::Red).paint(&format!("ERROR: {}", message))
            }
            ExecEvent::Exited(code) => Style::new()
                .fg(Color::Gray)
                .paint(&format!("exited with code {}", code.unwrap_or(-1))),
            ExecEvent::TimedOut => Style::new().bg(Color::Red).paint("ERROR: execution timed out"),
        };
        self.outputs.push(line);
    }

    /// Re-render the current slide when the view changed, then repaint.
    async fn draw(&mut self) -> Result<()> {
        let (vw, vh) = self.config.viewport(&self.meta, self.term);
        let view = (self.page, vw, vh);

        if self.current_view != Some(view) {
            let opts = self.config.render_options(&self.meta, self.term.0);
            let key = CacheKey::new(self.slides[self.page].clone(), vw, vh);
            let sink = Arc::clone(&self.runnable);
            let observer: CodeObserver = Arc::new(move |code, lang| {
                if let Some(ext) = runnable_ext(lang) {
                    sink.lock().unwrap().push(RunnableRef {
                        code: code.to_string(),
                        ext: ext.to_string(),
                    });
                }
            });
            self.rendered = pipeline::render_cached(
                &mut self.cache,
                key,
                &opts,
                &self.highlighter,
                Some(observer),
            )
            .await;
            self.current_view = Some(view);
        }

        let mut stdout = std::io::stdout();
        queue!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;

        let header = Style::new()
            .italic()
            .paint(&format!("[{} / {}]", self.page + 1, self.slides.len()));
        write!(stdout, "{}\r\n\r\n", header)?;

        let pane = self.pane_lines(vw as usize);
        let budget = (self.term.1 as usize)
            .saturating_sub(2)
            .saturating_sub(pane.len());
        for line in self.rendered.lines().take(budget) {
            write!(stdout, "{}\r\n", line)?;
        }
        for line in pane {
            write!(stdout, "{}\r\n", line)?;
        }
        stdout.flush()?;
        Ok(())
    }

    /// Execution pane: separator, then output lines or the instructional
    /// placeholder.
    fn pane_lines(&self, width: usize) -> Vec<String> {
        let dim = Style::new().fg(Color::Gray);
        let mut lines = vec![dim.paint(&"─".repeat(width.max(1)))];
        if self.outputs.is_empty() {
            lines.push(dim.paint("`Ctrl+E` to run code"));
        } else {
            lines.extend(self.outputs.iter().cloned());
        }
        lines
    }
}

/// Map a navigation key to the page it targets. Digits jump to that slide
/// (Ctrl adds ten); everything else moves one step, clamped to the deck.
pub fn target_page(code: KeyCode, modifiers: KeyModifiers, len: usize, cur: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    if let KeyCode::Char(c) = code {
        if let Some(digit) = c.to_digit(10) {
            let mut n = (digit as usize).saturating_sub(1);
            if modifiers.contains(KeyModifiers::CONTROL) {
                n += 10;
            }
            return n.min(last);
        }
    }

    let next = matches!(
        code,
        KeyCode::Char(' ')
            | KeyCode::Char('j')
            | KeyCode::Char('l')
            | KeyCode::Char('n')
            | KeyCode::Enter
            | KeyCode::Right
            | KeyCode::Down
            | KeyCode::PageDown
    );
    let prev = matches!(
        code,
        KeyCode::Char('p')
            | KeyCode::Char('h')
            | KeyCode::Char('k')
            | KeyCode::Char('N')
            | KeyCode::Left
            | KeyCode::Up
            | KeyCode::PageUp
    );

    if next {
        (cur + 1).min(last)
    } else if prev {
        cur.saturating_sub(1)
    } else {
        cur
    }
}
