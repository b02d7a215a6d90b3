use anyhow::{Context, Result};
use clap::Parser;
use mdeck::config::Config;
use mdeck::highlight::Highlighter;
use mdeck::pipeline;
use mdeck::tui::App;
use mdeck::{deck, logging};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "mdeck")]
#[command(version)]
#[command(about = "Present markdown slide decks in the terminal")]
struct Args {
    /// Markdown file, or a directory to pick a deck from
    input: Option<PathBuf>,

    /// Override the wrap width
    #[arg(short, long)]
    width: Option<u16>,

    /// Syntax highlighting theme
    #[arg(short, long)]
    theme: Option<String>,

    /// Render the whole deck to stdout instead of presenting
    #[arg(long)]
    print: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    logging::cleanup_old_logs();

    let args = Args::parse();

    let path = deck::resolve_input(args.input)?;
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let (mut meta, body) = deck::split_metadata(&raw);
    let slides = deck::split_slides(body);
    if slides.is_empty() {
        anyhow::bail!("{} contains no slides", path.display());
    }

    if let Some(width) = args.width {
        meta.width = Some(width);
    }
    if let Some(theme) = args.theme {
        meta.theme = Some(theme);
    }

    let config = Config::load();
    let term = crossterm::terminal::size().unwrap_or((80, 24));

    if args.print || !std::io::stdout().is_terminal() {
        print_deck(&config, &meta, &slides, term).await;
        return Ok(());
    }

    logging::info(&format!(
        "presenting {} ({} slides)",
        path.display(),
        slides.len()
    ));
    App::new(config, meta, slides, term).run().await
}

/// Non-interactive mode: render every slide in order with a rule between.
async fn print_deck(config: &Config, meta: &mdeck::deck::DeckMeta, slides: &[String], term: (u16, u16)) {
    let opts = config.render_options(meta, term.0);
    let highlighter = Arc::new(Highlighter::new(config.highlight_options(meta)));
    for (i, slide) in slides.iter().enumerate() {
        if i > 0 {
            println!("{}\n", "-".repeat(opts.width));
        }
        let rendered = pipeline::render_document(slide, &opts, &highlighter, None).await;
        print!("{}", rendered);
    }
}
