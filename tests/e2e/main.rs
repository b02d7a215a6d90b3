//! End-to-end tests for mdeck running the full deck pipeline
//!
//! These tests exercise load -> metadata -> slides -> highlight -> render
//! as a whole, plus real subprocess execution through the sandbox.

use anyhow::Result;
use mdeck::cache::{CacheKey, RenderCache};
use mdeck::config::Config;
use mdeck::deck;
use mdeck::exec::{ExecEvent, Sandbox};
use mdeck::highlight::Highlighter;
use mdeck::pipeline::{self, CodeObserver};
use mdeck::render::RenderOptions;
use mdeck::style::{printable_len, strip_ansi};
use std::sync::{Arc, Mutex};

fn plain_opts(width: usize) -> RenderOptions {
    RenderOptions {
        width,
        hyperlinks: false,
        ..RenderOptions::default()
    }
}

fn highlighter() -> Arc<Highlighter> {
    Arc::new(Highlighter::new(Default::default()))
}

/// Test a deck file end to end: frontmatter stripped, slides split,
/// markdown rendered with styling.
#[tokio::test]
async fn test_deck_renders_with_metadata() -> Result<()> {
    let raw = "---\nwidth: 40\ntheme: base16-ocean.dark\n---\n\n# First\n\nhello *world*\n\n---\n\n# Second\n";
    let (meta, body) = deck::split_metadata(raw);
    assert_eq!(meta.width, Some(40));

    let slides = deck::split_slides(body);
    assert_eq!(slides.len(), 2);

    let config = Config::load();
    let opts = config.render_options(&meta, 80);
    assert_eq!(opts.width, 40);

    let hl = highlighter();
    let out = pipeline::render_document(&slides[0], &opts, &hl, None).await;
    assert!(strip_ansi(&out).contains("First"));
    assert!(strip_ansi(&out).contains("hello world"));
    // Heading styling survives into the output.
    assert!(out.contains("\x1b["));
    assert!(out.ends_with('\n'));
    Ok(())
}

/// Test that fenced code comes back highlighted and the surrounding
/// document text is untouched.
#[tokio::test]
async fn test_code_block_highlighting() -> Result<()> {
    let source = "before\n\n```rust\nfn main() {}\n```\n\nafter\n";
    let hl = highlighter();
    let out = pipeline::render_document(source, &plain_opts(80), &hl, None).await;
    let plain = strip_ansi(&out);
    assert!(plain.contains("before"));
    assert!(plain.contains("fn main() {}"));
    assert!(plain.contains("after"));
    // The code block itself carries color codes.
    assert!(out.contains("\x1b[38;2;"));
    Ok(())
}

/// Test that an unknown fence language degrades that block to raw text
/// instead of failing the render.
#[tokio::test]
async fn test_unknown_language_degrades() -> Result<()> {
    let source = "```nosuchlang\nsome code here\n```\n";
    let hl = highlighter();
    let out = pipeline::render_document(source, &plain_opts(80), &hl, None).await;
    assert!(strip_ansi(&out).contains("some code here"));
    Ok(())
}

/// Test that the observer sees every fenced block in document order,
/// including ones that fail to highlight.
#[tokio::test]
async fn test_observer_reports_blocks_in_order() -> Result<()> {
    let source = "```js\nconsole.log(1)\n```\n\ntext\n\n```nosuchlang\nx\n```\n\n```sh\necho hi\n```\n";
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: CodeObserver = Arc::new(move |_code, lang| {
        sink.lock().unwrap().push(lang.to_string());
    });

    let hl = highlighter();
    pipeline::render_document(source, &plain_opts(80), &hl, Some(&observer)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["js", "nosuchlang", "sh"]);
    Ok(())
}

/// Test that a cached render returns the identical string and still
/// re-fires the observer for runnable-block discovery.
#[tokio::test]
async fn test_render_cache_hit_refires_observer() -> Result<()> {
    let source = "```js\nconsole.log(1)\n```\n";
    let opts = plain_opts(80);
    let hl = highlighter();
    let mut cache = RenderCache::new();

    let first = pipeline::render_cached(
        &mut cache,
        CacheKey::new(source, 80, 24),
        &opts,
        &hl,
        None,
    )
    .await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let observer: CodeObserver = Arc::new(move |_code, lang| {
        let _ = tx.send(lang.to_string());
    });
    let second = pipeline::render_cached(
        &mut cache,
        CacheKey::new(source, 80, 24),
        &opts,
        &hl,
        Some(observer),
    )
    .await;

    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
    assert_eq!(rx.recv().await, Some("js".to_string()));
    Ok(())
}

/// Test that the grammar for a language is loaded once across a deck,
/// not once per block.
#[tokio::test]
async fn test_grammar_loaded_once_across_slides() -> Result<()> {
    let hl = highlighter();
    let opts = plain_opts(80);
    for slide in [
        "```js\nlet a = 1\n```\n",
        "```javascript\nlet b = 2\n```\n",
        "```js\nlet c = 3\n```\n",
    ] {
        pipeline::render_document(slide, &opts, &hl, None).await;
    }
    assert_eq!(hl.grammar_loads(), 1);
    Ok(())
}

/// Test long-line reflow against the width limit through the whole
/// pipeline.
#[tokio::test]
async fn test_reflow_respects_width() -> Result<()> {
    let source = "one two three four five six seven eight nine ten eleven twelve\n";
    let hl = highlighter();
    let out = pipeline::render_document(source, &plain_opts(20), &hl, None).await;
    for line in out.lines() {
        assert!(printable_len(line) <= 20, "line too wide: {:?}", line);
    }
    Ok(())
}

/// Test running a shell code block through the sandbox and streaming
/// its output.
#[tokio::test]
async fn test_execute_shell_block() -> Result<()> {
    let sandbox = Sandbox::new();
    let mut rx = sandbox.execute("echo first\necho second", "sh");

    let mut stdout = Vec::new();
    let mut exit = None;
    while let Some(event) = rx.recv().await {
        match event {
            ExecEvent::Stdout(line) => stdout.push(line),
            ExecEvent::Exited(code) => exit = Some(code),
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(stdout, vec!["first", "second"]);
    assert_eq!(exit, Some(Some(0)));
    Ok(())
}

/// Test that a failing script reports stderr and its exit code.
#[tokio::test]
async fn test_execute_reports_failure() -> Result<()> {
    let sandbox = Sandbox::new();
    let mut rx = sandbox.execute("echo boom >&2\nexit 3", "sh");

    let mut stderr = Vec::new();
    let mut exit = None;
    while let Some(event) = rx.recv().await {
        match event {
            ExecEvent::Stderr(line) => stderr.push(line),
            ExecEvent::Exited(code) => exit = Some(code),
            ExecEvent::Stdout(_) => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(stderr, vec!["boom"]);
    assert_eq!(exit, Some(Some(3)));
    Ok(())
}

/// Test that a block with no runnable language never spawns anything.
#[tokio::test]
async fn test_execute_rejects_non_runnable() -> Result<()> {
    let sandbox = Sandbox::new();
    let mut rx = sandbox.execute("SELECT 1;", "sql");
    match rx.recv().await {
        Some(ExecEvent::Failed(_)) => {}
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
    Ok(())
}

/// Test that executing a JavaScript block prints its console output.
/// Skipped when node is not installed.
#[tokio::test]
async fn test_execute_javascript_block() -> Result<()> {
    let have_node = tokio::process::Command::new("node")
        .arg("--version")
        .output()
        .await
        .is_ok();
    if !have_node {
        return Ok(());
    }

    let sandbox = Sandbox::new();
    let mut rx = sandbox.execute("console.log(1)", "js");

    let mut stdout = Vec::new();
    let mut exit = None;
    while let Some(event) = rx.recv().await {
        match event {
            ExecEvent::Stdout(line) => stdout.push(line),
            ExecEvent::Exited(code) => exit = Some(code),
            other => panic!("unexpected event: {:?}", other),
        }
    }
    assert_eq!(stdout, vec!["1"]);
    assert_eq!(exit, Some(Some(0)));
    Ok(())
}

/// Test picking a deck out of a directory, preferring readme-style names.
#[test]
fn test_resolve_directory_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("zz-notes.md"), "# notes\n")?;
    std::fs::write(dir.path().join("README.md"), "# deck\n")?;
    std::fs::write(dir.path().join("script.sh"), "echo no\n")?;

    let picked = deck::resolve_input(Some(dir.path().to_path_buf()))?;
    assert_eq!(picked.file_name().unwrap(), "README.md");
    Ok(())
}
