//! Document render pipeline
//!
//! Walks the parsed token stream, routes every fenced code block through the
//! highlighter, and assembles the final ANSI string once all highlight work
//! has resolved. Document order, not completion order, decides where each
//! block lands. An observer callback sees every fenced block once per pass,
//! in document order, regardless of highlight outcome; that is how the
//! presenter discovers runnable blocks.

use crate::cache::{CacheKey, RenderCache};
use crate::highlight::Highlighter;
use crate::logging;
use crate::render::{self, RenderOptions};
use pulldown_cmark::{CodeBlockKind, Event, Tag};
use std::sync::Arc;

/// Language tag assigned to fences that carry none.
pub const DEFAULT_LANG: &str = "console";

/// Callback invoked once per fenced code block with (code text, language).
pub type CodeObserver = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub text: String,
    pub lang: String,
}

/// Collect every fenced code block in document order. Untagged fences get
/// [`DEFAULT_LANG`]. Indented code blocks are not fenced and stay out.
pub fn collect_code_blocks(source: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<CodeBlock> = None;
    for ev in render::parser(source) {
        match ev {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(tag))) => {
                let lang = tag
                    .split([',', ' '])
                    .next()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(DEFAULT_LANG);
                current = Some(CodeBlock {
                    text: String::new(),
                    lang: lang.to_string(),
                });
            }
            Event::Text(t) => {
                if let Some(block) = current.as_mut() {
                    block.text.push_str(&t);
                }
            }
            Event::End(_) => {
                if let Some(mut block) = current.take() {
                    block.text = block.text.trim_end_matches('\n').to_string();
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

/// Run one full render pass: highlight every fenced block (concurrently,
/// spliced back by document position), fire the observer, assemble the
/// string.
pub async fn render_document(
    source: &str,
    opts: &RenderOptions,
    highlighter: &Arc<Highlighter>,
    observer: Option<&CodeObserver>,
) -> String {
    let blocks = collect_code_blocks(source);
    let theme = highlighter.theme();

    let tasks: Vec<_> = blocks
        .iter()
        .map(|block| {
            let hl = Arc::clone(highlighter);
            let code = block.text.clone();
            let lang = block.lang.clone();
            let theme = theme.clone();
            tokio::task::spawn_blocking(move || hl.highlight(&code, &lang, &theme))
        })
        .collect();

    // Every highlight must resolve before assembly starts.
    let results = futures::future::join_all(tasks).await;
    let highlights: Vec<Option<String>> = results
        .into_iter()
        .zip(&blocks)
        .map(|(joined, block)| match joined {
            Ok(Ok(ansi)) => Some(ansi),
            Ok(Err(err)) => {
                // Degrade this one block to raw text, keep the document.
                logging::debug(&format!("highlight skipped ({}): {}", block.lang, err));
                None
            }
            Err(err) => {
                logging::error(&format!("highlight task panicked: {}", err));
                None
            }
        })
        .collect();

    if let Some(observer) = observer {
        for block in &blocks {
            observer(&block.text, &block.lang);
        }
    }

    render::render(source, opts, highlights)
}

/// Cached render entry point.
///
/// Hit without observer: return the stored string, do nothing else. Hit
/// with observer (a remount rediscovering runnable blocks): return the
/// stored string immediately and re-fire the observer from a background
/// walk of the source, with no re-render. Miss: run the pipeline and store
/// the result.
pub async fn render_cached(
    cache: &mut RenderCache,
    key: CacheKey,
    opts: &RenderOptions,
    highlighter: &Arc<Highlighter>,
    observer: Option<CodeObserver>,
) -> String {
    if let Some(hit) = cache.lookup(&key) {
        let rendered = hit.clone();
        if let Some(observer) = observer {
            let source = key.source.clone();
            tokio::spawn(async move {
                for block in collect_code_blocks(&source) {
                    observer(&block.text, &block.lang);
                }
            });
        }
        return rendered;
    }

    let rendered = render_document(&key.source, opts, highlighter, observer.as_ref()).await;
    cache.store(key, rendered.clone());
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::strip_ansi;
    use std::sync::Mutex;

    fn opts() -> RenderOptions {
        RenderOptions {
            hyperlinks: false,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn test_collect_in_document_order() {
        let source = "```js\nfirst\n```\n\ntext\n\n```bash\nsecond\n```\n";
        let blocks = collect_code_blocks(source);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], CodeBlock { text: "first".into(), lang: "js".into() });
        assert_eq!(blocks[1], CodeBlock { text: "second".into(), lang: "bash".into() });
    }

    #[test]
    fn test_untagged_fence_gets_default_lang() {
        let blocks = collect_code_blocks("```\nplain\n```\n");
        assert_eq!(blocks[0].lang, DEFAULT_LANG);
    }

    #[test]
    fn test_indented_code_not_collected() {
        assert!(collect_code_blocks("text\n\n    indented code\n").is_empty());
    }

    #[test]
    fn test_fence_tag_attributes_trimmed() {
        let blocks = collect_code_blocks("```js,norun extra\nx\n```\n");
        assert_eq!(blocks[0].lang, "js");
    }

    #[tokio::test]
    async fn test_highlight_failure_degrades_to_raw_text() {
        let hl = Arc::new(Highlighter::default());
        let source = "```nosuchlanguage\nlet a = 1\n```\n";
        let out = render_document(source, &opts(), &hl, None).await;
        assert!(out.contains("let a = 1"));
    }

    #[tokio::test]
    async fn test_observer_fires_once_per_block_in_order() {
        let hl = Arc::new(Highlighter::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer: CodeObserver = Arc::new(move |code, lang| {
            sink.lock().unwrap().push((code.to_string(), lang.to_string()));
        });

        let source = "```nosuchlanguage\na\n```\n\n```js\nb\n```\n";
        render_document(source, &opts(), &hl, Some(&observer)).await;

        let seen = seen.lock().unwrap();
        // Fires for the failed block too, in document order.
        assert_eq!(
            *seen,
            vec![
                ("a".to_string(), "nosuchlanguage".to_string()),
                ("b".to_string(), "js".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_highlighted_block_lands_at_its_position() {
        let hl = Arc::new(Highlighter::default());
        let source = "before\n\n```js\nconst n = 7\n```\n\nafter\n";
        let out = render_document(source, &opts(), &hl, None).await;
        let plain = strip_ansi(&out);
        let before = plain.find("before").unwrap();
        let code = plain.find("const n = 7").unwrap();
        let after = plain.find("after").unwrap();
        assert!(before < code && code < after);
        // The js block is actually highlighted.
        assert!(out.contains("38;2;"));
    }

    #[tokio::test]
    async fn test_cache_hit_returns_identical_string() {
        let hl = Arc::new(Highlighter::default());
        let mut cache = RenderCache::new();
        let key = CacheKey::new("# Title\n\nbody", 80, 24);
        let first = render_cached(&mut cache, key.clone(), &opts(), &hl, None).await;
        let second = render_cached(&mut cache, key.clone(), &opts(), &hl, None).await;
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_still_refires_observer() {
        let hl = Arc::new(Highlighter::default());
        let mut cache = RenderCache::new();
        let key = CacheKey::new("```js\nx\n```\n", 80, 24);

        render_cached(&mut cache, key.clone(), &opts(), &hl, None).await;
        assert_eq!(cache.len(), 1);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let observer: CodeObserver = Arc::new(move |code, lang| {
            let _ = tx.send((code.to_string(), lang.to_string()));
        });
        render_cached(&mut cache, key, &opts(), &hl, Some(observer)).await;

        let seen = rx.recv().await.expect("observer fired after remount");
        assert_eq!(seen, ("x".to_string(), "js".to_string()));
    }
}
