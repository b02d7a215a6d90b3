//! ANSI-safe greedy text reflow
//!
//! Input may contain SGR escape sequences and [`HARD_BREAK`] markers. The
//! text is split on hard breaks first (those never rewrap), then on escape
//! boundaries so a sequence is never divided across output lines. Words are
//! packed greedily so that the printable length of every line stays within
//! the width; a single word longer than the width is hard-split at the
//! boundary.

use crate::style::{printable_len, split_ansi};
use regex::Regex;
use std::sync::LazyLock;

/// Marker for a break the reflow must not rewrap across. `\r` is safe
/// because the parser normalizes line endings before we ever see one.
pub const HARD_BREAK: char = '\r';

static WORD_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\n]+").expect("valid word-split regex"));

pub fn reflow(text: &str, width: usize) -> String {
    if width == 0 {
        return text.replace(HARD_BREAK, "\n");
    }

    let mut reflowed: Vec<String> = Vec::new();

    for section in text.split(HARD_BREAK) {
        let mut column = 0usize;
        let mut line = String::new();
        let mut last_was_escape = false;

        for fragment in split_ansi(section) {
            if fragment.is_empty() {
                last_was_escape = false;
                continue;
            }
            // Escape sequence: keep whole, attach to the current line.
            if printable_len(&fragment) == 0 {
                line.push_str(&fragment);
                last_was_escape = true;
                continue;
            }

            for word in WORD_SPLIT.split(&fragment) {
                let add_space = usize::from(column != 0 && !last_was_escape);
                last_was_escape = false;
                let chars: Vec<char> = word.chars().collect();

                if column + chars.len() + add_space <= width {
                    if add_space == 1 {
                        line.push(' ');
                        column += 1;
                    }
                    line.push_str(word);
                    column += chars.len();
                    continue;
                }

                if chars.len() <= width {
                    // Word fits on a line of its own.
                    reflowed.push(std::mem::take(&mut line));
                    line.push_str(word);
                    column = chars.len();
                    continue;
                }

                // Longer than the width: fill the current line, then split
                // the remainder into width-sized pieces. A full line is
                // flushed as-is; the separating space must not overflow it.
                let take = width.saturating_sub(column + add_space);
                if take > 0 && add_space == 1 {
                    line.push(' ');
                }
                line.extend(&chars[..take]);
                reflowed.push(std::mem::take(&mut line));
                column = 0;

                let mut rest = &chars[take..];
                while !rest.is_empty() {
                    if rest.len() < width {
                        line = rest.iter().collect();
                        column = rest.len();
                        break;
                    }
                    reflowed.push(rest[..width].iter().collect());
                    rest = &rest[width..];
                }
            }
        }

        if printable_len(&line) > 0 {
            reflowed.push(line);
        }
    }

    reflowed.join("\n")
}
