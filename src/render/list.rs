//! List serialization helpers
//!
//! Items arrive as already-rendered bodies; this module attaches bullet or
//! number markers and pads wrapped continuation lines so they line up under
//! the marker. Ordered lists are renumbered sequentially from 1 regardless
//! of the numerals in the source.

pub const BULLET: &str = "* ";

pub fn numbered(n: usize) -> String {
    format!("{}. ", n)
}

/// Prefix the first line of `body` with `marker` and every continuation
/// line with blank padding of the marker's width.
pub fn attach_marker(marker: &str, body: &str) -> String {
    let pad = " ".repeat(marker.chars().count());
    let mut out = String::new();
    for (i, line) in body.lines().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if i == 0 {
            out.push_str(marker);
        } else {
            out.push_str(&pad);
        }
        out.push_str(line);
    }
    if body.is_empty() {
        out.push_str(marker);
    }
    out
}

/// Indent every non-empty line of `text`.
pub fn indent_lines(indent: &str, text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", indent, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
