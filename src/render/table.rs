//! Box-drawing table layout
//!
//! Cells arrive as structured rows of already-styled strings; column widths
//! are computed from printable display width so embedded escape sequences
//! do not skew the layout.

use crate::style::display_width;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Render head plus body rows into a bordered table.
pub fn render_table(head: &[String], rows: &[Vec<String>], aligns: &[CellAlign]) -> String {
    let columns = head
        .len()
        .max(rows.iter().map(Vec::len).max().unwrap_or(0));
    if columns == 0 {
        return String::new();
    }

    let mut widths = vec![0usize; columns];
    for (i, cell) in head.iter().enumerate() {
        widths[i] = widths[i].max(display_width(cell));
    }
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let mut out = String::new();
    out.push_str(&border(&widths, '┌', '┬', '┐'));
    out.push('\n');
    if !head.is_empty() {
        out.push_str(&row_line(head, &widths, aligns));
        out.push('\n');
        out.push_str(&border(&widths, '├', '┼', '┤'));
        out.push('\n');
    }
    for row in rows {
        out.push_str(&row_line(row, &widths, aligns));
        out.push('\n');
    }
    out.push_str(&border(&widths, '└', '┴', '┘'));
    out
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let mut out = String::new();
    out.push(left);
    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            out.push(mid);
        }
        out.push_str(&"─".repeat(w + 2));
    }
    out.push(right);
    out
}

fn row_line(cells: &[String], widths: &[usize], aligns: &[CellAlign]) -> String {
    let mut out = String::new();
    out.push('│');
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let align = aligns.get(i).copied().unwrap_or_default();
        let pad = width.saturating_sub(display_width(cell));
        let (before, after) = match align {
            CellAlign::Left => (0, pad),
            CellAlign::Right => (pad, 0),
            CellAlign::Center => (pad / 2, pad - pad / 2),
        };
        out.push(' ');
        out.push_str(&" ".repeat(before));
        out.push_str(cell);
        out.push_str(&" ".repeat(after));
        out.push(' ');
        out.push('│');
    }
    out
}
