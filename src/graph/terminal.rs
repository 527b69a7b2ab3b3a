use std::fmt::Write as _;

use ansi_term::{Colour, Style};
use plotters::style::RGBColor;

use super::grid::{CalendarGrid, Mark, DAYS_IN_ROW};

const CELL: &str = "  ";
const MARKED_CELL: &str = "<>";

/// Coloured console version of a calendar, two characters per day.
pub fn render_calendar(
    grid: &CalendarGrid,
    title: &str,
    color_of: &dyn Fn(u32) -> RGBColor,
    marks: &[Mark],
) -> String {
    let labels = grid.row_labels();
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or_default();

    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    let _ = write!(out, "{:label_width$} ", "");
    for day in 1..=DAYS_IN_ROW {
        let _ = write!(out, "{day:>2}");
    }
    out.push('\n');

    for (row, label) in labels.iter().enumerate() {
        let _ = write!(out, "{label:>label_width$} ");
        for day in 0..DAYS_IN_ROW {
            match grid.value(row, day) {
                Some(value) => {
                    let RGBColor(r, g, b) = color_of(value);
                    let marked = marks.iter().any(|m| m.row == row && m.day == day);
                    let text = if marked { MARKED_CELL } else { CELL };
                    let _ = write!(out, "{}", Style::new().on(Colour::RGB(r, g, b)).paint(text));
                }
                None => out.push_str(CELL),
            }
        }
        out.push('\n');
    }

    for mark in marks {
        let _ = writeln!(out, "{} {}: {}", MARKED_CELL, labels[mark.row], mark.label);
    }
    out
}

/// Swatch and label for each legend entry on one line.
pub fn render_legend(entries: &[(String, RGBColor)]) -> String {
    entries
        .iter()
        .map(|(label, RGBColor(r, g, b))| {
            format!(
                "{} {label}",
                Style::new().on(Colour::RGB(*r, *g, *b)).paint(CELL)
            )
        })
        .collect::<Vec<_>>()
        .join("  ")
}
