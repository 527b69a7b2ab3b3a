use anyhow::{bail, Result};
use plotters::{coord::Shift, prelude::*};

use super::{
    grid::{CalendarGrid, Mark, DAYS_IN_ROW},
    palette::NOTABLE,
};

pub(super) type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

pub(super) const FONT: &str = "sans-serif";

/// Font and spacing of one calendar chart.
#[derive(Debug, Clone, Copy)]
pub(super) struct CalendarStyle {
    pub caption: i32,
    pub labels: i32,
    pub margin: i32,
    pub x_label_area: i32,
    pub y_label_area: i32,
}

impl CalendarStyle {
    pub const LARGE: Self = Self {
        caption: 24,
        labels: 12,
        margin: 10,
        x_label_area: 30,
        y_label_area: 70,
    };

    pub const SMALL: Self = Self {
        caption: 14,
        labels: 8,
        margin: 4,
        x_label_area: 16,
        y_label_area: 48,
    };
}

/// Draws one cell per filled grid value. Row 0 is on top, day 1 on the left.
pub(super) fn draw_calendar(
    area: &Area,
    grid: &CalendarGrid,
    title: &str,
    style: CalendarStyle,
    color_of: &dyn Fn(u32) -> RGBColor,
    marks: &[Mark],
) -> Result<()> {
    let rows = grid.row_count() as i32;
    if rows == 0 {
        bail!("Can't draw an empty calendar");
    }
    let labels = grid.row_labels();
    let flip = |row: usize| rows - 1 - row as i32;

    let mut chart = ChartBuilder::on(area)
        .caption(title, (FONT, style.caption))
        .margin(style.margin)
        .x_label_area_size(style.x_label_area)
        .y_label_area_size(style.y_label_area)
        .build_cartesian_2d(0..DAYS_IN_ROW as i32, 0..rows)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(DAYS_IN_ROW)
        .y_labels(rows as usize)
        .x_label_formatter(&|x| (x + 1).to_string())
        .y_label_formatter(&|y| {
            labels
                .get((rows - 1 - *y) as usize)
                .cloned()
                .unwrap_or_default()
        })
        .label_style((FONT, style.labels))
        .draw()?;

    chart.draw_series(grid.cells().map(|(row, day, value)| {
        let (x, y) = (day as i32, flip(row));
        Rectangle::new([(x, y), (x + 1, y + 1)], color_of(value).filled())
    }))?;

    for mark in marks {
        let (x, y) = (mark.day as i32, flip(mark.row));
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x, y), (x + 1, y + 1)],
            NOTABLE.stroke_width(2),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            mark.label.clone(),
            (x, y + 1),
            (FONT, style.labels).into_font().color(&NOTABLE),
        )))?;
    }

    Ok(())
}

/// Horizontal colour bar for `0..=max`.
pub(super) fn draw_scale(area: &Area, max: u32, color_of: &dyn Fn(u32) -> RGBColor) -> Result<()> {
    let steps = max as i32 + 1;
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(20)
        .build_cartesian_2d(0..steps, 0..1)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .disable_y_axis()
        .x_labels(steps as usize + 1)
        .x_label_formatter(&|x| if *x < steps { x.to_string() } else { String::new() })
        .label_style((FONT, 12))
        .draw()?;

    chart.draw_series(
        (0..steps).map(|v| Rectangle::new([(v, 0), (v + 1, 1)], color_of(v as u32).filled())),
    )?;
    Ok(())
}

/// Colour swatches with their labels, one per line.
pub(super) fn draw_legend(area: &Area, entries: &[(String, RGBColor)]) -> Result<()> {
    const SWATCH: i32 = 10;
    const LINE: i32 = 14;
    for (i, (label, color)) in entries.iter().enumerate() {
        let y = 4 + i as i32 * LINE;
        area.draw(&Rectangle::new(
            [(8, y), (8 + SWATCH, y + SWATCH)],
            color.filled(),
        ))?;
        area.draw(&Text::new(
            label.clone(),
            (8 + SWATCH + 6, y),
            (FONT, 10).into_font(),
        ))?;
    }
    Ok(())
}
