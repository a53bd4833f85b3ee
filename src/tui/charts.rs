use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::model::{ChartOptions, Theme};
use crate::track::TrackTable;

struct Palette {
    background: Color,
    foreground: Color,
    axis: Color,
    track: Color,
    start: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            background: Color::Reset,
            foreground: Color::White,
            axis: Color::Gray,
            track: Color::Cyan,
            start: Color::Yellow,
        },
        Theme::Light => Palette {
            background: Color::White,
            foreground: Color::Black,
            axis: Color::DarkGray,
            track: Color::Blue,
            start: Color::Red,
        },
    }
}

/// Ratatui axes only run low to high. A descending `(first, last)` range is
/// drawn on the negated axis so `first` still lands on the left.
pub fn axis_mapping(bounds: (f64, f64)) -> (bool, [f64; 2]) {
    let (first, last) = bounds;
    if first > last {
        (true, [-first, -last])
    } else {
        (false, [first, last])
    }
}

/// Track points in chart space, dropping anything outside the bounds.
pub fn chart_points(points: &[(f64, f64)], options: &ChartOptions) -> Vec<(f64, f64)> {
    let (flip_x, [x_lo, x_hi]) = axis_mapping(options.x_bounds);
    let (flip_y, [y_lo, y_hi]) = axis_mapping(options.y_bounds);
    points
        .iter()
        .map(|&(x, y)| {
            (
                if flip_x { -x } else { x },
                if flip_y { -y } else { y },
            )
        })
        .filter(|&(x, y)| x >= x_lo && x <= x_hi && y >= y_lo && y <= y_hi)
        .collect()
}

fn axis_labels(bounds: (f64, f64), color: Color) -> Vec<Span<'static>> {
    let (first, last) = bounds;
    let mid = (first + last) / 2.0;
    [first, mid, last]
        .into_iter()
        .map(|v| Span::styled(format!("{v:.2}"), Style::default().fg(color)))
        .collect()
}

/// Hertzsprung-Russell diagram of log10(L) against log10(Teff).
pub fn draw_hr_diagram(
    area: Rect,
    f: &mut Frame,
    track: Option<&TrackTable>,
    options: &ChartOptions,
    title: &str,
) {
    let pal = palette(options.theme);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Line::from(title.to_string()))
        .style(Style::default().bg(pal.background).fg(pal.foreground));

    let points = match track.map(|t| t.hr_points()) {
        Some(Ok(p)) => p,
        Some(Err(e)) => {
            let p = Paragraph::new(format!("Cannot draw track: {e}"))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(p, area);
            return;
        }
        None => {
            let p = Paragraph::new("No track yet. Press r to run the simulator again.")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(p, area);
            return;
        }
    };

    let line = chart_points(&points, options);
    let start: Vec<(f64, f64)> = line.first().copied().into_iter().collect();
    let (_, x_range) = axis_mapping(options.x_bounds);
    let (_, y_range) = axis_mapping(options.y_bounds);

    let datasets = vec![
        Dataset::default()
            .name("track")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(pal.track))
            .data(&line),
        Dataset::default()
            .name("ZAMS")
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(pal.start))
            .data(&start),
    ];

    let x_axis = Axis::default()
        .title(Span::styled("log10(Teff)", Style::default().fg(pal.axis)))
        .style(Style::default().fg(pal.axis))
        .bounds(x_range)
        .labels(axis_labels(options.x_bounds, pal.axis));
    let y_axis = Axis::default()
        .title(Span::styled("log10(L/Lsun)", Style::default().fg(pal.axis)))
        .style(Style::default().fg(pal.axis))
        .bounds(y_range)
        .labels(axis_labels(options.y_bounds, pal.axis));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(x_axis)
        .y_axis(y_axis);
    f.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descending_bounds_are_negated() {
        assert_eq!(axis_mapping((4.75, 3.3)), (true, [-4.75, -3.3]));
        assert_eq!(axis_mapping((-1.8, 6.5)), (false, [-1.8, 6.5]));
    }

    #[test]
    fn points_are_flipped_and_clipped() {
        let options = ChartOptions::default();
        let pts = chart_points(&[(4.2, 2.0), (5.5, 1.0), (3.6, 7.0)], &options);
        assert_eq!(pts, vec![(-4.2, 2.0)]);
    }
}
