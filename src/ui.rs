use crate::app::{App, Focus, LEGEND_WIDTH};
use crate::braille::BrailleCanvas;
use crate::plot::catalog::Rgb;
use crate::plot::legend::LegendItem;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Plot and legend above, status bar below
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(3), Constraint::Length(LEGEND_WIDTH)])
        .split(rows[0]);

    render_plot(frame, app, columns[0]);
    render_legend(frame, app, columns[1]);
    render_status_bar(frame, app, rows[1]);
}

fn panel(title: String, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn render_plot(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!(" {} · {} ", app.projection_name(), app.feature_name());
    let block = panel(title, app.focus == Focus::Plot);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    frame.render_widget(
        PlotWidget {
            canvas: app.surface(),
            background: app.background(),
        },
        inner,
    );
}

/// Draws a colored Braille surface cell by cell
struct PlotWidget<'a> {
    canvas: &'a BrailleCanvas,
    background: Rgb,
}

impl Widget for PlotWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = color(self.background);
        let rows = self.canvas.height().min(area.height as usize);
        let cols = self.canvas.width().min(area.width as usize);
        for cy in 0..rows {
            for cx in 0..cols {
                let x = area.x + cx as u16;
                let y = area.y + cy as u16;
                let cell = &mut buf[(x, y)];
                cell.set_bg(bg);

                let (ch, rgb) = self.canvas.cell(cx, cy);
                // Skip empty braille characters (U+2800)
                if ch == '\u{2800}' {
                    continue;
                }
                cell.set_char(ch).set_fg(rgb.map_or(Color::Gray, color));
            }
        }
    }
}

fn legend_line(item: &LegendItem, width: usize, under_cursor: bool) -> Line<'static> {
    let marker = if item.is_visible { item.swatch.shape.glyph() } else { ' ' };
    let text_style = if item.is_visible {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT)
    };
    let text_style = if under_cursor {
        text_style.add_modifier(Modifier::REVERSED)
    } else {
        text_style
    };

    let count = item.count.to_string();
    let prefix = if item.extracted_from_other { "↑" } else { "" };
    let name = format!("{}{}", prefix, item.value);
    // Glyph, space, name, space, count
    let room = width.saturating_sub(count.len() + 3);
    let name: String = name.chars().take(room).collect();
    let pad = room.saturating_sub(name.chars().count());

    Line::from(vec![
        Span::styled(format!("{} ", marker), Style::default().fg(color(item.swatch.color))),
        Span::styled(name, text_style),
        Span::raw(" ".repeat(pad + 1)),
        Span::styled(count, Style::default().fg(Color::DarkGray)),
    ])
}

fn render_legend(frame: &mut Frame, app: &App, area: Rect) {
    let focused = app.focus == Focus::Legend;
    let block = panel(format!(" Legend ({}) ", app.legend_items().len()), focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let visible_rows = inner.height as usize;
    let scroll = app.legend_scroll(visible_rows);
    let lines: Vec<Line> = app
        .legend_items()
        .iter()
        .enumerate()
        .skip(scroll)
        .take(visible_rows)
        .map(|(i, item)| legend_line(item, inner.width as usize, focused && i == app.legend_cursor()))
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let mode = if app.selection_mode() { " SELECT " } else { " PAN " };
    let mode_style = if app.selection_mode() {
        Style::default().fg(Color::Black).bg(Color::Yellow)
    } else {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    };

    let mut spans = vec![
        Span::styled(mode, mode_style),
        Span::styled(" Zoom: ", dim),
        Span::styled(format!("{:.2}x", app.zoom_level()), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", dim),
        Span::styled(
            format!("{}/{} pts", app.visible_count(), app.point_count()),
            Style::default().fg(Color::Cyan),
        ),
    ];
    if app.point_count() != app.dataset_len() {
        spans.push(Span::styled(format!(" of {}", app.dataset_len()), dim));
    }
    if !app.selected().is_empty() {
        spans.push(Span::styled(" | ", dim));
        spans.push(Span::styled(
            format!("{} selected", app.selected().len()),
            Style::default().fg(Color::Green),
        ));
    }
    if app.split_depth() > 0 {
        spans.push(Span::styled(" | ", dim));
        spans.push(Span::styled(
            format!("split {}", app.split_depth()),
            Style::default().fg(Color::Magenta),
        ));
    }
    if let Some((id, label)) = app.hover_info() {
        spans.push(Span::styled(" | ", dim));
        spans.push(Span::styled(format!("{} ", id), Style::default().fg(Color::White)));
        spans.push(Span::styled(label.to_string(), Style::default().fg(Color::Yellow)));
    } else if let Some(p) = app.pointer_data_coords() {
        spans.push(Span::styled(format!(" | ({:.2}, {:.2})", p.x, p.y), dim));
    }
    if let Some(id) = app.structure_request() {
        spans.push(Span::styled(" | structure: ", dim));
        spans.push(Span::styled(id.to_string(), Style::default().fg(Color::LightRed)));
    }
    spans.push(Span::styled(
        " | s:select f:feature p:proj i:split tab:legend q:quit",
        dim,
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
