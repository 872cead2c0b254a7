use ratatui::prelude::*;
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Tabs};

use crate::chart::BarSpec;
use crate::ui::components::theme::ThemePalette;

pub fn search_bar(
    query: &str,
    palette: ThemePalette,
    focused: bool,
    context: Option<&str>,
    count: Option<usize>,
) -> Paragraph<'static> {
    let mut title = format!(" {} ", context.unwrap_or("no archive"));
    if let Some(n) = count.filter(|n| *n > 0) {
        title.push_str(&format!("• {n} results "));
    }
    let border = if focused {
        palette.border_focus_style()
    } else {
        palette.border_style()
    };
    Paragraph::new(Line::from(vec![
        Span::styled("/ ", palette.hint_style()),
        Span::styled(query.to_string(), Style::default().fg(palette.fg)),
    ]))
    .block(
        Block::default()
            .title(Span::styled(title, palette.title()))
            .borders(Borders::ALL)
            .border_style(border),
    )
}

pub fn page_tabs(labels: &[String], selected: usize, palette: ThemePalette) -> Tabs<'static> {
    Tabs::new(labels.to_vec())
        .select(selected)
        .style(palette.hint_style())
        .highlight_style(palette.title().add_modifier(Modifier::REVERSED))
        .divider(" ")
}

/// Column chart of per-video counts; the title shows the bar under the
/// cursor.
pub fn frequency_chart(
    bars: &[BarSpec],
    cursor: usize,
    focused: bool,
    width: u16,
    palette: ThemePalette,
) -> BarChart<'static> {
    let data: Vec<Bar<'static>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut style = Style::default().fg(palette.bar_color(bar.color_key, bar.brightness_percent));
            if i == cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            // Keep non-empty bars visible at any scale.
            let value = (bar.height_ratio * 100.0).round() as u64;
            Bar::default()
                .value(if bar.count > 0 { value.max(1) } else { 0 })
                .text_value(String::new())
                .style(style)
        })
        .collect();

    let title = bars
        .get(cursor)
        .map(|b| format!(" {} ", b.label.replace('\n', " • ")))
        .unwrap_or_default();
    let border = if focused {
        palette.border_focus_style()
    } else {
        palette.border_style()
    };
    let bar_width = match u16::try_from(bars.len()) {
        Ok(n) if n > 0 => (width.saturating_sub(2) / n).max(1),
        _ => 1,
    };

    BarChart::default()
        .block(
            Block::default()
                .title(Span::styled(title, palette.hint_style()))
                .borders(Borders::ALL)
                .border_style(border),
        )
        .data(BarGroup::default().bars(&data))
        .bar_width(bar_width)
        .bar_gap(0)
        .max(100)
}
