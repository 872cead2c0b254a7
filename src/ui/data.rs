use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::highlight::{Markup, split_emphasis};
use crate::session::ResultsView;
use crate::ui::components::theme::ThemePalette;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusRegion {
    Query,
    Results,
    Chart,
}

/// One rendered line of the result list. Header lines have no `row`.
#[derive(Clone, Debug)]
pub struct DisplayLine {
    pub line: Line<'static>,
    /// Position among the page's match rows.
    pub row: Option<usize>,
}

/// Video headers followed by their match rows, for the selected page.
pub fn display_lines(view: &ResultsView, palette: ThemePalette, markup: &Markup) -> Vec<DisplayLine> {
    let mut lines = Vec::new();
    let mut row = 0;
    for group in &view.groups {
        lines.push(DisplayLine {
            line: Line::from(Span::styled(
                format!("{} • {} • {}", group.upload_date, group.title, group.video_id),
                palette.header_style(),
            )),
            row: None,
        });
        for r in &group.rows {
            let base = if r.visited {
                palette.visited_style()
            } else {
                Style::default().fg(palette.fg)
            };
            let mut spans = vec![
                Span::styled(r.timestamp.clone(), palette.hint_style()),
                Span::raw("  "),
            ];
            spans.extend(split_emphasis(&r.marked_text, markup).into_iter().map(|frag| {
                let style = if frag.emphasized {
                    palette.highlight_style()
                } else {
                    base
                };
                Span::styled(frag.text, style)
            }));
            lines.push(DisplayLine {
                line: Line::from(spans),
                row: Some(row),
            });
            row += 1;
        }
    }
    lines
}

/// Index into `lines` of match row `row`.
pub fn line_of_row(lines: &[DisplayLine], row: usize) -> Option<usize> {
    lines.iter().position(|l| l.row == Some(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{GroupView, RowView};

    fn view() -> ResultsView {
        let row = |match_index: usize, text: &str, visited: bool| RowView {
            match_index,
            timestamp: "00:00:10".into(),
            marked_text: text.into(),
            url: String::new(),
            command: String::new(),
            visited,
        };
        ResultsView {
            archive: "demo".into(),
            pattern: "cat".into(),
            count: 3,
            page_labels: Vec::new(),
            selected_page: 0,
            chart: None,
            groups: vec![
                GroupView {
                    archive_index: 0,
                    video_id: "a".into(),
                    title: "First".into(),
                    upload_date: "1 January 2020".into(),
                    rows: vec![
                        row(0, "a\u{1}cat\u{2}", false),
                        row(1, "b\u{1}cat\u{2}", true),
                    ],
                },
                GroupView {
                    archive_index: 1,
                    video_id: "b".into(),
                    title: "Second".into(),
                    upload_date: "2 January 2020".into(),
                    rows: vec![row(2, "\u{1}cat\u{2}s", false)],
                },
            ],
        }
    }

    #[test]
    fn headers_precede_their_rows() {
        let lines = display_lines(&view(), ThemePalette::dark(), &Markup::TERMINAL);
        let rows: Vec<Option<usize>> = lines.iter().map(|l| l.row).collect();
        assert_eq!(rows, vec![None, Some(0), Some(1), None, Some(2)]);
        assert_eq!(line_of_row(&lines, 2), Some(4));
        assert_eq!(line_of_row(&lines, 3), None);
    }

    #[test]
    fn emphasis_becomes_highlighted_span() {
        let palette = ThemePalette::dark();
        let lines = display_lines(&view(), palette, &Markup::TERMINAL);
        let spans = &lines[1].line.spans;
        let cat = spans.iter().find(|s| s.content == "cat").unwrap();
        assert_eq!(cat.style, palette.highlight_style());
        let header: String = lines[0].line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(header, "1 January 2020 • First • a");
    }
}
