//! Ratatui-based interface over a [`SearchSession`].

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::model::types::ArchiveSummary;
use crate::service::SearchService;
use crate::session::{ResultsView, SearchSession, SubmitOutcome};
use crate::ui::components::theme::ThemePalette;
use crate::ui::components::widgets::{frequency_chart, page_tabs, search_bar};
use crate::ui::data::{FocusRegion, display_lines, line_of_row};
use crate::ui::shortcuts;

/// What a key press asks the session to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Submit(String),
    NextPage,
    PrevPage,
    JumpToVideo(usize),
    Open(usize),
    ShowCommand(usize),
    Export,
    SelectContext(String),
}

/// Interface state that is not part of the session.
#[derive(Clone, Debug)]
pub struct App {
    pub query: String,
    pub focus: FocusRegion,
    /// Selected match row on the current page.
    pub row: usize,
    pub chart_cursor: usize,
    pub status: String,
    /// Highlighted entry while the archive menu is open.
    pub context_menu: Option<usize>,
    pub theme_dark: bool,
}

impl Default for App {
    fn default() -> Self {
        Self {
            query: String::new(),
            focus: FocusRegion::Query,
            row: 0,
            chart_cursor: 0,
            status: String::new(),
            context_menu: None,
            theme_dark: true,
        }
    }
}

impl App {
    pub fn palette(&self) -> ThemePalette {
        if self.theme_dark {
            ThemePalette::dark()
        } else {
            ThemePalette::light()
        }
    }

    fn reset_rows(&mut self) {
        self.row = 0;
    }

    /// Translate a key press into UI state changes and an [`Action`].
    pub fn handle_key(
        &mut self,
        key: KeyEvent,
        view: Option<&ResultsView>,
        archives: &[ArchiveSummary],
        context: Option<&str>,
    ) -> Action {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        if let Some(selected) = self.context_menu {
            match key.code {
                KeyCode::Esc | KeyCode::F(2) => self.context_menu = None,
                KeyCode::Up => self.context_menu = Some(selected.saturating_sub(1)),
                KeyCode::Down if selected + 1 < archives.len() => {
                    self.context_menu = Some(selected + 1)
                }
                KeyCode::Enter => {
                    self.context_menu = None;
                    if let Some(archive) = archives.get(selected) {
                        return Action::SelectContext(archive.name.clone());
                    }
                }
                _ => {}
            }
            return Action::None;
        }

        let rows = view.map_or(0, |v| v.rows().count());
        let bars = view
            .and_then(|v| v.chart.as_deref())
            .unwrap_or_default();
        let selected_match = || view.and_then(|v| v.rows().nth(self.row)).map(|r| r.match_index);

        match key.code {
            KeyCode::Esc => Action::Quit,
            KeyCode::F(2) => {
                if !archives.is_empty() {
                    let current = context
                        .and_then(|c| archives.iter().position(|a| a.name == c))
                        .unwrap_or(0);
                    self.context_menu = Some(current);
                }
                Action::None
            }
            KeyCode::F(3) => {
                self.theme_dark = !self.theme_dark;
                Action::None
            }
            KeyCode::Tab => Action::NextPage,
            KeyCode::BackTab => Action::PrevPage,
            KeyCode::Left if !bars.is_empty() => {
                if self.focus == FocusRegion::Chart {
                    self.chart_cursor = self.chart_cursor.saturating_sub(1);
                }
                self.focus = FocusRegion::Chart;
                Action::None
            }
            KeyCode::Right if !bars.is_empty() => {
                if self.focus == FocusRegion::Chart {
                    self.chart_cursor = (self.chart_cursor + 1).min(bars.len() - 1);
                }
                self.focus = FocusRegion::Chart;
                Action::None
            }
            KeyCode::Up => {
                match self.focus {
                    FocusRegion::Results if self.row > 0 => self.row -= 1,
                    FocusRegion::Results | FocusRegion::Chart => self.focus = FocusRegion::Query,
                    FocusRegion::Query => {}
                }
                Action::None
            }
            KeyCode::Down => {
                match self.focus {
                    FocusRegion::Results => self.row = (self.row + 1).min(rows.saturating_sub(1)),
                    FocusRegion::Query | FocusRegion::Chart if rows > 0 => {
                        self.focus = FocusRegion::Results;
                        self.row = self.row.min(rows - 1);
                    }
                    _ => {}
                }
                Action::None
            }
            KeyCode::Enter => match self.focus {
                FocusRegion::Query => {
                    let pattern = self.query.trim();
                    if pattern.is_empty() {
                        Action::None
                    } else {
                        Action::Submit(pattern.to_string())
                    }
                }
                FocusRegion::Chart => bars
                    .get(self.chart_cursor)
                    .map_or(Action::None, |b| Action::JumpToVideo(b.archive_index)),
                FocusRegion::Results => selected_match().map_or(Action::None, Action::Open),
            },
            KeyCode::Backspace => {
                self.focus = FocusRegion::Query;
                self.query.pop();
                Action::None
            }
            KeyCode::Char(c) if self.focus == FocusRegion::Results => match c {
                'o' => selected_match().map_or(Action::None, Action::Open),
                'y' => selected_match().map_or(Action::None, Action::ShowCommand),
                'e' => Action::Export,
                '/' => {
                    self.focus = FocusRegion::Query;
                    Action::None
                }
                _ => {
                    self.focus = FocusRegion::Query;
                    self.query.push(c);
                    Action::None
                }
            },
            KeyCode::Char(c) => {
                self.focus = FocusRegion::Query;
                self.query.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }
}

pub fn footer_legend(focus: FocusRegion) -> String {
    match focus {
        FocusRegion::Query => format!(
            "{} search | {} archive | {} page | {} chart | {} results | {} theme | {} quit",
            shortcuts::SUBMIT,
            shortcuts::CONTEXT_MENU,
            shortcuts::PAGE_NEXT,
            shortcuts::CHART_CURSOR,
            "Down",
            shortcuts::THEME,
            shortcuts::QUIT
        ),
        FocusRegion::Results => format!(
            "{} move | {} open | {} command | {} export | {} page | {} query | {} quit",
            shortcuts::ROW_NAV,
            shortcuts::OPEN,
            shortcuts::COMMAND,
            shortcuts::EXPORT,
            shortcuts::PAGE_NEXT,
            shortcuts::FOCUS_QUERY,
            shortcuts::QUIT
        ),
        FocusRegion::Chart => format!(
            "{} select video | {} jump to its page | {} prev page | Up query | {} quit",
            shortcuts::CHART_CURSOR,
            shortcuts::CHART_JUMP,
            shortcuts::PAGE_PREV,
            shortcuts::QUIT
        ),
    }
}

/// File name for an export of `pattern` in `archive`.
pub fn export_file_name(archive: &str, pattern: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!("{}-{}.txt", clean(archive), clean(pattern))
}

/// Run the interactive browser until the user quits.
///
/// With `once`, draws a single frame after loading the archive list and
/// returns.
pub async fn run_tui<S: SearchService>(
    session: &mut SearchSession<S>,
    preferred_archive: Option<&str>,
    export_dir: PathBuf,
    once: bool,
) -> Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, session, preferred_archive, &export_dir, once).await;
    teardown_terminal()?;
    result
}

async fn event_loop<S: SearchService>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut SearchSession<S>,
    preferred_archive: Option<&str>,
    export_dir: &Path,
    once: bool,
) -> Result<()> {
    let mut app = App {
        status: "Loading archives...".into(),
        ..App::default()
    };
    terminal.draw(|f| draw(f, &app, &*session))?;

    app.status = match session.load_archives(preferred_archive).await {
        Ok(Some(name)) => format!("Archive: {name}. Type a pattern and press Enter."),
        Ok(None) => "No archives available; searching is disabled.".into(),
        Err(e) => format!("Could not load archives: {e}"),
    };

    let tick_rate = Duration::from_millis(50);
    let mut needs_draw = true;
    loop {
        if needs_draw {
            terminal.draw(|f| draw(f, &app, &*session))?;
            needs_draw = false;
        }
        if once {
            break;
        }

        if event::poll(tick_rate)?
            && let Event::Key(key) = event::read()?
        {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            needs_draw = true;
            let view = session.view();
            let action = app.handle_key(key, view.as_ref(), session.archives(), session.context());
            drop(view);

            if let Action::Submit(pattern) = &action {
                app.status = format!("Searching for \"{pattern}\"...");
                terminal.draw(|f| draw(f, &app, &*session))?;
            }
            if apply(&mut app, session, action, export_dir).await {
                break;
            }
        }
    }
    Ok(())
}

/// Carry out `action`; returns `true` to quit.
pub async fn apply<S: SearchService>(
    app: &mut App,
    session: &mut SearchSession<S>,
    action: Action,
    export_dir: &Path,
) -> bool {
    match action {
        Action::None => {}
        Action::Quit => return true,
        Action::Submit(pattern) => {
            app.status = match session.submit(&pattern).await {
                Ok(SubmitOutcome::Ready { matches }) => {
                    app.reset_rows();
                    app.chart_cursor = 0;
                    format!("{matches} results")
                }
                Ok(SubmitOutcome::Empty) => {
                    app.reset_rows();
                    "No results".into()
                }
                Ok(SubmitOutcome::Duplicate) => "Results are already up to date".into(),
                Ok(SubmitOutcome::NoContext) => "No archive selected (F2 to choose)".into(),
                Ok(SubmitOutcome::Superseded) => app.status.clone(),
                Err(e) if e.is_retryable() => format!("Search failed: {e}. Press Enter to retry."),
                Err(e) => format!("Search failed: {e}"),
            };
        }
        Action::NextPage => {
            if session.next_page() {
                app.reset_rows();
            }
        }
        Action::PrevPage => {
            if session.prev_page() {
                app.reset_rows();
            }
        }
        Action::JumpToVideo(archive_index) => {
            app.status = match session.select_video(archive_index) {
                Some(page) => {
                    app.reset_rows();
                    app.focus = FocusRegion::Results;
                    format!("Page {}", page + 1)
                }
                None => "No matches in that video".into(),
            };
        }
        Action::Open(match_index) => {
            app.status = match session.mark_visited(match_index) {
                Ok(url) => url,
                Err(e) => e.to_string(),
            };
        }
        Action::ShowCommand(match_index) => {
            app.status = match session.command_for(match_index) {
                Ok(cmd) => cmd,
                Err(e) => e.to_string(),
            };
        }
        Action::Export => {
            app.status = match export(session, export_dir) {
                Ok(Some(path)) => format!("Exported to {}", path.display()),
                Ok(None) => "Nothing to export".into(),
                Err(e) => {
                    warn!(error = %e, "export failed");
                    format!("Export failed: {e:#}")
                }
            };
        }
        Action::SelectContext(name) => {
            app.status = match session.set_context(&name) {
                Ok(()) => {
                    app.query.clear();
                    app.reset_rows();
                    app.chart_cursor = 0;
                    app.focus = FocusRegion::Query;
                    format!("Archive: {name}")
                }
                Err(e) => e.to_string(),
            };
        }
    }
    false
}

fn export<S: SearchService>(session: &SearchSession<S>, dir: &Path) -> Result<Option<PathBuf>> {
    let (Some(doc), Some(result)) = (session.export_document(), session.result()) else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating export dir {}", dir.display()))?;
    let path = dir.join(export_file_name(&result.archive, &result.pattern));
    std::fs::write(&path, doc).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "export_written");
    Ok(Some(path))
}

fn draw<S: SearchService>(f: &mut Frame, app: &App, session: &SearchSession<S>) {
    let palette = app.palette();
    let view = session.view();
    let labels = view.as_ref().map(|v| v.page_labels.as_slice()).unwrap_or_default();
    let bars = view.as_ref().and_then(|v| v.chart.as_deref());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),                                  // search bar
            Constraint::Length(if labels.is_empty() { 0 } else { 1 }), // page tabs
            Constraint::Length(if bars.is_some() { 8 } else { 0 }),    // chart
            Constraint::Min(0),                                     // results
            Constraint::Length(1),                                  // status
            Constraint::Length(1),                                  // footer
        ])
        .split(f.area());

    f.render_widget(
        search_bar(
            &app.query,
            palette,
            app.focus == FocusRegion::Query,
            session.context(),
            view.as_ref().map(|v| v.count),
        ),
        chunks[0],
    );

    if !labels.is_empty() {
        let selected = view.as_ref().map_or(0, |v| v.selected_page);
        f.render_widget(page_tabs(labels, selected, palette), chunks[1]);
    }

    if let Some(bars) = bars {
        f.render_widget(
            frequency_chart(
                bars,
                app.chart_cursor,
                app.focus == FocusRegion::Chart,
                chunks[2].width,
                palette,
            ),
            chunks[2],
        );
    }

    let results_block = Block::default()
        .borders(Borders::ALL)
        .border_style(if app.focus == FocusRegion::Results {
            palette.border_focus_style()
        } else {
            palette.border_style()
        });
    match view.as_ref() {
        Some(view) => {
            let lines = display_lines(view, palette, &session.options().markup);
            let mut state = ListState::default();
            if app.focus == FocusRegion::Results {
                state.select(line_of_row(&lines, app.row));
            }
            let items: Vec<ListItem> = lines.into_iter().map(|l| ListItem::new(l.line)).collect();
            f.render_stateful_widget(
                List::new(items)
                    .block(results_block)
                    .highlight_style(palette.selected_style()),
                chunks[3],
                &mut state,
            );
        }
        None => {
            f.render_widget(Paragraph::new("").block(results_block), chunks[3]);
        }
    }

    let status_style = if session.last_error().is_some() {
        palette.error_style()
    } else {
        palette.hint_style()
    };
    f.render_widget(
        Paragraph::new(Span::styled(app.status.clone(), status_style)),
        chunks[4],
    );
    f.render_widget(
        Paragraph::new(Span::styled(footer_legend(app.focus), palette.hint_style())),
        chunks[5],
    );

    if let Some(selected) = app.context_menu {
        render_context_menu(f, palette, session.archives(), session.context(), selected);
    }
}

fn render_context_menu(
    frame: &mut Frame,
    palette: ThemePalette,
    archives: &[ArchiveSummary],
    current: Option<&str>,
    selected: usize,
) {
    let area = centered_rect(50, 50, frame.area());
    let items: Vec<ListItem> = archives
        .iter()
        .map(|a| {
            let marker = if Some(a.name.as_str()) == current { "● " } else { "  " };
            ListItem::new(format!("{marker}{}", a.name))
        })
        .collect();
    let mut state = ListState::default();
    state.select(Some(selected));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(
        List::new(items)
            .block(
                Block::default()
                    .title(Span::styled(" Archive ", palette.title()))
                    .borders(Borders::ALL)
                    .border_style(palette.border_focus_style()),
            )
            .highlight_style(palette.selected_style()),
        area,
        &mut state,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn teardown_terminal() -> Result<()> {
    let mut stdout = io::stdout();
    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;
    Ok(())
}
