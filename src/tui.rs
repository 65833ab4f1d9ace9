use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::cell::Cell;
use std::io::stdout;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

use crate::board::Board;
use crate::error::BoardError;
use crate::filter::{ExperienceBand, JobFilter, SalaryBand};
use crate::models::Job;
use crate::repo::ApplyOutcome;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    Title,
    Location,
}

struct AppState {
    jobs: Vec<Job>,
    selected: usize,
    scroll_offset: u16,
    focus: Focus,
    title: String,
    location: String,
    salary: Option<usize>,
    experience: Option<usize>,
    suggestions: Vec<String>,
    header: String,
    message: Option<String>,
}

impl AppState {
    fn new() -> Self {
        Self {
            jobs: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            focus: Focus::List,
            title: String::new(),
            location: String::new(),
            salary: None,
            experience: None,
            suggestions: Vec::new(),
            header: String::new(),
            message: None,
        }
    }

    fn filter(&self) -> JobFilter {
        JobFilter {
            title: Some(self.title.clone()),
            location: Some(self.location.clone()),
            salary: self.salary.map(|i| SalaryBand::STANDARD[i]),
            experience: self.experience.map(|i| ExperienceBand::STANDARD[i]),
        }
    }

    fn current_job(&self) -> Option<&Job> {
        self.jobs.get(self.selected)
    }

    /// Re-reads the visible jobs, keeping the same job selected if it is
    /// still there.
    fn reload(&mut self, board: &Board) {
        let keep = self.current_job().map(|j| j.id);
        self.jobs = board.browse_jobs(&self.filter());
        self.selected = keep
            .and_then(|id| self.jobs.iter().position(|j| j.id == id))
            .unwrap_or(0);
        self.suggestions = if self.focus == Focus::Title {
            board.suggestions(&self.title, SUGGESTION_LIMIT)
        } else {
            Vec::new()
        };
    }

    fn refresh_header(&mut self, board: &Board) {
        self.header = match board.context().user() {
            Some(user) => format!(" {} ({}) ", user.display_name(), user.user_type),
            None => " Not logged in ".to_string(),
        };
    }

    fn input(&mut self) -> Option<&mut String> {
        match self.focus {
            Focus::Title => Some(&mut self.title),
            Focus::Location => Some(&mut self.location),
            Focus::List => None,
        }
    }

    fn next(&mut self) {
        if !self.jobs.is_empty() && self.selected < self.jobs.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn clear_filters(&mut self) {
        self.title.clear();
        self.location.clear();
        self.salary = None;
        self.experience = None;
    }
}

/// Steps through `None`, then each band, then back to `None`.
fn cycle(current: Option<usize>, len: usize) -> Option<usize> {
    match current {
        None if len > 0 => Some(0),
        Some(i) if i + 1 < len => Some(i + 1),
        _ => None,
    }
}

fn describe(result: Result<String, BoardError>) -> String {
    match result {
        Ok(message) => message,
        Err(e) => e.to_string(),
    }
}

pub fn run_browse(board: &Board, title: Option<&str>) -> Result<()> {
    let mut state = AppState::new();
    if let Some(title) = title {
        state.title = title.to_string();
        board.history().record(title);
    }
    state.refresh_header(board);
    state.reload(board);

    let session_changed = Rc::new(Cell::new(false));
    let flag = session_changed.clone();
    let _subscription = board.session().subscribe(move |_| flag.set(true));

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, board, &session_changed);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    board: &Board,
    session_changed: &Cell<bool>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        if session_changed.replace(false) {
            state.refresh_header(board);
            state.reload(board);
        }
        list_state.select((!state.jobs.is_empty()).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(POLL_INTERVAL)? {
            if board.poll_external()? {
                debug!("store changed in another process, reloading");
                state.reload(board);
            }
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.focus != Focus::List {
            match key.code {
                KeyCode::Esc => state.focus = Focus::List,
                KeyCode::Enter => {
                    if state.focus == Focus::Title {
                        board.history().record(&state.title);
                    }
                    state.focus = Focus::List;
                }
                KeyCode::Tab => {
                    if let Some(first) = state.suggestions.first().cloned() {
                        state.title = first;
                    }
                }
                KeyCode::Backspace => {
                    if let Some(input) = state.input() {
                        input.pop();
                    }
                }
                KeyCode::Char(c) => {
                    if let Some(input) = state.input() {
                        input.push(c);
                    }
                }
                _ => {}
            }
            state.reload(board);
            continue;
        }

        state.message = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
            KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
            KeyCode::Char('/') => {
                state.focus = Focus::Title;
                state.reload(board);
            }
            KeyCode::Char('l') => state.focus = Focus::Location,
            KeyCode::Char('s') => {
                state.salary = cycle(state.salary, SalaryBand::STANDARD.len());
                state.reload(board);
            }
            KeyCode::Char('e') => {
                state.experience = cycle(state.experience, ExperienceBand::STANDARD.len());
                state.reload(board);
            }
            KeyCode::Char('c') => {
                state.clear_filters();
                state.reload(board);
            }
            KeyCode::Char('a') => {
                if let Some((id, title)) = state.current_job().map(|j| (j.id, j.title.clone())) {
                    let result = board.apply(id).map(|outcome| match outcome {
                        ApplyOutcome::Applied(_) => format!("Applied to {}", title),
                        ApplyOutcome::AlreadyApplied(_) => format!("Already applied to {}", title),
                    });
                    state.message = Some(describe(result));
                }
            }
            KeyCode::Char('v') => {
                if let Some(id) = state.current_job().map(|j| j.id) {
                    let result = if board.is_saved(id) {
                        board.unsave_job(id).map(|_| "Removed from saved jobs".to_string())
                    } else {
                        board.save_job(id).map(|_| "Saved".to_string())
                    };
                    state.message = Some(describe(result));
                }
            }
            KeyCode::Char('t') => {
                if let Some(id) = state.current_job().map(|j| j.id) {
                    let result = board
                        .toggle_job_status(id)
                        .map(|j| format!("Job #{} is now {}", j.id, j.status));
                    state.message = Some(describe(result));
                    state.reload(board);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_filter_bar(frame, state, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(rows[1]);

    // Left panel: job list
    let items: Vec<ListItem> = state
        .jobs
        .iter()
        .map(|job| {
            let status_icon = if job.is_active() { " " } else { "-" };
            ListItem::new(format!(
                "{} {} | {}",
                status_icon,
                truncate(&job.title, 32),
                job.company
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " Jobs ({}) ", state.jobs.len()
        )))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: job detail, or suggestions while typing a title
    let width = chunks[1].width.saturating_sub(2).max(20) as usize;
    let (detail, title) = if state.focus == Focus::Title && !state.suggestions.is_empty() {
        (build_suggestions(state), " Suggestions (Tab to use the first) ")
    } else {
        (build_detail(state, width), " Detail ")
    };
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help = match &state.message {
        Some(message) => Paragraph::new(format!(" {}", message)).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(
            " j/k:move J/K:scroll /:title l:location s:salary e:experience c:clear  a:apply v:save t:open/close  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(help, rows[2]);
}

fn draw_filter_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let active = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |label: &'static str, value: &str, focused: bool| -> Vec<Span<'static>> {
        let style = if focused { active } else { Style::default() };
        let cursor = if focused { "_" } else { "" };
        vec![
            Span::styled(format!("{}: ", label), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{}{}", value, cursor), style),
            Span::raw("   "),
        ]
    };

    let salary = state
        .salary
        .map(|i| format!("{}L", SalaryBand::STANDARD[i]))
        .unwrap_or_else(|| "any".to_string());
    let experience = state
        .experience
        .map(|i| format!("{} yrs", ExperienceBand::STANDARD[i]))
        .unwrap_or_else(|| "any".to_string());

    let mut spans = field("Title", &state.title, state.focus == Focus::Title);
    spans.extend(field("Location", &state.location, state.focus == Focus::Location));
    spans.extend(field("Salary", &salary, false));
    spans.extend(field("Experience", &experience, false));

    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(state.header.clone()));
    frame.render_widget(bar, area);
}

fn build_suggestions(state: &AppState) -> Text<'_> {
    let lines: Vec<Line> = state
        .suggestions
        .iter()
        .map(|s| Line::from(format!("  {}", s)))
        .collect();
    Text::from(lines)
}

fn build_detail(state: &AppState, width: usize) -> Text<'_> {
    let Some(job) = state.current_job() else {
        return Text::raw("No jobs match the current filters");
    };

    let mut lines: Vec<Line> = Vec::new();

    // Header
    lines.push(Line::from(Span::styled(
        &job.title,
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!("at {}", job.company)));

    let status_style = if job.is_active() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.status),
        status_style,
    )));

    lines.push(Line::from(format!("Location: {}", job.location)));
    lines.push(Line::from(format!("Salary: {}", job.salary)));
    lines.push(Line::from(format!("Experience: {} yrs", job.experience_range)));
    if let Some(job_type) = &job.job_type {
        lines.push(Line::from(format!("Type: {}", job_type)));
    }
    if let Some(posted) = &job.posted_date {
        lines.push(Line::from(format!("Posted: {}", posted)));
    }
    if !job.skills.is_empty() {
        lines.push(Line::from(format!("Skills: {}", job.skills.join(", "))));
    }

    lines.push(Line::from(""));

    if job.description.trim().is_empty() {
        lines.push(Line::from(Span::styled(
            "(No description)",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        for line in textwrap::fill(&job.description, width).lines() {
            lines.push(Line::from(line.to_string()));
        }
    }

    Text::from(lines)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
