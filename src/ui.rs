use std::cell::Cell;
use std::io::{self, Stdout};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::feed::{FeedView, Update};
use crate::model::Post;
use crate::navigation::ViewportScroller;

const CARD_WIDTH: u16 = 34;
const TITLE_LINES: usize = 3;
const SPINNER_FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

/// Scroller for the card strip: records which card must be visible and the
/// next draw scrolls the strip to it.
#[derive(Debug, Clone, Default)]
pub struct StripScroller {
    focus: Rc<Cell<usize>>,
}

impl StripScroller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> usize {
        self.focus.get()
    }
}

impl ViewportScroller for StripScroller {
    fn bring_into_view(&self, index: usize) {
        self.focus.set(index);
    }
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    view: FeedView,
    scroller: StripScroller,
    status_message: String,
    spinner: Spinner,
    numeric_jump: Option<usize>,
    strip_offset: usize,
    card_areas: Vec<(Rect, usize)>,
    needs_redraw: bool,
}

impl Model {
    pub fn new(view: FeedView, scroller: StripScroller, status_message: String) -> Self {
        Self {
            view,
            scroller,
            status_message,
            spinner: Spinner::new(),
            numeric_jump: None,
            strip_offset: 0,
            card_areas: Vec::new(),
            needs_redraw: true,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        stdout.execute(EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(DisableMouseCapture)?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            self.poll_feed();

            if self.view.take_dirty() {
                self.mark_dirty();
            }
            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {err:#}");
                                self.mark_dirty();
                            }
                        }
                    }
                    Event::Mouse(mouse) => {
                        if let Err(err) = self.handle_mouse(mouse) {
                            self.status_message = format!("Error: {err:#}");
                            self.mark_dirty();
                        }
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.view.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn poll_feed(&mut self) {
        while let Some(update) = self.view.poll() {
            match update {
                Update::Appended(count) => {
                    self.status_message = format!(
                        "Loaded {} new post{} ({} total).",
                        count,
                        if count == 1 { "" } else { "s" },
                        self.view.len()
                    );
                }
                Update::Unchanged => {}
                Update::Failed(err) => {
                    self.status_message = format!("Could not load posts: {err}");
                }
            }
            self.mark_dirty();
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if !matches!(code, KeyCode::Char(ch) if ch.is_ascii_digit())
            && !matches!(code, KeyCode::Enter)
        {
            self.numeric_jump = None;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('l') | KeyCode::Right => {
                self.view.advance();
            }
            KeyCode::Char('h') | KeyCode::Left => {
                self.view.retreat();
            }
            KeyCode::Home => {
                self.view.first();
            }
            KeyCode::End => {
                self.view.last();
            }
            KeyCode::Char('+') | KeyCode::Char('u') => {
                let liked = self.view.like()?;
                self.status_message = self.reaction_status(liked);
            }
            KeyCode::Char('-') | KeyCode::Char('d') => {
                let disliked = self.view.dislike()?;
                self.status_message = self.reaction_status(disliked);
            }
            KeyCode::Char('s') | KeyCode::Char('S') => match self.view.share_link() {
                Ok(url) => {
                    self.status_message = format!("Link copied to clipboard: {url}");
                }
                Err(err) => {
                    self.status_message = format!("Share failed: {err}");
                }
            },
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.view.load_more();
                self.status_message = "Checking for new posts…".to_string();
            }
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                let digit = ch.to_digit(10).unwrap_or(0) as usize;
                let next = self
                    .numeric_jump
                    .unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(digit);
                self.numeric_jump = Some(next);
                self.status_message = format!("Go to post #{next} (Enter to jump)");
            }
            KeyCode::Enter => {
                if let Some(position) = self.numeric_jump.take() {
                    self.jump_to(position);
                }
            }
            _ => return Ok(false),
        }

        self.mark_dirty();
        Ok(false)
    }

    fn jump_to(&mut self, position: usize) {
        if position >= 1 && position <= self.view.len() {
            self.view.select_index(position - 1);
            self.status_message = format!("Post #{position} of {}.", self.view.len());
        } else {
            self.status_message = format!("No post #{position} yet.");
        }
    }

    fn reaction_status(&self, applied: bool) -> String {
        if !applied {
            return "Nothing to react to yet.".to_string();
        }
        match self.view.current() {
            Some(post) if post.like => format!("Liked \"{}\".", post.image.title),
            Some(post) if post.dislike => format!("Disliked \"{}\".", post.image.title),
            Some(_) => "Reaction cleared.".to_string(),
            None => String::new(),
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Result<()> {
        self.numeric_jump = None;

        match event.kind {
            MouseEventKind::ScrollDown => {
                self.view.advance();
            }
            MouseEventKind::ScrollUp => {
                self.view.retreat();
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(index) = card_at(&self.card_areas, event.column, event.row) {
                    self.view.select_index(index);
                }
            }
            _ => return Ok(()),
        }
        self.mark_dirty();
        Ok(())
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.view.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        self.draw_strip(frame, layout[1]);

        let footer = Paragraph::new(
            "h/l move · Home/End · 1-9+Enter jump · u like · d dislike · s share · r refresh · q quit",
        )
        .style(
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .bg(COLOR_PANEL_BG)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center);
        frame.render_widget(footer, layout[2]);
    }

    fn draw_strip(&mut self, frame: &mut Frame<'_>, area: Rect) {
        self.card_areas.clear();
        let len = self.view.len();
        let current = self.view.current().map(|_| self.view.cursor().unwrap_or(0));

        let Some(current) = current else {
            let message = if self.view.is_loading() || len == 0 {
                format!("{} Loading posts…", self.spinner.frame())
            } else {
                format!(
                    "{} Waiting for post #{}…",
                    self.spinner.frame(),
                    self.view.cursor().map(|index| index + 1).unwrap_or(1)
                )
            };
            let placeholder = Paragraph::new(message)
                .style(Style::default().fg(COLOR_ACCENT).bg(COLOR_PANEL_BG))
                .alignment(Alignment::Center)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(COLOR_BORDER_IDLE)),
                );
            frame.render_widget(placeholder, area);
            return;
        };

        let visible = visible_cards(area.width);
        let focus = self.scroller.focus().min(len.saturating_sub(1));
        self.strip_offset = strip_offset(focus, self.strip_offset, visible, len);

        let end = (self.strip_offset + visible).min(len);
        let constraints: Vec<Constraint> = (self.strip_offset..end)
            .map(|_| Constraint::Length(CARD_WIDTH))
            .chain(std::iter::once(Constraint::Min(0)))
            .collect();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (slot, index) in (self.strip_offset..end).enumerate() {
            let card_area = columns[slot];
            let post = &self.view.posts()[index];
            let focused = index == current;
            frame.render_widget(card(post, index, focused, card_area.width), card_area);
            self.card_areas.push((card_area, index));
        }
    }
}

fn card(post: &Post, index: usize, focused: bool, width: u16) -> Paragraph<'static> {
    let inner_width = width.saturating_sub(2).max(1) as usize;
    let (border, background) = if focused {
        (COLOR_BORDER_FOCUSED, COLOR_PANEL_FOCUSED_BG)
    } else {
        (COLOR_BORDER_IDLE, COLOR_PANEL_BG)
    };

    let mut lines: Vec<Line<'static>> = Vec::new();
    let title = if post.image.title.trim().is_empty() {
        "Untitled"
    } else {
        post.image.title.trim()
    };
    for line in title_lines(title, inner_width, TITLE_LINES) {
        lines.push(Line::from(Span::styled(
            line,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::default());

    let byline = if post.author.username.is_empty() {
        post.author.display_name().to_string()
    } else if post.author.display_name() == post.author.username {
        format!("@{}", post.author.username)
    } else {
        format!("{} (@{})", post.author.display_name(), post.author.username)
    };
    lines.push(Line::from(Span::styled(
        truncate_to_width(&format!("by {byline}"), inner_width),
        Style::default().fg(COLOR_TEXT_SECONDARY),
    )));
    if !post.image.date.is_empty() {
        lines.push(Line::from(Span::styled(
            truncate_to_width(&post.image.date, inner_width),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        truncate_to_width(&post.image.src, inner_width),
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::UNDERLINED),
    )));
    lines.push(Line::default());

    let reaction_color = if post.like {
        COLOR_SUCCESS
    } else if post.dislike {
        COLOR_ERROR
    } else {
        COLOR_TEXT_SECONDARY
    };
    lines.push(Line::from(Span::styled(
        reaction_label(post),
        Style::default()
            .fg(reaction_color)
            .add_modifier(Modifier::BOLD),
    )));

    Paragraph::new(Text::from(lines))
        .style(Style::default().bg(background))
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(Span::styled(
                    format!(" #{} ", index + 1),
                    Style::default().fg(border).add_modifier(Modifier::BOLD),
                )),
        )
}

fn reaction_label(post: &Post) -> &'static str {
    if post.like {
        "♥ liked"
    } else if post.dislike {
        "✖ disliked"
    } else {
        "· no reaction"
    }
}

fn visible_cards(width: u16) -> usize {
    ((width / CARD_WIDTH) as usize).max(1)
}

/// First card to draw so that `focus` is on screen, moving the strip as
/// little as possible from `offset`.
fn strip_offset(focus: usize, offset: usize, visible: usize, len: usize) -> usize {
    let visible = visible.max(1);
    let mut offset = offset.min(len.saturating_sub(1));
    if focus < offset {
        offset = focus;
    } else if focus >= offset + visible {
        offset = focus + 1 - visible;
    }
    offset
}

fn card_at(areas: &[(Rect, usize)], column: u16, row: u16) -> Option<usize> {
    areas
        .iter()
        .find(|(area, _)| {
            column >= area.x
                && column < area.x.saturating_add(area.width)
                && row >= area.y
                && row < area.y.saturating_add(area.height)
        })
        .map(|(_, index)| *index)
}

fn title_lines(title: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = wrap(title, width.max(1))
        .into_iter()
        .map(|line| line.into_owned())
        .collect();
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let shortened = truncate_to_width(last, width.saturating_sub(1));
            *last = format!("{shortened}…");
        }
    }
    lines
}

fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    if width > 0 {
        out.push('…');
    }
    out
}
