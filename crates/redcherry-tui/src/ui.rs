use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use redcherry_core::{format_response, DisplayLine, Message};

use crate::app::{App, Widget};

const BRAND: Color = Color::Red;
const PANEL_WIDTH: u16 = 56;
const PANEL_HEIGHT: u16 = 28;
const LAUNCHER_WIDTH: u16 = 12;
const LAUNCHER_HEIGHT: u16 = 3;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    match app.widget {
        Widget::Closed => render_launcher(frame, area),
        Widget::Open => render_panel(app, frame, area),
    }
}

/// A `width` x `height` box pinned to the bottom-right corner, one cell in.
fn anchored(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    Rect {
        x: area.x + area.width.saturating_sub(width + 1),
        y: area.y + area.height.saturating_sub(height + 1),
        width,
        height,
    }
}

fn render_launcher(frame: &mut Frame, area: Rect) {
    let hint = Paragraph::new(Line::from(Span::styled(
        "Enter: chat with us   q: quit",
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(hint, Rect { height: 1, ..area });

    let button_area = anchored(area, LAUNCHER_WIDTH, LAUNCHER_HEIGHT);
    let button = Paragraph::new(Line::from(Span::styled(
        "💬 Chat",
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(BRAND))
            .style(Style::default().bg(BRAND)),
    );
    frame.render_widget(button, button_area);
}

fn render_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let panel = anchored(area, PANEL_WIDTH, PANEL_HEIGHT);
    frame.render_widget(Clear, panel);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BRAND))
        .title(Span::styled(
            " RedCherry Assistant ",
            Style::default().fg(BRAND).add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(" Esc to close ").alignment(Alignment::Right));
    let inner = block.inner(panel);
    frame.render_widget(block, panel);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(inner);

    render_messages(app, frame, chunks[0]);
    render_input(app, frame, chunks[1]);
    render_status(app, frame, chunks[2]);
}

fn render_messages(app: &mut App, frame: &mut Frame, area: Rect) {
    let lines = chat_lines(app.session.messages(), app.is_loading(), app.animation_frame);

    // Estimate wrapped height so "scroll to newest" lands on the last line
    let wrap_width = area.width.max(1) as usize;
    let total: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(wrap_width))
        .sum();
    app.total_chat_lines = total.min(u16::MAX as usize) as u16;
    app.chat_height = area.height;

    let max_scroll = app.total_chat_lines.saturating_sub(app.chat_height);
    if app.take_scroll_request() {
        app.chat_scroll = max_scroll;
    }
    app.chat_scroll = app.chat_scroll.min(max_scroll);

    let chat = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn chat_lines(messages: &[Message], loading: bool, frame_idx: u8) -> Vec<Line<'_>> {
    let mut lines: Vec<Line> = Vec::new();

    for msg in messages {
        let stamp = Span::styled(
            msg.timestamp.format("%H:%M").to_string(),
            Style::default().fg(Color::DarkGray),
        );

        if msg.is_user() {
            for line in msg.text.lines() {
                lines.push(
                    Line::from(Span::styled(
                        line,
                        Style::default().fg(Color::White).bg(BRAND),
                    ))
                    .alignment(Alignment::Right),
                );
            }
            lines.push(Line::from(stamp).alignment(Alignment::Right));
        } else {
            for display in format_response(&msg.text) {
                lines.push(match display {
                    DisplayLine::Bullet(text) => Line::from(vec![
                        Span::styled("• ", Style::default().fg(BRAND)),
                        Span::raw(text),
                    ]),
                    DisplayLine::Plain(text) => Line::raw(text),
                });
            }
            lines.push(Line::from(stamp));
        }
        lines.push(Line::default());
    }

    if loading {
        // Bouncing dots: the highlighted one walks left to right
        let dots: Vec<Span> = (0..3u8)
            .map(|i| {
                let color = if i == frame_idx { Color::Gray } else { Color::DarkGray };
                Span::styled("● ", Style::default().fg(color))
            })
            .collect();
        lines.push(Line::from(dots));
    }

    lines
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.is_loading();
    let border_color = if loading { Color::DarkGray } else { BRAND };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let content = if app.input.is_empty() {
        Span::styled("Type your message...", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(app.input.as_str())
    };
    frame.render_widget(Paragraph::new(Line::from(content)).block(block), area);

    if !loading {
        let inner_width = area.width.saturating_sub(2);
        let offset = (app.input_cursor as u16).min(inner_width.saturating_sub(1));
        frame.set_cursor_position((area.x + 1 + offset, area.y + 1));
    }
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let text = app
        .status
        .clone()
        .unwrap_or_else(|| "Enter send  ↑↓ scroll  Ctrl-S save transcript".to_string());
    let status = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )));
    frame.render_widget(status, area);
}
