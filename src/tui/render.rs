/// Ratatui draw entry-point for scrivener.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::UnicodeWidthStr;

use super::{AppState, word_count};
use crate::machine::ModeKind;
use crate::surface::DocumentSurface;

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const KEY_HINTS: &str = "^G continue  Esc dismiss  ^Q quit ";

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();
    let show_banner = state.orchestrator.has_error();

    let constraints = if show_banner {
        vec![
            Constraint::Min(0),    // editor
            Constraint::Length(3), // error banner
            Constraint::Length(1), // status bar
        ]
    } else {
        vec![Constraint::Min(0), Constraint::Length(1)]
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    {
        let document = state.orchestrator.document().borrow();
        f.render_widget(&*document, chunks[0]);
    }

    if show_banner {
        draw_error_banner(f, state, chunks[1]);
        draw_status_bar(f, state, chunks[2]);
    } else {
        draw_status_bar(f, state, chunks[1]);
    }
}

// ── Error banner ──────────────────────────────────────────────────────────────

fn draw_error_banner(f: &mut Frame, state: &AppState, area: Rect) {
    let message = state.orchestrator.error_message().unwrap_or_default();
    let line = Line::from(vec![
        Span::styled(" ✗ ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled(message.to_string(), Style::default().fg(Color::White)),
        Span::styled(
            "   Esc to dismiss · ^G to try again",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(
        Paragraph::new(line)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title(" generation failed "),
            ),
        area,
    );
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let (glyph, label, color) = match state.orchestrator.mode() {
        ModeKind::Generating => {
            let words = state
                .orchestrator
                .pending_request()
                .map(|req| word_count(&req.current_text))
                .unwrap_or(0);
            (
                SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()],
                format!("continuing {words} words…"),
                Color::Cyan,
            )
        }
        ModeKind::Failure => ("✗", "failed".to_string(), Color::Red),
        ModeKind::Idle => ("▲", "ready".to_string(), Color::Green),
    };

    let words = word_count(&state.orchestrator.document().borrow().text());

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(" scrivener", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(
            state.profile.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(state.model.clone(), Style::default().fg(Color::Rgb(100, 180, 220))),
        Span::styled("  ", Style::default()),
        Span::styled(label, Style::default().fg(color)),
        Span::styled(format!("  {words} words"), Style::default().fg(Color::DarkGray)),
    ];
    if let Some(notice) = &state.notice {
        spans.push(Span::styled(
            format!("  {notice}"),
            Style::default().fg(Color::Rgb(200, 160, 50)),
        ));
    }

    // Right-align key hints in whatever room is left
    let used: usize = spans.iter().map(|s| s.content.width()).sum();
    let room = (area.width as usize).saturating_sub(used);
    if room > KEY_HINTS.width() {
        spans.push(Span::raw(" ".repeat(room - KEY_HINTS.width())));
        spans.push(Span::styled(KEY_HINTS, Style::default().fg(Color::Rgb(55, 50, 90))));
    }

    let bar_style = if state.orchestrator.busy() {
        Style::default().bg(Color::Rgb(15, 15, 25))
    } else {
        Style::default().bg(Color::Rgb(10, 10, 18))
    };
    f.render_widget(Paragraph::new(Line::from(spans)).style(bar_style), area);
}
