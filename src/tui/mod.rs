/// Ratatui-based TUI for scrivener.
///
/// Architecture:
///   main task:        event loop, crossterm keyboard events + mpsc UiEvent drain;
///                     the only place the orchestrator and the document are touched
///   generation task:  tokio::spawn, runs the adapter call, sends the outcome back
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  document editor (Min(0))                      │
///   ├────────────────────────────────────────────────┤
///   │  error banner (3 lines, only in failure)       │
///   ├────────────────────────────────────────────────┤
///   │  status bar (1 line)                           │
///   └────────────────────────────────────────────────┘
pub mod render;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    style::{Color, Style},
    widgets::{Block, Borders},
};
use tokio::sync::mpsc;
use tui_textarea::TextArea;

use crate::config::ResolvedConfig;
use crate::continuation::{ChatContinuation, ContinuationProvider};
use crate::orchestrator::{FinishedGeneration, Orchestrator};
use crate::surface::{DocumentSurface, shared};

// ── UiEvent: typed events from background tasks → TUI ───────────────────────

#[derive(Debug)]
pub enum UiEvent {
    /// The adapter call for the in-flight generation returned.
    GenerationFinished(FinishedGeneration),
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub orchestrator: Orchestrator<TextArea<'static>>,
    pub profile: String,
    pub model: String,
    /// Incremented every 120ms while generating for spinner animation
    pub spinner_tick: u32,
    /// One-shot status line message, cleared on the next keystroke
    pub notice: Option<String>,
}

impl AppState {
    pub fn new(
        resolved: &ResolvedConfig,
        seed: &str,
        provider: Arc<dyn ContinuationProvider>,
    ) -> Self {
        let mut textarea = if seed.is_empty() {
            TextArea::default()
        } else {
            TextArea::from(seed.lines())
        };
        textarea.set_block(Block::default().borders(Borders::ALL).title(" draft "));
        textarea.set_placeholder_text("Start writing, then press Ctrl+G to continue…");
        textarea.set_cursor_line_style(Style::default());
        textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
        textarea.focus();

        Self {
            orchestrator: Orchestrator::new(shared(textarea), provider),
            profile: resolved.profile_name.clone(),
            model: resolved.model.clone(),
            spinner_tick: 0,
            notice: None,
        }
    }

    fn apply_event(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::GenerationFinished(finished) => {
                self.orchestrator.complete(finished);
                if !self.orchestrator.has_error() {
                    let words = self
                        .orchestrator
                        .last_generated_text()
                        .map(word_count)
                        .unwrap_or(0);
                    self.notice = Some(format!("✓ continued · {words} words"));
                }
            }
        }
    }

    /// Ctrl+G: snapshot the document and start a generation in the background.
    fn trigger(&mut self, ui_tx: &mpsc::UnboundedSender<UiEvent>) {
        match self.orchestrator.trigger_generation() {
            Ok(pending) => {
                tracing::info!(
                    words = word_count(&pending.request().current_text),
                    "continuation requested"
                );
                self.notice = None;
                self.spinner_tick = 0;
                let tx = ui_tx.clone();
                tokio::spawn(async move {
                    let finished = pending.run().await;
                    let _ = tx.send(UiEvent::GenerationFinished(finished));
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "generation not started");
                self.notice = Some(e.to_string());
            }
        }
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(resolved: ResolvedConfig, seed: String) -> Result<()> {
    let client = resolved.client()?;
    let provider: Arc<dyn ContinuationProvider> = Arc::new(ChatContinuation::new(client));
    let state = AppState::new(&resolved, &seed, provider);

    let mut terminal = setup_terminal().context("Failed to initialise terminal")?;

    // Panic hook: restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let result = event_loop(&mut terminal, state).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut state: AppState,
) -> Result<()> {
    // Channel: generation task → TUI
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    tracing::info!(profile = %state.profile, model = %state.model, "session started");
    terminal.draw(|f| render::draw(f, &state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.orchestrator.busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, &state))?;
                }
            }

            // ── Generation outcomes ───────────────────────────────────────────
            Some(ev) = ui_rx.recv() => {
                state.apply_event(ev);
                terminal.draw(|f| render::draw(f, &state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                if let Event::Key(key) = ev {
                    if !handle_key(key, &mut state, &ui_tx) {
                        break;
                    }
                }
                terminal.draw(|f| render::draw(f, &state))?;
            }
        }
    }

    tracing::info!("session ended");
    Ok(())
}

// ── Key handler ───────────────────────────────────────────────────────────────

/// Returns false when the user asked to quit.
fn handle_key(key: KeyEvent, state: &mut AppState, ui_tx: &mpsc::UnboundedSender<UiEvent>) -> bool {
    if key.kind != KeyEventKind::Press {
        return true;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return false,
        KeyCode::Char('g') if ctrl => state.trigger(ui_tx),
        KeyCode::Esc => {
            if state.orchestrator.has_error() {
                state.orchestrator.dismiss_error();
            }
            state.notice = None;
        }
        _ => {
            state.notice = None;
            state.orchestrator.document().borrow_mut().input(key);
        }
    }
    true
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::machine::ModeKind;
    use async_trait::async_trait;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl ContinuationProvider for Fixed {
        async fn generate(&self, _current_text: &str) -> Result<String, ProviderError> {
            self.0
                .map(str::to_string)
                .map_err(|m| ProviderError::Provider(m.to_string()))
        }
    }

    fn resolved() -> ResolvedConfig {
        ResolvedConfig::resolve(&crate::config::ConfigFile::default(), &Default::default())
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    async fn drain(state: &mut AppState, rx: &mut mpsc::UnboundedReceiver<UiEvent>) {
        let ev = rx.recv().await.expect("generation task reports back");
        state.apply_event(ev);
    }

    #[tokio::test]
    async fn test_ctrl_g_appends_continuation_to_editor() {
        let provider = Arc::new(Fixed(Ok(" turning orange.")));
        let mut state = AppState::new(&resolved(), "The sky was", provider);
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(handle_key(key(KeyCode::Char('g'), KeyModifiers::CONTROL), &mut state, &tx));
        assert!(state.orchestrator.busy());
        drain(&mut state, &mut rx).await;

        assert_eq!(state.orchestrator.mode(), ModeKind::Idle);
        assert_eq!(state.orchestrator.document().borrow().text(), "The sky was turning orange.");
        assert_eq!(state.notice.as_deref(), Some("✓ continued · 2 words"));
    }

    #[tokio::test]
    async fn test_empty_editor_shows_notice_without_generating() {
        let mut state = AppState::new(&resolved(), "", Arc::new(Fixed(Ok("never"))));
        let (tx, _rx) = mpsc::unbounded_channel();

        handle_key(key(KeyCode::Char('g'), KeyModifiers::CONTROL), &mut state, &tx);

        assert_eq!(state.orchestrator.mode(), ModeKind::Idle);
        assert_eq!(
            state.notice.as_deref(),
            Some("nothing to continue: the document is empty")
        );
    }

    #[tokio::test]
    async fn test_escape_dismisses_error() {
        let mut state = AppState::new(&resolved(), "Draft", Arc::new(Fixed(Err("rate limited"))));
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_key(key(KeyCode::Char('g'), KeyModifiers::CONTROL), &mut state, &tx);
        drain(&mut state, &mut rx).await;
        assert_eq!(state.orchestrator.error_message(), Some("rate limited"));

        handle_key(key(KeyCode::Esc, KeyModifiers::NONE), &mut state, &tx);
        assert_eq!(state.orchestrator.mode(), ModeKind::Idle);
        assert_eq!(state.orchestrator.document().borrow().text(), "Draft");
    }

    #[tokio::test]
    async fn test_typing_edits_document_and_ctrl_q_quits() {
        let mut state = AppState::new(&resolved(), "Hi", Arc::new(Fixed(Ok("!"))));
        let (tx, _rx) = mpsc::unbounded_channel();

        handle_key(key(KeyCode::Char('!'), KeyModifiers::NONE), &mut state, &tx);
        assert_eq!(state.orchestrator.document().borrow().text(), "Hi!");
        assert!(!handle_key(key(KeyCode::Char('q'), KeyModifiers::CONTROL), &mut state, &tx));
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one  two\n\nthree"), 3);
    }
}
