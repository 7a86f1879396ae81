use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use redcherry_core::{format_conversation, ChatSession, SettledTurn, StoreEvent};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// The floating launcher button, or the open chat panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    Closed,
    Open,
}

pub struct App {
    pub should_quit: bool,
    pub widget: Widget,
    pub session: ChatSession,

    // Pending input
    pub input: String,
    pub input_cursor: usize, // cursor position in chars, not bytes

    // In-flight turn
    pub pending: Option<JoinHandle<SettledTurn>>,

    // Chat area, updated during render
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub total_chat_lines: u16,
    follow_newest: Arc<AtomicBool>,

    pub animation_frame: u8, // 0-2 for the typing indicator
    pub status: Option<String>,
    pub data_dir: PathBuf,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl App {
    pub fn new(mut session: ChatSession, data_dir: PathBuf) -> Self {
        let follow_newest = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&follow_newest);
        session.subscribe(move |event| {
            if let StoreEvent::MessageAppended { .. } = event {
                flag.store(true, Ordering::SeqCst);
            }
        });

        Self {
            should_quit: false,
            widget: Widget::Closed,
            session,
            input: String::new(),
            input_cursor: 0,
            pending: None,
            chat_scroll: 0,
            chat_height: 0,
            total_chat_lines: 0,
            follow_newest,
            animation_frame: 0,
            status: None,
            data_dir,
        }
    }

    pub fn open(&mut self) {
        self.widget = Widget::Open;
        self.follow_newest.store(true, Ordering::SeqCst);
    }

    pub fn close(&mut self) {
        self.widget = Widget::Closed;
        self.status = None;
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }

    /// Hand the pending input to the session and dispatch the call in the
    /// background. Returns false when the session rejected the send.
    pub fn submit(&mut self) -> bool {
        let Some(turn) = self.session.begin_send(&self.input) else {
            return false;
        };

        self.input.clear();
        self.input_cursor = 0;
        self.status = None;

        let client = self.session.client();
        self.pending = Some(tokio::spawn(turn.dispatch(client)));
        true
    }

    /// Fold a finished turn back into the session. Called on every tick.
    pub async fn poll_pending(&mut self) {
        let finished = self
            .pending
            .as_ref()
            .map_or(false, |handle| handle.is_finished());
        if !finished {
            return;
        }

        if let Some(handle) = self.pending.take() {
            match handle.await {
                Ok(settled) => {
                    self.session.complete(settled);
                }
                Err(e) => {
                    error!(error = %e, "inference task failed");
                    self.session.cancel_in_flight();
                }
            }
        }
    }

    /// True once after each appended message; the renderer jumps to the bottom.
    pub fn take_scroll_request(&self) -> bool {
        self.follow_newest.swap(false, Ordering::SeqCst)
    }

    pub fn tick_animation(&mut self) {
        if self.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.total_chat_lines.saturating_sub(self.chat_height);
        self.chat_scroll = (self.chat_scroll + lines).min(max_scroll);
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
        self.input.insert(byte_pos, c);
        self.input_cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.input_cursor > 0 {
            self.input_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.input_cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.input_cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.input_cursor = (self.input_cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.input.chars().count();
    }

    /// Write the conversation as a plain transcript into the data directory.
    pub fn export_transcript(&mut self) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)?;
        let name = format!(
            "transcript-{}.txt",
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );
        let path = self.data_dir.join(name);
        fs::write(&path, format_conversation(self.session.messages()))?;

        info!(path = %path.display(), "transcript saved");
        self.status = Some(format!("Saved {}", path.display()));
        Ok(path)
    }
}
