//! The prompt editor: a multi-line text buffer with a byte cursor.
//!
//! Key handling follows the usual terminal composer conventions:
//!
//! - <kbd>Enter</kbd> submits; <kbd>Shift</kbd>/<kbd>Alt</kbd>+<kbd>Enter</kbd> and
//!   <kbd>Ctrl</kbd>+<kbd>J</kbd> insert a newline.
//! - <kbd>←</kbd>/<kbd>→</kbd>/<kbd>Home</kbd>/<kbd>End</kbd> move the cursor;
//!   <kbd>Ctrl</kbd>+<kbd>A</kbd>/<kbd>Ctrl</kbd>+<kbd>E</kbd> jump to line start/end.
//! - <kbd>Backspace</kbd>/<kbd>Delete</kbd> delete a character, <kbd>Ctrl</kbd>+<kbd>W</kbd> and
//!   <kbd>Alt</kbd>+<kbd>Backspace</kbd> delete the previous word, <kbd>Ctrl</kbd>+<kbd>U</kbd>
//!   deletes to line start.
//!
//! The stored text is never trimmed; callers trim when they test for presence or send it.

use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResult {
    Submitted,
    None,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PromptEditor {
    text: String,
    cursor: usize,
}

impl PromptEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the whole buffer and move the cursor to its end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn insert_str(&mut self, text: &str) {
        // Pasted text from Windows terminals carries CRLF.
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        self.text.insert_str(self.cursor, &normalized);
        self.cursor += normalized.len();
    }

    pub fn insert_char(&mut self, ch: char) {
        self.text.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    pub fn backspace(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.text.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
    }

    pub fn delete(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.text.replace_range(self.cursor..next, "");
        }
    }

    pub fn move_left(&mut self) {
        if let Some(prev) = self.prev_boundary() {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(next) = self.next_boundary() {
            self.cursor = next;
        }
    }

    pub fn move_line_start(&mut self) {
        self.cursor = self.line_start();
    }

    pub fn move_line_end(&mut self) {
        self.cursor = self.text[self.cursor..]
            .find('\n')
            .map_or(self.text.len(), |offset| self.cursor + offset);
    }

    /// Delete back to the start of the previous word, skipping trailing whitespace first.
    pub fn delete_word_backward(&mut self) {
        let before = &self.text[..self.cursor];
        let trimmed = before.trim_end();
        let start = trimmed
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map_or(0, |(idx, ch)| idx + ch.len_utf8());
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    pub fn delete_to_line_start(&mut self) {
        let start = self.line_start();
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    fn line_start(&self) -> usize {
        self.text[..self.cursor].rfind('\n').map_or(0, |idx| idx + 1)
    }

    fn prev_boundary(&self) -> Option<usize> {
        self.text[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(idx, _)| idx)
    }

    fn next_boundary(&self) -> Option<usize> {
        self.text[self.cursor..]
            .chars()
            .next()
            .map(|ch| self.cursor + ch.len_utf8())
    }

    /// Apply a key press. Returns the outcome and whether the buffer needs a redraw.
    pub fn handle_key_event(&mut self, key_event: KeyEvent) -> (InputResult, bool) {
        if key_event.kind == KeyEventKind::Release {
            return (InputResult::None, false);
        }
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key_event.modifiers.contains(KeyModifiers::ALT);
        match key_event.code {
            KeyCode::Enter
                if key_event
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                self.insert_char('\n');
            }
            KeyCode::Enter => return (InputResult::Submitted, false),
            KeyCode::Char('j') if ctrl => self.insert_char('\n'),
            KeyCode::Char('a') if ctrl => self.move_line_start(),
            KeyCode::Char('e') if ctrl => self.move_line_end(),
            KeyCode::Char('w') if ctrl => self.delete_word_backward(),
            KeyCode::Char('u') if ctrl => self.delete_to_line_start(),
            KeyCode::Backspace if alt || ctrl => self.delete_word_backward(),
            KeyCode::Char(ch) if !ctrl && !alt => self.insert_char(ch),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_line_start(),
            KeyCode::End => self.move_line_end(),
            _ => return (InputResult::None, false),
        }
        (InputResult::None, true)
    }

    /// Break the buffer into display rows of at most `width` columns.
    ///
    /// Returns the rows and the cursor position as `(column, row)`.
    pub fn layout(&self, width: u16) -> (Vec<String>, (u16, u16)) {
        let width = usize::from(width.max(1));
        let mut rows = vec![String::new()];
        let mut col = 0usize;
        let mut cursor = None;

        for (idx, ch) in self.text.char_indices() {
            if idx == self.cursor {
                cursor = Some((col, rows.len() - 1));
            }
            if ch == '\n' {
                rows.push(String::new());
                col = 0;
                continue;
            }
            let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
            if col + ch_width > width && col > 0 {
                rows.push(String::new());
                col = 0;
                if idx == self.cursor {
                    cursor = Some((0, rows.len() - 1));
                }
            }
            if let Some(row) = rows.last_mut() {
                row.push(ch);
            }
            col += ch_width;
        }

        let (cursor_col, cursor_row) = cursor.unwrap_or((col, rows.len() - 1));
        let cursor_col = cursor_col.min(width - 1);
        (
            rows,
            (
                u16::try_from(cursor_col).unwrap_or(u16::MAX),
                u16::try_from(cursor_row).unwrap_or(u16::MAX),
            ),
        )
    }
}
