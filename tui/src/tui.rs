//! Terminal setup and teardown.

use std::io;
use std::io::Stdout;
use std::io::stdout;

use crossterm::event::DisableBracketedPaste;
use crossterm::event::EnableBracketedPaste;
use crossterm::execute;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use crossterm::terminal::disable_raw_mode;
use crossterm::terminal::enable_raw_mode;
use ratatui::backend::CrosstermBackend;

pub type Terminal = ratatui::Terminal<CrosstermBackend<Stdout>>;

/// Enter raw mode with bracketed paste on the alternate screen.
///
/// Bracketed paste is what turns a file drop into a single paste event.
pub fn init() -> io::Result<Terminal> {
    enable_raw_mode()?;
    if let Err(err) = execute!(stdout(), EnterAlternateScreen, EnableBracketedPaste) {
        let _ = restore();
        return Err(err);
    }
    let mut terminal = match ratatui::Terminal::new(CrosstermBackend::new(stdout())) {
        Ok(terminal) => terminal,
        Err(err) => {
            let _ = restore();
            return Err(err);
        }
    };
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore() -> io::Result<()> {
    execute!(stdout(), DisableBracketedPaste, LeaveAlternateScreen)?;
    disable_raw_mode()
}

/// Owns the terminal for the lifetime of the UI and restores it when dropped, including when
/// the loop returns early with an error.
pub struct TerminalGuard {
    pub terminal: Terminal,
}

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        Ok(Self { terminal: init()? })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        if let Err(err) = restore() {
            tracing::warn!("failed to restore terminal: {err}");
        }
    }
}
