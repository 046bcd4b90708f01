// Forbid accidental stdout/stderr writes in the library portion of the TUI.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod exit;

mod action_gate;
mod app;
mod app_event;
mod app_event_sender;
mod atomic_write;
mod attachments;
mod backend;
mod bottom_pane;
mod clipboard_paste;
mod history_cell;
mod input_channels;
mod notifications;
mod prompt_input;
mod render;
mod result_actions;
mod session;
mod transcript;
mod tui;
mod ui_colors;
mod version;

pub use app::AppConfig;
pub use app::run_app;
pub use atomic_write::write_atomic;
pub use backend::GenerationBackend;
pub use backend::HttpBackend;
pub use exit::AppExitInfo;
pub use exit::ExitReason;
pub use session::SessionConfig;
pub use version::IMAGE_STUDIO_VERSION;
