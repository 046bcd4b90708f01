//! The UI loop.
//!
//! Terminal input and continuation events are applied to the [`Session`] one at a time, in
//! arrival order. Anything slow (file reads, previews, network requests, clipboard and
//! post-result actions) runs on a spawned task that reports back through [`AppEventSender`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::style::Styled;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Clear;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use ratatui::widgets::Wrap;
use tempfile::TempPath;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;
use unicode_width::UnicodeWidthStr;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::attachments::Attachment;
use crate::attachments::produce_preview;
use crate::backend::GenerationBackend;
use crate::bottom_pane::BottomPane;
use crate::bottom_pane::Focus;
use crate::clipboard_paste::ClipboardSource;
use crate::clipboard_paste::ImageClipboard;
use crate::clipboard_paste::SystemClipboard;
use crate::exit::AppExitInfo;
use crate::exit::ExitReason;
use crate::history_cell::transcript_window;
use crate::input_channels::ClipboardPaste;
use crate::input_channels::InputChannel;
use crate::input_channels::PasteDisposition;
use crate::input_channels::classify_bracketed_paste;
use crate::input_channels::load_candidates;
use crate::input_channels::parse_selection;
use crate::input_channels::read_clipboard;
use crate::notifications::NotificationKind;
use crate::notifications::Phase;
use crate::prompt_input::InputResult;
use crate::prompt_input::PromptEditor;
use crate::render::renderable::Renderable;
use crate::result_actions::ActionContext;
use crate::result_actions::ResultAction;
use crate::result_actions::perform;
use crate::session::Session;
use crate::session::SessionConfig;
use crate::transcript::ImageRole;
use crate::transcript::prepare_generate_result;
use crate::tui::TerminalGuard;
use crate::ui_colors::failure_color;
use crate::ui_colors::success_color;

const PASTE_FAILED: &str = "Could not read the clipboard image";
const EMPTY_TRANSCRIPT_HINT: &str =
    "Attach images with ctrl+o, by dropping files or with ctrl+v, then describe what to generate.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    /// Where downloaded images are written.
    pub download_dir: PathBuf,
    /// Files attached at startup as an explicit selection.
    pub initial_images: Vec<PathBuf>,
    pub initial_prompt: Option<String>,
}

/// Run the interactive session until the user quits.
///
/// The terminal is restored before this returns, whether the loop ended normally or with an
/// error.
pub async fn run_app<B: GenerationBackend>(
    backend: B,
    config: AppConfig,
) -> anyhow::Result<AppExitInfo> {
    let mut guard = TerminalGuard::new().context("failed to initialise the terminal")?;
    let (app_event_tx, mut app_event_rx) = unbounded_channel();
    let mut app = App::new(
        Arc::new(backend),
        SystemClipboard::default(),
        AppEventSender::new(app_event_tx),
        config,
    );
    app.run(&mut guard.terminal, &mut app_event_rx).await
}

struct App<B, C> {
    session: Session,
    backend: Arc<B>,
    clipboard: C,
    app_event_tx: AppEventSender,
    focus: Focus,
    /// Path input of the explicit-selection prompt.
    selection_input: PromptEditor,
    selected_attachment: usize,
    download_dir: PathBuf,
    /// Height of the transcript pane at the last draw; one page for PgUp/PgDn.
    transcript_height: u16,
    generate_requests: usize,
    /// Enlarged-image pages handed to the viewer; removed when the session ends.
    viewer_pages: Vec<TempPath>,
    exit_reason: Option<ExitReason>,
}

impl<B, C> App<B, C>
where
    B: GenerationBackend,
    C: ClipboardSource + ImageClipboard + Clone + Send + 'static,
{
    fn new(backend: Arc<B>, clipboard: C, app_event_tx: AppEventSender, config: AppConfig) -> Self {
        let mut session = Session::new(config.session);
        if let Some(prompt) = config.initial_prompt {
            session.edit_prompt(|editor| editor.set_text(prompt));
        }
        let app = Self {
            session,
            backend,
            clipboard,
            app_event_tx,
            focus: Focus::Prompt,
            selection_input: PromptEditor::new(),
            selected_attachment: 0,
            download_dir: config.download_dir,
            transcript_height: 0,
            generate_requests: 0,
            viewer_pages: Vec::new(),
            exit_reason: None,
        };
        if !config.initial_images.is_empty() {
            app.load_paths(InputChannel::ExplicitSelection, config.initial_images);
        }
        app
    }

    async fn run<T: Backend>(
        &mut self,
        terminal: &mut Terminal<T>,
        app_event_rx: &mut UnboundedReceiver<AppEvent>,
    ) -> anyhow::Result<AppExitInfo> {
        let mut events = EventStream::new();
        self.draw(terminal)?;

        while self.exit_reason.is_none() {
            let deadline = self.session.notifications().next_deadline(Instant::now());
            tokio::select! {
                maybe_event = events.next() => self.handle_terminal_input(maybe_event),
                Some(app_event) = app_event_rx.recv() => {
                    self.handle_app_event(app_event, Instant::now());
                }
                () = sleep_until(deadline) => {}
            }
            self.session.notifications_mut().prune(Instant::now());
            self.draw(terminal)?;
        }

        self.close_viewer_pages();
        Ok(self.exit_info())
    }

    fn handle_terminal_input(&mut self, maybe_event: Option<std::io::Result<Event>>) {
        match maybe_event {
            Some(Ok(event)) => self.handle_terminal_event(event),
            Some(Err(err)) => {
                tracing::error!("failed to read terminal events: {err}");
                self.exit_reason = Some(ExitReason::Fatal(format!(
                    "failed to read terminal events: {err}"
                )));
            }
            None => self.exit_reason = Some(ExitReason::InputClosed),
        }
    }

    fn close_viewer_pages(&mut self) {
        for page in self.viewer_pages.drain(..) {
            let path = page.to_path_buf();
            if let Err(err) = page.close() {
                tracing::warn!("failed to remove {}: {err}", path.display());
            }
        }
    }

    fn exit_info(&self) -> AppExitInfo {
        AppExitInfo {
            transcript_entries: self.session.transcript().entries().len(),
            generate_requests: self.generate_requests,
            exit_reason: self
                .exit_reason
                .clone()
                .unwrap_or(ExitReason::UserRequested),
        }
    }

    fn handle_terminal_event(&mut self, event: Event) {
        match event {
            Event::Key(key_event) => self.handle_key_event(key_event),
            Event::Paste(pasted) => self.handle_paste(pasted),
            // Resize and focus changes only need the redraw that follows every event.
            _ => {}
        }
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) {
        if key_event.kind == KeyEventKind::Release {
            return;
        }

        if key_event.modifiers.contains(KeyModifiers::CONTROL) {
            match key_event.code {
                KeyCode::Char('c') => {
                    self.on_ctrl_c();
                    return;
                }
                KeyCode::Char('d') if self.session.prompt().text().is_empty() => {
                    self.exit_reason = Some(ExitReason::UserRequested);
                    return;
                }
                KeyCode::Char('o') => {
                    self.selection_input.clear();
                    self.focus = Focus::SelectionPrompt;
                    return;
                }
                KeyCode::Char('v') => {
                    self.paste_from_clipboard();
                    return;
                }
                KeyCode::Char('p') => {
                    self.optimize();
                    return;
                }
                KeyCode::Char('s') => {
                    self.submit();
                    return;
                }
                _ => {}
            }
        }

        match key_event.code {
            KeyCode::PageUp => {
                let page = self.transcript_height.max(1);
                self.session.transcript_mut().scroll_up(page);
                return;
            }
            KeyCode::PageDown => {
                let page = self.transcript_height.max(1);
                self.session.transcript_mut().scroll_down(page);
                return;
            }
            KeyCode::Tab if self.focus != Focus::SelectionPrompt => {
                self.cycle_focus();
                return;
            }
            KeyCode::Esc => {
                self.set_focus(Focus::Prompt);
                return;
            }
            _ => {}
        }

        match self.focus {
            Focus::Prompt => {
                let (result, _) = self
                    .session
                    .edit_prompt(|editor| editor.handle_key_event(key_event));
                if result == InputResult::Submitted {
                    self.submit();
                }
            }
            Focus::SelectionPrompt => {
                let (result, _) = self.selection_input.handle_key_event(key_event);
                if result == InputResult::Submitted {
                    self.confirm_selection();
                }
            }
            Focus::Attachments => self.handle_attachments_key(key_event),
            Focus::Transcript => self.handle_transcript_key(key_event),
        }
    }

    fn on_ctrl_c(&mut self) {
        if self.focus == Focus::SelectionPrompt {
            self.set_focus(Focus::Prompt);
        } else if self.session.prompt().text().is_empty() {
            self.exit_reason = Some(ExitReason::UserRequested);
        } else {
            self.session.edit_prompt(PromptEditor::clear);
        }
    }

    fn set_focus(&mut self, focus: Focus) {
        if self.focus == Focus::Transcript && focus != Focus::Transcript {
            self.session.transcript_mut().clear_selection();
        }
        if focus == Focus::Transcript && self.session.transcript().selected_image().is_none() {
            self.session.transcript_mut().move_selection(0);
        }
        self.focus = focus;
    }

    fn cycle_focus(&mut self) {
        let next = match self.focus {
            Focus::Prompt if !self.session.attachments().is_empty() => Focus::Attachments,
            Focus::Prompt | Focus::Attachments => Focus::Transcript,
            Focus::Transcript | Focus::SelectionPrompt => Focus::Prompt,
        };
        self.set_focus(next);
    }

    fn handle_attachments_key(&mut self, key_event: KeyEvent) {
        let count = self.session.attachments().len();
        match key_event.code {
            KeyCode::Left | KeyCode::Up => {
                self.selected_attachment = self.selected_attachment.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Down => {
                self.selected_attachment = (self.selected_attachment + 1).min(count.saturating_sub(1));
            }
            KeyCode::Delete | KeyCode::Backspace | KeyCode::Char('x') => {
                if let Some(removed) = self.session.remove_attachment_at(self.selected_attachment) {
                    tracing::debug!("removed attachment {}", removed.name());
                }
                self.clamp_attachment_selection();
            }
            _ => {}
        }
    }

    fn clamp_attachment_selection(&mut self) {
        let count = self.session.attachments().len();
        if count == 0 {
            self.selected_attachment = 0;
            if self.focus == Focus::Attachments {
                self.focus = Focus::Prompt;
            }
        } else {
            self.selected_attachment = self.selected_attachment.min(count - 1);
        }
    }

    fn handle_transcript_key(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Left | KeyCode::Up => {
                self.session.transcript_mut().move_selection(-1);
            }
            KeyCode::Right | KeyCode::Down => {
                self.session.transcript_mut().move_selection(1);
            }
            KeyCode::Enter => self.run_result_action(ResultAction::Enlarge),
            KeyCode::Char('c') => self.run_result_action(ResultAction::Copy),
            KeyCode::Char('d') => self.run_result_action(ResultAction::Download),
            _ => {}
        }
    }

    fn handle_paste(&mut self, pasted: String) {
        match classify_bracketed_paste(pasted) {
            PasteDisposition::Drop(paths) => {
                let drop_zone = self.session.drop_zone_mut();
                drop_zone.drag_over();
                drop_zone.drop();
                self.load_paths(InputChannel::Drop, paths);
            }
            PasteDisposition::Text(text) => {
                self.session.drop_zone_mut().drag_leave();
                self.insert_text(&text);
            }
        }
    }

    fn insert_text(&mut self, text: &str) {
        match self.focus {
            Focus::SelectionPrompt => self.selection_input.insert_str(text),
            Focus::Prompt | Focus::Attachments | Focus::Transcript => {
                self.set_focus(Focus::Prompt);
                self.session.edit_prompt(|editor| editor.insert_str(text));
            }
        }
    }

    fn confirm_selection(&mut self) {
        let paths = parse_selection(self.selection_input.text());
        self.selection_input.clear();
        self.set_focus(Focus::Prompt);
        if !paths.is_empty() {
            self.load_paths(InputChannel::ExplicitSelection, paths);
        }
    }

    fn load_paths(&self, channel: InputChannel, paths: Vec<PathBuf>) {
        let tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let loaded = load_candidates(paths).await;
            tx.send(AppEvent::CandidatesLoaded { channel, loaded });
        });
    }

    fn paste_from_clipboard(&self) {
        let mut clipboard = self.clipboard.clone();
        let tx = self.app_event_tx.clone();
        tokio::task::spawn_blocking(move || {
            tx.send(AppEvent::ClipboardRead(read_clipboard(&mut clipboard)));
        });
    }

    fn request_previews(&self, accepted: Vec<Arc<Attachment>>) {
        for attachment in accepted {
            let tx = self.app_event_tx.clone();
            tokio::task::spawn_blocking(move || {
                let preview = produce_preview(&attachment);
                tx.send(AppEvent::PreviewReady {
                    attachment,
                    preview,
                });
            });
        }
    }

    fn submit(&mut self) {
        let Some(form) = self.session.begin_generate() else {
            return;
        };
        self.generate_requests += 1;
        let include_echo_sections = self.session.config().include_echo_sections;
        let backend = Arc::clone(&self.backend);
        let tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result = backend.generate(form).await;
            tx.send(AppEvent::GenerateFinished(prepare_generate_result(
                result,
                include_echo_sections,
            )));
        });
    }

    fn optimize(&mut self) {
        let Some(request) = self.session.begin_optimize() else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.app_event_tx.clone();
        tokio::spawn(async move {
            let result = backend.optimize_prompt(request).await;
            tx.send(AppEvent::OptimizeFinished(result));
        });
    }

    /// Copy and download apply to generated images only; enlarge to any image.
    fn run_result_action(&self, action: ResultAction) {
        let Some(tile) = self.session.transcript().selected_tile() else {
            return;
        };
        if action != ResultAction::Enlarge && tile.role != ImageRole::Generated {
            return;
        }
        let payload = tile.payload.clone();
        let ordinal = tile.ordinal;
        let context = ActionContext {
            download_dir: self.download_dir.clone(),
            now: Utc::now(),
        };
        let mut clipboard = self.clipboard.clone();
        let tx = self.app_event_tx.clone();
        tokio::task::spawn_blocking(move || {
            let outcome = perform(action, &payload, ordinal, &context, &mut clipboard);
            if let Some(page) = outcome.page {
                tx.send(AppEvent::ViewerPageOpened(page));
            }
            if let Some((kind, message)) = outcome.notification {
                tx.send(AppEvent::Notify { kind, message });
            }
        });
    }

    fn handle_app_event(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::CandidatesLoaded { channel, loaded } => {
                if channel == InputChannel::Drop {
                    self.session.drop_zone_mut().drop_loaded();
                }
                if !loaded.failures.is_empty() {
                    self.session.notify(
                        NotificationKind::Failure,
                        format!("Could not read {} file(s)", loaded.failures.len()),
                        now,
                    );
                }
                let accepted = self.session.add_candidates(channel, loaded.candidates);
                self.request_previews(accepted);
            }
            AppEvent::ClipboardRead(paste) => match paste {
                ClipboardPaste::Image(candidate) => {
                    let accepted = self
                        .session
                        .add_candidates(InputChannel::ClipboardPaste, vec![candidate]);
                    self.request_previews(accepted);
                }
                ClipboardPaste::Text(text) => self.insert_text(&text),
                ClipboardPaste::Empty => {}
                ClipboardPaste::Failed(_) => {
                    self.session
                        .notify(NotificationKind::Failure, PASTE_FAILED, now);
                }
            },
            AppEvent::PreviewReady {
                attachment,
                preview,
            } => self.session.attach_preview(&attachment, preview),
            AppEvent::GenerateFinished(result) => {
                self.session.finish_generate(result);
                self.clamp_attachment_selection();
            }
            AppEvent::OptimizeFinished(result) => self.session.finish_optimize(result, now),
            AppEvent::Notify { kind, message } => self.session.notify(kind, message, now),
            AppEvent::ViewerPageOpened(page) => self.viewer_pages.push(page),
        }
    }

    fn draw<T: Backend>(&mut self, terminal: &mut Terminal<T>) -> anyhow::Result<()> {
        terminal
            .draw(|frame| self.render(frame, Instant::now()))
            .context("failed to draw frame")?;
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame, now: Instant) {
        let area = frame.area();
        let pane = BottomPane {
            session: &self.session,
            selection_input: &self.selection_input,
            focus: self.focus,
            selected_attachment: Some(self.selected_attachment),
        };
        let pane_height = pane.desired_height(area.width).min(area.height);
        let [transcript_area, pane_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(pane_height)]).areas(area);
        pane.render(pane_area, frame.buffer_mut());
        if let Some((x, y)) = pane.cursor_pos(pane_area) {
            frame.set_cursor_position((x, y));
        }

        self.render_transcript(transcript_area, frame.buffer_mut());
        self.render_notifications(area, frame.buffer_mut(), now);
    }

    /// The transcript is bottom-anchored: `scroll_back` counts rows up from the newest line.
    fn render_transcript(&mut self, area: Rect, buf: &mut Buffer) {
        self.transcript_height = area.height;
        let transcript = self.session.transcript();
        if transcript.entries().is_empty() {
            Paragraph::new(Line::from(EMPTY_TRANSCRIPT_HINT.dim().italic()))
                .wrap(Wrap { trim: false })
                .render(area, buf);
            return;
        }

        let window = transcript_window(
            transcript.entries(),
            transcript.selected_image(),
            area.width,
            area.height,
            usize::from(transcript.scroll_back()),
        );
        self.session
            .transcript_mut()
            .clamp_scroll(u16::try_from(window.max_scroll_back).unwrap_or(u16::MAX));
        Paragraph::new(window.lines)
            .wrap(Wrap { trim: false })
            .scroll((window.offset, 0))
            .render(area, buf);
    }

    /// Toasts stack downwards from the top-right corner, newest last.
    fn render_notifications(&self, area: Rect, buf: &mut Buffer, now: Instant) {
        let mut y = area.y;
        for (notification, phase) in self.session.notifications().visible(now) {
            if y >= area.bottom() {
                break;
            }
            let (icon, color) = match notification.kind {
                NotificationKind::Success => ("✓", success_color()),
                NotificationKind::Failure => ("✗", failure_color()),
            };
            let text = format!(" {icon} {} ", notification.message);
            let width = u16::try_from(text.width())
                .unwrap_or(u16::MAX)
                .min(area.width);
            let toast = Rect::new(area.right().saturating_sub(width), y, width, 1);
            let mut style = Style::default().fg(color).reversed();
            if phase != Phase::Shown {
                style = style.dim();
            }
            Clear.render(toast, buf);
            Line::from(text.set_style(style)).render(toast, buf);
            y += 1;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::GenerateForm;
    use crate::attachments::tests::PNG_1X1;
    use crate::backend::GenerateResult;
    use crate::backend::OptimizeResult;
    use crate::backend::decode_response;
    use crate::clipboard_paste::ClipboardError;
    use crate::clipboard_paste::PastedImageInfo;
    use crate::input_channels::PASTED_IMAGE_NAME;
    use crate::result_actions::COPY_SUCCEEDED;
    use crate::session::PROMPT_OPTIMIZED;
    use crate::transcript::TranscriptEntry;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;
    use std::sync::Mutex;
    use std::time::Duration;
    use studio_protocol::GenerateResponse;
    use studio_protocol::ImagePayload;
    use studio_protocol::OptimizePromptRequest;

    fn generate_ok() -> anyhow::Result<String> {
        Ok(serde_json::to_string(&GenerateResponse {
            original_prompt: Some("a cat".to_string()),
            generated_text: Some("A fluffy cat.".to_string()),
            generated_images: Some(vec![ImagePayload::from_bytes(PNG_1X1, "image/png")]),
            ..GenerateResponse::default()
        })?)
    }

    #[derive(Default)]
    struct FakeBackend {
        generate: (u16, String),
        optimize: (u16, String),
        forms: Mutex<Vec<GenerateForm>>,
    }

    impl GenerationBackend for FakeBackend {
        async fn generate(&self, form: GenerateForm) -> GenerateResult {
            if let Ok(mut forms) = self.forms.lock() {
                forms.push(form);
            }
            let (status, body) = &self.generate;
            decode_response(*status, body.as_bytes())
        }

        async fn optimize_prompt(&self, _request: OptimizePromptRequest) -> OptimizeResult {
            let (status, body) = &self.optimize;
            decode_response(*status, body.as_bytes())
        }
    }

    #[derive(Clone, Default)]
    struct FakeClipboard {
        image: Option<Vec<u8>>,
        text: Option<String>,
        copied: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl ClipboardSource for FakeClipboard {
        fn image_png(&mut self) -> Result<Option<(Vec<u8>, PastedImageInfo)>, ClipboardError> {
            Ok(self.image.clone().map(|png| {
                (
                    png,
                    PastedImageInfo {
                        width: 1,
                        height: 1,
                    },
                )
            }))
        }

        fn text(&mut self) -> Option<String> {
            self.text.clone()
        }
    }

    impl ImageClipboard for FakeClipboard {
        fn set_image_rgba(
            &mut self,
            width: u32,
            height: u32,
            _rgba: Vec<u8>,
        ) -> Result<(), ClipboardError> {
            if let Ok(mut copied) = self.copied.lock() {
                copied.push((width, height));
            }
            Ok(())
        }
    }

    fn make_app(
        backend: FakeBackend,
        clipboard: FakeClipboard,
    ) -> (App<FakeBackend, FakeClipboard>, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = unbounded_channel();
        let app = App::new(
            Arc::new(backend),
            clipboard,
            AppEventSender::new(tx),
            AppConfig {
                session: SessionConfig::default(),
                download_dir: std::env::temp_dir(),
                initial_images: Vec::new(),
                initial_prompt: None,
            },
        );
        (app, rx)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App<FakeBackend, FakeClipboard>, text: &str) {
        for ch in text.chars() {
            app.handle_key_event(press(KeyCode::Char(ch)));
        }
    }

    /// Apply the next continuation event, as the loop would.
    async fn pump(
        app: &mut App<FakeBackend, FakeClipboard>,
        rx: &mut UnboundedReceiver<AppEvent>,
    ) -> anyhow::Result<()> {
        let event = rx.recv().await.context("event channel closed")?;
        app.handle_app_event(event, Instant::now());
        Ok(())
    }

    #[tokio::test]
    async fn enter_submits_and_success_clears_prompt() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend {
                generate: (200, generate_ok()?),
                ..FakeBackend::default()
            },
            FakeClipboard::default(),
        );
        type_text(&mut app, "a cat");
        app.handle_key_event(press(KeyCode::Enter));
        assert!(app.session.is_generate_busy());

        pump(&mut app, &mut rx).await?;

        assert!(!app.session.is_generate_busy());
        assert_eq!(app.session.prompt().text(), "");
        assert_eq!(app.generate_requests, 1);
        let entries = app.session.transcript().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], TranscriptEntry::user_message("a cat", 0));
        assert!(entries[1].is_ai_response());
        let forms = app.backend.forms.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        assert_eq!(forms[0].prompt, "a cat");
        Ok(())
    }

    #[tokio::test]
    async fn server_failure_keeps_prompt_for_resubmission() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend {
                generate: (500, r#"{"error":"quota exceeded"}"#.to_string()),
                ..FakeBackend::default()
            },
            FakeClipboard::default(),
        );
        type_text(&mut app, "y");
        app.handle_key_event(ctrl('s'));
        pump(&mut app, &mut rx).await?;

        assert_eq!(app.session.prompt().text(), "y");
        assert_eq!(
            app.session.transcript().entries().last(),
            Some(&TranscriptEntry::error("quota exceeded"))
        );
        assert!(app.session.send_control().enabled);
        Ok(())
    }

    #[tokio::test]
    async fn blank_prompt_is_not_submitted() {
        let (mut app, mut rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        type_text(&mut app, "   ");
        app.handle_key_event(press(KeyCode::Enter));
        assert!(!app.session.is_generate_busy());
        assert!(app.session.transcript().entries().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn optimize_replaces_prompt_and_notifies() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend {
                optimize: (
                    200,
                    r#"{"original_prompt":"x","optimized_prompt":"a detailed prompt about x"}"#
                        .to_string(),
                ),
                ..FakeBackend::default()
            },
            FakeClipboard::default(),
        );
        type_text(&mut app, "x");
        app.handle_key_event(ctrl('p'));
        assert!(app.session.is_optimize_busy());
        pump(&mut app, &mut rx).await?;

        assert_eq!(app.session.prompt().text(), "a detailed prompt about x");
        assert!(!app.session.is_optimize_busy());
        let shown_at = Instant::now() + Duration::from_millis(500);
        let messages: Vec<&str> = app
            .session
            .notifications()
            .visible(shown_at)
            .into_iter()
            .map(|(notification, _)| notification.message.as_str())
            .collect();
        assert_eq!(messages, vec![PROMPT_OPTIMIZED]);
        assert_eq!(
            app.session.transcript().entries().last(),
            Some(&TranscriptEntry::OptimizationResult {
                original_prompt: "x".to_string(),
                optimized_prompt: "a detailed prompt about x".to_string(),
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn clipboard_image_becomes_an_attachment() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend::default(),
            FakeClipboard {
                image: Some(PNG_1X1.to_vec()),
                text: Some("ignored".to_string()),
                ..FakeClipboard::default()
            },
        );
        app.handle_key_event(ctrl('v'));
        pump(&mut app, &mut rx).await?;

        assert_eq!(app.session.prompt().text(), "");
        let view = app.session.attachments().get(0).context("attachment")?;
        assert_eq!(view.attachment.name(), PASTED_IMAGE_NAME);
        assert!(view.preview.is_none());

        pump(&mut app, &mut rx).await?;
        let view = app.session.attachments().get(0).context("attachment")?;
        assert_eq!(view.preview.and_then(|preview| preview.dimensions), Some((1, 1)));
        Ok(())
    }

    #[tokio::test]
    async fn clipboard_without_image_pastes_text() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend::default(),
            FakeClipboard {
                text: Some("a cat".to_string()),
                ..FakeClipboard::default()
            },
        );
        app.handle_key_event(ctrl('v'));
        pump(&mut app, &mut rx).await?;

        assert_eq!(app.session.prompt().text(), "a cat");
        assert!(app.session.attachments().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_files_attach_images_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("cat.png");
        let notes = dir.path().join("notes.txt");
        std::fs::write(&image, PNG_1X1)?;
        std::fs::write(&notes, "not an image")?;

        let (mut app, mut rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        app.handle_paste(format!("{} {}", image.display(), notes.display()));
        assert!(app.session.drop_zone().is_hovering());
        assert_eq!(app.session.prompt().text(), "");

        pump(&mut app, &mut rx).await?;

        assert!(!app.session.drop_zone().is_hovering());
        let names: Vec<String> = app
            .session
            .attachments()
            .iter()
            .map(|view| view.attachment.name().to_string())
            .collect();
        assert_eq!(names, vec!["cat.png".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn overlapping_drops_keep_the_zone_lit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("a.png");
        let second = dir.path().join("b.png");
        std::fs::write(&first, PNG_1X1)?;
        std::fs::write(&second, PNG_1X1)?;

        let (mut app, mut rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        app.handle_paste(first.display().to_string());
        app.handle_paste(second.display().to_string());

        pump(&mut app, &mut rx).await?;
        assert!(app.session.drop_zone().is_hovering());
        // The first batch's preview request may arrive before the second batch.
        while app.session.attachments().len() < 2 {
            pump(&mut app, &mut rx).await?;
        }
        assert!(!app.session.drop_zone().is_hovering());
        Ok(())
    }

    #[tokio::test]
    async fn plain_paste_goes_to_the_prompt() {
        let (mut app, _rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        app.handle_paste("a cat on a mat".to_string());
        assert_eq!(app.session.prompt().text(), "a cat on a mat");
        assert!(!app.session.drop_zone().is_hovering());
    }

    #[tokio::test]
    async fn selection_prompt_loads_named_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let image = dir.path().join("dog.png");
        std::fs::write(&image, PNG_1X1)?;

        let (mut app, mut rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        app.handle_key_event(ctrl('o'));
        assert_eq!(app.focus, Focus::SelectionPrompt);
        app.selection_input.set_text(image.display().to_string());
        app.handle_key_event(press(KeyCode::Enter));
        assert_eq!(app.focus, Focus::Prompt);

        pump(&mut app, &mut rx).await?;
        assert_eq!(app.session.attachments().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn attachments_can_be_removed_from_the_strip() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend::default(),
            FakeClipboard {
                image: Some(PNG_1X1.to_vec()),
                ..FakeClipboard::default()
            },
        );
        app.handle_key_event(ctrl('v'));
        pump(&mut app, &mut rx).await?;

        app.handle_key_event(press(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Attachments);
        app.handle_key_event(press(KeyCode::Delete));

        assert!(app.session.attachments().is_empty());
        assert_eq!(app.focus, Focus::Prompt);
        Ok(())
    }

    #[tokio::test]
    async fn copy_on_generated_image_notifies() -> anyhow::Result<()> {
        let clipboard = FakeClipboard::default();
        let copied = Arc::clone(&clipboard.copied);
        let (mut app, mut rx) = make_app(
            FakeBackend {
                generate: (200, generate_ok()?),
                ..FakeBackend::default()
            },
            clipboard,
        );
        type_text(&mut app, "a cat");
        app.handle_key_event(press(KeyCode::Enter));
        pump(&mut app, &mut rx).await?;

        app.set_focus(Focus::Transcript);
        assert!(app.session.transcript().selected_tile().is_some());
        app.handle_key_event(press(KeyCode::Char('c')));
        match rx.recv().await.context("event channel closed")? {
            AppEvent::Notify { kind, message } => {
                assert_eq!(kind, NotificationKind::Success);
                assert_eq!(message, COPY_SUCCEEDED);
            }
            other => anyhow::bail!("expected a notification, got {other:?}"),
        }
        let copied = copied.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        assert_eq!(*copied, vec![(1, 1)]);
        Ok(())
    }

    #[tokio::test]
    async fn terminal_read_error_ends_the_session_as_fatal() {
        let (mut app, _rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        app.handle_terminal_input(Some(Err(std::io::Error::other("tty gone"))));
        assert_eq!(
            app.exit_info().exit_reason,
            ExitReason::Fatal("failed to read terminal events: tty gone".to_string())
        );

        let (mut closed, _rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        closed.handle_terminal_input(None);
        assert_eq!(closed.exit_info().exit_reason, ExitReason::InputClosed);
    }

    #[tokio::test]
    async fn viewer_pages_are_removed_when_the_session_ends() -> anyhow::Result<()> {
        let (mut app, _rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        let page = tempfile::NamedTempFile::new()?.into_temp_path();
        let path = page.to_path_buf();

        app.handle_app_event(AppEvent::ViewerPageOpened(page), Instant::now());
        assert!(path.exists());

        app.close_viewer_pages();
        assert!(!path.exists());
        assert!(app.viewer_pages.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn ctrl_c_clears_then_exits() {
        let (mut app, _rx) = make_app(FakeBackend::default(), FakeClipboard::default());
        type_text(&mut app, "draft");
        app.handle_key_event(ctrl('c'));
        assert_eq!(app.session.prompt().text(), "");
        assert_eq!(app.exit_reason, None);
        app.handle_key_event(ctrl('c'));
        assert_eq!(app.exit_reason, Some(ExitReason::UserRequested));
    }

    #[tokio::test]
    async fn frame_shows_transcript_above_prompt() -> anyhow::Result<()> {
        let (mut app, mut rx) = make_app(
            FakeBackend {
                generate: (500, r#"{"error":"quota exceeded"}"#.to_string()),
                ..FakeBackend::default()
            },
            FakeClipboard::default(),
        );
        type_text(&mut app, "y");
        app.handle_key_event(press(KeyCode::Enter));
        pump(&mut app, &mut rx).await?;

        let mut terminal = Terminal::new(TestBackend::new(50, 12))?;
        app.draw(&mut terminal)?;

        let buffer = terminal.backend().buffer();
        let rows: Vec<String> = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect();
        assert!(rows.iter().any(|row| row == "› Your prompt"));
        assert!(rows.iter().any(|row| row == "  quota exceeded"));
        assert!(rows.iter().any(|row| row == "› y"));
        Ok(())
    }
}
