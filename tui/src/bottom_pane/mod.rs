//! The pane under the transcript: attachment strip, prompt box and footer.

mod attachment_strip;
mod footer;

pub use attachment_strip::AttachmentStrip;
pub use footer::FooterProps;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;

use crate::prompt_input::PromptEditor;
use crate::render::renderable::ColumnRenderable;
use crate::render::renderable::Renderable;
use crate::session::Session;

/// Rows of prompt text shown before the box starts scrolling with the cursor.
const MAX_PROMPT_ROWS: usize = 8;
const PROMPT_PREFIX_COLS: u16 = 2;

const PROMPT_PLACEHOLDER: &str = "Describe the image you want…";
const SELECTION_PLACEHOLDER: &str = "Paths of images to attach, separated by spaces";

/// Which part of the screen receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Prompt,
    Attachments,
    Transcript,
    /// The explicit-selection path prompt opened with Ctrl+O.
    SelectionPrompt,
}

/// Bordered single editor: the prompt, or the path prompt while selecting files.
struct PromptBox<'a> {
    title: &'static str,
    editor: &'a PromptEditor,
    placeholder: &'static str,
    active: bool,
}

impl PromptBox<'_> {
    fn text_width(width: u16) -> u16 {
        width.saturating_sub(PROMPT_PREFIX_COLS + 1).max(1)
    }

    /// Visible rows and the cursor relative to the first visible row.
    fn visible(&self, width: u16) -> (Vec<String>, (u16, u16)) {
        let (rows, (col, row)) = self.editor.layout(Self::text_width(width));
        let first = usize::from(row).saturating_sub(MAX_PROMPT_ROWS - 1);
        let visible = rows.into_iter().skip(first).take(MAX_PROMPT_ROWS).collect();
        let row = row.saturating_sub(u16::try_from(first).unwrap_or(u16::MAX));
        (visible, (col, row))
    }
}

impl Renderable for PromptBox<'_> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        let rule_width = usize::from(area.width).saturating_sub(self.title.len() + 3);
        let mut lines = vec![Line::from(vec![
            "─ ".dim(),
            self.title.bold(),
            format!(" {}", "─".repeat(rule_width)).dim(),
        ])];
        if self.editor.text().is_empty() {
            lines.push(Line::from(vec!["› ".bold(), self.placeholder.dim().italic()]));
        } else {
            let (rows, _) = self.visible(area.width);
            for (idx, row) in rows.into_iter().enumerate() {
                let prefix = if idx == 0 { "› " } else { "  " };
                lines.push(Line::from(vec![prefix.bold(), row.into()]));
            }
        }
        Paragraph::new(lines).render_ref(area, buf);
    }

    fn desired_height(&self, width: u16) -> u16 {
        let (rows, _) = self.visible(width);
        u16::try_from(rows.len().max(1) + 1).unwrap_or(u16::MAX)
    }

    fn cursor_pos(&self, area: Rect) -> Option<(u16, u16)> {
        if !self.active {
            return None;
        }
        let (_, (col, row)) = self.visible(area.width);
        Some((
            area.x + PROMPT_PREFIX_COLS + col,
            area.y.saturating_add(1).saturating_add(row),
        ))
    }
}

/// Borrowed view over the session used to paint the bottom pane.
pub struct BottomPane<'a> {
    pub session: &'a Session,
    pub selection_input: &'a PromptEditor,
    pub focus: Focus,
    pub selected_attachment: Option<usize>,
}

impl BottomPane<'_> {
    fn column(&self) -> ColumnRenderable<'_> {
        let mut column = ColumnRenderable::new();
        column.push(AttachmentStrip {
            store: self.session.attachments(),
            drop_zone: self.session.drop_zone(),
            selected: (self.focus == Focus::Attachments)
                .then_some(self.selected_attachment)
                .flatten(),
        });
        let prompt_box = if self.focus == Focus::SelectionPrompt {
            PromptBox {
                title: "Add images",
                editor: self.selection_input,
                placeholder: SELECTION_PLACEHOLDER,
                active: true,
            }
        } else {
            PromptBox {
                title: "Prompt",
                editor: self.session.prompt(),
                placeholder: PROMPT_PLACEHOLDER,
                active: self.focus == Focus::Prompt,
            }
        };
        column.push(prompt_box);
        column.push(Paragraph::new(footer::footer_lines(FooterProps {
            send: self.session.send_control(),
            optimize: self.session.optimize_control(),
            focus: self.focus,
        })));
        column
    }
}

impl Renderable for BottomPane<'_> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        self.column().render(area, buf);
    }

    fn desired_height(&self, width: u16) -> u16 {
        self.column().desired_height(width)
    }

    fn cursor_pos(&self, area: Rect) -> Option<(u16, u16)> {
        self.column().cursor_pos(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use pretty_assertions::assert_eq;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn renders_prompt_and_controls() -> anyhow::Result<()> {
        let mut session = Session::new(SessionConfig::default());
        session.edit_prompt(|editor| editor.set_text("a cat"));
        let selection_input = PromptEditor::new();
        let pane = BottomPane {
            session: &session,
            selection_input: &selection_input,
            focus: Focus::Prompt,
            selected_attachment: None,
        };
        assert_eq!(pane.desired_height(40), 4);

        let mut terminal = Terminal::new(TestBackend::new(40, 4))?;
        let mut cursor = None;
        terminal.draw(|frame| {
            let area = frame.area();
            pane.render(area, frame.buffer_mut());
            cursor = pane.cursor_pos(area);
        })?;

        let lines = screen(&terminal);
        assert!(lines[0].starts_with("─ Prompt ─"));
        assert_eq!(lines[1], "› a cat");
        assert_eq!(lines[2], " [ Send ] ⏎  [ Optimize ] ctrl+p");
        assert_eq!(cursor, Some((7, 1)));
        Ok(())
    }

    #[test]
    fn selection_prompt_replaces_prompt_box() {
        let session = Session::new(SessionConfig::default());
        let mut selection_input = PromptEditor::new();
        selection_input.set_text("/tmp/cat.png");
        let pane = BottomPane {
            session: &session,
            selection_input: &selection_input,
            focus: Focus::SelectionPrompt,
            selected_attachment: None,
        };
        let area = Rect::new(0, 0, 40, pane.desired_height(40));
        assert_eq!(pane.cursor_pos(area), Some((14, 1)));
    }
}
