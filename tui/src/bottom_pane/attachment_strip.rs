use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::style::Styled;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;

use crate::attachments::AttachmentStore;
use crate::attachments::AttachmentView;
use crate::history_cell::format_bytes;
use crate::input_channels::DropZone;
use crate::render::renderable::Renderable;
use crate::ui_colors::info_color;

/// Rows of attachments shown at once; the window follows the selection.
const MAX_VISIBLE_ROWS: usize = 4;

/// Pending attachments above the prompt, one per row.
pub struct AttachmentStrip<'a> {
    pub store: &'a AttachmentStore,
    pub drop_zone: DropZone,
    /// Highlighted row while the strip has focus.
    pub selected: Option<usize>,
}

impl AttachmentStrip<'_> {
    fn lines(&self) -> Vec<Line<'static>> {
        let count = self.store.len();
        if count == 0 && !self.drop_zone.is_hovering() {
            return Vec::new();
        }

        let mut lines = Vec::new();
        if self.drop_zone.is_hovering() {
            lines.push(Line::from(
                " ⇣ Adding dropped images…".set_style(Style::default().fg(info_color()).bold()),
            ));
        } else {
            lines.push(Line::from(format!(" Attachments ({count})").bold().dim()));
        }

        let start = self
            .selected
            .map_or(0, |selected| (selected + 1).saturating_sub(MAX_VISIBLE_ROWS));
        for (idx, view) in self
            .store
            .iter()
            .enumerate()
            .skip(start)
            .take(MAX_VISIBLE_ROWS)
        {
            let text = format!("  ▣ {}", describe(view));
            let line = if self.selected == Some(idx) {
                Line::from(vec![text.reversed(), "  del to remove".dim()])
            } else {
                Line::from(text)
            };
            lines.push(line);
        }
        let hidden = count.saturating_sub(start + MAX_VISIBLE_ROWS);
        if hidden > 0 {
            lines.push(Line::from(format!("    +{hidden} more").dim()));
        }
        lines
    }
}

fn describe(view: AttachmentView<'_>) -> String {
    let attachment = view.attachment;
    let size = format_bytes(attachment.bytes().len());
    match view.preview {
        Some(preview) => match preview.dimensions {
            Some((width, height)) => {
                format!("{} · {width}×{height} · {size}", attachment.name())
            }
            None => format!("{} · {size}", attachment.name()),
        },
        None => format!("{} · loading…", attachment.name()),
    }
}

impl Renderable for AttachmentStrip<'_> {
    fn render(&self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.lines()).render_ref(area, buf);
    }

    fn desired_height(&self, _width: u16) -> u16 {
        u16::try_from(self.lines().len()).unwrap_or(u16::MAX)
    }
}
