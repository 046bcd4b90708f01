//! Painting of transcript entries into terminal lines.
//!
//! Entries are built elsewhere (see `transcript`); the cells here only decide how they look.

use ratatui::prelude::*;
use ratatui::style::Style;
use ratatui::style::Styled;
use ratatui::style::Stylize;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Wrap;

use crate::transcript::AiResponse;
use crate::transcript::ImageRef;
use crate::transcript::ImageTile;
use crate::transcript::NO_CONTENT_PLACEHOLDER;
use crate::transcript::ResponseSection;
use crate::transcript::TranscriptEntry;
use crate::ui_colors::failure_color;
use crate::ui_colors::info_color;
use crate::ui_colors::secondary_color;

const INDENT: &str = "  ";

/// Something in the transcript pane. Returns its `Vec<Line<'static>>` representation so the
/// pane can stack and scroll cells.
pub trait HistoryCell: std::fmt::Debug {
    fn display_lines(&self, width: u16) -> Vec<Line<'static>>;

    fn desired_height(&self, width: u16) -> u16 {
        Paragraph::new(Text::from(self.display_lines(width)))
            .wrap(Wrap { trim: false })
            .line_count(width)
            .try_into()
            .unwrap_or(0)
    }
}

/// One transcript entry, with the current image selection so its tile can be highlighted.
#[derive(Debug)]
pub struct EntryCell<'a> {
    entry: &'a TranscriptEntry,
    entry_index: usize,
    selected: Option<ImageRef>,
}

impl<'a> EntryCell<'a> {
    pub fn new(entry: &'a TranscriptEntry, entry_index: usize, selected: Option<ImageRef>) -> Self {
        Self {
            entry,
            entry_index,
            selected,
        }
    }

    fn is_selected(&self, section: usize, index: usize) -> bool {
        self.selected
            == Some(ImageRef {
                entry: self.entry_index,
                section,
                index,
            })
    }
}

impl HistoryCell for EntryCell<'_> {
    fn display_lines(&self, width: u16) -> Vec<Line<'static>> {
        let wrap_width = usize::from(width.saturating_sub(3).max(1));
        let mut lines = match self.entry {
            TranscriptEntry::UserMessage {
                prompt,
                attachment_count,
            } => {
                let mut lines = vec![header("› ", "Your prompt", Style::default().bold())];
                lines.extend(indented(prompt, wrap_width, Style::default()));
                if *attachment_count > 0 {
                    lines.push(Line::from(
                        format!("{INDENT}{attachment_count} image(s) attached").dim(),
                    ));
                }
                lines
            }
            TranscriptEntry::AiResponse(response) => self.response_lines(response, wrap_width),
            TranscriptEntry::OptimizationResult {
                original_prompt,
                optimized_prompt,
            } => {
                let accent = Style::default().fg(info_color());
                let mut lines = vec![header("✦ ", "Prompt optimization", accent.bold())];
                lines.push(sub_heading("Original prompt"));
                lines.extend(indented(original_prompt, wrap_width, Style::default().dim()));
                lines.push(sub_heading("Optimized prompt"));
                lines.extend(indented(optimized_prompt, wrap_width, accent));
                lines
            }
            TranscriptEntry::Error { message } => {
                let accent = Style::default().fg(failure_color());
                let mut lines = vec![header("■ ", "Error", accent.bold())];
                lines.extend(indented(message, wrap_width, accent));
                lines
            }
        };
        lines.push(Line::from(""));
        lines
    }
}

impl EntryCell<'_> {
    fn response_lines(&self, response: &AiResponse, wrap_width: usize) -> Vec<Line<'static>> {
        let mut lines = vec![header(
            "• ",
            "Response",
            Style::default().fg(secondary_color()).bold(),
        )];
        for (section_idx, section) in response.sections.iter().enumerate() {
            match section {
                ResponseSection::OriginalPrompt(prompt) => {
                    lines.push(sub_heading("Original prompt"));
                    lines.extend(indented(prompt, wrap_width, Style::default().dim()));
                }
                ResponseSection::UploadedImages(tiles) => {
                    lines.push(sub_heading(&format!("Uploaded images ({})", tiles.len())));
                    lines.extend(self.thumbnail_rows(section_idx, tiles, wrap_width));
                }
                ResponseSection::GeneratedText(text) => {
                    lines.push(sub_heading("Generated text"));
                    lines.extend(indented(text, wrap_width, Style::default()));
                }
                ResponseSection::GeneratedImages(tiles) => {
                    lines.push(sub_heading(&format!("Generated images ({})", tiles.len())));
                    for (idx, tile) in tiles.iter().enumerate() {
                        lines.extend(generated_tile(tile, self.is_selected(section_idx, idx)));
                    }
                }
                ResponseSection::NoContent => {
                    lines.push(Line::from(
                        format!("{INDENT}{NO_CONTENT_PLACEHOLDER}").dim().italic(),
                    ));
                }
            }
        }
        lines
    }

    /// Compact thumbnails, packed into rows that fit the width.
    fn thumbnail_rows(
        &self,
        section_idx: usize,
        tiles: &[ImageTile],
        wrap_width: usize,
    ) -> Vec<Line<'static>> {
        let mut rows = Vec::new();
        let mut row: Vec<Span<'static>> = vec![INDENT.into()];
        let mut row_width = 0usize;
        for (idx, tile) in tiles.iter().enumerate() {
            let text = format!("[{}]", tile_summary(tile, false));
            let text_width = text.chars().count() + 1;
            if row_width > 0 && row_width + text_width > wrap_width {
                rows.push(Line::from(std::mem::replace(&mut row, vec![INDENT.into()])));
                row_width = 0;
            }
            if row_width > 0 {
                row.push(" ".into());
            }
            let span = if self.is_selected(section_idx, idx) {
                text.reversed()
            } else {
                text.dim()
            };
            row.push(span);
            row_width += text_width;
        }
        if row_width > 0 {
            rows.push(Line::from(row));
        }
        rows
    }
}

fn header(marker: &'static str, label: &'static str, style: Style) -> Line<'static> {
    Line::from(vec![marker.set_style(style), label.set_style(style)])
}

fn sub_heading(label: &str) -> Line<'static> {
    Line::from(format!("{INDENT}{label}").bold().dim())
}

fn indented(text: &str, wrap_width: usize, style: Style) -> Vec<Line<'static>> {
    textwrap::wrap(text, wrap_width)
        .into_iter()
        .map(|part| Line::from(format!("{INDENT}{part}").set_style(style)))
        .collect()
}

fn generated_tile(tile: &ImageTile, selected: bool) -> Vec<Line<'static>> {
    let title = format!("{INDENT}┌ {}", tile_summary(tile, true));
    let actions = format!("{INDENT}└ ⏎ enlarge · c copy · d download");
    if selected {
        vec![
            Line::from(title.reversed()),
            Line::from(actions.set_style(Style::default().fg(info_color()))),
        ]
    } else {
        vec![Line::from(title), Line::from(actions.dim())]
    }
}

fn tile_summary(tile: &ImageTile, with_mime: bool) -> String {
    let mut parts = vec![tile.label()];
    if with_mime {
        parts.push(tile.payload.mime_type.clone());
    }
    if let Some((width, height)) = tile.dimensions {
        parts.push(format!("{width}×{height}"));
    }
    parts.push(format_bytes(tile.byte_len));
    parts.join(" · ")
}

pub(crate) fn format_bytes(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if value < KIB {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else {
        format!("{:.1} MB", value / (KIB * KIB))
    }
}

/// The slice of the transcript that fills a pane, bottom-anchored.
#[derive(Debug)]
pub struct TranscriptWindow {
    /// Lines of the entries that overlap the pane.
    pub lines: Vec<Line<'static>>,
    /// Rows of `lines` above the pane's top edge.
    pub offset: u16,
    /// Largest useful `scroll_back` for this pane.
    pub max_scroll_back: usize,
}

/// Lay out the entries visible in a pane of `height` rows scrolled `scroll_back` rows up from
/// the newest line. Only the entries that overlap the pane are painted, so the offset stays
/// small however long the transcript grows.
pub fn transcript_window(
    entries: &[TranscriptEntry],
    selected: Option<ImageRef>,
    width: u16,
    height: u16,
    scroll_back: usize,
) -> TranscriptWindow {
    let cells: Vec<EntryCell<'_>> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| EntryCell::new(entry, idx, selected))
        .collect();
    let heights: Vec<usize> = cells
        .iter()
        .map(|cell| usize::from(cell.desired_height(width)))
        .collect();
    let total: usize = heights.iter().sum();
    let max_scroll_back = total.saturating_sub(usize::from(height));
    let bottom = total - scroll_back.min(max_scroll_back);
    let top = bottom.saturating_sub(usize::from(height));

    let mut lines = Vec::new();
    let mut first_start = None;
    let mut start = 0usize;
    for (cell, cell_height) in cells.iter().zip(heights) {
        let end = start + cell_height;
        if end > top && start < bottom {
            first_start.get_or_insert(start);
            lines.extend(cell.display_lines(width));
        }
        if end >= bottom {
            break;
        }
        start = end;
    }

    let offset = top - first_start.unwrap_or(top);
    TranscriptWindow {
        lines,
        offset: u16::try_from(offset).unwrap_or(u16::MAX),
        max_scroll_back,
    }
}
