//! Transcript entries and the data-to-entry constructors.
//!
//! Nothing here paints; `history_cell` turns entries into terminal lines.

use studio_protocol::GenerateResponse;
use studio_protocol::ImagePayload;

use crate::attachments::image_dimensions;
use crate::backend::BackendError;
use crate::backend::GenerateResult;
use crate::backend::HttpOutcome;

pub const REQUEST_FAILED: &str = "Request failed";
pub const OPTIMIZATION_FAILED: &str = "Optimization failed";
pub const NO_CONTENT_PLACEHOLDER: &str = "No content generated";

pub fn network_error_message(cause: impl std::fmt::Display) -> String {
    format!("Network error: {cause}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// Echo of an image the user attached; shown as a compact thumbnail.
    Uploaded,
    /// Produced by the backend; full-width tile with copy and download actions.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTile {
    pub payload: ImagePayload,
    pub role: ImageRole,
    /// 1-based position within its section.
    pub ordinal: usize,
    pub dimensions: Option<(u32, u32)>,
    pub byte_len: usize,
}

impl ImageTile {
    fn new(payload: ImagePayload, role: ImageRole, ordinal: usize) -> Self {
        let dimensions = payload
            .decode_bytes()
            .ok()
            .and_then(|bytes| image_dimensions(&bytes));
        let byte_len = payload.decoded_len();
        Self {
            payload,
            role,
            ordinal,
            dimensions,
            byte_len,
        }
    }

    pub fn label(&self) -> String {
        if let Some(filename) = self.payload.filename.as_deref().filter(|f| !f.is_empty()) {
            return filename.to_string();
        }
        match self.role {
            ImageRole::Uploaded => format!("Uploaded image {}", self.ordinal),
            ImageRole::Generated => format!("Generated image {}", self.ordinal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSection {
    OriginalPrompt(String),
    UploadedImages(Vec<ImageTile>),
    GeneratedText(String),
    GeneratedImages(Vec<ImageTile>),
    NoContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiResponse {
    pub sections: Vec<ResponseSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::IsVariant)]
pub enum TranscriptEntry {
    UserMessage {
        prompt: String,
        attachment_count: usize,
    },
    AiResponse(AiResponse),
    OptimizationResult {
        original_prompt: String,
        optimized_prompt: String,
    },
    Error {
        message: String,
    },
}

impl TranscriptEntry {
    pub fn user_message(prompt: impl Into<String>, attachment_count: usize) -> Self {
        Self::UserMessage {
            prompt: prompt.into(),
            attachment_count,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Build the response entry for a successful generate.
///
/// When the backend produced neither text nor images the placeholder is the only section,
/// echoes included.
pub fn build_ai_response(payload: GenerateResponse, include_echo_sections: bool) -> AiResponse {
    if !payload.has_generated_content() {
        return AiResponse {
            sections: vec![ResponseSection::NoContent],
        };
    }

    let mut sections = Vec::new();
    let text = payload.non_blank_text().map(str::to_string);
    let GenerateResponse {
        original_prompt,
        uploaded_images,
        generated_images,
        ..
    } = payload;

    if include_echo_sections {
        if let Some(prompt) = original_prompt.filter(|prompt| !prompt.is_empty()) {
            sections.push(ResponseSection::OriginalPrompt(prompt));
        }
        let uploaded = tiles(uploaded_images.unwrap_or_default(), ImageRole::Uploaded);
        if !uploaded.is_empty() {
            sections.push(ResponseSection::UploadedImages(uploaded));
        }
    }
    if let Some(text) = text {
        sections.push(ResponseSection::GeneratedText(text));
    }
    let generated = tiles(generated_images.unwrap_or_default(), ImageRole::Generated);
    if !generated.is_empty() {
        sections.push(ResponseSection::GeneratedImages(generated));
    }
    AiResponse { sections }
}

/// A finished generate with its response already built into transcript sections.
pub type GenerateCompletion = Result<HttpOutcome<AiResponse>, BackendError>;

/// Build the response sections of a generate result. Every returned image is decoded here, so
/// the runtime calls this on the request task rather than the UI loop.
pub fn prepare_generate_result(
    result: GenerateResult,
    include_echo_sections: bool,
) -> GenerateCompletion {
    result.map(|outcome| outcome.map(|payload| build_ai_response(payload, include_echo_sections)))
}

fn tiles(payloads: Vec<ImagePayload>, role: ImageRole) -> Vec<ImageTile> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(idx, payload)| ImageTile::new(payload, role, idx + 1))
        .collect()
}

/// Address of one selectable image in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    pub entry: usize,
    pub section: usize,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    /// Rows scrolled up from the bottom; 0 follows the newest entry.
    scroll_back: u16,
    selected_image: Option<ImageRef>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and bring the bottom of the transcript into view.
    pub fn append(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
        self.scroll_back = 0;
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn scroll_back(&self) -> u16 {
        self.scroll_back
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.scroll_back = self.scroll_back.saturating_sub(rows);
    }

    /// Clamp the scroll offset once the painted height is known.
    pub fn clamp_scroll(&mut self, max_scroll_back: u16) {
        self.scroll_back = self.scroll_back.min(max_scroll_back);
    }

    /// Every selectable image, in display order.
    pub fn image_refs(&self) -> Vec<ImageRef> {
        let mut refs = Vec::new();
        for (entry_idx, entry) in self.entries.iter().enumerate() {
            let TranscriptEntry::AiResponse(response) = entry else {
                continue;
            };
            for (section_idx, section) in response.sections.iter().enumerate() {
                let count = match section {
                    ResponseSection::UploadedImages(tiles)
                    | ResponseSection::GeneratedImages(tiles) => tiles.len(),
                    _ => 0,
                };
                refs.extend((0..count).map(|index| ImageRef {
                    entry: entry_idx,
                    section: section_idx,
                    index,
                }));
            }
        }
        refs
    }

    pub fn image(&self, image_ref: ImageRef) -> Option<&ImageTile> {
        let TranscriptEntry::AiResponse(response) = self.entries.get(image_ref.entry)? else {
            return None;
        };
        match response.sections.get(image_ref.section)? {
            ResponseSection::UploadedImages(tiles) | ResponseSection::GeneratedImages(tiles) => {
                tiles.get(image_ref.index)
            }
            _ => None,
        }
    }

    pub fn selected_image(&self) -> Option<ImageRef> {
        self.selected_image
    }

    pub fn selected_tile(&self) -> Option<&ImageTile> {
        self.selected_image.and_then(|image_ref| self.image(image_ref))
    }

    /// Move the image selection by `delta`, starting from the newest image when nothing is
    /// selected yet. Returns the new selection.
    pub fn move_selection(&mut self, delta: isize) -> Option<ImageRef> {
        let refs = self.image_refs();
        if refs.is_empty() {
            self.selected_image = None;
            return None;
        }
        let last = refs.len() - 1;
        let next = match self
            .selected_image
            .and_then(|current| refs.iter().position(|r| *r == current))
        {
            Some(pos) => pos.saturating_add_signed(delta).min(last),
            None => last,
        };
        self.selected_image = refs.get(next).copied();
        self.selected_image
    }

    pub fn clear_selection(&mut self) {
        self.selected_image = None;
    }
}
