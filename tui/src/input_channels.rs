//! The three ways images reach the attachment store.
//!
//! - Explicit selection: paths typed into the selection prompt (or passed on the command line).
//!   Every named file is forwarded; the store does the image filtering.
//! - Drop: a bracketed paste whose text names existing files by absolute path or `file://` URL.
//!   The path text is never inserted into the prompt, and only image files are forwarded.
//! - Clipboard paste: an image on the system clipboard is forwarded as `pasted-image.png`;
//!   without one, the paste falls back to inserting clipboard text.
//!
//! File reads happen on tasks; the loaded candidates come back as a continuation event.

use std::path::Path;
use std::path::PathBuf;

use crate::attachments::ImageCandidate;
use crate::clipboard_paste::ClipboardSource;
use crate::clipboard_paste::normalize_dropped_paths;

/// Name given to images materialised from the clipboard.
pub const PASTED_IMAGE_NAME: &str = "pasted-image.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputChannel {
    ExplicitSelection,
    Drop,
    ClipboardPaste,
}

/// Highlight state of the drop target.
///
/// The zone stays lit while something is dragged over it and until every dropped batch has
/// finished loading, so overlapping drops keep it on until the last one lands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropZone {
    dragging: bool,
    pending_drops: usize,
}

impl DropZone {
    pub fn drag_over(&mut self) {
        self.dragging = true;
    }

    pub fn drag_leave(&mut self) {
        self.dragging = false;
    }

    /// Files were released over the zone; their batch is now loading.
    pub fn drop(&mut self) {
        self.dragging = false;
        self.pending_drops += 1;
    }

    /// A dropped batch finished loading.
    pub fn drop_loaded(&mut self) {
        self.pending_drops = self.pending_drops.saturating_sub(1);
    }

    pub fn is_hovering(self) -> bool {
        self.dragging || self.pending_drops > 0
    }
}

/// How a bracketed paste should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteDisposition {
    /// The text names files: treat it as a drop of these paths.
    Drop(Vec<PathBuf>),
    /// Ordinary text for the prompt.
    Text(String),
}

/// Decide whether a bracketed paste is a file drop.
///
/// Terminals deliver drops as absolute paths or `file://` URLs. A paste counts as a drop only
/// when every path it names is absolute and an existing file, so a word that happens to match a
/// file in the working directory still pastes as text.
pub fn classify_bracketed_paste(pasted: String) -> PasteDisposition {
    let paths = normalize_dropped_paths(&pasted);
    if !paths.is_empty()
        && paths
            .iter()
            .all(|path| path.is_absolute() && path.is_file())
    {
        PasteDisposition::Drop(paths)
    } else {
        PasteDisposition::Text(pasted)
    }
}

/// Split the selection prompt's input into paths, honouring shell quoting.
pub fn parse_selection(input: &str) -> Vec<PathBuf> {
    normalize_dropped_paths(input)
}

/// Candidates read from disk, plus a message per file that could not be read.
#[derive(Debug, Default)]
pub struct LoadedCandidates {
    pub candidates: Vec<ImageCandidate>,
    pub failures: Vec<String>,
}

pub async fn load_candidates(paths: Vec<PathBuf>) -> LoadedCandidates {
    let mut loaded = LoadedCandidates::default();
    for path in paths {
        match tokio::fs::read(&path).await {
            Ok(bytes) => loaded
                .candidates
                .push(ImageCandidate::detect(display_name(&path), bytes)),
            Err(err) => {
                tracing::warn!("failed to read {}: {err}", path.display());
                loaded.failures.push(format!("{}: {err}", path.display()));
            }
        }
    }
    loaded
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Apply the per-channel filter before candidates reach the store.
///
/// Explicit selection forwards everything; drops and clipboard pastes forward images only.
pub fn filter_for_channel(
    channel: InputChannel,
    candidates: Vec<ImageCandidate>,
) -> Vec<ImageCandidate> {
    match channel {
        InputChannel::ExplicitSelection => candidates,
        InputChannel::Drop | InputChannel::ClipboardPaste => candidates
            .into_iter()
            .filter(ImageCandidate::is_image)
            .collect(),
    }
}

/// What a clipboard paste produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardPaste {
    /// The clipboard held an image; the text paste is suppressed.
    Image(ImageCandidate),
    /// No image: fall through to the default text paste.
    Text(String),
    /// Nothing usable on the clipboard.
    Empty,
    /// Reading the clipboard image failed.
    Failed(String),
}

pub fn read_clipboard(source: &mut impl ClipboardSource) -> ClipboardPaste {
    match source.image_png() {
        Ok(Some((png, info))) => {
            tracing::debug!("pasted image size={}x{}", info.width, info.height);
            ClipboardPaste::Image(ImageCandidate::detect(PASTED_IMAGE_NAME, png))
        }
        Ok(None) => match source.text() {
            Some(text) if !text.is_empty() => ClipboardPaste::Text(text),
            _ => ClipboardPaste::Empty,
        },
        Err(err) => {
            tracing::warn!("failed to paste image: {err}");
            ClipboardPaste::Failed(err.to_string())
        }
    }
}
