//! System clipboard access and normalisation of dropped/pasted file paths.
//!
//! Terminals deliver a file drop as a bracketed paste of its path (or of several paths separated
//! by spaces). The helpers here turn that text back into paths, and read or write images on the
//! system clipboard through `arboard`.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use image::DynamicImage;
use image::ImageFormat;
use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode clipboard image: {0}")]
    Encode(String),
    #[error("failed to write clipboard image: {0}")]
    Write(String),
}

/// Pixel size of an image read from the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PastedImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Read side of the clipboard, as seen by the paste channel.
pub trait ClipboardSource {
    /// The clipboard image encoded as PNG, or `None` when the clipboard holds no image.
    fn image_png(&mut self) -> Result<Option<(Vec<u8>, PastedImageInfo)>, ClipboardError>;

    /// The clipboard text, or `None` when there is none.
    fn text(&mut self) -> Option<String>;
}

/// Write side of the clipboard, as seen by the copy action.
pub trait ImageClipboard {
    fn set_image_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<(), ClipboardError>;
}

/// The system clipboard.
///
/// Clones share one `arboard` handle, opened on first use and kept for the rest of the session.
/// On X11 and Wayland the selection owner must keep serving copied data, so a copied image only
/// survives while that handle is alive.
#[derive(Clone, Default)]
pub struct SystemClipboard {
    handle: Arc<Mutex<Option<arboard::Clipboard>>>,
}

impl SystemClipboard {
    fn with_clipboard<T>(
        &self,
        op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, ClipboardError>,
    ) -> Result<T, ClipboardError> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|_| ClipboardError::Unavailable("clipboard handle poisoned".to_string()))?;
        if handle.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            *handle = Some(clipboard);
        }
        let Some(clipboard) = handle.as_mut() else {
            return Err(ClipboardError::Unavailable(
                "clipboard handle missing".to_string(),
            ));
        };
        let result = op(clipboard);
        if matches!(result, Err(ClipboardError::Unavailable(_))) {
            // Reopen on the next use; the display connection may have gone away.
            *handle = None;
        }
        result
    }
}

impl ClipboardSource for SystemClipboard {
    fn image_png(&mut self) -> Result<Option<(Vec<u8>, PastedImageInfo)>, ClipboardError> {
        let image = self.with_clipboard(|clipboard| match clipboard.get_image() {
            Ok(image) => Ok(Some(image)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(ClipboardError::Unavailable(err.to_string())),
        })?;
        let Some(image) = image else {
            return Ok(None);
        };

        let width =
            u32::try_from(image.width).map_err(|err| ClipboardError::Encode(err.to_string()))?;
        let height =
            u32::try_from(image.height).map_err(|err| ClipboardError::Encode(err.to_string()))?;
        let Some(rgba) = RgbaImage::from_raw(width, height, image.bytes.into_owned()) else {
            return Err(ClipboardError::Encode(
                "clipboard image has an unexpected buffer size".to_string(),
            ));
        };

        let mut png = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|err| ClipboardError::Encode(err.to_string()))?;
        Ok(Some((png, PastedImageInfo { width, height })))
    }

    fn text(&mut self) -> Option<String> {
        match self.with_clipboard(|clipboard| Ok(clipboard.get_text().ok())) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!("{err}");
                None
            }
        }
    }
}

impl ImageClipboard for SystemClipboard {
    /// Succeeds once this process owns the clipboard selection.
    fn set_image_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<(), ClipboardError> {
        let image = arboard::ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Owned(rgba),
        };
        self.with_clipboard(|clipboard| {
            clipboard
                .set_image(image)
                .map_err(|err| ClipboardError::Write(err.to_string()))
        })
    }
}

/// Normalize pasted text that may name one or more files.
///
/// Supports:
/// - `file://` URLs (converted to local paths), one per whitespace-separated token
/// - a single Windows/UNC path (spaces allowed, since Windows terminals do not escape them)
/// - shell-escaped or quoted POSIX paths, split with `shlex`
///
/// Returns an empty list when the text cannot be read as paths at all. Whether the paths exist
/// is left to the caller.
pub fn normalize_dropped_paths(pasted: &str) -> Vec<PathBuf> {
    let pasted = pasted.trim();
    if pasted.is_empty() {
        return Vec::new();
    }

    if pasted.starts_with("file://") {
        return pasted
            .split_whitespace()
            .filter_map(|token| url::Url::parse(token).ok())
            .filter(|url| url.scheme() == "file")
            .filter_map(|url| url.to_file_path().ok())
            .collect();
    }

    let unquoted = pasted.trim_matches(|c| c == '\'' || c == '"');
    if looks_like_windows_path(unquoted) {
        #[cfg(target_os = "linux")]
        {
            if is_probably_wsl()
                && let Some(converted) = convert_windows_path_to_wsl(unquoted)
            {
                return vec![converted];
            }
        }
        return vec![PathBuf::from(unquoted)];
    }

    match shlex::split(pasted) {
        Some(parts) => parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect(),
        None => Vec::new(),
    }
}

fn looks_like_windows_path(text: &str) -> bool {
    // Drive letter path: C:\ or C:/
    let drive = text.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && text.get(1..2) == Some(":")
        && text.get(2..3).is_some_and(|s| s == "\\" || s == "/");
    // UNC path: \\server\share
    let unc = text.starts_with("\\\\");
    drive || unc
}

#[cfg(target_os = "linux")]
pub fn is_probably_wsl() -> bool {
    if let Ok(version) = std::fs::read_to_string("/proc/version") {
        let version_lower = version.to_lowercase();
        if version_lower.contains("microsoft") || version_lower.contains("wsl") {
            return true;
        }
    }

    std::env::var_os("WSL_DISTRO_NAME").is_some() || std::env::var_os("WSL_INTEROP").is_some()
}

#[cfg(target_os = "linux")]
fn convert_windows_path_to_wsl(input: &str) -> Option<PathBuf> {
    if input.starts_with("\\\\") {
        return None;
    }

    let drive_letter = input.chars().next()?.to_ascii_lowercase();
    if !drive_letter.is_ascii_lowercase() || input.get(1..2) != Some(":") {
        return None;
    }

    let mut result = PathBuf::from(format!("/mnt/{drive_letter}"));
    for component in input
        .get(2..)?
        .trim_start_matches(['\\', '/'])
        .split(['\\', '/'])
        .filter(|component| !component.is_empty())
    {
        result.push(component);
    }

    Some(result)
}
