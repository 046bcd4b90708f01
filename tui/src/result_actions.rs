//! Follow-on actions for a rendered image: enlarge, copy, download.
//!
//! All three do blocking work (decoding, clipboard, filesystem, spawning the opener), so the
//! runtime runs [`perform`] on a blocking worker and shows its outcome as a notification. These
//! failures never reach the transcript.

use std::ffi::OsString;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use chrono::DateTime;
use chrono::Utc;
use image::ImageFormat;
use studio_protocol::ImagePayload;
use studio_protocol::mime::extension_for_mime;
use tempfile::TempPath;

use crate::atomic_write::write_atomic_new;
use crate::clipboard_paste::ClipboardError;
use crate::clipboard_paste::ImageClipboard;
use crate::notifications::NotificationKind;

pub const COPY_SUCCEEDED: &str = "Image copied to clipboard";
pub const COPY_FAILED: &str = "Copy failed, please save the image manually";
pub const DOWNLOAD_FAILED: &str = "Download failed, please save the image manually";
pub const ENLARGE_FAILED: &str = "Could not open the image viewer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAction {
    Enlarge,
    Copy,
    Download,
}

#[derive(Debug, thiserror::Error)]
pub enum ResultActionError {
    #[error("invalid image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no image viewer is known for `{0}`")]
    NoOpener(String),
    #[error("`{program}` exited with {status}")]
    OpenerFailed {
        program: String,
        status: std::process::ExitStatus,
    },
}

/// Everything an action needs besides the image itself.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub download_dir: PathBuf,
    pub now: DateTime<Utc>,
}

/// What an action left behind for the runtime.
#[derive(Debug, Default)]
pub struct ActionOutcome {
    /// Toast describing the outcome; `None` when a success has nothing to report (enlarge).
    pub notification: Option<(NotificationKind, String)>,
    /// Viewer page the opener may still be reading; deleted when the session ends.
    pub page: Option<TempPath>,
}

impl ActionOutcome {
    fn notify(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            notification: Some((kind, message.into())),
            page: None,
        }
    }
}

/// Run `action` and describe its outcome as a notification.
pub fn perform(
    action: ResultAction,
    payload: &ImagePayload,
    ordinal: usize,
    context: &ActionContext,
    clipboard: &mut impl ImageClipboard,
) -> ActionOutcome {
    match action {
        ResultAction::Enlarge => match enlarge(payload) {
            Ok(page) => {
                tracing::debug!("opened enlarged image page {}", page.display());
                ActionOutcome {
                    notification: None,
                    page: Some(page),
                }
            }
            Err(err) => {
                tracing::warn!("failed to enlarge image: {err}");
                ActionOutcome::notify(NotificationKind::Failure, ENLARGE_FAILED)
            }
        },
        ResultAction::Copy => match copy_to_clipboard(payload, clipboard) {
            Ok(()) => ActionOutcome::notify(NotificationKind::Success, COPY_SUCCEEDED),
            Err(err) => {
                tracing::warn!("failed to copy image: {err}");
                ActionOutcome::notify(NotificationKind::Failure, COPY_FAILED)
            }
        },
        ResultAction::Download => {
            match download(payload, ordinal, &context.download_dir, context.now) {
                Ok(path) => ActionOutcome::notify(
                    NotificationKind::Success,
                    format!("Image saved to {}", path.display()),
                ),
                Err(err) => {
                    tracing::warn!("failed to save image: {err}");
                    ActionOutcome::notify(NotificationKind::Failure, DOWNLOAD_FAILED)
                }
            }
        }
    }
}

/// A standalone page showing the image scaled to the window.
pub fn enlarge_page_html(payload: &ImagePayload) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Image Studio</title>\n\
         <style>body {{ margin: 0; display: flex; justify-content: center; align-items: center; \
         min-height: 100vh; background: #111; }} img {{ max-width: 100%; max-height: 100vh; }}\
         </style>\n</head>\n<body>\n<img src=\"{}\" alt=\"Generated image\">\n</body>\n</html>\n",
        payload.data_uri()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenCommand {
    program: &'static str,
    prefix_args: &'static [&'static str],
}

fn open_command_for_os(target_os: &str) -> Option<OpenCommand> {
    match target_os {
        "macos" => Some(OpenCommand {
            program: "open",
            prefix_args: &[],
        }),
        "windows" => Some(OpenCommand {
            program: "cmd",
            prefix_args: &["/C", "start", ""],
        }),
        "linux" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Some(OpenCommand {
            program: "xdg-open",
            prefix_args: &[],
        }),
        _ => None,
    }
}

/// Write the image page to a temp file and open it.
///
/// The file is removed when the returned path is dropped, so the caller keeps it until the
/// viewer no longer needs it.
pub fn enlarge(payload: &ImagePayload) -> Result<TempPath, ResultActionError> {
    let command = open_command_for_os(std::env::consts::OS)
        .ok_or_else(|| ResultActionError::NoOpener(std::env::consts::OS.to_string()))?;

    let mut page = tempfile::Builder::new()
        .prefix("image-studio-")
        .suffix(".html")
        .tempfile()?;
    page.write_all(enlarge_page_html(payload).as_bytes())?;
    page.flush()?;
    let path = page.into_temp_path();

    let mut args: Vec<OsString> = command.prefix_args.iter().map(OsString::from).collect();
    args.push(path.as_os_str().to_os_string());
    let status = Command::new(command.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        return Err(ResultActionError::OpenerFailed {
            program: command.program.to_string(),
            status,
        });
    }
    Ok(path)
}

pub fn copy_to_clipboard(
    payload: &ImagePayload,
    clipboard: &mut impl ImageClipboard,
) -> Result<(), ResultActionError> {
    let bytes = payload.decode_bytes()?;
    let decoded = match ImageFormat::from_mime_type(&payload.mime_type) {
        Some(format) => image::load_from_memory_with_format(&bytes, format)?,
        None => image::load_from_memory(&bytes)?,
    };
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    clipboard.set_image_rgba(width, height, rgba.into_raw())?;
    Ok(())
}

/// File name for a downloaded image.
///
/// Uses the server-provided filename (reduced to its last component) when there is one, else
/// `generated_image_<UTC timestamp>_<ordinal>.<ext>`. [`download`] numbers the name when a file
/// by that name already exists.
pub fn download_file_name(payload: &ImagePayload, ordinal: usize, now: DateTime<Utc>) -> String {
    if let Some(name) = payload
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
    {
        return name.to_string();
    }
    format!(
        "generated_image_{}_{ordinal}.{}",
        now.format("%Y%m%dT%H%M%S"),
        extension_for_mime(&payload.mime_type)
    )
}

pub fn download(
    payload: &ImagePayload,
    ordinal: usize,
    download_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf, ResultActionError> {
    let bytes = payload.decode_bytes()?;
    let path = write_atomic_new(
        &download_dir.join(download_file_name(payload, ordinal, now)),
        &bytes,
    )?;
    tracing::info!("saved image to {}", path.display());
    Ok(path)
}
