//! Pending image attachments and their previews.
//!
//! The store is the only owner of the attachment list; other components go through its
//! operations. Attachments are shared as `Arc<Attachment>` and compared by pointer, so two files
//! with identical bytes are still distinct attachments.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use image::ImageFormat;
use image::ImageReader;
use studio_protocol::mime::is_image_mime;

/// Content type assigned to candidates whose bytes and name say nothing useful.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// A file-like blob offered by one of the input channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageCandidate {
    /// Build a candidate, detecting its content type from magic bytes and then the name.
    pub fn detect(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = detect_content_type(&name, &bytes).to_string();
        Self {
            name,
            content_type,
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        is_image_mime(&self.content_type)
    }
}

/// Sniff the content type of `bytes`, falling back to the extension of `name`.
pub fn detect_content_type(name: &str, bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    match ImageFormat::from_path(Path::new(name)) {
        Ok(format) => format.to_mime_type(),
        Err(_) => UNKNOWN_CONTENT_TYPE,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl Attachment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Displayable form of an attachment, produced off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub data_uri: String,
    /// Pixel size, when the format could be decoded.
    pub dimensions: Option<(u32, u32)>,
}

/// Encode the attachment as a data URI and read its dimensions.
///
/// This does blocking work proportional to the image size; callers run it on a blocking worker.
pub fn produce_preview(attachment: &Attachment) -> Preview {
    let data_uri = format!(
        "data:{};base64,{}",
        attachment.mime_type,
        BASE64_STANDARD.encode(&attachment.bytes)
    );
    Preview {
        data_uri,
        dimensions: image_dimensions(&attachment.bytes),
    }
}

pub(crate) fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dimensions) => Some(dimensions),
        Err(err) => {
            tracing::trace!("image dimensions lookup failed: {err}");
            None
        }
    }
}

/// One image part of a generate submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormImage {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Submission representation read by the request coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateForm {
    pub prompt: String,
    /// Empty when the store is empty; the multipart body then omits the images field.
    pub images: Vec<FormImage>,
}

#[derive(Debug)]
struct StoredAttachment {
    attachment: Arc<Attachment>,
    preview: Option<Preview>,
}

/// Read-only view of one store entry, used by the attachment strip.
#[derive(Debug, Clone, Copy)]
pub struct AttachmentView<'a> {
    pub attachment: &'a Arc<Attachment>,
    pub preview: Option<&'a Preview>,
}

#[derive(Debug, Default)]
pub struct AttachmentStore {
    entries: Vec<StoredAttachment>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every image candidate, silently dropping the rest.
    ///
    /// Returns the accepted attachments in insertion order; each one still needs a preview.
    pub fn add_images(
        &mut self,
        candidates: impl IntoIterator<Item = ImageCandidate>,
    ) -> Vec<Arc<Attachment>> {
        let mut accepted = Vec::new();
        for candidate in candidates {
            if !candidate.is_image() {
                tracing::debug!(
                    "dropping non-image candidate {} ({})",
                    candidate.name,
                    candidate.content_type
                );
                continue;
            }
            let attachment = Arc::new(Attachment {
                name: candidate.name,
                mime_type: candidate.content_type,
                bytes: candidate.bytes,
            });
            self.entries.push(StoredAttachment {
                attachment: Arc::clone(&attachment),
                preview: None,
            });
            accepted.push(attachment);
        }
        accepted
    }

    /// Remove the first entry that is the very same attachment. No-op if absent.
    pub fn remove(&mut self, attachment: &Arc<Attachment>) -> bool {
        let Some(idx) = self
            .entries
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.attachment, attachment))
        else {
            return false;
        };
        self.entries.remove(idx);
        true
    }

    /// Remove the entry at `index`; out-of-range indices are ignored.
    pub fn remove_at(&mut self, index: usize) -> Option<Arc<Attachment>> {
        let attachment = self.entries.get(index).map(|entry| Arc::clone(&entry.attachment))?;
        self.remove(&attachment);
        Some(attachment)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Store a finished preview. Returns `false` when the attachment was removed meanwhile.
    pub fn attach_preview(&mut self, attachment: &Arc<Attachment>, preview: Preview) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| Arc::ptr_eq(&entry.attachment, attachment))
        {
            Some(entry) => {
                entry.preview = Some(preview);
                true
            }
            None => false,
        }
    }

    pub fn as_form_parts(&self, prompt: &str) -> GenerateForm {
        GenerateForm {
            prompt: prompt.to_string(),
            images: self
                .entries
                .iter()
                .map(|entry| FormImage {
                    filename: entry.attachment.name.clone(),
                    mime_type: entry.attachment.mime_type.clone(),
                    bytes: entry.attachment.bytes.clone(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<AttachmentView<'_>> {
        self.entries.get(index).map(|entry| AttachmentView {
            attachment: &entry.attachment,
            preview: entry.preview.as_ref(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = AttachmentView<'_>> {
        self.entries.iter().map(|entry| AttachmentView {
            attachment: &entry.attachment,
            preview: entry.preview.as_ref(),
        })
    }
}
