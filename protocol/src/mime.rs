/// Extension used when the MIME subtype cannot be determined.
pub const DEFAULT_IMAGE_EXTENSION: &str = "png";

/// File extension derived from the MIME subtype (`image/jpeg` → `jpeg`).
///
/// Parameters (`; charset=...`) are ignored. Falls back to [`DEFAULT_IMAGE_EXTENSION`] when the
/// type has no subtype.
pub fn extension_for_mime(mime_type: &str) -> &str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    essence
        .split_once('/')
        .map(|(_, subtype)| subtype.trim())
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or(DEFAULT_IMAGE_EXTENSION)
}

/// `true` for MIME types in the `image/` category.
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type.trim_start().starts_with("image/")
}
