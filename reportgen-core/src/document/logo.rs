//! Logo embedding.

use base64::Engine;
use std::path::Path;
use tracing::warn;

/// MIME type for a logo file, chosen by extension.
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Reads a logo and returns it as a `data:` URI.
///
/// A missing, unreadable or unrecognized file is logged as a warning and
/// skipped; the report still renders without a logo.
pub async fn load_logo(path: &Path) -> Option<String> {
    let Some(mime) = mime_for(path) else {
        warn!(
            "Logo {} has an unsupported extension (expected png, jpg, gif, svg or webp); skipping",
            path.display()
        );
        return None;
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            Some(format!("data:{};base64,{}", mime, encoded))
        }
        Err(e) => {
            warn!("Logo {} could not be read ({}); skipping", path.display(), e);
            None
        }
    }
}
