//! Content-type labels for listed files.

use mime_guess::mime;

pub trait ContentTypeResolver: Send + Sync {
    fn content_type(&self, filename: &str) -> String;
}

/// Extension lookup through `mime_guess`, `application/octet-stream` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeGuessResolver;

impl ContentTypeResolver for MimeGuessResolver {
    fn content_type(&self, filename: &str) -> String {
        mime_guess::from_path(filename)
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
            .essence_str()
            .to_string()
    }
}
