/// Number of leading bytes inspected when classifying content.
pub const SNIFF_LEN: usize = 512;

/// Image formats accepted for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
        }
    }

    /// Extension used when the uploaded filename has none.
    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Jpeg => ".jpg",
            MediaType::Png => ".png",
        }
    }
}

/// Detect content type from magic bytes.
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    let prefix = &bytes[..bytes.len().min(SNIFF_LEN)];

    match prefix {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        [b'B', b'M', ..] => "image/bmp",
        [b'%', b'P', b'D', b'F', b'-', ..] => "application/pdf",
        [0x50, 0x4B, 0x03, 0x04, ..] => "application/zip",
        [0x1F, 0x8B, 0x08, ..] => "application/x-gzip",
        [] => "text/plain; charset=utf-8",
        _ if looks_like_text(prefix) => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn looks_like_text(prefix: &[u8]) -> bool {
    // A multi-byte character may be cut at the sniff boundary
    let valid = match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !prefix
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
}

/// Classifies `bytes` against the upload allow-list, returning the detected
/// type on rejection.
pub fn sniff_image(bytes: &[u8]) -> Result<MediaType, &'static str> {
    match detect_content_type(bytes) {
        "image/jpeg" => Ok(MediaType::Jpeg),
        "image/png" => Ok(MediaType::Png),
        other => Err(other),
    }
}
