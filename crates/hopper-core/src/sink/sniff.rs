//! Content sniffing for the formats the classifier accepts.

/// Check whether the leading bytes match a JPEG, PNG or GIF signature.
///
/// Extensions are cheap to fake; the sink should never be sent a text file
/// that merely ends in `.png`.
pub fn is_image_content(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }

    // JPEG: FF D8 FF
    if bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return true;
    }

    // PNG: 89 50 4E 47
    if bytes[0] == 0x89 && bytes[1] == b'P' && bytes[2] == b'N' && bytes[3] == b'G' {
        return true;
    }

    // GIF: GIF8
    bytes.starts_with(b"GIF8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes_jpeg() {
        assert!(is_image_content(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]));
    }

    #[test]
    fn test_magic_bytes_png() {
        assert!(is_image_content(&[
            0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A
        ]));
    }

    #[test]
    fn test_magic_bytes_gif() {
        assert!(is_image_content(b"GIF89a\x01\x00"));
    }

    #[test]
    fn test_magic_bytes_invalid() {
        assert!(!is_image_content(b"hello world"));
        assert!(!is_image_content(&[0x00, 0x00, 0x00, 0x00]));
    }

    #[test]
    fn test_too_short() {
        assert!(!is_image_content(&[0xFF, 0xD8]));
        assert!(!is_image_content(&[]));
    }
}
