//! Uploaded-file decoding: text encoding detection and delimiter sniffing.
//!
//! Admission files arrive as raw bytes with no declared encoding. UTF-8 is
//! tried first; UTF-16 is the fallback (BOM-aware, little-endian when no
//! BOM is present). Anything else is rejected as a batch-fatal error.

use crate::error::AdmissionError;

/// Detected source encoding of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl SourceEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Utf16Le => "utf-16le",
            SourceEncoding::Utf16Be => "utf-16be",
        }
    }
}

/// A decoded admission file: its text, the encoding it was read with and
/// the field delimiter sniffed from the header line.
#[derive(Debug, Clone)]
pub struct DecodedFile {
    pub text: String,
    pub encoding: SourceEncoding,
    pub delimiter: u8,
}

/// Decode an uploaded file and sniff its CSV delimiter.
pub fn decode(bytes: &[u8]) -> Result<DecodedFile, AdmissionError> {
    if bytes.is_empty() {
        return Err(AdmissionError::EmptyFile);
    }

    let (text, encoding) = decode_text(bytes)?;
    let delimiter = sniff_delimiter(text.lines().next().unwrap_or(""));

    Ok(DecodedFile {
        text,
        encoding,
        delimiter,
    })
}

fn decode_text(bytes: &[u8]) -> Result<(String, SourceEncoding), AdmissionError> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        // NUL bytes are valid UTF-8, but real CSV text never contains them;
        // ASCII content encoded as UTF-16 does. Send those to the UTF-16 path.
        if !text.contains('\0') {
            // Strip a UTF-8 BOM so it cannot leak into the first header field.
            return Ok((
                text.trim_start_matches('\u{feff}').to_string(),
                SourceEncoding::Utf8,
            ));
        }
    }

    let (payload, encoding) = match bytes {
        [0xff, 0xfe, rest @ ..] => (rest, SourceEncoding::Utf16Le),
        [0xfe, 0xff, rest @ ..] => (rest, SourceEncoding::Utf16Be),
        // No BOM: assume little-endian, the common case for exports
        // produced on desktop platforms.
        _ => (bytes, SourceEncoding::Utf16Le),
    };

    let text = decode_utf16(payload, encoding).ok_or(AdmissionError::UnsupportedEncoding)?;
    Ok((text, encoding))
}

fn decode_utf16(bytes: &[u8], encoding: SourceEncoding) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }

    let units = bytes.chunks_exact(2).map(|pair| match encoding {
        SourceEncoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
        _ => u16::from_le_bytes([pair[0], pair[1]]),
    });

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .ok()
}

/// Sniff the field delimiter from the header line. The most frequent of
/// the candidate delimiters wins; comma is the default when none appear.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

    let mut best = b',';
    let mut best_count = 0usize;
    for candidate in CANDIDATES {
        let count = header_line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

// =============================================================================
// Tests
// =============================================================================
