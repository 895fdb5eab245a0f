//! Text decoding and delimiter detection for delimited files.
//!
//! UTF-16 with a BOM and UTF-8 (BOM stripped) are decoded directly. Other
//! text is treated as a single-byte legacy encoding: the `chardet` guess when
//! it names one that decodes cleanly, Windows-1252 otherwise. Control bytes
//! that never appear in text mark the content as binary.

use encoding_rs::Encoding;

use crate::error::ParseFailure;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const UTF16LE_BOM: &[u8] = b"\xFF\xFE";
const UTF16BE_BOM: &[u8] = b"\xFE\xFF";

/// Candidate delimiters, in tie-break order.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Records inspected per candidate delimiter.
const DELIMITER_SAMPLE_RECORDS: usize = 10;

/// Detect the encoding of raw bytes using chardet, normalized to a known name.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _confidence, _language) = chardet::detect(bytes);

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode file bytes to text.
///
/// Fails on binary content and on malformed UTF-16.
pub fn decode_text(bytes: &[u8]) -> Result<String, ParseFailure> {
    if let Some(encoding) = utf16_from_bom(bytes) {
        let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
        if had_errors {
            return Err(ParseFailure::Encoding(encoding.name().to_lowercase()));
        }
        return Ok(text.into_owned());
    }

    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    if looks_binary(bytes) {
        return Err(ParseFailure::BinaryContent);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    let detected = detect_encoding(bytes);
    if let Some(encoding) = single_byte_encoding(&detected) {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            tracing::debug!(encoding = %detected, "decoded legacy-encoded text");
            return Ok(text.into_owned());
        }
    }

    tracing::debug!(detected = %detected, "falling back to windows-1252");
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    Ok(text.into_owned())
}

fn utf16_from_bom(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.starts_with(UTF16LE_BOM) {
        Some(encoding_rs::UTF_16LE)
    } else if bytes.starts_with(UTF16BE_BOM) {
        Some(encoding_rs::UTF_16BE)
    } else {
        None
    }
}

/// NUL and C0 controls other than tab, line feed, form feed and carriage return.
fn looks_binary(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .any(|b| *b < 0x20 && !matches!(*b, b'\t' | b'\n' | 0x0C | b'\r'))
}

fn single_byte_encoding(label: &str) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label.as_bytes())?;
    if encoding.is_single_byte() {
        Some(encoding)
    } else {
        None
    }
}

/// Detect the delimiter by trial-parsing the first records with each candidate.
///
/// A candidate needs at least two fields in the first non-blank record; the
/// one whose sampled records most often match that width wins, then the
/// wider header, then candidate order. Quoted fields are respected. Defaults
/// to `,`.
pub fn detect_delimiter(content: &str) -> u8 {
    let mut best = b',';
    let mut best_score = (0, 0);

    for sep in DELIMITERS {
        let widths = record_widths(content, sep);
        let Some(&width) = widths.first() else {
            continue;
        };
        if width < 2 {
            continue;
        }

        let agreeing = widths.iter().filter(|w| **w == width).count();
        let score = (agreeing, width);
        if score > best_score {
            best_score = score;
            best = sep;
        }
    }

    best
}

/// Field counts of the first non-blank records when split on `sep`.
fn record_widths(content: &str, sep: u8) -> Vec<usize> {
    csv::ReaderBuilder::new()
        .delimiter(sep)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
        .records()
        .map_while(Result::ok)
        .filter(|record| record.iter().any(|field| !field.trim().is_empty()))
        .take(DELIMITER_SAMPLE_RECORDS)
        .map(|record| record.len())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_with_bom() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("Name\nJosé".as_bytes());
        assert_eq!(decode_text(&bytes).unwrap(), "Name\nJosé");
    }

    #[test]
    fn test_binary_is_rejected() {
        let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
        assert!(matches!(decode_text(png), Err(ParseFailure::BinaryContent)));
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = UTF16LE_BOM.to_vec();
        for unit in "a,b\n1,2".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_text(&bytes).unwrap(), "a,b\n1,2");
    }

    #[test]
    fn test_legacy_text_is_decoded() {
        let bytes: &[u8] = &[b'c', b'a', b'f', 0xE9, b',', b'x'];
        let text = decode_text(bytes).unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.ends_with(",x"));
    }

    #[test]
    fn test_detect_delimiter_variants() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), b'\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), b'|');
    }

    #[test]
    fn test_detect_delimiter_defaults_to_comma() {
        assert_eq!(detect_delimiter("single"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted_separators() {
        assert_eq!(detect_delimiter("\"a,b,c\";d\n1;2\n"), b';');
        assert_eq!(detect_delimiter("\"x;y\",z\n1,2\n"), b',');
    }

    #[test]
    fn test_detect_delimiter_prefers_consistent_width() {
        // The header alone has more `|` than `,`, but only `,` splits the rows evenly.
        assert_eq!(detect_delimiter("a,b|c|d\n1,2\n3,4\n"), b',');
    }

    #[test]
    fn test_detect_delimiter_skips_leading_blank_lines() {
        assert_eq!(detect_delimiter("\n\n  \na;b\n1;2"), b';');
    }
}
