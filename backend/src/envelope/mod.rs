//! Decoding of processed-file responses.
//!
//! The transform service returns the processed file as the body, a
//! `Content-Disposition` filename hint, and JSON metadata in side-channel
//! headers. [`decode`] pulls these apart:
//!
//! ```text
//! ResponseEnvelope ──▶ filename  (Content-Disposition, default "processed.csv")
//!                  ──▶ side channel (strict JSON, then one repair pass, else None)
//!                  ──▶ payload   (untouched, reparsed as an UploadedFile)
//! ```
//!
//! Some transports fold long header values and leave literal `\n` sequences
//! between JSON tokens. The repair pass turns exactly those into whitespace;
//! it does not attempt any other recovery.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{DEFAULT_PROCESSED_FILENAME, MATCH_STATS_HEADER, REGEX_INFO_HEADER, SIDE_CHANNEL_KEYS};
use crate::error::MetadataDecodeFailure;
use crate::models::{MatchStats, RegexInfo};
use crate::parser::UploadedFile;

static FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]+)"|([^";\s]+))"#).expect("valid regex")
});

/// Transport response as received: body plus raw header strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseEnvelope {
    /// Processed file bytes.
    pub payload: Vec<u8>,
    /// Raw `Content-Disposition` value, if any.
    pub content_disposition: Option<String>,
    /// Side-channel key to raw header value (`None` when absent).
    pub side_channel: BTreeMap<String, Option<String>>,
}

impl ResponseEnvelope {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            ..Self::default()
        }
    }

    pub fn with_content_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    pub fn with_side_channel(mut self, key: &str, value: Option<String>) -> Self {
        self.side_channel.insert(key.to_string(), value);
        self
    }
}

/// Result of [`decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    pub filename: String,
    /// Every declared key is present; `None` means absent or undecodable.
    pub side_channel: BTreeMap<String, Option<Value>>,
    pub payload: Vec<u8>,
}

impl DecodedEnvelope {
    /// Decoded `X-Regex-Info`, if present and well-shaped.
    pub fn regex_info(&self) -> Option<RegexInfo> {
        self.typed_field(REGEX_INFO_HEADER)
    }

    /// Decoded `X-Match-Stats`, if present and well-shaped.
    pub fn match_stats(&self) -> Option<MatchStats> {
        self.typed_field(MATCH_STATS_HEADER)
    }

    fn typed_field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.side_channel.get(key)?.as_ref()?;
        match serde_json::from_value(value.clone()) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key, error = %e, "side-channel field has an unexpected shape");
                None
            }
        }
    }

    /// The payload as a virtual file named after the extracted filename.
    pub fn to_file(&self) -> UploadedFile {
        UploadedFile::new(self.filename.clone(), self.payload.clone())
    }

    pub fn into_file(self) -> UploadedFile {
        UploadedFile::new(self.filename, self.payload)
    }
}

/// Split an envelope into filename, decoded side channel and payload.
///
/// Never fails: a bad side-channel field degrades to `None` on its own.
pub fn decode(envelope: ResponseEnvelope) -> DecodedEnvelope {
    let filename = extract_filename(envelope.content_disposition.as_deref());

    let mut side_channel: BTreeMap<String, Option<Value>> = SIDE_CHANNEL_KEYS
        .iter()
        .map(|key| (key.to_string(), None))
        .collect();

    for (key, raw) in &envelope.side_channel {
        let parsed = match parse_side_channel_value(key, raw.as_deref()) {
            Ok(value) => value,
            Err(failure) => {
                tracing::warn!(%failure, "dropping side-channel field");
                None
            }
        };
        side_channel.insert(key.clone(), parsed);
    }

    DecodedEnvelope {
        filename,
        side_channel,
        payload: envelope.payload,
    }
}

/// Filename from a `Content-Disposition` value, or `processed.csv`.
pub fn extract_filename(content_disposition: Option<&str>) -> String {
    content_disposition
        .and_then(|value| FILENAME.captures(value))
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_PROCESSED_FILENAME.to_string())
}

/// Decode one raw side-channel value.
///
/// `Ok(None)` for an absent or empty value, `Ok(Some)` when strict decoding
/// or the repair pass succeeds, `Err` when both fail.
pub fn parse_side_channel_value(
    key: &str,
    raw: Option<&str>,
) -> Result<Option<Value>, MetadataDecodeFailure> {
    let Some(raw) = raw.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    let first_error = match serde_json::from_str(raw) {
        Ok(value) => return Ok(Some(value)),
        Err(e) => e,
    };

    let repaired = unescape_folded_newlines(raw);
    if repaired == raw {
        return Err(MetadataDecodeFailure {
            key: key.to_string(),
            message: first_error.to_string(),
        });
    }

    tracing::debug!(key, "retrying side-channel field after newline repair");
    serde_json::from_str(&repaired)
        .map(Some)
        .map_err(|e| MetadataDecodeFailure {
            key: key.to_string(),
            message: e.to_string(),
        })
}

/// Replace literal `\n` sequences outside JSON string literals with newlines.
///
/// Inside a string literal `\n` is already a valid escape and is kept.
pub fn unescape_folded_newlines(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
            }
            _ => out.push(c),
        }
    }

    out
}
