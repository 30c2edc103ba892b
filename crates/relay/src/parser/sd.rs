//! Lexical scanner for RFC 5424 structured data.
//!
//! Structured data is either the NILVALUE `-` or one or more bracketed
//! `[id k="v" ...]` elements. This module only needs to find where SD ends
//! and MSG begins — the record keeps the SD string opaque and verbatim, so
//! there is no key/value decomposition here, unlike a log-indexing pipeline
//! that wants individual `sd_id_param` fields.

use sluice_core::error::ParseError;

/// Splits `rest` (everything after MSGID in an RFC 5424 header) into the
/// structured-data substring and the remaining bytes (the MSG, including
/// its leading space if any — callers trim it).
///
/// Tracks bracket depth and `\`-escaped quotes so a `]` or `"` inside a
/// quoted param value doesn't end the element early.
pub fn split_sd_and_message(rest: &str) -> Result<(&str, &str), ParseError> {
    if let Some(msg) = rest.strip_prefix("- ") {
        return Ok(("-", msg));
    }
    if rest == "-" {
        return Ok(("-", ""));
    }

    if !rest.starts_with('[') {
        return Err(ParseError::MalformedStructuredData);
    }

    let bytes = rest.as_bytes();
    let mut depth = 0i32;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quotes {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_quotes = false;
            }
        } else {
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        // Possibly more elements follow, or the message starts.
                        let after = i + 1;
                        if after >= bytes.len() {
                            return Ok((&rest[..after], ""));
                        }
                        if bytes[after] == b'[' {
                            i = after;
                            continue;
                        }
                        if bytes[after] == b' ' {
                            return Ok((&rest[..after], &rest[after + 1..]));
                        }
                        return Ok((&rest[..after], &rest[after..]));
                    }
                }
                b'"' => in_quotes = true,
                _ => {}
            }
        }
        i += 1;
    }

    if depth != 0 {
        return Err(ParseError::MalformedStructuredData);
    }

    Ok((rest, ""))
}
