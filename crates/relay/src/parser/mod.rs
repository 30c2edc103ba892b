//! Bytes-to-[`Record`](sluice_core::Record) decoding for RFC 5424, RFC 3164,
//! and the permissive fallback (C2).
//!
//! Input to [`parse`] is always exactly one syslog message — framing has
//! already been resolved by the ingress layer (one UDP datagram, or one
//! frame extracted from a TCP stream).

pub mod permissive;
pub mod rfc3164;
pub mod rfc5424;
pub mod sd;

use bytes::Bytes;
use sluice_core::error::ParseError;
use sluice_core::record::Record;

const MAX_PRI: u16 = 191;

/// Decodes one syslog message into a [`Record`].
///
/// Format detection, in order:
/// 1. `<N>1 ` (priority, the literal version digit `1`, a space) → RFC 5424.
/// 2. `<N>` alone → RFC 3164.
/// 3. Anything else → permissive fallback; this never fails.
pub fn parse(input: &[u8]) -> Result<Record, ParseError> {
    if input.is_empty() {
        return Err(ParseError::TruncatedHeader);
    }

    let raw = Bytes::copy_from_slice(input);
    let text = String::from_utf8_lossy(input);

    let Some(after_open) = text.strip_prefix('<') else {
        return Ok(permissive::parse(input, raw));
    };

    let Some(close) = after_open.find('>') else {
        return Err(ParseError::BadPriority);
    };

    let pri_s = &after_open[..close];
    let remainder = &after_open[close + 1..];

    if pri_s.is_empty() || !pri_s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::BadPriority);
    }
    let pri: u16 = pri_s.parse().map_err(|_| ParseError::BadPriority)?;
    if pri > MAX_PRI {
        return Err(ParseError::BadPriority);
    }
    let facility = (pri / 8) as u8;
    let severity = (pri % 8) as u8;

    if let Some(body) = remainder.strip_prefix("1 ") {
        return rfc5424::parse_body(facility, severity, body, raw);
    }

    Ok(rfc3164::parse_body(facility, severity, remainder, raw))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
            let _ = parse(&bytes);
        }

        #[test]
        fn parse_accepts_every_priority_in_range(pri in 0u16..=191) {
            let raw = format!("<{pri}>1 2023-10-11T22:14:15Z host app - - - msg");
            let r = parse(raw.as_bytes()).unwrap();
            prop_assert_eq!(r.facility, (pri / 8) as u8);
            prop_assert_eq!(r.severity, (pri % 8) as u8);
        }

        #[test]
        fn parse_rejects_every_priority_above_range(pri in 192u32..10_000) {
            let raw = format!("<{pri}>1 2023-10-11T22:14:15Z host app - - - msg");
            prop_assert!(parse(raw.as_bytes()).is_err());
        }

        #[test]
        fn parse_arbitrary_hostname_never_panics(hostname in "[a-zA-Z0-9._-]{0,100}") {
            let raw = format!("<34>1 2023-10-11T22:14:15Z {hostname} app - - - msg");
            let _ = parse(raw.as_bytes());
        }
    }
}
