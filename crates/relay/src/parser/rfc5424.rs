//! RFC 5424 body parser (the part after `<PRI>1 `).

use bytes::Bytes;
use chrono::DateTime;
use sluice_core::error::ParseError;
use sluice_core::record::{OriginFormat, Record};

use super::sd::split_sd_and_message;

const BOM: char = '\u{feff}';

fn nilvalue_to_empty(s: &str) -> String {
    if s == "-" { String::new() } else { s.to_owned() }
}

/// Parses the tail of an RFC 5424 message, given the already-decoded
/// priority and the raw bytes (kept verbatim on the returned record).
///
/// `body` is everything after `<PRI>1 `: `TIMESTAMP HOSTNAME APP-NAME
/// PROCID MSGID SD MSG`.
pub fn parse_body(
    facility: u8,
    severity: u8,
    body: &str,
    raw: Bytes,
) -> Result<Record, ParseError> {
    let mut parts = body.splitn(6, ' ');
    let timestamp_s = parts.next().ok_or(ParseError::TruncatedHeader)?;
    let hostname_s = parts.next().ok_or(ParseError::TruncatedHeader)?;
    let app_name_s = parts.next().ok_or(ParseError::TruncatedHeader)?;
    let proc_id_s = parts.next().ok_or(ParseError::TruncatedHeader)?;
    let msg_id_s = parts.next().ok_or(ParseError::TruncatedHeader)?;
    let rest = parts.next().ok_or(ParseError::TruncatedHeader)?;

    let timestamp = if timestamp_s == "-" {
        None
    } else {
        DateTime::parse_from_rfc3339(timestamp_s)
            .ok()
            .map(|dt| dt.into())
    };

    let (sd, msg) = split_sd_and_message(rest)?;
    let structured_data = nilvalue_to_empty(sd);
    let message = msg.strip_prefix(BOM).unwrap_or(msg).to_owned();

    Ok(Record {
        facility,
        severity,
        timestamp,
        hostname: nilvalue_to_empty(hostname_s),
        app_name: nilvalue_to_empty(app_name_s),
        proc_id: nilvalue_to_empty(proc_id_s),
        msg_id: nilvalue_to_empty(msg_id_s),
        structured_data,
        message,
        raw,
        origin_format: OriginFormat::Rfc5424,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> Bytes {
        Bytes::from_static(b"dummy")
    }

    #[test]
    fn full_header_with_sd() {
        let body = r#"2023-10-11T22:14:15.003Z host1 app 1234 msg1 [ex@1 k="v"] the message"#;
        let r = parse_body(4, 6, body, raw()).unwrap();
        assert_eq!(r.hostname, "host1");
        assert_eq!(r.app_name, "app");
        assert_eq!(r.proc_id, "1234");
        assert_eq!(r.msg_id, "msg1");
        assert_eq!(r.structured_data, r#"[ex@1 k="v"]"#);
        assert_eq!(r.message, "the message");
        assert!(r.timestamp.is_some());
        assert_eq!(r.origin_format, OriginFormat::Rfc5424);
    }

    #[test]
    fn nilvalues_become_empty() {
        let body = "- - - - - - the message";
        let r = parse_body(1, 5, body, raw()).unwrap();
        assert_eq!(r.hostname, "");
        assert_eq!(r.app_name, "");
        assert_eq!(r.proc_id, "");
        assert_eq!(r.msg_id, "");
        assert_eq!(r.structured_data, "");
        assert_eq!(r.message, "the message");
        assert!(r.timestamp.is_none());
    }

    #[test]
    fn unparseable_timestamp_yields_absent() {
        let body = "not-a-timestamp host app - - - msg";
        let r = parse_body(1, 5, body, raw()).unwrap();
        assert!(r.timestamp.is_none());
    }

    #[test]
    fn bom_is_stripped_from_message() {
        let body = "- host app - - - \u{feff}hello";
        let r = parse_body(1, 5, body, raw()).unwrap();
        assert_eq!(r.message, "hello");
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert!(parse_body(1, 5, "2023-10-11T22:14:15Z host app", raw()).is_err());
    }

    #[test]
    fn malformed_structured_data_is_an_error() {
        let body = r#"- host app - - [unterminated msg"#;
        assert!(parse_body(1, 5, body, raw()).is_err());
    }
}
