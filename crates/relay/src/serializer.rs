//! Deterministic re-encoding of a [`Record`] to RFC 3164, RFC 5424, or
//! passthrough (C1/C7).

use chrono::{DateTime, Datelike, Local, SecondsFormat, Utc};
use sluice_core::record::{OriginFormat, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Rfc3164,
    Rfc5424,
    Auto,
}

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Serializes `record` for the given destination `format`.
///
/// `transformed` tells `auto` whether anything mutated the record since
/// parse: if nothing did, `auto` emits `raw` verbatim; otherwise it
/// re-serializes in the record's `origin_format` (the resolved reading of
/// the open question in spec.md §9 — `auto` prefers `origin_format`, not
/// the destination's nominal format).
pub fn serialize(record: &Record, format: OutputFormat, transformed: bool) -> Vec<u8> {
    match format {
        OutputFormat::Rfc3164 => to_rfc3164(record),
        OutputFormat::Rfc5424 => to_rfc5424(record),
        OutputFormat::Auto => {
            if !transformed {
                record.raw.to_vec()
            } else {
                match record.origin_format {
                    OriginFormat::Rfc5424 => to_rfc5424(record),
                    OriginFormat::Rfc3164 | OriginFormat::Permissive => to_rfc3164(record),
                }
            }
        }
    }
}

fn to_rfc3164(record: &Record) -> Vec<u8> {
    let pri = record.priority();
    let ts: DateTime<Local> = record
        .timestamp
        .map(DateTime::<Local>::from)
        .unwrap_or_else(Local::now);
    let month = MONTH_NAMES[(ts.month() - 1) as usize];
    let day = ts.format("%e").to_string(); // space-padded day
    let time = ts.format("%H:%M:%S").to_string();
    let hostname = if record.hostname.is_empty() {
        "-"
    } else {
        &record.hostname
    };

    let tag = if record.app_name.is_empty() {
        None
    } else if record.proc_id.is_empty() {
        Some(record.app_name.clone())
    } else {
        Some(format!("{}[{}]", record.app_name, record.proc_id))
    };

    let mut out = format!("<{pri}>{month} {day} {time} {hostname} ");
    if let Some(tag) = tag {
        out.push_str(&tag);
        out.push_str(": ");
    }
    out.push_str(&record.message);
    out.into_bytes()
}

fn to_rfc5424(record: &Record) -> Vec<u8> {
    let pri = record.priority();
    let ts = match record.timestamp {
        Some(t) => DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Micros, true),
        None => Local::now()
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Micros, true),
    };
    let nil = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let sd = if record.structured_data.is_empty() {
        "-".to_string()
    } else {
        record.structured_data.clone()
    };
    let msg_has_non_ascii = record.message.bytes().any(|b| b >= 0x80);
    let msg = if msg_has_non_ascii {
        format!("\u{feff}{}", record.message)
    } else {
        record.message.clone()
    };

    format!(
        "<{pri}>1 {ts} {} {} {} {} {sd} {msg}",
        nil(&record.hostname),
        nil(&record.app_name),
        nil(&record.proc_id),
        nil(&record.msg_id),
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::{Duration, UNIX_EPOCH};

    fn record() -> Record {
        Record {
            facility: 4,
            severity: 6,
            timestamp: Some(UNIX_EPOCH + Duration::from_secs(1_697_061_255)),
            hostname: "host1".into(),
            app_name: "sshd".into(),
            proc_id: "1234".into(),
            msg_id: String::new(),
            structured_data: String::new(),
            message: "Failed password for root".into(),
            raw: Bytes::from_static(b"<38>Oct 11 22:14:15 host1 sshd[1234]: Failed password for root"),
            origin_format: OriginFormat::Rfc3164,
        }
    }

    #[test]
    fn rfc3164_includes_tag_and_pid() {
        let out = String::from_utf8(to_rfc3164(&record())).unwrap();
        assert!(out.starts_with("<38>"));
        assert!(out.contains("host1 sshd[1234]: Failed password for root"));
    }

    #[test]
    fn rfc3164_empty_hostname_becomes_dash() {
        let mut r = record();
        r.hostname = String::new();
        let out = String::from_utf8(to_rfc3164(&r)).unwrap();
        assert!(out.contains(" - "));
    }

    #[test]
    fn rfc3164_tag_without_pid_omits_brackets() {
        let mut r = record();
        r.proc_id = String::new();
        let out = String::from_utf8(to_rfc3164(&r)).unwrap();
        assert!(out.contains("sshd: Failed password"));
    }

    #[test]
    fn rfc5424_substitutes_nilvalue_for_empty_fields() {
        let mut r = record();
        r.msg_id = String::new();
        let out = String::from_utf8(to_rfc5424(&r)).unwrap();
        assert!(out.starts_with("<38>1 "));
        assert!(out.contains(" host1 sshd 1234 - - "));
    }

    #[test]
    fn rfc5424_prefixes_bom_for_non_ascii_message() {
        let mut r = record();
        r.message = "café".into();
        let out = to_rfc5424(&r);
        let out_s = String::from_utf8(out).unwrap();
        assert!(out_s.contains('\u{feff}'));
    }

    #[test]
    fn auto_emits_raw_verbatim_when_untransformed() {
        let r = record();
        let out = serialize(&r, OutputFormat::Auto, false);
        assert_eq!(out, r.raw.to_vec());
    }

    #[test]
    fn auto_reserializes_in_origin_format_when_transformed() {
        let r = record();
        let out = serialize(&r, OutputFormat::Auto, true);
        assert_ne!(out, r.raw.to_vec());
        let out_s = String::from_utf8(out).unwrap();
        assert!(out_s.starts_with("<38>")); // rfc3164 origin -> rfc3164 output
        assert!(!out_s.starts_with("<38>1 "));
    }
}
