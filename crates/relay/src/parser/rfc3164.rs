//! RFC 3164 (BSD syslog) body parser.

use bytes::Bytes;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use sluice_core::error::ParseError;
use sluice_core::record::{OriginFormat, Record};

/// Parses an RFC 3164 body (everything after `<PRI>`): `Mmm dd hh:mm:ss
/// HOSTNAME TAG[PID]: MSG`, tolerating a missing or malformed timestamp.
pub fn parse_body(facility: u8, severity: u8, body: &str, raw: Bytes) -> Record {
    match try_parse_dated(body) {
        Some((timestamp, rest)) => {
            let (hostname, tag, proc_id, message) = split_hostname_tag_message(rest);
            Record {
                facility,
                severity,
                timestamp: Some(timestamp),
                hostname,
                app_name: tag,
                proc_id,
                msg_id: String::new(),
                structured_data: String::new(),
                message,
                raw,
                origin_format: OriginFormat::Rfc3164,
            }
        }
        None => Record {
            facility,
            severity,
            timestamp: None,
            hostname: String::new(),
            app_name: String::new(),
            proc_id: String::new(),
            msg_id: String::new(),
            structured_data: String::new(),
            message: body.to_owned(),
            raw,
            origin_format: OriginFormat::Rfc3164,
        },
    }
}

/// Tries to consume a `Mmm dd hh:mm:ss ` prefix and resolve it to an
/// absolute instant, applying the year-rollover rule. Returns the parsed
/// timestamp and the remainder of the body (starting at HOSTNAME).
fn try_parse_dated(body: &str) -> Option<(std::time::SystemTime, &str)> {
    let mut parts = body.splitn(4, ' ');
    let month_s = parts.next()?;
    let day_s = parts.next()?;
    let time_s = parts.next()?;
    let rest = parts.next()?;

    let month = month_abbrev_to_number(month_s)?;
    let day: u32 = day_s.trim().parse().ok()?;
    let naive_time = chrono::NaiveTime::parse_from_str(time_s, "%H:%M:%S").ok()?;

    let now = Local::now();
    let mut year = now.year();

    // Rollover: a parsed month more than one month ahead of the current
    // month belongs to last year (e.g. it's January and the message says
    // December — Dec was last year, not 11 months from now).
    let current_month = now.month() as i32;
    let parsed_month = month as i32;
    if parsed_month - current_month > 1 {
        year -= 1;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let naive_dt = NaiveDateTime::new(date, naive_time);
    let local_dt = Local.from_local_datetime(&naive_dt).single()?;
    let timestamp: DateTime<Local> = local_dt;

    Some((timestamp.into(), rest))
}

fn month_abbrev_to_number(s: &str) -> Option<u32> {
    Some(match s {
        "Jan" => 1,
        "Feb" => 2,
        "Mar" => 3,
        "Apr" => 4,
        "May" => 5,
        "Jun" => 6,
        "Jul" => 7,
        "Aug" => 8,
        "Sep" => 9,
        "Oct" => 10,
        "Nov" => 11,
        "Dec" => 12,
        _ => return None,
    })
}

/// Splits `HOSTNAME TAG[PID]: MSG` (or `HOSTNAME TAG: MSG`, or just
/// `HOSTNAME MSG` with no tag) on the first space, then the first `:` or
/// `[`, whichever comes first.
fn split_hostname_tag_message(rest: &str) -> (String, String, String, String) {
    let rest = rest.trim_start();
    let (hostname, tail) = match rest.split_once(' ') {
        Some((h, t)) => (h, t),
        None => return (rest.to_owned(), String::new(), String::new(), String::new()),
    };

    let colon_pos = tail.find(':');
    let bracket_pos = tail.find('[');

    match (colon_pos, bracket_pos) {
        (None, None) => (hostname.to_owned(), String::new(), String::new(), tail.to_owned()),
        (Some(c), None) => {
            let tag = &tail[..c];
            let msg = tail[c + 1..].trim_start();
            (hostname.to_owned(), tag.to_owned(), String::new(), msg.to_owned())
        }
        (colon, Some(b)) if colon.is_none_or(|c| b < c) => {
            let tag = &tail[..b];
            let after_bracket = &tail[b + 1..];
            let close = match after_bracket.find(']') {
                Some(p) => p,
                None => {
                    return (
                        hostname.to_owned(),
                        String::new(),
                        String::new(),
                        tail.to_owned(),
                    );
                }
            };
            let pid = &after_bracket[..close];
            let after = &after_bracket[close + 1..];
            let msg = after.strip_prefix(':').unwrap_or(after).trim_start();
            (hostname.to_owned(), tag.to_owned(), pid.to_owned(), msg.to_owned())
        }
        (Some(c), Some(_)) => {
            let tag = &tail[..c];
            let msg = tail[c + 1..].trim_start();
            (hostname.to_owned(), tag.to_owned(), String::new(), msg.to_owned())
        }
    }
}
