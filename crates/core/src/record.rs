//! The canonical in-memory syslog record (C1) passed between pipeline stages.

use bytes::Bytes;
use std::time::SystemTime;

/// Which of the three input grammars produced a [`Record`].
///
/// Used by the serializer's `auto` output format, which re-encodes in the
/// record's origin format rather than the destination's nominal format when
/// the record has been transformed (spec Design Note, resolved in favor of
/// `origin_format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginFormat {
    Rfc5424,
    Rfc3164,
    Permissive,
}

/// The closed set of record fields a transform may `remove_fields` or
/// `set_fields`. Deliberately not an open string-keyed map: the source this
/// spec was distilled from exposed fields by name, but the target represents
/// editable fields as a closed enum so an unknown field name is caught at
/// transform-parse time, not at message time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Hostname,
    AppName,
    ProcId,
    MsgId,
    StructuredData,
}

impl RecordField {
    /// Parses the YAML key spelling used in transform definitions.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hostname" => Some(RecordField::Hostname),
            "app_name" => Some(RecordField::AppName),
            "proc_id" => Some(RecordField::ProcId),
            "msg_id" => Some(RecordField::MsgId),
            "structured_data" => Some(RecordField::StructuredData),
            _ => None,
        }
    }
}

/// The canonical syslog message, normalized from any of the three input
/// grammars and carried through routing, transforms, and serialization.
///
/// `raw` is never mutated by a transform and survives for the lifetime of
/// the record, regardless of what happens to the other fields — it backs
/// the `auto` passthrough format and scenario-level round-trip testing.
#[derive(Debug, Clone)]
pub struct Record {
    /// 0..=23, syslog facility code.
    pub facility: u8,
    /// 0..=7, syslog severity (0 = emerg, 7 = debug).
    pub severity: u8,
    /// Absent when the parser could not recover a timestamp.
    pub timestamp: Option<SystemTime>,
    pub hostname: String,
    pub app_name: String,
    pub proc_id: String,
    pub msg_id: String,
    /// Opaque RFC 5424 SD string including surrounding brackets, or empty.
    pub structured_data: String,
    pub message: String,
    /// The undecoded bytes as received; never mutated after parse.
    pub raw: Bytes,
    pub origin_format: OriginFormat,
}

impl Record {
    /// `facility*8 + severity`, the PRI value.
    pub fn priority(&self) -> u16 {
        u16::from(self.facility) * 8 + u16::from(self.severity)
    }

    /// Reads one of the closed editable fields by enum key.
    pub fn field(&self, field: RecordField) -> &str {
        match field {
            RecordField::Hostname => &self.hostname,
            RecordField::AppName => &self.app_name,
            RecordField::ProcId => &self.proc_id,
            RecordField::MsgId => &self.msg_id,
            RecordField::StructuredData => &self.structured_data,
        }
    }

    /// Overwrites one of the closed editable fields by enum key.
    pub fn set_field(&mut self, field: RecordField, value: String) {
        match field {
            RecordField::Hostname => self.hostname = value,
            RecordField::AppName => self.app_name = value,
            RecordField::ProcId => self.proc_id = value,
            RecordField::MsgId => self.msg_id = value,
            RecordField::StructuredData => self.structured_data = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            facility: 4,
            severity: 6,
            timestamp: None,
            hostname: "host1".into(),
            app_name: "sshd".into(),
            proc_id: "1234".into(),
            msg_id: String::new(),
            structured_data: String::new(),
            message: "Failed password for root".into(),
            raw: Bytes::from_static(b"<38>..."),
            origin_format: OriginFormat::Rfc3164,
        }
    }

    #[test]
    fn priority_is_facility_times_8_plus_severity() {
        assert_eq!(sample().priority(), 38);
    }

    #[test]
    fn boundary_priorities() {
        let mut r = sample();
        r.facility = 0;
        r.severity = 0;
        assert_eq!(r.priority(), 0);
        r.facility = 23;
        r.severity = 7;
        assert_eq!(r.priority(), 191);
    }

    #[test]
    fn field_accessor_round_trips() {
        let mut r = sample();
        r.set_field(RecordField::Hostname, "host2".into());
        assert_eq!(r.field(RecordField::Hostname), "host2");
    }

    #[test]
    fn record_field_parses_known_names_only() {
        assert_eq!(RecordField::parse("hostname"), Some(RecordField::Hostname));
        assert_eq!(RecordField::parse("facility"), None);
    }
}
