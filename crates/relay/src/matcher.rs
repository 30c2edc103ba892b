//! Rule predicate evaluation (C3): does a record match a rule's clauses?

use regex::Regex;
use sluice_core::record::Record;

/// Canonical facility names in code order (0..=23), per RFC 3164 §4.1.1.
const FACILITY_NAMES: [&str; 24] = [
    "kern", "user", "mail", "daemon", "auth", "syslog", "lpr", "news", "uucp", "cron", "authpriv",
    "ftp", "ntp", "security", "console", "cron2", "local0", "local1", "local2", "local3", "local4",
    "local5", "local6", "local7",
];

/// Canonical severity names in code order (0..=7).
const SEVERITY_NAMES: [&str; 8] = [
    "emerg", "alert", "crit", "err", "warning", "notice", "info", "debug",
];

/// Resolves a facility code to its canonical lowercase name.
pub fn facility_name(facility: u8) -> Option<&'static str> {
    FACILITY_NAMES.get(facility as usize).copied()
}

/// Resolves a severity code to its canonical lowercase name. Severity 3
/// accepts the alias `error`, but the canonical name returned is `err`.
pub fn severity_name(severity: u8) -> Option<&'static str> {
    SEVERITY_NAMES.get(severity as usize).copied()
}

/// Normalizes a severity name as it might appear in a clause's name set,
/// so `err` and `error` both select severity 3.
fn normalize_severity_name(name: &str) -> &str {
    if name == "error" { "err" } else { name }
}

/// A rule's predicate: zero or more clauses, all of which must match
/// (logical AND). An empty clause list matches unconditionally.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    pub facility: Option<Vec<String>>,
    pub severity: Option<Vec<String>>,
    pub hostname_pattern: Option<Regex>,
    pub message_pattern: Option<Regex>,
}

impl Predicate {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(names) = &self.facility {
            match facility_name(record.facility) {
                Some(name) if names.iter().any(|n| n == name) => {}
                _ => return false,
            }
        }

        if let Some(names) = &self.severity {
            match severity_name(record.severity) {
                Some(name) if names.iter().any(|n| normalize_severity_name(n) == name) => {}
                _ => return false,
            }
        }

        if let Some(re) = &self.hostname_pattern {
            if !re.is_match(&record.hostname) {
                return false;
            }
        }

        if let Some(re) = &self.message_pattern {
            if !re.is_match(&record.message) {
                return false;
            }
        }

        true
    }
}
