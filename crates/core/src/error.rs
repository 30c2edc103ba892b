//! Error hierarchy shared across the relay crates.

use thiserror::Error;

/// Errors raised while decoding a single syslog message (C2).
///
/// Each variant corresponds to one of the error conditions in the parser's
/// contract; the record is always discarded on any of these, never
/// defaulted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("bad priority field")]
    BadPriority,

    #[error("bad version field")]
    BadVersion,

    #[error("truncated header")]
    TruncatedHeader,

    #[error("malformed structured data")]
    MalformedStructuredData,
}

impl ParseError {
    /// A stable, machine-grepable name for this error condition, attached
    /// as a structured `reason` field on the ingress `tracing::debug!` call
    /// that logs the failed parse. Not used as a metric label: the
    /// `dropped_total{reason}` label stays within the closed
    /// `{filter, no_match, parse_error, send_failed}` set (§6), coarser
    /// than these per-variant names.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseError::BadPriority => "bad_priority",
            ParseError::BadVersion => "bad_version",
            ParseError::TruncatedHeader => "truncated_header",
            ParseError::MalformedStructuredData => "malformed_structured_data",
        }
    }
}

/// Fatal pipeline-construction errors (§4.7, §7): unknown destination or
/// transform referenced by a rule, duplicate names in a namespace, or an
/// invalid regex. Construction stops at the first one encountered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("rule '{rule}' references unknown destination '{destination}'")]
    UnknownDestination { rule: String, destination: String },

    #[error("rule '{rule}' references unknown transform '{transform}'")]
    UnknownTransform { rule: String, transform: String },

    #[error("duplicate {kind} name: '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{context} references unknown record field '{field}'")]
    UnknownField { context: String, field: String },

    #[error("invalid regex in {context}: {source}")]
    InvalidRegex {
        context: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reason_labels_are_stable() {
        assert_eq!(ParseError::BadPriority.reason(), "bad_priority");
        assert_eq!(ParseError::BadVersion.reason(), "bad_version");
        assert_eq!(ParseError::TruncatedHeader.reason(), "truncated_header");
        assert_eq!(
            ParseError::MalformedStructuredData.reason(),
            "malformed_structured_data"
        );
    }

    #[test]
    fn build_error_messages_name_the_offending_item() {
        let e = BuildError::UnknownDestination {
            rule: "r1".into(),
            destination: "siem".into(),
        };
        assert!(e.to_string().contains("siem"));

        let e = BuildError::DuplicateName {
            kind: "destination",
            name: "central".into(),
        };
        assert!(e.to_string().contains("central"));
    }
}
