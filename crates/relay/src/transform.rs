//! Ordered field edits and regex masking applied to a routed record (C5).

use regex::Regex;
use sluice_core::record::{Record, RecordField};

/// A regex + replacement pair, used by `message_replace` and each entry of
/// `mask_patterns`. `replacement` here is already in native `regex` crate
/// syntax (`$1`..`$9`, `${name}`) — configuration accepts backslash-style
/// `\1`..`\9` backreferences, and `compile_pattern` translates them into
/// this form once, before a `Transform` is ever built.
#[derive(Debug, Clone)]
pub struct PatternReplacement {
    pub pattern: Regex,
    pub replacement: String,
}

/// One named transform: a set of edits applied in a fixed order, never
/// touching `raw`, `origin_format`, `facility`, `severity`, or `timestamp`.
#[derive(Debug, Clone, Default)]
pub struct Transform {
    pub name: String,
    pub remove_fields: Vec<RecordField>,
    pub set_fields: Vec<(RecordField, String)>,
    pub message_replace: Option<PatternReplacement>,
    pub mask_patterns: Vec<PatternReplacement>,
    pub message_prefix: Option<String>,
    pub message_suffix: Option<String>,
}

impl Transform {
    /// Applies this transform's edits to `record` in the fixed order:
    /// remove_fields, set_fields, message_replace, mask_patterns,
    /// prefix/suffix.
    pub fn apply(&self, record: &mut Record) {
        for field in &self.remove_fields {
            record.set_field(*field, String::new());
        }

        for (field, value) in &self.set_fields {
            record.set_field(*field, value.clone());
        }

        if let Some(pr) = &self.message_replace {
            record.message = pr
                .pattern
                .replace_all(&record.message, pr.replacement.as_str())
                .into_owned();
        }

        for pr in &self.mask_patterns {
            record.message = pr
                .pattern
                .replace_all(&record.message, pr.replacement.as_str())
                .into_owned();
        }

        if let Some(prefix) = &self.message_prefix {
            record.message = format!("{prefix}{}", record.message);
        }
        if let Some(suffix) = &self.message_suffix {
            record.message = format!("{}{suffix}", record.message);
        }
    }
}

/// Applies a named sequence of transforms (already resolved by the
/// pipeline builder) to `record`, in listed order.
pub fn apply_all(transforms: &[&Transform], record: &mut Record) {
    for t in transforms {
        t.apply(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sluice_core::record::OriginFormat;

    fn record() -> Record {
        Record {
            facility: 1,
            severity: 6,
            timestamp: None,
            hostname: "host1".into(),
            app_name: "app".into(),
            proc_id: "123".into(),
            msg_id: String::new(),
            structured_data: "[ex@1 k=\"v\"]".into(),
            message: "user=alice password=hunter2".into(),
            raw: Bytes::from_static(b"original raw bytes"),
            origin_format: OriginFormat::Rfc3164,
        }
    }

    #[test]
    fn empty_transform_list_leaves_record_untouched() {
        let mut r = record();
        let before_message = r.message.clone();
        let before_hostname = r.hostname.clone();
        apply_all(&[], &mut r);
        assert_eq!(r.message, before_message);
        assert_eq!(r.hostname, before_hostname);
    }

    #[test]
    fn remove_fields_blanks_named_fields_only() {
        let t = Transform {
            remove_fields: vec![RecordField::Hostname],
            ..Default::default()
        };
        let mut r = record();
        t.apply(&mut r);
        assert_eq!(r.hostname, "");
        assert_eq!(r.app_name, "app");
    }

    #[test]
    fn set_fields_overwrites_with_literal() {
        let t = Transform {
            set_fields: vec![(RecordField::AppName, "renamed".into())],
            ..Default::default()
        };
        let mut r = record();
        t.apply(&mut r);
        assert_eq!(r.app_name, "renamed");
    }

    #[test]
    fn set_fields_applied_after_remove_fields() {
        let t = Transform {
            remove_fields: vec![RecordField::Hostname],
            set_fields: vec![(RecordField::Hostname, "h2".into())],
            ..Default::default()
        };
        let mut r = record();
        t.apply(&mut r);
        assert_eq!(r.hostname, "h2");
    }

    #[test]
    fn mask_patterns_supports_backreferences() {
        // Configuration writes replacements with `\1`..`\9` backreferences;
        // `crate::config::translate_backreferences` (called by
        // `compile_pattern` when a `Transform` is built) is what turns that
        // into the native `$1` syntax seen here.
        let t = Transform {
            mask_patterns: vec![PatternReplacement {
                pattern: Regex::new(r"(password)=\S+").unwrap(),
                replacement: crate::config::translate_backreferences(r"\1=***"),
            }],
            ..Default::default()
        };
        let mut r = record();
        t.apply(&mut r);
        assert_eq!(r.message, "user=alice password=***");
    }

    #[test]
    fn mask_composition_matches_sequential_application() {
        let a = PatternReplacement {
            pattern: Regex::new("alice").unwrap(),
            replacement: "A".into(),
        };
        let b = PatternReplacement {
            pattern: Regex::new("hunter2").unwrap(),
            replacement: "H".into(),
        };

        let combined = Transform {
            mask_patterns: vec![a.clone(), b.clone()],
            ..Default::default()
        };
        let mut r1 = record();
        combined.apply(&mut r1);

        let step_a = Transform {
            mask_patterns: vec![a],
            ..Default::default()
        };
        let step_b = Transform {
            mask_patterns: vec![b],
            ..Default::default()
        };
        let mut r2 = record();
        step_a.apply(&mut r2);
        step_b.apply(&mut r2);

        assert_eq!(r1.message, r2.message);
    }

    #[test]
    fn prefix_and_suffix_concatenate() {
        let t = Transform {
            message_prefix: Some("[redacted] ".into()),
            message_suffix: Some(" [end]".into()),
            ..Default::default()
        };
        let mut r = record();
        t.apply(&mut r);
        assert_eq!(r.message, "[redacted] user=alice password=hunter2 [end]");
    }

    #[test]
    fn transforms_never_touch_raw_or_origin_metadata() {
        let t = Transform {
            remove_fields: vec![RecordField::Hostname],
            set_fields: vec![(RecordField::AppName, "x".into())],
            message_prefix: Some("p".into()),
            ..Default::default()
        };
        let mut r = record();
        let raw_before = r.raw.clone();
        t.apply(&mut r);
        assert_eq!(r.raw, raw_before);
        assert_eq!(r.facility, 1);
        assert_eq!(r.severity, 6);
        assert!(r.timestamp.is_none());
    }
}
