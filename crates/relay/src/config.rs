//! Pipeline configuration contract (§6) and construction (§4.7).
//!
//! The external config loader resolves environment variable substitution
//! and schema validation before handing the pipeline an already-resolved
//! [`PipelineConfig`] snapshot; this module's job is to turn that snapshot
//! into the compiled [`BuiltPipeline`] — router, transforms, destinations —
//! or fail fast with a [`BuildError`] naming the first problem found.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sluice_core::error::BuildError;
use sluice_core::record::RecordField;
use thiserror::Error;

use crate::egress::{Protocol, RetryPolicy};
use crate::matcher::Predicate;
use crate::router::{Action, Rule, Router};
use crate::serializer::OutputFormat;
use crate::transform::{PatternReplacement, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolConfig {
    Udp,
    Tcp,
}

impl From<ProtocolConfig> for Protocol {
    fn from(p: ProtocolConfig) -> Self {
        match p {
            ProtocolConfig::Udp => Protocol::Udp,
            ProtocolConfig::Tcp => Protocol::Tcp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatConfig {
    Rfc3164,
    Rfc5424,
    Auto,
}

impl From<FormatConfig> for OutputFormat {
    fn from(f: FormatConfig) -> Self {
        match f {
            FormatConfig::Rfc3164 => OutputFormat::Rfc3164,
            FormatConfig::Rfc5424 => OutputFormat::Rfc5424,
            FormatConfig::Auto => OutputFormat::Auto,
        }
    }
}

fn default_max_connections() -> usize {
    256
}

fn default_max_message_size() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub name: String,
    pub protocol: ProtocolConfig,
    pub bind_addr: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let d = RetryPolicy::default();
        Self {
            max_attempts: d.max_attempts,
            backoff_base_seconds: d.backoff_base_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub name: String,
    pub protocol: ProtocolConfig,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_format")]
    pub format: FormatConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_format() -> FormatConfig {
    FormatConfig::Auto
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    pub name: String,
    #[serde(default)]
    pub remove_fields: Vec<String>,
    #[serde(default)]
    pub set_fields: HashMap<String, String>,
    pub message_replace: Option<PatternConfig>,
    #[serde(default)]
    pub mask_patterns: Vec<PatternConfig>,
    pub message_prefix: Option<String>,
    pub message_suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub name: String,
    pub facility: Option<Vec<String>>,
    pub severity: Option<Vec<String>>,
    pub hostname_pattern: Option<String>,
    pub message_pattern: Option<String>,
    #[serde(default)]
    pub action: ActionConfig,
    #[serde(default)]
    pub destinations: Vec<String>,
    #[serde(default)]
    pub transforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionConfig {
    #[default]
    Forward,
    Drop,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub observation_addr: Option<String>,
    #[serde(default = "default_true")]
    pub observation_required: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            observation_addr: Some("0.0.0.0:9090".to_owned()),
            observation_required: true,
        }
    }
}

/// The validated configuration snapshot the pipeline is constructed from,
/// matching the nested shape described in spec.md §6: `inputs[]`,
/// `destinations[]`, `transforms[]`, `filters[]`, `service`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub inputs: Vec<InputConfig>,
    pub destinations: Vec<DestinationConfig>,
    #[serde(default)]
    pub transforms: Vec<TransformConfig>,
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub service: ServiceConfig,
}

/// A compiled destination, ready for an egress task to own.
#[derive(Debug, Clone)]
pub struct CompiledDestination {
    pub name: String,
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub format: OutputFormat,
    pub retry: RetryPolicy,
}

/// The output of [`PipelineConfig::build`]: a router and transform table
/// with every name reference already resolved, plus the raw input and
/// destination configs needed to start listeners and senders.
pub struct BuiltPipeline {
    pub inputs: Vec<InputConfig>,
    pub destinations: Vec<CompiledDestination>,
    pub router: Router,
    pub transforms: HashMap<String, Transform>,
    pub service: ServiceConfig,
}

impl PipelineConfig {
    /// Compiles this configuration, or returns the first [`BuildError`]
    /// encountered: an unknown destination/transform referenced by a
    /// filter, a duplicate name within a namespace, or an invalid regex.
    pub fn build(&self) -> Result<BuiltPipeline, BuildError> {
        check_unique(self.inputs.iter().map(|i| i.name.as_str()), "input")?;
        check_unique(
            self.destinations.iter().map(|d| d.name.as_str()),
            "destination",
        )?;
        check_unique(
            self.transforms.iter().map(|t| t.name.as_str()),
            "transform",
        )?;
        check_unique(self.filters.iter().map(|f| f.name.as_str()), "filter")?;

        let destination_names: HashSet<&str> =
            self.destinations.iter().map(|d| d.name.as_str()).collect();

        let mut transforms = HashMap::new();
        for t in &self.transforms {
            transforms.insert(t.name.clone(), compile_transform(t)?);
        }

        let mut rules = Vec::with_capacity(self.filters.len());
        for f in &self.filters {
            for dest in &f.destinations {
                if !destination_names.contains(dest.as_str()) {
                    return Err(BuildError::UnknownDestination {
                        rule: f.name.clone(),
                        destination: dest.clone(),
                    });
                }
            }
            for tr in &f.transforms {
                if !transforms.contains_key(tr) {
                    return Err(BuildError::UnknownTransform {
                        rule: f.name.clone(),
                        transform: tr.clone(),
                    });
                }
            }

            rules.push(Rule {
                name: f.name.clone(),
                predicate: compile_predicate(f)?,
                action: match f.action {
                    ActionConfig::Forward => Action::Forward,
                    ActionConfig::Drop => Action::Drop,
                },
                destinations: f.destinations.clone(),
                transforms: f.transforms.clone(),
            });
        }

        let destinations = self
            .destinations
            .iter()
            .map(|d| CompiledDestination {
                name: d.name.clone(),
                protocol: d.protocol.into(),
                host: d.host.clone(),
                port: d.port,
                format: d.format.into(),
                retry: RetryPolicy {
                    max_attempts: d.retry.max_attempts,
                    backoff_base_seconds: d.retry.backoff_base_seconds,
                },
            })
            .collect();

        Ok(BuiltPipeline {
            inputs: self.inputs.clone(),
            destinations,
            router: Router::new(rules),
            transforms,
            service: self.service.clone(),
        })
    }
}

fn check_unique<'a>(
    names: impl Iterator<Item = &'a str>,
    kind: &'static str,
) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(BuildError::DuplicateName {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(())
}

/// Translates backslash-style backreferences (`\1`..`\9`, `\\` as a literal
/// backslash) into the `$1`..`$9` syntax `regex::Regex::replace_all` actually
/// understands. Any literal `$` in the input is escaped to `$$` so it
/// survives as literal text rather than being read as a group reference.
pub(crate) fn translate_backreferences(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(d) if ('1'..='9').contains(d) => {
                    out.push_str("${");
                    out.push(*d);
                    out.push('}');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

fn compile_pattern(context: String, p: &PatternConfig) -> Result<PatternReplacement, BuildError> {
    let pattern = Regex::new(&p.pattern).map_err(|source| BuildError::InvalidRegex {
        context,
        source,
    })?;
    Ok(PatternReplacement {
        pattern,
        replacement: translate_backreferences(&p.replacement),
    })
}

fn compile_transform(t: &TransformConfig) -> Result<Transform, BuildError> {
    let remove_fields = t
        .remove_fields
        .iter()
        .map(|f| {
            RecordField::parse(f).ok_or_else(|| BuildError::UnknownField {
                context: format!("transform '{}' remove_fields", t.name),
                field: f.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let set_fields = t
        .set_fields
        .iter()
        .map(|(k, v)| {
            RecordField::parse(k)
                .ok_or_else(|| BuildError::UnknownField {
                    context: format!("transform '{}' set_fields", t.name),
                    field: k.clone(),
                })
                .map(|field| (field, v.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let message_replace = t
        .message_replace
        .as_ref()
        .map(|p| compile_pattern(format!("transform '{}' message_replace", t.name), p))
        .transpose()?;

    let mask_patterns = t
        .mask_patterns
        .iter()
        .map(|p| compile_pattern(format!("transform '{}' mask_patterns", t.name), p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Transform {
        name: t.name.clone(),
        remove_fields,
        set_fields,
        message_replace,
        mask_patterns,
        message_prefix: t.message_prefix.clone(),
        message_suffix: t.message_suffix.clone(),
    })
}

fn compile_predicate(f: &FilterConfig) -> Result<Predicate, BuildError> {
    let hostname_pattern = f
        .hostname_pattern
        .as_ref()
        .map(|p| {
            Regex::new(p).map_err(|source| BuildError::InvalidRegex {
                context: format!("filter '{}' hostname_pattern", f.name),
                source,
            })
        })
        .transpose()?;

    let message_pattern = f
        .message_pattern
        .as_ref()
        .map(|p| {
            Regex::new(p).map_err(|source| BuildError::InvalidRegex {
                context: format!("filter '{}' message_pattern", f.name),
                source,
            })
        })
        .transpose()?;

    Ok(Predicate {
        facility: f.facility.clone(),
        severity: f.severity.clone(),
        hostname_pattern,
        message_pattern,
    })
}

/// Errors raised while turning a YAML document on disk into a
/// [`PipelineConfig`] — before the semantic validation [`PipelineConfig::build`]
/// performs. Loading happens ahead of the binary's `run`/`--validate`
/// entrypoints, so it gets its own error type rather than overloading
/// [`BuildError`]; [`crate::error::RunError`] folds both into the same exit
/// code.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Substitutes `${VAR}` and `${VAR:-default}` in `input` with values read
/// from the process environment, resolved before YAML deserialization. An
/// unset `${VAR}` with no default is left untouched — `serde_yaml` will
/// then fail on whatever's literally there, which surfaces as a normal
/// [`LoadError::Yaml`].
fn substitute_env_vars(input: &str) -> String {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").unwrap();
    pattern
        .replace_all(input, |caps: &regex::Captures| {
            let var = &caps[1];
            match std::env::var(var) {
                Ok(value) => value,
                Err(_) => caps
                    .get(3)
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_else(|| caps[0].to_owned()),
            }
        })
        .into_owned()
}

/// Parses a YAML document (after environment substitution) into a
/// [`PipelineConfig`]. Does not run [`PipelineConfig::build`] — callers
/// still need to validate the result before starting a pipeline.
pub fn load_from_str(yaml: &str) -> Result<PipelineConfig, LoadError> {
    let resolved = substitute_env_vars(yaml);
    Ok(serde_yaml::from_str(&resolved)?)
}

/// Reads and parses `path` into a [`PipelineConfig`].
pub async fn load_from_path(path: &Path) -> Result<PipelineConfig, LoadError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
    load_from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(name: &str) -> DestinationConfig {
        DestinationConfig {
            name: name.to_owned(),
            protocol: ProtocolConfig::Udp,
            host: "127.0.0.1".into(),
            port: 514,
            format: FormatConfig::Rfc3164,
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn builds_a_minimal_valid_config() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![destination("c")],
            transforms: vec![],
            filters: vec![FilterConfig {
                name: "catch-all".into(),
                destinations: vec!["c".into()],
                ..Default::default()
            }],
            service: ServiceConfig::default(),
        };
        let built = config.build().unwrap();
        assert_eq!(built.destinations.len(), 1);
    }

    #[test]
    fn unknown_destination_is_a_build_error() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![],
            transforms: vec![],
            filters: vec![FilterConfig {
                name: "r1".into(),
                destinations: vec!["ghost".into()],
                ..Default::default()
            }],
            service: ServiceConfig::default(),
        };
        assert!(matches!(
            config.build(),
            Err(BuildError::UnknownDestination { .. })
        ));
    }

    #[test]
    fn unknown_transform_is_a_build_error() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![destination("c")],
            transforms: vec![],
            filters: vec![FilterConfig {
                name: "r1".into(),
                destinations: vec!["c".into()],
                transforms: vec!["missing".into()],
                ..Default::default()
            }],
            service: ServiceConfig::default(),
        };
        assert!(matches!(
            config.build(),
            Err(BuildError::UnknownTransform { .. })
        ));
    }

    #[test]
    fn duplicate_destination_names_is_a_build_error() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![destination("c"), destination("c")],
            transforms: vec![],
            filters: vec![],
            service: ServiceConfig::default(),
        };
        assert!(matches!(
            config.build(),
            Err(BuildError::DuplicateName { kind: "destination", .. })
        ));
    }

    #[test]
    fn invalid_regex_in_filter_is_a_build_error() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![destination("c")],
            transforms: vec![],
            filters: vec![FilterConfig {
                name: "r1".into(),
                hostname_pattern: Some("(unclosed".into()),
                destinations: vec!["c".into()],
                ..Default::default()
            }],
            service: ServiceConfig::default(),
        };
        assert!(matches!(config.build(), Err(BuildError::InvalidRegex { .. })));
    }

    #[test]
    fn invalid_regex_in_mask_pattern_is_a_build_error() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![destination("c")],
            transforms: vec![TransformConfig {
                name: "bad".into(),
                mask_patterns: vec![PatternConfig {
                    pattern: "(unclosed".into(),
                    replacement: "x".into(),
                }],
                ..Default::default()
            }],
            filters: vec![],
            service: ServiceConfig::default(),
        };
        assert!(matches!(config.build(), Err(BuildError::InvalidRegex { .. })));
    }

    #[test]
    fn translate_backreferences_converts_backslash_groups_to_dollar_braces() {
        assert_eq!(translate_backreferences(r"\1=***"), "${1}=***");
        assert_eq!(
            translate_backreferences(r"\1-\2-\9"),
            "${1}-${2}-${9}"
        );
    }

    #[test]
    fn translate_backreferences_unescapes_literal_backslash() {
        assert_eq!(translate_backreferences(r"a\\b"), r"a\b");
    }

    #[test]
    fn translate_backreferences_escapes_literal_dollar() {
        assert_eq!(translate_backreferences("$100"), "$$100");
    }

    #[test]
    fn compile_pattern_translates_spec_style_backreferences() {
        let p = PatternConfig {
            pattern: r"(password)=\S+".into(),
            replacement: r"\1=***".into(),
        };
        let compiled = compile_pattern("test".into(), &p).unwrap();
        let out = compiled
            .pattern
            .replace_all("password=hunter2", compiled.replacement.as_str());
        assert_eq!(out, "password=***");
    }

    #[test]
    fn substitutes_a_set_environment_variable() {
        // SAFETY: single-threaded test, no other test reads this name.
        unsafe { std::env::set_var("SLUICE_TEST_HOST", "siem.example.com") };
        let out = substitute_env_vars("host: ${SLUICE_TEST_HOST}");
        unsafe { std::env::remove_var("SLUICE_TEST_HOST") };
        assert_eq!(out, "host: siem.example.com");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let out = substitute_env_vars("port: ${SLUICE_TEST_UNSET_PORT:-514}");
        assert_eq!(out, "port: 514");
    }

    #[test]
    fn leaves_unset_variable_without_default_untouched() {
        let out = substitute_env_vars("x: ${SLUICE_TEST_UNSET_NO_DEFAULT}");
        assert_eq!(out, "x: ${SLUICE_TEST_UNSET_NO_DEFAULT}");
    }

    #[test]
    fn load_from_str_parses_a_minimal_document() {
        let yaml = r#"
inputs:
  - name: in
    protocol: udp
    bind_addr: "0.0.0.0:514"
destinations:
  - name: out
    protocol: udp
    host: 127.0.0.1
    port: 9000
filters:
  - name: catch-all
    destinations: [out]
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.inputs.len(), 1);
        assert_eq!(config.destinations.len(), 1);
        assert!(config.build().is_ok());
    }
}
