//! Parsing helpers shared by the config and role field tables.
//!
//! Requests arrive as loose JSON objects: durations may be integer seconds or
//! strings like `"33m"`, lists may be arrays or comma-separated strings.

use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// A request field that could not be accepted. Messages are shown to the
/// caller as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("{0} must be a string")]
    NotText(String),

    #[error("{0} cannot be negative")]
    Negative(String),

    #[error("{name} is not a valid duration: {reason}")]
    InvalidDuration { name: String, reason: String },

    #[error("{0} must be a list of strings")]
    NotAList(String),

    #[error("unknown config field {0}")]
    UnknownField(String),

    #[error("bound domain cannot be empty")]
    EmptyBoundDomain,

    #[error("ttl should be shorter than max_ttl")]
    TtlAboveMaxTtl,

    #[error("'period' of '{period}s' is greater than the backend's maximum lease TTL of '{max_ttl}s'")]
    PeriodTooLong { period: u64, max_ttl: u64 },
}

pub type FieldResult<T> = Result<T, FieldError>;

fn invalid_duration(name: &str, reason: impl ToString) -> FieldError {
    FieldError::InvalidDuration {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

pub fn parse_text(name: &str, value: &Value) -> FieldResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(FieldError::NotText(name.to_string())),
    }
}

/// Parses a duration into whole seconds.
pub fn parse_duration_seconds(name: &str, value: &Value) -> FieldResult<u64> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                Ok(secs)
            } else if n.as_i64().is_some_and(|v| v < 0)
                || n.as_f64().is_some_and(|v| v < 0.0)
            {
                Err(FieldError::Negative(name.to_string()))
            } else {
                n.as_f64()
                    .map(|v| v as u64)
                    .ok_or_else(|| invalid_duration(name, "number out of range"))
            }
        }
        Value::String(s) => parse_duration_str(name, s.trim()),
        _ => Err(invalid_duration(name, "expected seconds or a duration string")),
    }
}

fn parse_duration_str(name: &str, raw: &str) -> FieldResult<u64> {
    if raw.is_empty() {
        return Ok(0);
    }
    if raw.starts_with('-') {
        return Err(FieldError::Negative(name.to_string()));
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(raw)
        .map(|d: Duration| d.as_secs())
        .map_err(|e| invalid_duration(name, e))
}

/// Accepts a JSON array of strings or a single comma-separated string.
/// Entries are trimmed and empty entries dropped.
pub fn parse_string_list(name: &str, value: &Value) -> FieldResult<Vec<String>> {
    let raw: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(FieldError::NotAList(name.to_string())),
            })
            .collect::<FieldResult<_>>()?,
        _ => return Err(FieldError::NotAList(name.to_string())),
    };

    Ok(raw
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Normalises a policy list: lowercased, de-duplicated and sorted. A list
/// containing `root` collapses to just `root`.
pub fn sanitize_policies(policies: Vec<String>) -> Vec<String> {
    let set: BTreeSet<String> = policies
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if set.contains("root") {
        return vec!["root".to_string()];
    }
    set.into_iter().collect()
}

/// Set comparison used when deciding whether a renewal would change the
/// granted policies.
pub fn same_policies(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_durations_accept_seconds_and_human_strings() {
        assert_eq!(parse_duration_seconds("ttl", &json!(300)).unwrap(), 300);
        assert_eq!(parse_duration_seconds("ttl", &json!("300")).unwrap(), 300);
        assert_eq!(parse_duration_seconds("ttl", &json!("33m")).unwrap(), 1980);
        assert_eq!(parse_duration_seconds("ttl", &json!("1h 30m")).unwrap(), 5400);
        assert_eq!(parse_duration_seconds("ttl", &json!("")).unwrap(), 0);
    }

    #[test]
    fn test_negative_durations_are_rejected() {
        let err = parse_duration_seconds("max_ttl", &json!(-5)).unwrap_err();
        assert_eq!(err.to_string(), "max_ttl cannot be negative");
        let err = parse_duration_seconds("max_ttl", &json!("-5m")).unwrap_err();
        assert_eq!(err, FieldError::Negative("max_ttl".to_string()));
        assert!(matches!(
            parse_duration_seconds("ttl", &json!("soon")),
            Err(FieldError::InvalidDuration { .. })
        ));
        assert!(parse_duration_seconds("ttl", &json!([1])).is_err());
    }

    #[test]
    fn test_lists_accept_arrays_and_comma_strings() {
        assert_eq!(
            parse_string_list("allowed_domains", &json!("a.com, b.com,,")).unwrap(),
            vec!["a.com", "b.com"]
        );
        assert_eq!(
            parse_string_list("allowed_domains", &json!([" a.com ", ""])).unwrap(),
            vec!["a.com"]
        );
        assert!(parse_string_list("allowed_domains", &json!("")).unwrap().is_empty());
        assert!(parse_string_list("allowed_domains", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_policy_sanitizing() {
        let policies = vec![
            " Dev ".to_string(),
            "ops".to_string(),
            "dev".to_string(),
            String::new(),
        ];
        assert_eq!(sanitize_policies(policies), vec!["dev", "ops"]);
        assert_eq!(
            sanitize_policies(vec!["ops".to_string(), "ROOT".to_string()]),
            vec!["root"]
        );
    }

    #[test]
    fn test_policy_sets_ignore_order_and_duplicates() {
        let a = vec!["p1".to_string(), "p2".to_string()];
        let b = vec!["p2".to_string(), "p1".to_string(), "p1".to_string()];
        assert!(same_policies(&a, &b));
        assert!(!same_policies(&a, &["p1".to_string()]));
    }
}
