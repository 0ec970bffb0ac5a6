//! Role model - binds a hosted domain plus groups/emails to a policy set.

use super::fields::{
    parse_duration_seconds, parse_string_list, parse_text, sanitize_policies, FieldError,
    FieldResult,
};
use super::lease::LeaseLimits;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Stored under `role/<name>`. The bound domain is persisted as `domain`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    pub policies: Vec<String>,
    #[serde(rename = "domain", alias = "bound_domain")]
    pub bound_domain: String,
    pub bound_groups: Vec<String>,
    pub bound_emails: Vec<String>,
    pub ttl: u64,
    pub max_ttl: u64,
    pub period: u64,
}

impl Role {
    /// Returns a copy with the supplied request fields applied.
    pub fn apply(&self, fields: &Map<String, Value>) -> FieldResult<Role> {
        let mut role = self.clone();

        if let Some(raw) = fields.get("policies") {
            role.policies = sanitize_policies(parse_string_list("policies", raw)?);
        }
        if let Some(raw) = fields.get("bound_domain") {
            role.bound_domain = parse_text("bound_domain", raw)?.trim().to_string();
        }
        if let Some(raw) = fields.get("bound_groups") {
            role.bound_groups = parse_string_list("bound_groups", raw)?;
        }
        if let Some(raw) = fields.get("bound_emails") {
            role.bound_emails = parse_string_list("bound_emails", raw)?;
        }
        if let Some(raw) = fields.get("ttl") {
            role.ttl = parse_duration_seconds("ttl", raw)?;
        }
        if let Some(raw) = fields.get("max_ttl") {
            role.max_ttl = parse_duration_seconds("max_ttl", raw)?;
        }
        if let Some(raw) = fields.get("period") {
            role.period = parse_duration_seconds("period", raw)?;
        }

        Ok(role)
    }

    /// Checks the role before it is stored. Returns non-fatal warnings.
    pub fn validate(&self, limits: &LeaseLimits) -> FieldResult<Vec<String>> {
        let mut warnings = Vec::new();

        if self.bound_domain.is_empty() {
            return Err(FieldError::EmptyBoundDomain);
        }

        if self.ttl > limits.default_ttl {
            warnings.push(format!(
                "Given ttl of {} seconds greater than current mount/system default of {} seconds; ttl will be capped at login time",
                self.ttl, limits.default_ttl
            ));
        }
        if self.max_ttl > limits.max_ttl {
            warnings.push(format!(
                "Given max_ttl of {} seconds greater than current mount/system default of {} seconds; max_ttl will be capped at login time",
                self.max_ttl, limits.max_ttl
            ));
        }

        if self.max_ttl != 0 && self.max_ttl < self.ttl {
            return Err(FieldError::TtlAboveMaxTtl);
        }

        if self.period > limits.max_ttl {
            return Err(FieldError::PeriodTooLong {
                period: self.period,
                max_ttl: limits.max_ttl,
            });
        }

        Ok(warnings)
    }

    pub fn to_response(&self) -> Value {
        json!({
            "policies": self.policies,
            "bound_domain": self.bound_domain,
            "bound_groups": self.bound_groups,
            "bound_emails": self.bound_emails,
            "ttl": self.ttl,
            "max_ttl": self.max_ttl,
            "period": self.period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> LeaseLimits {
        LeaseLimits {
            default_ttl: 3600,
            max_ttl: 7200,
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_apply_parses_loose_input() {
        let role = Role::default()
            .apply(&fields(json!({
                "policies": "Dev,ops,dev",
                "bound_domain": "a.com",
                "bound_groups": ["g@a.com"],
                "ttl": "30m",
                "max_ttl": 3600,
            })))
            .unwrap();

        assert_eq!(role.policies, vec!["dev", "ops"]);
        assert_eq!(role.bound_domain, "a.com");
        assert_eq!(role.bound_groups, vec!["g@a.com"]);
        assert_eq!(role.ttl, 1800);
        assert_eq!(role.max_ttl, 3600);
        assert_eq!(role.period, 0);
    }

    #[test]
    fn test_update_keeps_unsupplied_fields() {
        let role = Role {
            policies: vec!["dev".to_string()],
            bound_domain: "a.com".to_string(),
            ttl: 60,
            ..Default::default()
        };
        let updated = role.apply(&fields(json!({ "ttl": 120 }))).unwrap();
        assert_eq!(updated.policies, vec!["dev"]);
        assert_eq!(updated.bound_domain, "a.com");
        assert_eq!(updated.ttl, 120);
    }

    #[test]
    fn test_validation_rules() {
        let empty = Role::default();
        assert_eq!(
            empty.validate(&limits()).unwrap_err(),
            FieldError::EmptyBoundDomain
        );

        let inverted = Role {
            bound_domain: "a.com".to_string(),
            ttl: 600,
            max_ttl: 60,
            ..Default::default()
        };
        assert_eq!(
            inverted.validate(&limits()).unwrap_err().to_string(),
            "ttl should be shorter than max_ttl"
        );

        let long_period = Role {
            bound_domain: "a.com".to_string(),
            period: 10_000,
            ..Default::default()
        };
        assert!(long_period
            .validate(&limits())
            .unwrap_err()
            .to_string()
            .contains("'period' of '10000s'"));
    }

    #[test]
    fn test_validation_warns_about_long_ttls() {
        let role = Role {
            bound_domain: "a.com".to_string(),
            ttl: 4000,
            max_ttl: 8000,
            ..Default::default()
        };
        let warnings = role.validate(&limits()).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Given ttl of 4000 seconds"));
    }

    #[test]
    fn test_bound_domain_is_stored_as_domain() {
        let role = Role {
            bound_domain: "a.com".to_string(),
            ..Default::default()
        };
        let stored = serde_json::to_value(&role).unwrap();
        assert_eq!(stored["domain"], "a.com");
        let back: Role = serde_json::from_value(stored).unwrap();
        assert_eq!(back, role);
    }
}
