use serde::{Deserialize, Serialize};

/// A verified Google user, as returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    #[serde(default, rename = "hd")]
    pub domain: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub verified_email: bool,
}

impl Identity {
    /// Part of the email before `@`.
    pub fn local_part(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

/// A directory group the user belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Group {
    /// The group email followed by its aliases.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.email.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_userinfo_payload() {
        let identity: Identity = serde_json::from_str(
            r#"{"id":"1","email":"jane@a.com","verified_email":true,"given_name":"Jane","family_name":"Doe","hd":"a.com"}"#,
        )
        .unwrap();
        assert_eq!(identity.domain, "a.com");
        assert_eq!(identity.local_part(), "jane");
        assert!(identity.verified_email);
    }

    #[test]
    fn test_consumer_accounts_have_no_domain() {
        let identity: Identity =
            serde_json::from_str(r#"{"email":"jane@gmail.com","verified_email":true}"#).unwrap();
        assert_eq!(identity.domain, "");
    }

    #[test]
    fn test_group_identifiers_include_aliases() {
        let group = Group {
            email: "eng@a.com".to_string(),
            aliases: vec!["engineering@a.com".to_string()],
            ..Default::default()
        };
        let ids: Vec<&str> = group.identifiers().collect();
        assert_eq!(ids, vec!["eng@a.com", "engineering@a.com"]);
    }
}
