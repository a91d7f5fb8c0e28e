//! Operation → role requirements.
//!
//! Static after startup. Operations without a rule are denied; operations on the
//! public allow-list skip authentication entirely.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::services::identity::types::{Identity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// At least one required role.
    Any,
    /// Every required role. An empty requirement admits any authenticated caller.
    All,
}

impl FromStr for MatchMode {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "all" => Ok(Self::All),
            _ => Err(PolicyParseError(format!("unknown match mode '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRule {
    pub operation: String,
    pub required_roles: BTreeSet<Role>,
    pub match_mode: MatchMode,
}

impl AuthorizationRule {
    pub fn any(operation: impl Into<String>, roles: &[&str]) -> Self {
        Self::build(operation, roles, MatchMode::Any)
    }

    pub fn all(operation: impl Into<String>, roles: &[&str]) -> Self {
        Self::build(operation, roles, MatchMode::All)
    }

    fn build(operation: impl Into<String>, roles: &[&str], match_mode: MatchMode) -> Self {
        Self {
            operation: operation.into(),
            required_roles: roles.iter().map(|r| Role::new(*r)).collect(),
            match_mode,
        }
    }

    pub fn admits(&self, identity: &Identity) -> bool {
        match self.match_mode {
            MatchMode::Any => self.required_roles.iter().any(|r| identity.has_role(r)),
            MatchMode::All => self.required_roles.iter().all(|r| identity.has_role(r)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyParseError(pub String);

impl fmt::Display for PolicyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid authorization policy: {}", self.0)
    }
}

impl std::error::Error for PolicyParseError {}

#[derive(Debug, Clone, Default)]
pub struct AuthorizationPolicy {
    public_operations: HashSet<String>,
    rules: HashMap<String, AuthorizationRule>,
}

impl AuthorizationPolicy {
    pub fn new(
        public_operations: impl IntoIterator<Item = String>,
        rules: impl IntoIterator<Item = AuthorizationRule>,
    ) -> Self {
        Self {
            public_operations: public_operations.into_iter().collect(),
            rules: rules
                .into_iter()
                .map(|r| (r.operation.clone(), r))
                .collect(),
        }
    }

    /// Rules for the catalogue/cart/checkout services of the fleet.
    pub fn fleet_default() -> Self {
        let shopper = &[Role::USER, Role::ADMIN];
        let admin = &[Role::ADMIN];

        Self::new(
            ["Login", "Register", "ValidateToken"].map(String::from),
            [
                AuthorizationRule::any("WhoAmI", shopper),
                AuthorizationRule::any("GetProduct", shopper),
                AuthorizationRule::any("ListProducts", shopper),
                AuthorizationRule::any("LookupProduct", shopper),
                AuthorizationRule::any("CheckStock", shopper),
                AuthorizationRule::any("GetCart", shopper),
                AuthorizationRule::any("AddItem", shopper),
                AuthorizationRule::any("RemoveItem", shopper),
                AuthorizationRule::any("GetCartSnapshot", shopper),
                AuthorizationRule::any("InitiateCheckout", shopper),
                AuthorizationRule::any("CreateProduct", admin),
                AuthorizationRule::any("UpdateProduct", admin),
                AuthorizationRule::any("DeleteProduct", admin),
                AuthorizationRule::any("AdjustInventory", admin),
            ],
        )
    }

    /// Parse `Op=any:ROLE,ROLE;Op2=all:ROLE` rule lists.
    pub fn parse_rules(input: &str) -> Result<Vec<AuthorizationRule>, PolicyParseError> {
        input
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (operation, requirement) = entry
                    .split_once('=')
                    .ok_or_else(|| PolicyParseError(format!("missing '=' in '{entry}'")))?;
                let (mode, roles) = requirement
                    .split_once(':')
                    .ok_or_else(|| PolicyParseError(format!("missing ':' in '{entry}'")))?;

                let operation = operation.trim();
                if operation.is_empty() {
                    return Err(PolicyParseError(format!("empty operation in '{entry}'")));
                }

                Ok(AuthorizationRule {
                    operation: operation.to_string(),
                    required_roles: roles
                        .split(',')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(Role::new)
                        .collect(),
                    match_mode: mode.parse()?,
                })
            })
            .collect()
    }

    pub fn is_public(&self, operation: &str) -> bool {
        self.public_operations.contains(operation)
    }

    pub fn rules(&self) -> impl Iterator<Item = &AuthorizationRule> {
        self.rules.values()
    }

    pub fn check(&self, identity: &Identity, operation: &str) -> Decision {
        match self.rules.get(operation) {
            Some(rule) if rule.admits(identity) => Decision::Allow,
            _ => Decision::Deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(roles: &[&str]) -> Identity {
        Identity {
            id: "1".into(),
            subject: "someone".into(),
            email: None,
            roles: roles.iter().map(|r| Role::new(*r)).collect(),
            active: true,
        }
    }

    #[test]
    fn any_rule_needs_one_matching_role() {
        let policy =
            AuthorizationPolicy::new([], [AuthorizationRule::any("DeleteProduct", &["ADMIN"])]);

        assert_eq!(policy.check(&identity(&["USER"]), "DeleteProduct"), Decision::Deny);
        assert_eq!(policy.check(&identity(&["ADMIN"]), "DeleteProduct"), Decision::Allow);
        assert_eq!(
            policy.check(&identity(&["USER", "ADMIN"]), "DeleteProduct"),
            Decision::Allow
        );
    }

    #[test]
    fn all_rule_needs_every_role() {
        let policy = AuthorizationPolicy::new(
            [],
            [AuthorizationRule::all("ExportLedger", &["ADMIN", "AUDITOR"])],
        );

        assert_eq!(policy.check(&identity(&["ADMIN"]), "ExportLedger"), Decision::Deny);
        assert_eq!(
            policy.check(&identity(&["ADMIN", "AUDITOR"]), "ExportLedger"),
            Decision::Allow
        );
    }

    #[test]
    fn operation_without_rule_is_denied() {
        let policy = AuthorizationPolicy::fleet_default();
        assert_eq!(policy.check(&identity(&["ADMIN"]), "DropDatabase"), Decision::Deny);
    }

    #[test]
    fn empty_any_rule_denies_and_empty_all_rule_admits() {
        let policy = AuthorizationPolicy::new(
            [],
            [
                AuthorizationRule::any("Nothing", &[]),
                AuthorizationRule::all("AnyCaller", &[]),
            ],
        );

        assert_eq!(policy.check(&identity(&["USER"]), "Nothing"), Decision::Deny);
        assert_eq!(policy.check(&identity(&["USER"]), "AnyCaller"), Decision::Allow);
    }

    #[test]
    fn fleet_default_allow_list() {
        let policy = AuthorizationPolicy::fleet_default();

        assert!(policy.is_public("Login"));
        assert!(policy.is_public("ValidateToken"));
        assert!(!policy.is_public("UpdateProduct"));
        assert!(!policy.is_public("login"));
    }

    #[test]
    fn parses_rule_lists() {
        let rules = AuthorizationPolicy::parse_rules(
            " DeleteProduct=any:ADMIN ; ExportLedger=ALL:ADMIN, AUDITOR;",
        )
        .unwrap();

        assert_eq!(
            rules,
            vec![
                AuthorizationRule::any("DeleteProduct", &["ADMIN"]),
                AuthorizationRule::all("ExportLedger", &["ADMIN", "AUDITOR"]),
            ]
        );
    }

    #[test]
    fn rejects_broken_rule_lists() {
        for bad in ["DeleteProduct", "DeleteProduct=ADMIN", "=any:ADMIN", "Op=some:ADMIN"] {
            assert!(AuthorizationPolicy::parse_rules(bad).is_err(), "{bad}");
        }
    }
}
