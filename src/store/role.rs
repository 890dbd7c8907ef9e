//! Managed configuration roles and file sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the fixed configuration files the control plane manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    #[serde(alias = "composeYaml")]
    Compose,
    #[serde(alias = "prometheusYaml")]
    Scraper,
    #[serde(alias = "collectorYaml")]
    Collector,
    #[serde(alias = "tempoYaml")]
    TraceBackend,
    #[serde(alias = "lokiYaml")]
    LogBackend,
    #[serde(alias = "alertRulesYaml")]
    AlertRules,
    GeneratedAlertRules,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Compose,
        Role::Scraper,
        Role::Collector,
        Role::TraceBackend,
        Role::LogBackend,
        Role::AlertRules,
        Role::GeneratedAlertRules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Compose => "compose",
            Role::Scraper => "scraper",
            Role::Collector => "collector",
            Role::TraceBackend => "traceBackend",
            Role::LogBackend => "logBackend",
            Role::AlertRules => "alertRules",
            Role::GeneratedAlertRules => "generatedAlertRules",
        }
    }

    pub fn from_name(name: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The complete set of managed files. Every role always has content;
/// a missing file is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFiles {
    pub compose: String,
    pub scraper: String,
    pub collector: String,
    pub trace_backend: String,
    pub log_backend: String,
    pub alert_rules: String,
    pub generated_alert_rules: String,
}

impl ConfigFiles {
    pub fn get(&self, role: Role) -> &str {
        match role {
            Role::Compose => &self.compose,
            Role::Scraper => &self.scraper,
            Role::Collector => &self.collector,
            Role::TraceBackend => &self.trace_backend,
            Role::LogBackend => &self.log_backend,
            Role::AlertRules => &self.alert_rules,
            Role::GeneratedAlertRules => &self.generated_alert_rules,
        }
    }

    pub fn set(&mut self, role: Role, content: String) {
        let slot = match role {
            Role::Compose => &mut self.compose,
            Role::Scraper => &mut self.scraper,
            Role::Collector => &mut self.collector,
            Role::TraceBackend => &mut self.trace_backend,
            Role::LogBackend => &mut self.log_backend,
            Role::AlertRules => &mut self.alert_rules,
            Role::GeneratedAlertRules => &mut self.generated_alert_rules,
        };
        *slot = content;
    }

    /// Roles whose text differs verbatim from `previous`.
    pub fn changed_roles(&self, previous: &ConfigFiles) -> ChangedRoles {
        let mut changed = ChangedRoles::default();
        for role in Role::ALL {
            if self.get(role) != previous.get(role) {
                changed.roles.push(role);
            }
        }
        changed
    }

    /// Overlay a partial set; roles absent from `partial` keep their current text.
    pub fn merged_with(&self, partial: &PartialConfigFiles) -> ConfigFiles {
        let mut merged = self.clone();
        for (role, content) in partial.iter() {
            merged.set(role, content.to_string());
        }
        merged
    }

    /// The full set as a partial set containing every role.
    pub fn to_partial(&self) -> PartialConfigFiles {
        let mut partial = PartialConfigFiles::default();
        for role in Role::ALL {
            partial.insert(role, self.get(role).to_string());
        }
        partial
    }
}

/// A subset of roles, used for writes and for restored snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialConfigFiles(BTreeMap<Role, String>);

impl PartialConfigFiles {
    pub fn insert(&mut self, role: Role, content: String) {
        self.0.insert(role, content);
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.0.get(&role).map(String::as_str)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains_key(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.0.iter().map(|(role, content)| (*role, content.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Role, String)> for PartialConfigFiles {
    fn from_iter<I: IntoIterator<Item = (Role, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-role changed flags for one apply attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedRoles {
    roles: Vec<Role>,
}

impl ChangedRoles {
    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.contains(*role))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
