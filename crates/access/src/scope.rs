//! Department scope resolution.
//!
//! Scopes are derived from a policy table rather than code branches: adding a
//! department is one entry in `access.policy`.

use std::collections::{HashMap, HashSet};

use roleflow_core::config::AccessConfig;

use crate::identity::{Identity, ScopeSet};

/// Maps an identity to the departments it may read.
///
/// `resolve` is total: unknown departments fall back to the default scopes.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    privileged_ids: HashSet<String>,
    privileged_scopes: ScopeSet,
    policy: HashMap<String, ScopeSet>,
    default_scopes: ScopeSet,
}

impl ScopeResolver {
    pub fn from_config(config: &AccessConfig) -> Self {
        let policy = config
            .policy
            .iter()
            .map(|(dept, scopes)| (dept.trim().to_lowercase(), ScopeSet::new(scopes)))
            .collect();

        Self {
            privileged_ids: config.privileged_ids.iter().cloned().collect(),
            privileged_scopes: ScopeSet::new(&config.privileged_scopes),
            policy,
            default_scopes: ScopeSet::new(&config.default_scopes),
        }
    }

    /// Privileged employee ids override the stated department.
    pub fn resolve(&self, identity: &Identity) -> ScopeSet {
        if self.privileged_ids.contains(&identity.employee_id) {
            return self.privileged_scopes.clone();
        }

        let department = identity.department.trim().to_lowercase();
        self.policy
            .get(&department)
            .unwrap_or(&self.default_scopes)
            .clone()
    }
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::from_config(&AccessConfig::default())
    }
}
