//! Identity and scope data types.

use serde::{Deserialize, Serialize};

/// An authenticated employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub employee_id: String,
    pub full_name: String,
    pub department: String,
    pub role: String,
}

impl Identity {
    pub fn new(
        employee_id: impl Into<String>,
        full_name: impl Into<String>,
        department: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            employee_id: employee_id.into(),
            full_name: full_name.into(),
            department: department.into(),
            role: role.into(),
        }
    }
}

/// Ordered, duplicate-free list of lower-cased department names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    pub fn new<I, S>(departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scopes: Vec<String> = Vec::new();
        for dept in departments {
            let dept = dept.as_ref().trim().to_lowercase();
            if !dept.is_empty() && !scopes.contains(&dept) {
                scopes.push(dept);
            }
        }
        Self(scopes)
    }

    pub fn contains(&self, department: &str) -> bool {
        self.0.iter().any(|d| d.eq_ignore_ascii_case(department))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for ScopeSet {
    fn from(departments: Vec<String>) -> Self {
        Self::new(departments)
    }
}

impl From<ScopeSet> for Vec<String> {
    fn from(scopes: ScopeSet) -> Self {
        scopes.0
    }
}

impl<'a> IntoIterator for &'a ScopeSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_set_lowercases_and_dedups_in_order() {
        let scopes = ScopeSet::new(["Finance", "general", "FINANCE", " hr "]);
        assert_eq!(scopes.as_slice(), &["finance", "general", "hr"]);
    }

    #[test]
    fn test_scope_set_serializes_as_list() {
        let scopes = ScopeSet::new(["marketing", "general"]);
        let json = serde_json::to_string(&scopes).unwrap();
        assert_eq!(json, r#"["marketing","general"]"#);

        let back: ScopeSet = serde_json::from_str(r#"["HR","hr","general"]"#).unwrap();
        assert_eq!(back.as_slice(), &["hr", "general"]);
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let scopes = ScopeSet::new(["engineering"]);
        assert!(scopes.contains("Engineering"));
        assert!(!scopes.contains("finance"));
    }
}
