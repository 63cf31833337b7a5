//! Backend column catalogue and request validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use crate::protocol::ViewConfiguration;

/// Roles a column may play in an analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnMeta {
    #[serde(default)]
    pub label: String,
    #[serde(deserialize_with = "yes_no")]
    pub as_target: bool,
    #[serde(deserialize_with = "yes_no")]
    pub as_context: bool,
    #[serde(default)]
    pub reason: String,
}

// The backend spells these flags as "yes"/"no".
fn yes_no<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "y"),
    })
}

/// `GET /columns` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ColumnCatalog {
    pub columns: Vec<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, ColumnMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("must have at least one context column")]
    EmptyContext,
    #[error("target cannot be in context_cols")]
    TargetInContext,
    #[error("column {0:?} is not valid")]
    UnknownColumn(String),
    #[error("column {0:?} cannot be used as the target")]
    NotATarget(String),
    #[error("column {0:?} cannot be used as context")]
    NotAContext(String),
}

impl ColumnCatalog {
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn label<'a>(&'a self, column: &'a str) -> &'a str {
        self.meta
            .get(column)
            .map(|m| m.label.as_str())
            .filter(|l| !l.is_empty())
            .unwrap_or(column)
    }

    /// Columns allowed as the target, in catalogue order.
    pub fn targets(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.meta.get(*c).is_none_or(|m| m.as_target))
            .map(String::as_str)
            .collect()
    }

    /// Columns allowed as context, in catalogue order.
    pub fn contexts(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.meta.get(*c).is_none_or(|m| m.as_context))
            .map(String::as_str)
            .collect()
    }
}

impl ViewConfiguration {
    /// Checks the request the way the backend would, so the caller can gate
    /// the action instead of sending a request that is certain to fail.
    ///
    /// Columns without a catalogue entry are allowed in any role.
    pub fn validate(&self, catalog: &ColumnCatalog) -> Result<(), ConfigError> {
        if self.context_cols.is_empty() {
            return Err(ConfigError::EmptyContext);
        }
        if self.context_cols.iter().any(|c| c == &self.target) {
            return Err(ConfigError::TargetInContext);
        }
        if !catalog.contains(&self.target) {
            return Err(ConfigError::UnknownColumn(self.target.clone()));
        }
        if catalog.meta.get(&self.target).is_some_and(|m| !m.as_target) {
            return Err(ConfigError::NotATarget(self.target.clone()));
        }
        for col in &self.context_cols {
            if !catalog.contains(col) {
                return Err(ConfigError::UnknownColumn(col.clone()));
            }
            if catalog.meta.get(col).is_some_and(|m| !m.as_context) {
                return Err(ConfigError::NotAContext(col.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnCatalog, ConfigError};
    use crate::protocol::ViewConfiguration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn catalog() -> ColumnCatalog {
        serde_json::from_value(json!({
            "columns": ["clr", "bldgtype", "lc_type", "fips"],
            "meta": {
                "clr": {"label": "Color (clr)", "as_target": "yes", "as_context": "no", "reason": ""},
                "bldgtype": {"label": "Building Type", "as_target": "yes", "as_context": "yes", "reason": ""},
                "lc_type": {"label": "Land Cover", "as_target": "no", "as_context": "yes", "reason": ""},
                "fips": {"label": "County (FIPS)", "as_target": "no", "as_context": "yes", "reason": ""}
            }
        }))
        .expect("catalog")
    }

    #[test]
    fn roles_follow_yes_no_flags() {
        let c = catalog();
        assert_eq!(c.targets(), vec!["clr", "bldgtype"]);
        assert_eq!(c.contexts(), vec!["bldgtype", "lc_type", "fips"]);
        assert_eq!(c.label("lc_type"), "Land Cover");
        assert_eq!(c.label("unknown"), "unknown");
    }

    #[test]
    fn accepts_a_sensible_request() {
        let cfg = ViewConfiguration::new(vec!["lc_type".into(), "fips".into()], "clr");
        assert_eq!(cfg.validate(&catalog()), Ok(()));
    }

    #[test]
    fn rejects_what_the_backend_would_reject() {
        let c = catalog();
        let empty = ViewConfiguration::new(vec![], "clr");
        assert_eq!(empty.validate(&c), Err(ConfigError::EmptyContext));

        let overlap = ViewConfiguration::new(vec!["bldgtype".into()], "bldgtype");
        assert_eq!(overlap.validate(&c), Err(ConfigError::TargetInContext));

        let unknown = ViewConfiguration::new(vec!["zzz".into()], "clr");
        assert_eq!(
            unknown.validate(&c),
            Err(ConfigError::UnknownColumn("zzz".into()))
        );

        let bad_target = ViewConfiguration::new(vec!["fips".into()], "lc_type");
        assert_eq!(
            bad_target.validate(&c),
            Err(ConfigError::NotATarget("lc_type".into()))
        );

        let bad_context = ViewConfiguration::new(vec!["clr".into()], "bldgtype");
        assert_eq!(
            bad_context.validate(&c),
            Err(ConfigError::NotAContext("clr".into()))
        );
    }
}
