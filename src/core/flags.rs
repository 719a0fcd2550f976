// src/core/flags.rs

//! The feature flag data model: names, declared properties, and the migration
//! callback contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A feature flag name. Unique across every application declaring flags on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

/// Lifecycle event a migration callback is invoked with. Only `Enable` exists today;
/// disabling an enabled flag is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationEvent {
    Enable,
}

/// A side-effecting callback tied to a flag, executed exactly once per node per
/// enable. Implementations run under a supervised `tokio::spawn`, so a panic inside
/// `run` is caught and translated into `FfcError::MigrationCrash` rather than
/// bringing down the coordinator.
#[async_trait]
pub trait Migration: Send + Sync {
    async fn run(&self, event: MigrationEvent) -> Result<(), String>;
}

/// Declared properties of a feature flag, as reported by an `AppCatalog`.
#[derive(Clone)]
pub struct FeatureFlag {
    pub desc: String,
    pub depends_on: Vec<Name>,
    pub migration: Option<std::sync::Arc<dyn Migration>>,
    pub stability: String,
}

impl fmt::Debug for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureFlag")
            .field("desc", &self.desc)
            .field("depends_on", &self.depends_on)
            .field("migration", &self.migration.is_some())
            .field("stability", &self.stability)
            .finish()
    }
}

impl FeatureFlag {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            depends_on: Vec::new(),
            migration: None,
            stability: "stable".to_string(),
        }
    }

    pub fn with_depends_on(mut self, names: impl IntoIterator<Item = Name>) -> Self {
        self.depends_on = names.into_iter().collect();
        self
    }

    pub fn with_migration(mut self, migration: std::sync::Arc<dyn Migration>) -> Self {
        self.migration = Some(migration);
        self
    }
}

/// Which subset of the registry's flags a `list` call should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ListFilter {
    All,
    Enabled,
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn list_filter_round_trips_through_its_lowercase_string_form() {
        assert_eq!(ListFilter::from_str("enabled").unwrap(), ListFilter::Enabled);
        assert_eq!(ListFilter::Disabled.to_string(), "disabled");
    }
}
