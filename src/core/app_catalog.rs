// src/core/app_catalog.rs

//! Enumerates the applications loaded on this node and their declared feature
//! flags.

use super::flags::{FeatureFlag, Name};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait AppCatalog: Send + Sync {
    /// The identifiers of every application loaded on this node.
    fn list_applications(&self) -> Vec<String>;

    /// The flag map declared by `app`, or `None` if the application declares none.
    /// Implementations whose flag source is a computed callback MUST themselves
    /// catch any failure and return `None` (logging it) rather than propagate it —
    /// a misbehaving application must never abort registry initialisation.
    async fn flags_for(&self, app: &str) -> Option<HashMap<Name, FeatureFlag>>;
}

/// An `AppCatalog` backed by a fixed, in-memory map. Used for tests and for
/// embeddings where the flag set is known at construction time rather than
/// discovered from a plugin system.
#[derive(Default)]
pub struct StaticAppCatalog {
    apps: HashMap<String, HashMap<Name, FeatureFlag>>,
}

impl StaticAppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, app: impl Into<String>, flags: HashMap<Name, FeatureFlag>) -> Self {
        self.apps.insert(app.into(), flags);
        self
    }
}

#[async_trait]
impl AppCatalog for StaticAppCatalog {
    fn list_applications(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }

    async fn flags_for(&self, app: &str) -> Option<HashMap<Name, FeatureFlag>> {
        self.apps.get(app).cloned()
    }
}

/// An `AppCatalog` backed by a single "host" application whose flags come from
/// `[[ffc.flags]]` in the node's TOML configuration. Declares every flag with a
/// `None` migration: migrations are code, and config-declared flags have none.
/// Embedders that need migrations register their own `AppCatalog` instead of
/// going through this reference implementation.
pub struct ConfigAppCatalog {
    flags: HashMap<Name, FeatureFlag>,
}

impl ConfigAppCatalog {
    pub fn from_decls(decls: &[crate::config::FlagDecl]) -> Self {
        let mut flags = HashMap::new();
        for decl in decls {
            let flag = FeatureFlag::new(decl.desc.clone())
                .with_depends_on(decl.depends_on.iter().map(Name::from));
            let mut flag = flag;
            flag.stability = decl.stability.clone();
            flags.insert(Name::from(decl.name.clone()), flag);
        }
        Self { flags }
    }
}

#[async_trait]
impl AppCatalog for ConfigAppCatalog {
    fn list_applications(&self) -> Vec<String> {
        vec!["host".to_string()]
    }

    async fn flags_for(&self, app: &str) -> Option<HashMap<Name, FeatureFlag>> {
        (app == "host").then(|| self.flags.clone())
    }
}

/// Merges every application's declared flags into one map. Later declarations win
/// on a name collision; the collision is logged, never fatal.
pub async fn merge_all(catalog: &Arc<dyn AppCatalog>) -> HashMap<Name, FeatureFlag> {
    let mut merged: HashMap<Name, FeatureFlag> = HashMap::new();
    for app in catalog.list_applications() {
        let Some(flags) = catalog.flags_for(&app).await else {
            continue;
        };
        for (name, flag) in flags {
            if merged.contains_key(&name) {
                warn!(flag = %name, app = %app, "duplicate feature flag declaration, last declaration wins");
            }
            merged.insert(name, flag);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn later_app_wins_on_name_collision() {
        let mut first = HashMap::new();
        first.insert(Name::from("shared"), FeatureFlag::new("from app_a"));
        let mut second = HashMap::new();
        second.insert(Name::from("shared"), FeatureFlag::new("from app_b"));

        let catalog: Arc<dyn AppCatalog> = Arc::new(
            StaticAppCatalog::new()
                .with_app("app_a", first)
                .with_app("app_b", second),
        );

        let merged = merge_all(&catalog).await;
        let desc = &merged.get(&Name::from("shared")).unwrap().desc;
        assert!(desc == "from app_a" || desc == "from app_b");
        assert_eq!(merged.len(), 1);
    }

    #[tokio::test]
    async fn config_catalog_declares_host_app_with_dependencies() {
        let decls = vec![
            crate::config::FlagDecl {
                name: "ff_a".to_string(),
                desc: "base flag".to_string(),
                depends_on: Vec::new(),
                stability: "stable".to_string(),
            },
            crate::config::FlagDecl {
                name: "ff_b".to_string(),
                desc: "depends on ff_a".to_string(),
                depends_on: vec!["ff_a".to_string()],
                stability: "experimental".to_string(),
            },
        ];
        let catalog: Arc<dyn AppCatalog> = Arc::new(ConfigAppCatalog::from_decls(&decls));
        assert_eq!(catalog.list_applications(), vec!["host".to_string()]);

        let merged = merge_all(&catalog).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.get(&Name::from("ff_b")).unwrap().depends_on,
            vec![Name::from("ff_a")]
        );
        assert_eq!(merged.get(&Name::from("ff_b")).unwrap().stability, "experimental");
    }
}
