/*
Copyright 2024, Zep Software, Inc.

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Dialect discovery by name

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::config::DialectConfig;
use crate::dialect::{Dialect, Neo4jDialect, NEO4J_DIALECT_NAME};
use crate::engine::DialectEngine;
use crate::errors::{DialectError, DialectResult};
use crate::runtime::DriverRuntime;

/// Alias the dialect is also reachable under
pub const NEO4J_JDBC_DIALECT_NAME: &str = "neo4j+jdbc";

/// Builds a dialect from configuration and a runtime
pub type DialectFactory =
    fn(&DialectConfig, Arc<dyn DriverRuntime>) -> DialectResult<Arc<dyn Dialect>>;

fn neo4j_factory(
    config: &DialectConfig,
    runtime: Arc<dyn DriverRuntime>,
) -> DialectResult<Arc<dyn Dialect>> {
    Ok(Arc::new(Neo4jDialect::new(config.clone(), runtime.as_ref())?))
}

/// Dialects known to a host, keyed by URL scheme
#[derive(Debug, Clone, Default)]
pub struct DialectRegistry {
    factories: BTreeMap<String, DialectFactory>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Neo4j dialect under both of its names
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(NEO4J_DIALECT_NAME, neo4j_factory);
        registry.register(NEO4J_JDBC_DIALECT_NAME, neo4j_factory);
        registry
    }

    /// Register a factory; a later registration under the same name replaces it
    pub fn register(&mut self, name: impl Into<String>, factory: DialectFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn load(
        &self,
        name: &str,
        config: &DialectConfig,
        runtime: Arc<dyn DriverRuntime>,
    ) -> DialectResult<Arc<dyn Dialect>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| DialectError::UnknownDialect {
                name: name.to_string(),
            })?;
        debug!("Loading dialect '{}'", name);
        factory(config, runtime)
    }
}

/// Resolve the dialect named by the URL scheme and bind it to the URL
pub fn create_engine(
    registry: &DialectRegistry,
    url: &str,
    config: &DialectConfig,
    runtime: Arc<dyn DriverRuntime>,
) -> DialectResult<DialectEngine> {
    let parsed = Url::parse(url)?;
    let dialect = registry.load(parsed.scheme(), config, runtime)?;
    DialectEngine::new(dialect, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::engine::Engine;
    use crate::runtime::NativeRuntime;

    const TEST_CLASS: &str = "org.example.memory.Driver";

    fn started_runtime() -> Arc<dyn DriverRuntime> {
        let store = MemoryStore::new("5.12.0").with_schema("neo4j");
        let runtime = NativeRuntime::new().with_driver(TEST_CLASS, Arc::new(MemoryDriver::new(store)));
        runtime.start(None).unwrap();
        Arc::new(runtime)
    }

    fn config() -> DialectConfig {
        DialectConfig::default().with_driver_class(TEST_CLASS)
    }

    #[test]
    fn test_builtins_resolve_to_neo4j_dialect() {
        let registry = DialectRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["neo4j", "neo4j+jdbc"]);

        for name in ["neo4j", "neo4j+jdbc"] {
            let dialect = registry.load(name, &config(), started_runtime()).unwrap();
            assert_eq!(dialect.name(), NEO4J_DIALECT_NAME);
            assert_eq!(dialect.driver_class(), TEST_CLASS);
        }
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let registry = DialectRegistry::with_builtins();
        let err = create_engine(
            &registry,
            "postgres://db.local/app?PWD=x",
            &config(),
            started_runtime(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DialectError::UnknownDialect { name } if name == "postgres"));
    }

    #[test]
    fn test_invalid_url() {
        let registry = DialectRegistry::with_builtins();
        let err = create_engine(&registry, "not a url", &config(), started_runtime())
            .err()
            .unwrap();
        assert!(matches!(err, DialectError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_create_engine_connects() {
        let registry = DialectRegistry::with_builtins();
        let engine = create_engine(
            &registry,
            "neo4j+jdbc://db.local/neo4j?PWD=secret",
            &config(),
            started_runtime(),
        )
        .unwrap();

        assert_eq!(engine.connect_args().dsn, "jdbc:neo4j://db.local:7687/neo4j");
        let layer = engine.connect().await.unwrap();
        assert_eq!(engine.dialect().server_version_info().unwrap(), vec![5, 12, 0]);
        layer.close().await.unwrap();
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = DialectRegistry::new();
        assert!(!registry.contains("graph"));
        registry.register("graph", neo4j_factory);
        assert!(registry.contains("graph"));
        assert!(registry.load("neo4j", &config(), started_runtime()).is_err());
    }
}
