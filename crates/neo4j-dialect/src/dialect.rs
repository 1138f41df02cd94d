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

//! Dialect capability set consumed by mapping hosts

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::DialectConfig;
use crate::connection::{self, is_disconnect_error, ConnectionLayer};
use crate::driver::Driver;
use crate::dsn::{self, ConnectArgs};
use crate::engine::{Connectable, ScopedConnection};
use crate::errors::{DialectError, DialectResult, DriverError};
use crate::metadata;
use crate::runtime::{ensure_runtime_started, DriverRuntime};
use crate::types::{ColumnInfo, ForeignKeyInfo, IndexInfo, IsolationLevel, PrimaryKeyConstraint};

/// Name the Neo4j dialect is registered under
pub const NEO4J_DIALECT_NAME: &str = "neo4j";

/// Interface a mapping host uses to talk to a store
#[async_trait]
pub trait Dialect: Send + Sync {
    fn name(&self) -> &str;

    /// Class identifier of the driver this dialect resolved
    fn driver_class(&self) -> &str;

    /// The resolved driver module
    fn dbapi(&self) -> Arc<dyn Driver>;

    /// Translate a connection URL into driver arguments. Performs no I/O.
    fn create_connect_args(&self, url: &str) -> DialectResult<ConnectArgs>;

    async fn connect(&self, args: &ConnectArgs) -> DialectResult<ConnectionLayer>;

    /// Per-engine setup run on the first connection
    async fn initialize(&self, connection: &ConnectionLayer) -> DialectResult<()>;

    fn server_version_info(&self) -> DialectResult<Vec<u32>>;

    async fn get_schema_names(&self, target: Connectable<'_>) -> DialectResult<Vec<String>>;

    async fn get_table_names(
        &self,
        target: Connectable<'_>,
        schema: Option<&str>,
    ) -> DialectResult<Vec<String>>;

    async fn get_columns(
        &self,
        target: Connectable<'_>,
        table: &str,
        schema: Option<&str>,
    ) -> DialectResult<Vec<ColumnInfo>>;

    fn get_pk_constraint(&self, table: &str, schema: Option<&str>) -> PrimaryKeyConstraint;

    fn get_primary_keys(&self) -> Vec<String>;

    fn get_foreign_keys(&self, table: &str, schema: Option<&str>) -> Vec<ForeignKeyInfo>;

    fn get_indexes(&self, table: &str, schema: Option<&str>) -> Vec<IndexInfo>;

    async fn has_table(
        &self,
        connection: &ConnectionLayer,
        table: &str,
        schema: Option<&str>,
    ) -> DialectResult<bool>;

    fn get_isolation_level(&self, connection: &ConnectionLayer) -> IsolationLevel;

    fn is_disconnect(&self, error: &DriverError) -> bool;

    async fn do_rollback(&self, connection: &ConnectionLayer) -> DialectResult<()>;

    async fn default_schema_name(&self, target: Connectable<'_>) -> DialectResult<String>;
}

/// Neo4j dialect over the driver resolved from the runtime
pub struct Neo4jDialect {
    config: DialectConfig,
    driver: Arc<dyn Driver>,
    database: OnceLock<Option<String>>,
    server_version: OnceLock<String>,
}

impl fmt::Debug for Neo4jDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jDialect")
            .field("driver_class", &self.config.driver_class)
            .field("database", &self.database.get())
            .field("server_version", &self.server_version.get())
            .finish()
    }
}

impl Neo4jDialect {
    /// Start the runtime if allowed, then resolve the configured driver
    pub fn new(config: DialectConfig, runtime: &dyn DriverRuntime) -> DialectResult<Self> {
        ensure_runtime_started(runtime, &config)?;
        let driver = runtime.load_driver(&config.driver_class)?;
        debug!("Resolved driver {}", config.driver_class);

        Ok(Self {
            config,
            driver,
            database: OnceLock::new(),
            server_version: OnceLock::new(),
        })
    }

    /// Database taken from the first translated URL, used as the catalog filter
    pub fn database(&self) -> Option<&str> {
        self.database.get().and_then(|db| db.as_deref())
    }
}

#[async_trait]
impl Dialect for Neo4jDialect {
    fn name(&self) -> &str {
        NEO4J_DIALECT_NAME
    }

    fn driver_class(&self) -> &str {
        &self.config.driver_class
    }

    fn dbapi(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    fn create_connect_args(&self, url: &str) -> DialectResult<ConnectArgs> {
        let args = dsn::translate(url)?;
        // First URL wins; a dialect serves a single engine
        let _ = self.database.set(args.database.clone());
        Ok(args)
    }

    async fn connect(&self, args: &ConnectArgs) -> DialectResult<ConnectionLayer> {
        connection::open_connection(self.driver.as_ref(), args).await
    }

    async fn initialize(&self, connection: &ConnectionLayer) -> DialectResult<()> {
        if self.server_version.get().is_some() {
            return Ok(());
        }
        let handle = connection::unwrap_connection(connection)?.handle;
        let version = handle.metadata().database_product_version().await?;
        info!("Connected to Neo4j {}", version);
        let _ = self.server_version.set(version);
        Ok(())
    }

    fn server_version_info(&self) -> DialectResult<Vec<u32>> {
        let version = self.server_version.get().ok_or(DialectError::NotInitialized)?;
        metadata::parse_server_version(version)
    }

    async fn get_schema_names(&self, target: Connectable<'_>) -> DialectResult<Vec<String>> {
        let scoped = ScopedConnection::acquire(target).await?;
        let result = match scoped.handle() {
            Ok(handle) => metadata::list_schemas(handle.metadata()).await,
            Err(err) => Err(err),
        };
        scoped.finish(result).await
    }

    async fn get_table_names(
        &self,
        target: Connectable<'_>,
        schema: Option<&str>,
    ) -> DialectResult<Vec<String>> {
        let scoped = ScopedConnection::acquire(target).await?;
        let result = match scoped.handle() {
            Ok(handle) => metadata::list_tables(handle.metadata(), self.database(), schema).await,
            Err(err) => Err(err),
        };
        scoped.finish(result).await
    }

    async fn get_columns(
        &self,
        target: Connectable<'_>,
        table: &str,
        schema: Option<&str>,
    ) -> DialectResult<Vec<ColumnInfo>> {
        let scoped = ScopedConnection::acquire(target).await?;
        let result = match scoped.handle() {
            Ok(handle) => {
                metadata::list_columns(handle.metadata(), self.database(), table, schema).await
            }
            Err(err) => Err(err),
        };
        scoped.finish(result).await
    }

    fn get_pk_constraint(&self, _table: &str, _schema: Option<&str>) -> PrimaryKeyConstraint {
        PrimaryKeyConstraint::default()
    }

    fn get_primary_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn get_foreign_keys(&self, _table: &str, _schema: Option<&str>) -> Vec<ForeignKeyInfo> {
        Vec::new()
    }

    fn get_indexes(&self, _table: &str, _schema: Option<&str>) -> Vec<IndexInfo> {
        Vec::new()
    }

    async fn has_table(
        &self,
        connection: &ConnectionLayer,
        table: &str,
        schema: Option<&str>,
    ) -> DialectResult<bool> {
        let handle = connection::unwrap_connection(connection)?.handle;
        metadata::table_exists(handle.metadata(), self.database(), table, schema).await
    }

    fn get_isolation_level(&self, _connection: &ConnectionLayer) -> IsolationLevel {
        IsolationLevel::Serializable
    }

    fn is_disconnect(&self, error: &DriverError) -> bool {
        is_disconnect_error(error)
    }

    async fn do_rollback(&self, connection: &ConnectionLayer) -> DialectResult<()> {
        connection::rollback(connection).await
    }

    async fn default_schema_name(&self, target: Connectable<'_>) -> DialectResult<String> {
        let schemas = self.get_schema_names(target).await?;
        metadata::first_schema(schemas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::engine::DialectEngine;
    use crate::runtime::NativeRuntime;

    const URL: &str = "neo4j+jdbc://db.local:7687/neo4j?PWD=secret&UID=neo4j";
    const TEST_CLASS: &str = "org.example.memory.Driver";

    fn dialect_over(driver: MemoryDriver) -> Arc<Neo4jDialect> {
        let runtime = NativeRuntime::new().with_driver(TEST_CLASS, Arc::new(driver));
        runtime.start(None).unwrap();
        let config = DialectConfig::default().with_driver_class(TEST_CLASS);
        Arc::new(Neo4jDialect::new(config, &runtime).unwrap())
    }

    fn movies() -> MemoryStore {
        MemoryStore::new("5.12.0")
            .with_table("neo4j", "Person", &[("name", "VARCHAR"), ("born", "BIGINT")])
            .with_table("neo4j", "Movie", &[("title", "VARCHAR"), ("poster", "FROBNICATE")])
            .with_schema("system")
    }

    #[test]
    fn test_construction_requires_started_runtime() {
        let runtime = NativeRuntime::new();
        let err = Neo4jDialect::new(DialectConfig::default(), &runtime).unwrap_err();
        assert!(matches!(err, DialectError::RuntimeNotStarted));
    }

    #[test]
    fn test_construction_fails_for_missing_driver() {
        let runtime = NativeRuntime::new();
        let config = DialectConfig::default().with_auto_warmup(true);
        let err = Neo4jDialect::new(config, &runtime).unwrap_err();
        assert!(matches!(err, DialectError::DriverNotFound { .. }));
        assert!(runtime.is_running());
    }

    #[test]
    fn test_warmup_with_archive_classpath_resolves_driver() {
        let config = DialectConfig::from_vars(|key| match key {
            crate::config::WARMUP_ENV => Some("1".to_string()),
            crate::config::SEARCH_PATH_ENV => Some("/opt/drivers/Neo4jJDBC42.jar".to_string()),
            _ => None,
        });
        let runtime = NativeRuntime::new().with_driver(
            crate::config::NEO4J_DRIVER_CLASS,
            Arc::new(MemoryDriver::new(movies())),
        );

        let dialect = Neo4jDialect::new(config, &runtime).unwrap();
        assert_eq!(dialect.driver_class(), crate::config::NEO4J_DRIVER_CLASS);
        assert_eq!(
            runtime.search_path().unwrap(),
            &["/opt/drivers/Neo4jJDBC42.jar".to_string()]
        );
    }

    #[tokio::test]
    async fn test_connect_error_propagates_through_engine() {
        let store = movies().with_connect_error(DriverError::operational("connection refused"));
        let driver = MemoryDriver::new(store);
        let stats = driver.stats();
        let dialect = dialect_over(driver);
        let engine = DialectEngine::new(dialect.clone(), URL).unwrap();

        let err = crate::engine::Engine::connect(&engine).await.err().unwrap();
        assert!(matches!(
            err,
            DialectError::Driver(DriverError { kind: crate::errors::DriverErrorKind::Operational, .. })
        ));

        let err = dialect.get_schema_names(engine.connectable()).await.unwrap_err();
        assert!(!dialect.is_disconnect(match &err {
            DialectError::Driver(driver_err) => driver_err,
            other => panic!("unexpected error {other}"),
        }));
        assert!(matches!(dialect.server_version_info(), Err(DialectError::NotInitialized)));
        assert_eq!(stats.opened(), 0);
    }

    #[test]
    fn test_missing_password_fails_without_io() {
        let driver = MemoryDriver::new(movies());
        let stats = driver.stats();
        let dialect = dialect_over(driver);

        let err = dialect
            .create_connect_args("neo4j+jdbc://db.local:7687/neo4j?UID=neo4j")
            .unwrap_err();
        assert!(matches!(err, DialectError::MissingOption { .. }));
        assert_eq!(stats.opened(), 0);
    }

    #[tokio::test]
    async fn test_engine_walks_catalog_and_closes_connections() {
        let driver = MemoryDriver::new(movies());
        let stats = driver.stats();
        let dialect = dialect_over(driver);
        let engine = DialectEngine::new(dialect.clone(), URL).unwrap();

        let schemas = dialect.get_schema_names(engine.connectable()).await.unwrap();
        assert_eq!(schemas, vec!["neo4j", "system"]);

        let tables = dialect
            .get_table_names(engine.connectable(), Some("neo4j"))
            .await
            .unwrap();
        assert_eq!(tables, vec!["Person", "Movie"]);

        let columns = dialect
            .get_columns(engine.connectable(), "Movie", Some("neo4j"))
            .await
            .unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnInfo::new("title", crate::types::ColumnType::String),
                ColumnInfo::new("poster", crate::types::ColumnType::Unknown),
            ]
        );

        assert_eq!(stats.opened(), 3);
        assert_eq!(stats.open_connections(), 0);
        assert_eq!(dialect.database(), Some("neo4j"));
    }

    #[tokio::test]
    async fn test_server_version_cached_after_initialize() {
        let driver = MemoryDriver::new(movies());
        let stats = driver.stats();
        let dialect = dialect_over(driver);
        assert!(matches!(dialect.server_version_info(), Err(DialectError::NotInitialized)));

        let engine = DialectEngine::new(dialect.clone(), URL).unwrap();
        let first = crate::engine::Engine::connect(&engine).await.unwrap();
        let second = crate::engine::Engine::connect(&engine).await.unwrap();

        assert_eq!(dialect.server_version_info().unwrap(), vec![5, 12, 0]);
        // Version fetched once, on the first connection only
        assert_eq!(stats.metadata_calls(), 1);

        first.close().await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_has_table_uses_supplied_connection() {
        let driver = MemoryDriver::new(movies());
        let stats = driver.stats();
        let dialect = dialect_over(driver);
        let args = dialect.create_connect_args(URL).unwrap();
        let layer = dialect.connect(&args).await.unwrap().wrap().wrap();

        assert!(dialect.has_table(&layer, "Person", Some("neo4j")).await.unwrap());
        assert!(!dialect.has_table(&layer, "Studio", Some("neo4j")).await.unwrap());
        assert_eq!(stats.opened(), 1);

        let tables = dialect
            .get_table_names(Connectable::Connection(&layer), None)
            .await
            .unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(stats.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_default_schema_name() {
        let dialect = dialect_over(MemoryDriver::new(movies()));
        let engine = DialectEngine::new(dialect.clone(), URL).unwrap();
        assert_eq!(
            dialect.default_schema_name(engine.connectable()).await.unwrap(),
            "neo4j"
        );

        let empty = dialect_over(MemoryDriver::new(MemoryStore::new("5.12.0")));
        let engine = DialectEngine::new(empty.clone(), URL).unwrap();
        let err = empty.default_schema_name(engine.connectable()).await.unwrap_err();
        assert!(matches!(err, DialectError::NoSchemas));
    }

    #[tokio::test]
    async fn test_unsupported_metadata_is_empty_without_io() {
        let driver = MemoryDriver::new(movies());
        let stats = driver.stats();
        let dialect = dialect_over(driver);

        assert!(dialect.get_primary_keys().is_empty());
        assert!(dialect.get_foreign_keys("Person", Some("neo4j")).is_empty());
        assert!(dialect.get_indexes("Person", None).is_empty());
        assert_eq!(dialect.get_pk_constraint("Person", None), PrimaryKeyConstraint::default());
        assert_eq!(stats.opened(), 0);
        assert_eq!(stats.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn test_fixed_capabilities() {
        let dialect = dialect_over(MemoryDriver::new(movies()));
        let args = dialect.create_connect_args(URL).unwrap();
        let layer = dialect.connect(&args).await.unwrap();

        assert_eq!(dialect.get_isolation_level(&layer), IsolationLevel::Serializable);
        dialect.do_rollback(&layer).await.unwrap();
        assert!(dialect.is_disconnect(&DriverError::programming("connection is closed")));
        assert!(!dialect.is_disconnect(&DriverError::programming("syntax error")));
        assert_eq!(dialect.driver_class(), TEST_CLASS);
    }

    #[tokio::test]
    async fn test_closed_connection_error_is_a_disconnect() {
        let dialect = dialect_over(MemoryDriver::new(movies()));
        let args = dialect.create_connect_args(URL).unwrap();
        let layer = dialect.connect(&args).await.unwrap();
        layer.close().await.unwrap();

        let err = dialect
            .get_schema_names(Connectable::Connection(&layer))
            .await
            .unwrap_err();
        let DialectError::Driver(driver_err) = err else {
            panic!("expected a driver error");
        };
        assert!(dialect.is_disconnect(&driver_err));
    }
}
