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

//! Native Neo4j driver implementation
//!
//! Speaks Bolt through `neo4rs` and answers catalog queries with the built-in
//! schema procedures. Nodes are exposed under the `Node` schema with one table
//! per label; relationships under `Relationship` with one table per type.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    matches_pattern, row, DatabaseMetadata, Driver, DriverConnection, DriverValue, ResultCursor, Row,
    RowCursor,
};
use crate::errors::{DriverError, DriverResult};

pub const NODE_SCHEMA: &str = "Node";
pub const RELATIONSHIP_SCHEMA: &str = "Relationship";

const DSN_PREFIX: &str = "jdbc:";

const VERSION_QUERY: &str = "CALL dbms.components() YIELD versions RETURN versions[0] AS version";
const NODE_LABELS_QUERY: &str = "CALL db.labels() YIELD label RETURN label AS name ORDER BY name";
const RELATIONSHIP_TYPES_QUERY: &str =
    "CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType AS name ORDER BY name";
const NODE_PROPERTIES_QUERY: &str = "CALL db.schema.nodeTypeProperties() \
     YIELD nodeLabels, propertyName, propertyTypes \
     RETURN nodeLabels AS owners, propertyName AS property, propertyTypes AS types";
const RELATIONSHIP_PROPERTIES_QUERY: &str = "CALL db.schema.relTypeProperties() \
     YIELD relType, propertyName, propertyTypes \
     RETURN [substring(relType, 2, size(relType) - 3)] AS owners, propertyName AS property, propertyTypes AS types";

/// Bolt target resolved from a DSN and its options
#[derive(Debug, Clone, PartialEq)]
pub struct BoltTarget {
    pub uri: String,
    pub database: Option<String>,
}

/// Resolve `jdbc:neo4j://host:port[/database]` into a Bolt URI.
///
/// `StrictlyUseBoltScheme` selects a direct `bolt` connection instead of a
/// routed `neo4j` one and `SSL` adds the `+s` suffix.
pub fn resolve_dsn(dsn: &str, options: &HashMap<String, String>) -> DriverResult<BoltTarget> {
    let raw = dsn.strip_prefix(DSN_PREFIX).unwrap_or(dsn);
    let parsed = url::Url::parse(raw)
        .map_err(|e| DriverError::interface(format!("invalid DSN `{}`: {}", dsn, e)))?;

    if parsed.scheme() != "neo4j" {
        return Err(DriverError::interface(format!(
            "unsupported DSN scheme `{}`",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DriverError::interface(format!("DSN `{}` has no host", dsn)))?;
    let port = parsed
        .port()
        .ok_or_else(|| DriverError::interface(format!("DSN `{}` has no port", dsn)))?;

    let mut scheme = if flag(options, "StrictlyUseBoltScheme") {
        "bolt".to_string()
    } else {
        "neo4j".to_string()
    };
    if flag(options, "SSL") {
        scheme.push_str("+s");
    }

    let database = parsed
        .path()
        .trim_start_matches('/')
        .to_string();
    let database = if database.is_empty() { None } else { Some(database) };

    Ok(BoltTarget {
        uri: format!("{}://{}:{}", scheme, host, port),
        database,
    })
}

/// Case-insensitive option lookup
fn option<'a>(options: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn flag(options: &HashMap<String, String>, key: &str) -> bool {
    option(options, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Translate Cypher property types into the names the type table knows
pub fn native_type_name(property_types: &[String]) -> Option<String> {
    let [single] = property_types else {
        // No type or a mix of types
        return match property_types {
            [] => None,
            _ => Some("ANY".to_string()),
        };
    };
    let name = match single.as_str() {
        "String" => "VARCHAR",
        "Long" | "Integer" => "BIGINT",
        "Double" | "Float" => "DOUBLE",
        "Boolean" => "BOOLEAN",
        "Date" => "TYPE_DATE",
        "Time" | "LocalTime" => "TIME",
        "DateTime" | "LocalDateTime" => "TIMESTAMP",
        "ByteArray" => "LONGVARBINARY",
        other => return Some(other.to_ascii_uppercase()),
    };
    Some(name.to_string())
}

/// Driver connecting to Neo4j over Bolt
#[derive(Debug, Default, Clone)]
pub struct Neo4jDriver;

impl Neo4jDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for Neo4jDriver {
    async fn connect(
        &self,
        dsn: &str,
        options: &HashMap<String, String>,
    ) -> DriverResult<Arc<dyn DriverConnection>> {
        let target = resolve_dsn(dsn, options)?;
        let mut builder = ConfigBuilder::default().uri(target.uri.as_str());

        if let Some(user) = option(options, "UID") {
            builder = builder.user(user);
        }
        if let Some(password) = option(options, "PWD") {
            builder = builder.password(password);
        }
        if let Some(database) = &target.database {
            builder = builder.db(database.as_str());
        }
        if let Some(fetch_size) = option(options, "FetchSize") {
            match fetch_size.parse::<usize>() {
                Ok(size) => builder = builder.fetch_size(size),
                Err(_) => warn!("Ignoring invalid FetchSize option `{}`", fetch_size),
            }
        }

        debug!("Opening Bolt connection to {}", target.uri);
        let graph = Graph::connect(builder.build()?).await?;

        Ok(Arc::new(Neo4jConnection {
            graph: Mutex::new(Some(graph)),
            target,
        }))
    }
}

#[derive(Deserialize)]
struct VersionRow {
    version: String,
}

#[derive(Deserialize)]
struct NameRow {
    name: String,
}

#[derive(Deserialize)]
struct PropertyRow {
    owners: Vec<String>,
    property: Option<String>,
    types: Option<Vec<String>>,
}

/// Connection backed by a `neo4rs` graph handle
pub struct Neo4jConnection {
    /// `None` once closed
    graph: Mutex<Option<Graph>>,
    target: BoltTarget,
}

impl fmt::Debug for Neo4jConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jConnection")
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Neo4jConnection {
    fn lock_graph(&self) -> MutexGuard<'_, Option<Graph>> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> DriverResult<()> {
        if self.is_closed() {
            return Err(DriverError::programming("connection is closed"));
        }
        Ok(())
    }

    /// Clone of the graph handle for one query
    fn graph(&self) -> DriverResult<Graph> {
        self.lock_graph()
            .clone()
            .ok_or_else(|| DriverError::programming("connection is closed"))
    }

    async fn fetch<T: DeserializeOwned>(&self, statement: &str) -> DriverResult<Vec<T>> {
        let graph = self.graph()?;
        let mut stream = graph.execute(query(statement)).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row.to::<T>().map_err(|e| DriverError::data(e.to_string()))?);
        }
        Ok(rows)
    }

    fn schemas_matching(pattern: Option<&str>) -> impl Iterator<Item = &'static str> + '_ {
        [NODE_SCHEMA, RELATIONSHIP_SCHEMA]
            .into_iter()
            .filter(move |s| matches_pattern(pattern, s))
    }
}

#[async_trait]
impl DatabaseMetadata for Neo4jConnection {
    async fn database_product_version(&self) -> DriverResult<String> {
        let rows: Vec<VersionRow> = self.fetch(VERSION_QUERY).await?;
        rows.into_iter()
            .next()
            .map(|r| r.version)
            .ok_or_else(|| DriverError::operational("server reported no version"))
    }

    async fn get_schemas(&self) -> DriverResult<Box<dyn ResultCursor>> {
        self.check_open()?;
        let rows = Self::schemas_matching(None)
            .map(|s| row([("TABLE_SCHEM", s)]))
            .collect();
        Ok(RowCursor::boxed(rows))
    }

    async fn get_tables(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: &str,
        types: Option<&[String]>,
    ) -> DriverResult<Box<dyn ResultCursor>> {
        if let Some(types) = types {
            if !types.iter().any(|t| t.eq_ignore_ascii_case("TABLE")) {
                return Ok(RowCursor::boxed(Vec::new()));
            }
        }
        let catalog = catalog
            .or(self.target.database.as_deref())
            .unwrap_or_default()
            .to_string();

        let mut rows = Vec::new();
        for schema in Self::schemas_matching(schema_pattern) {
            let statement = if schema == NODE_SCHEMA {
                NODE_LABELS_QUERY
            } else {
                RELATIONSHIP_TYPES_QUERY
            };
            let names: Vec<NameRow> = self.fetch(statement).await?;
            for name in names {
                if matches_pattern(Some(table_name_pattern), &name.name) {
                    rows.push(row([
                        ("TABLE_CAT", catalog.clone()),
                        ("TABLE_SCHEM", schema.to_string()),
                        ("TABLE_NAME", name.name),
                        ("TABLE_TYPE", "TABLE".to_string()),
                    ]));
                }
            }
        }
        Ok(RowCursor::boxed(rows))
    }

    async fn get_columns(
        &self,
        _catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: &str,
        column_name_pattern: &str,
    ) -> DriverResult<Box<dyn ResultCursor>> {
        let mut rows: Vec<Row> = Vec::new();
        for schema in Self::schemas_matching(schema_pattern) {
            let statement = if schema == NODE_SCHEMA {
                NODE_PROPERTIES_QUERY
            } else {
                RELATIONSHIP_PROPERTIES_QUERY
            };
            let properties: Vec<PropertyRow> = self.fetch(statement).await?;

            // One row per label combination; keep the first sighting per table
            let mut seen = HashSet::new();
            for prop in properties {
                let Some(column) = prop.property else {
                    continue;
                };
                if !matches_pattern(Some(column_name_pattern), &column) {
                    continue;
                }
                for owner in &prop.owners {
                    if !matches_pattern(Some(table_name_pattern), owner) {
                        continue;
                    }
                    if !seen.insert((owner.clone(), column.clone())) {
                        continue;
                    }
                    let type_name = native_type_name(prop.types.as_deref().unwrap_or_default());
                    let mut values = row([
                        ("TABLE_SCHEM", schema.to_string()),
                        ("TABLE_NAME", owner.clone()),
                        ("COLUMN_NAME", column.clone()),
                    ]);
                    values.insert(
                        "TYPE_NAME".to_string(),
                        type_name.map(DriverValue::String).unwrap_or(DriverValue::Null),
                    );
                    rows.push(values);
                }
            }
        }
        Ok(RowCursor::boxed(rows))
    }
}

#[async_trait]
impl DriverConnection for Neo4jConnection {
    fn metadata(&self) -> &dyn DatabaseMetadata {
        self
    }

    async fn execute(&self, statement: &str) -> DriverResult<Box<dyn ResultCursor>> {
        let rows: Vec<HashMap<String, serde_json::Value>> = self.fetch(statement).await?;
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|(k, v)| (k, DriverValue::from(v))).collect())
            .collect();
        Ok(RowCursor::boxed(rows))
    }

    async fn close(&self) -> DriverResult<()> {
        // Dropping the handle releases its pool once in-flight queries finish
        let graph = self.lock_graph().take();
        if graph.is_some() {
            debug!("Closed Bolt connection to {}", self.target.uri);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock_graph().is_none()
    }
}
