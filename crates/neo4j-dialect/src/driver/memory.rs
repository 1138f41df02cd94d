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

//! In-memory driver implementation
//!
//! Serves a fixed catalog and scripted statement results. Connections opened
//! against it are counted so callers can check that nothing leaks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    matches_pattern, row, DatabaseMetadata, Driver, DriverConnection, DriverValue, ResultCursor, Row,
    RowCursor,
};
use crate::errors::{DriverError, DriverResult};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: String,
    name: String,
    columns: Vec<(String, Option<String>)>,
}

/// Catalog contents served by a [`MemoryDriver`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    version: String,
    schemas: Vec<String>,
    tables: Vec<MemoryTable>,
    statements: HashMap<String, Vec<Row>>,
    connect_error: Option<DriverError>,
}

impl MemoryStore {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            schemas: Vec::new(),
            tables: Vec::new(),
            statements: HashMap::new(),
            connect_error: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        if !self.schemas.contains(&schema) {
            self.schemas.push(schema);
        }
        self
    }

    /// Add a table whose columns are `(name, native type name)` pairs
    pub fn with_table(mut self, schema: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        let columns = columns
            .iter()
            .map(|(name, type_name)| (name.to_string(), Some(type_name.to_string())))
            .collect();
        self = self.with_schema(schema);
        self.tables.push(MemoryTable {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
        });
        self
    }

    /// Add a column reported without a type name
    pub fn with_untyped_column(mut self, schema: &str, table: &str, column: &str) -> Self {
        if let Some(t) = self
            .tables
            .iter_mut()
            .find(|t| t.schema == schema && t.name == table)
        {
            t.columns.push((column.to_string(), None));
        }
        self
    }

    /// Script the rows returned for a statement
    pub fn with_statement(mut self, statement: impl Into<String>, rows: Vec<Row>) -> Self {
        self.statements.insert(statement.into(), rows);
        self
    }

    /// Make every connection attempt fail with `error`
    pub fn with_connect_error(mut self, error: DriverError) -> Self {
        self.connect_error = Some(error);
        self
    }
}

/// Counters shared by a driver and its connections
#[derive(Debug, Default)]
pub struct MemoryStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    metadata_calls: AtomicUsize,
}

impl MemoryStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.opened() - self.closed()
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

/// Driver serving a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    store: Arc<MemoryStore>,
    stats: Arc<MemoryStats>,
}

impl MemoryDriver {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store: Arc::new(store),
            stats: Arc::new(MemoryStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MemoryStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn connect(
        &self,
        _dsn: &str,
        _options: &HashMap<String, String>,
    ) -> DriverResult<Arc<dyn DriverConnection>> {
        if let Some(err) = &self.store.connect_error {
            return Err(err.clone());
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryConnection {
            store: self.store.clone(),
            stats: self.stats.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Connection to a [`MemoryStore`]
#[derive(Debug)]
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    stats: Arc<MemoryStats>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn check_open(&self) -> DriverResult<()> {
        if self.is_closed() {
            return Err(DriverError::programming("connection is closed"));
        }
        Ok(())
    }

    fn record_metadata_call(&self) -> DriverResult<()> {
        self.check_open()?;
        self.stats.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn matching_tables<'a>(
        &'a self,
        schema_pattern: Option<&'a str>,
        table_name_pattern: &'a str,
    ) -> impl Iterator<Item = &'a MemoryTable> + 'a {
        self.store.tables.iter().filter(move |t| {
            matches_pattern(schema_pattern, &t.schema)
                && matches_pattern(Some(table_name_pattern), &t.name)
        })
    }
}

#[async_trait]
impl DatabaseMetadata for MemoryConnection {
    async fn database_product_version(&self) -> DriverResult<String> {
        self.record_metadata_call()?;
        Ok(self.store.version.clone())
    }

    async fn get_schemas(&self) -> DriverResult<Box<dyn ResultCursor>> {
        self.record_metadata_call()?;
        let rows = self
            .store
            .schemas
            .iter()
            .map(|s| row([("TABLE_SCHEM", s.as_str())]))
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
        self.record_metadata_call()?;
        // Every memory table is of type TABLE
        if let Some(types) = types {
            if !types.iter().any(|t| t.eq_ignore_ascii_case("TABLE")) {
                return Ok(RowCursor::boxed(Vec::new()));
            }
        }
        let catalog = catalog.unwrap_or_default();
        let rows = self
            .matching_tables(schema_pattern, table_name_pattern)
            .map(|t| {
                row([
                    ("TABLE_CAT", catalog),
                    ("TABLE_SCHEM", t.schema.as_str()),
                    ("TABLE_NAME", t.name.as_str()),
                    ("TABLE_TYPE", "TABLE"),
                ])
            })
            .collect();
        Ok(RowCursor::boxed(rows))
    }

    async fn get_columns(
        &self,
        _catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: &str,
        column_name_pattern: &str,
    ) -> DriverResult<Box<dyn ResultCursor>> {
        self.record_metadata_call()?;
        let mut rows = Vec::new();
        for table in self.matching_tables(schema_pattern, table_name_pattern) {
            for (name, type_name) in &table.columns {
                if !matches_pattern(Some(column_name_pattern), name) {
                    continue;
                }
                let mut values = row([
                    ("TABLE_SCHEM", table.schema.as_str()),
                    ("TABLE_NAME", table.name.as_str()),
                    ("COLUMN_NAME", name.as_str()),
                ]);
                values.insert(
                    "TYPE_NAME".to_string(),
                    type_name.clone().map(Into::into).unwrap_or(DriverValue::Null),
                );
                rows.push(values);
            }
        }
        Ok(RowCursor::boxed(rows))
    }
}

#[async_trait]
impl DriverConnection for MemoryConnection {
    fn metadata(&self) -> &dyn DatabaseMetadata {
        self
    }

    async fn execute(&self, statement: &str) -> DriverResult<Box<dyn ResultCursor>> {
        self.check_open()?;
        match self.store.statements.get(statement) {
            Some(rows) => Ok(RowCursor::boxed(rows.clone())),
            None => Err(DriverError::programming(format!(
                "syntax error near `{}`",
                statement
            ))),
        }
    }

    async fn close(&self) -> DriverResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new("5.12.0")
            .with_table("Node", "Person", &[("name", "VARCHAR"), ("age", "BIGINT")])
            .with_table("Node", "Movie", &[("title", "VARCHAR")])
            .with_table("Relationship", "ACTED_IN", &[("roles", "VARCHAR")])
    }

    async fn drain(mut cursor: Box<dyn ResultCursor>, column: &str) -> Vec<String> {
        let mut out = Vec::new();
        while cursor.next().await.unwrap() {
            out.push(cursor.get_string(column).unwrap().unwrap_or_default());
        }
        out
    }

    #[tokio::test]
    async fn test_tables_filtered_by_schema_and_pattern() {
        let driver = MemoryDriver::new(store());
        let conn = driver.connect("", &HashMap::new()).await.unwrap();
        let meta = conn.metadata();

        let all = drain(meta.get_tables(None, Some("Node"), "%", None).await.unwrap(), "TABLE_NAME").await;
        assert_eq!(all, vec!["Person", "Movie"]);

        let one = drain(meta.get_tables(None, None, "ACTED_IN", None).await.unwrap(), "TABLE_NAME").await;
        assert_eq!(one, vec!["ACTED_IN"]);

        let views = vec!["VIEW".to_string()];
        let none = drain(meta.get_tables(None, None, "%", Some(&views)).await.unwrap(), "TABLE_NAME").await;
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_calls() {
        let driver = MemoryDriver::new(store());
        let conn = driver.connect("", &HashMap::new()).await.unwrap();
        conn.close().await.unwrap();
        conn.close().await.unwrap();

        let err = conn.metadata().get_schemas().await.err().unwrap();
        assert_eq!(err.message, "connection is closed");
        assert_eq!(driver.stats().opened(), 1);
        assert_eq!(driver.stats().closed(), 1);
    }

    #[tokio::test]
    async fn test_scripted_statement() {
        let driver = MemoryDriver::new(
            store().with_statement("MATCH (n) RETURN count(n) AS c", vec![row([("c", 3i64)])]),
        );
        let conn = driver.connect("", &HashMap::new()).await.unwrap();
        let mut cursor = conn.execute("MATCH (n) RETURN count(n) AS c").await.unwrap();
        assert!(cursor.next().await.unwrap());
        assert_eq!(cursor.get_value("c").unwrap(), DriverValue::Integer(3));

        assert!(conn.execute("MATCH").await.is_err());
    }
}
