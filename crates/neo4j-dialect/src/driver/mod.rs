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

//! Driver abstraction layer
//!
//! The dialect never talks to a store directly. It resolves a [`Driver`] from
//! the runtime and forwards every call to the connections and metadata objects
//! that driver hands out. Two implementations ship with the crate: a native
//! Neo4j driver built on `neo4rs` and an in-memory driver.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{DriverError, DriverResult};
use crate::types::decode_binary;

pub mod memory;
pub mod neo4j;

pub use memory::{MemoryDriver, MemoryStore};
pub use neo4j::Neo4jDriver;

/// A single value read from a cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriverValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl From<&str> for DriverValue {
    fn from(value: &str) -> Self {
        DriverValue::String(value.to_string())
    }
}

impl From<String> for DriverValue {
    fn from(value: String) -> Self {
        DriverValue::String(value)
    }
}

impl From<i64> for DriverValue {
    fn from(value: i64) -> Self {
        DriverValue::Integer(value)
    }
}

impl From<bool> for DriverValue {
    fn from(value: bool) -> Self {
        DriverValue::Boolean(value)
    }
}

impl From<serde_json::Value> for DriverValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DriverValue::Null,
            serde_json::Value::Bool(b) => DriverValue::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => DriverValue::Integer(i),
                None => DriverValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => DriverValue::String(s),
            other => DriverValue::String(other.to_string()),
        }
    }
}

/// A materialized result row keyed by column label
pub type Row = HashMap<String, DriverValue>;

/// Forward-only cursor over a result set
#[async_trait]
pub trait ResultCursor: Send {
    /// Advance to the next row, returning false once the cursor is exhausted
    async fn next(&mut self) -> DriverResult<bool>;

    /// Read a column of the current row
    fn get_value(&self, column: &str) -> DriverResult<DriverValue>;

    /// Read a column of the current row as text; null reads as `None`
    fn get_string(&self, column: &str) -> DriverResult<Option<String>> {
        match self.get_value(column)? {
            DriverValue::Null => Ok(None),
            DriverValue::String(s) => Ok(Some(s)),
            DriverValue::Boolean(b) => Ok(Some(b.to_string())),
            DriverValue::Integer(i) => Ok(Some(i.to_string())),
            DriverValue::Float(f) => Ok(Some(f.to_string())),
            DriverValue::Bytes(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        }
    }

    /// Read a binary column of the current row; text arrives as its UTF-8 bytes
    fn get_bytes(&self, column: &str) -> DriverResult<Option<Vec<u8>>> {
        Ok(decode_binary(&self.get_value(column)?))
    }
}

/// Catalog queries exposed by a driver connection
///
/// Pattern arguments use `%` for any run of characters and `_` for a single
/// character. A `None` schema pattern matches every schema.
#[async_trait]
pub trait DatabaseMetadata: Send + Sync {
    async fn database_product_version(&self) -> DriverResult<String>;

    /// Rows carry `TABLE_SCHEM`
    async fn get_schemas(&self) -> DriverResult<Box<dyn ResultCursor>>;

    /// Rows carry `TABLE_CAT`, `TABLE_SCHEM`, `TABLE_NAME` and `TABLE_TYPE`
    async fn get_tables(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: &str,
        types: Option<&[String]>,
    ) -> DriverResult<Box<dyn ResultCursor>>;

    /// Rows carry `TABLE_SCHEM`, `TABLE_NAME`, `COLUMN_NAME` and `TYPE_NAME`
    async fn get_columns(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_name_pattern: &str,
        column_name_pattern: &str,
    ) -> DriverResult<Box<dyn ResultCursor>>;
}

/// A live connection handed out by a driver
#[async_trait]
pub trait DriverConnection: Send + Sync + Debug {
    fn metadata(&self) -> &dyn DatabaseMetadata;

    /// Run a statement verbatim
    async fn execute(&self, statement: &str) -> DriverResult<Box<dyn ResultCursor>>;

    async fn close(&self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}

/// Entry point of a driver implementation
#[async_trait]
pub trait Driver: Send + Sync {
    async fn connect(
        &self,
        dsn: &str,
        options: &HashMap<String, String>,
    ) -> DriverResult<Arc<dyn DriverConnection>>;
}

/// Cursor over rows that were already fetched
#[derive(Debug, Default)]
pub struct RowCursor {
    rows: VecDeque<Row>,
    current: Option<Row>,
}

impl RowCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into(),
            current: None,
        }
    }

    pub fn boxed(rows: Vec<Row>) -> Box<dyn ResultCursor> {
        Box::new(Self::new(rows))
    }
}

#[async_trait]
impl ResultCursor for RowCursor {
    async fn next(&mut self) -> DriverResult<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get_value(&self, column: &str) -> DriverResult<DriverValue> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DriverError::programming("cursor is not positioned on a row"))?;
        row.get(column)
            .cloned()
            .ok_or_else(|| DriverError::programming(format!("no such column: {}", column)))
    }
}

/// Build a row from `(column, value)` pairs
pub fn row<I, K, V>(values: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<DriverValue>,
{
    values.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Match a name against a metadata search pattern
pub fn matches_pattern(pattern: Option<&str>, name: &str) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // matched[j]: pattern[..i] matches name[..j]
    let mut matched = vec![false; name.len() + 1];
    matched[0] = true;
    for p in &pattern {
        let mut next = vec![false; name.len() + 1];
        match p {
            '%' => {
                let mut any = false;
                for j in 0..=name.len() {
                    any |= matched[j];
                    next[j] = any;
                }
            }
            '_' => {
                for j in 1..=name.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=name.len() {
                    next[j] = matched[j - 1] && name[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[name.len()]
}
