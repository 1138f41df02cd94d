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

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::driver::DriverValue;

/// Portable column type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Boolean,
    Integer64,
    String,
    Binary,
    Float,
    Date,
    Time,
    Timestamp,
    /// Native type the dialect does not know
    Unknown,
}

/// Native type names reported by the driver and the tag each maps to
pub const NATIVE_TYPE_NAMES: &[(&str, ColumnType)] = &[
    ("BOOLEAN", ColumnType::Boolean),
    ("BIGINT", ColumnType::Integer64),
    ("LONGVARBINARY", ColumnType::Binary),
    ("VARCHAR", ColumnType::String),
    ("TIME", ColumnType::Time),
    ("TYPE_DATE", ColumnType::Date),
    ("DATE", ColumnType::Date),
    ("TIMESTAMP", ColumnType::Timestamp),
    ("DOUBLE", ColumnType::Float),
];

impl ColumnType {
    /// Look up a native type name; exact match only
    pub fn from_native(type_name: &str) -> Option<ColumnType> {
        NATIVE_TYPE_NAMES
            .iter()
            .find(|(name, _)| *name == type_name)
            .map(|(_, tag)| *tag)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Integer64 => "BIGINT",
            ColumnType::String => "VARCHAR",
            ColumnType::Binary => "BINARY",
            ColumnType::Float => "FLOAT",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Unknown => "NULL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKeyConstraint {
    pub constrained_columns: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    pub name: Option<String>,
    pub constrained_columns: Vec<String>,
    pub referred_schema: Option<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub column_names: Vec<String>,
    pub unique: bool,
}

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

/// Decode a binary column that may arrive as text or bytes
pub fn decode_binary(value: &DriverValue) -> Option<Vec<u8>> {
    match value {
        DriverValue::Null => None,
        DriverValue::String(s) => Some(s.as_bytes().to_vec()),
        DriverValue::Bytes(b) => Some(b.clone()),
        DriverValue::Boolean(b) => Some(vec![u8::from(*b)]),
        DriverValue::Integer(i) => Some(i.to_be_bytes().to_vec()),
        DriverValue::Float(f) => Some(f.to_be_bytes().to_vec()),
    }
}
