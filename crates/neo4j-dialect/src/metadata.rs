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

//! Metadata introspection over driver cursors
//!
//! Every function drains the cursor it gets back before returning. Nothing is
//! cached; each call reflects what the driver reports right now.

use tracing::warn;

use crate::driver::{DatabaseMetadata, ResultCursor};
use crate::errors::{DialectError, DialectResult};
use crate::types::{ColumnInfo, ColumnType};

pub const TABLE_SCHEM: &str = "TABLE_SCHEM";
pub const TABLE_NAME: &str = "TABLE_NAME";
pub const COLUMN_NAME: &str = "COLUMN_NAME";
pub const TYPE_NAME: &str = "TYPE_NAME";

/// Matches every table or column name
pub const MATCH_ALL: &str = "%";

/// A column whose native type has no portable tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedColumn {
    pub column: String,
    pub type_name: Option<String>,
}

/// Columns of a table together with the ones that fell back to `Unknown`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnListing {
    pub columns: Vec<ColumnInfo>,
    pub unrecognized: Vec<UnrecognizedColumn>,
}

async fn collect_strings(mut cursor: Box<dyn ResultCursor>, column: &str) -> DialectResult<Vec<String>> {
    let mut values = Vec::new();
    while cursor.next().await? {
        if let Some(value) = cursor.get_string(column)? {
            values.push(value);
        }
    }
    Ok(values)
}

pub async fn list_schemas(metadata: &dyn DatabaseMetadata) -> DialectResult<Vec<String>> {
    let cursor = metadata.get_schemas().await?;
    collect_strings(cursor, TABLE_SCHEM).await
}

pub async fn list_tables(
    metadata: &dyn DatabaseMetadata,
    catalog: Option<&str>,
    schema: Option<&str>,
) -> DialectResult<Vec<String>> {
    let cursor = metadata.get_tables(catalog, schema, MATCH_ALL, None).await?;
    collect_strings(cursor, TABLE_NAME).await
}

/// List columns and report every native type the tag table does not know
pub async fn column_listing(
    metadata: &dyn DatabaseMetadata,
    catalog: Option<&str>,
    table: &str,
    schema: Option<&str>,
) -> DialectResult<ColumnListing> {
    let mut cursor = metadata
        .get_columns(catalog, schema, table, MATCH_ALL)
        .await?;

    let mut listing = ColumnListing::default();
    while cursor.next().await? {
        let Some(name) = cursor.get_string(COLUMN_NAME)? else {
            warn!("Skipping column without a name in table '{}'", table);
            continue;
        };
        let type_name = cursor.get_string(TYPE_NAME)?;

        let column_type = match type_name.as_deref().and_then(ColumnType::from_native) {
            Some(tag) => tag,
            None => {
                listing.unrecognized.push(UnrecognizedColumn {
                    column: name.clone(),
                    type_name,
                });
                ColumnType::Unknown
            }
        };
        listing.columns.push(ColumnInfo::new(name, column_type));
    }
    Ok(listing)
}

/// List columns; unrecognized types become `Unknown` with a warning each
pub async fn list_columns(
    metadata: &dyn DatabaseMetadata,
    catalog: Option<&str>,
    table: &str,
    schema: Option<&str>,
) -> DialectResult<Vec<ColumnInfo>> {
    let listing = column_listing(metadata, catalog, table, schema).await?;
    for unrecognized in &listing.unrecognized {
        warn!(
            "Did not recognize type '{}' of column '{}'",
            unrecognized.type_name.as_deref().unwrap_or_default(),
            unrecognized.column
        );
    }
    Ok(listing.columns)
}

pub async fn table_exists(
    metadata: &dyn DatabaseMetadata,
    catalog: Option<&str>,
    table: &str,
    schema: Option<&str>,
) -> DialectResult<bool> {
    // The driver treats the name as a pattern; only an exact name counts
    let mut cursor = metadata.get_tables(catalog, schema, table, None).await?;
    while cursor.next().await? {
        if cursor.get_string(TABLE_NAME)?.as_deref() == Some(table) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Split a dotted version string into its numeric components
pub fn parse_server_version(version: &str) -> DialectResult<Vec<u32>> {
    version
        .split('.')
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| DialectError::InvalidVersion {
            version: version.to_string(),
        })
}

/// First schema the store reports
pub fn first_schema(schemas: Vec<String>) -> DialectResult<String> {
    schemas.into_iter().next().ok_or(DialectError::NoSchemas)
}
