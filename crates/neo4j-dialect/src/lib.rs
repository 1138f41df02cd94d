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

//! # Neo4j Dialect
//!
//! Exposes a Neo4j store to relational mapping hosts as a dialect.
//!
//! Connectivity is delegated to a driver resolved from a [`DriverRuntime`].
//! The dialect translates connection URLs, unwraps layered connections,
//! classifies lost connections and enumerates schemas, tables and columns.

pub mod config;
pub mod connection;
pub mod dialect;
pub mod driver;
pub mod dsn;
pub mod engine;
pub mod errors;
pub mod metadata;
pub mod registry;
pub mod runtime;
pub mod types;

// Re-export commonly used types
pub use config::DialectConfig;
pub use errors::{DialectError, DialectResult, DriverError, DriverErrorKind, DriverResult};

// Re-export traits
pub use dialect::Dialect;
pub use driver::{DatabaseMetadata, Driver, DriverConnection, ResultCursor};
pub use engine::Engine;
pub use runtime::DriverRuntime;

// Re-export concrete types
pub use connection::ConnectionLayer;
pub use dialect::Neo4jDialect;
pub use driver::{DriverValue, MemoryDriver, MemoryStore, Neo4jDriver};
pub use dsn::ConnectArgs;
pub use engine::{Connectable, DialectEngine};
pub use registry::{create_engine, DialectRegistry};
pub use runtime::NativeRuntime;
pub use types::{ColumnInfo, ColumnType, IsolationLevel};
