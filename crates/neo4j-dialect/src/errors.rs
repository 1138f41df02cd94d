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

use thiserror::Error;

/// Base error type for dialect operations
#[derive(Debug, Error)]
pub enum DialectError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required connection option `{field}`. Make sure all parameters are properly escaped")]
    MissingOption { field: String },

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("The driver runtime must be started before connecting. Start it explicitly or set NEOJDBC_WARMUP")]
    RuntimeNotStarted,

    #[error("The `{class}` driver class was not located in the driver search path")]
    DriverNotFound { class: String },

    #[error("No dialect registered for `{name}`")]
    UnknownDialect { name: String },

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Connection chain ended before reaching a driver connection")]
    ConnectionUnavailable,

    #[error("Connection chain is deeper than {max} layers")]
    UnwrapDepthExceeded { max: usize },

    #[error("The store reported no schemas")]
    NoSchemas,

    #[error("Dialect has not been initialized with a connection")]
    NotInitialized,

    #[error("Invalid server version `{version}`")]
    InvalidVersion { version: String },
}

impl DialectError {
    pub fn config(message: impl Into<String>) -> Self {
        DialectError::Config {
            message: message.into(),
        }
    }
}

/// Error categories reported by drivers, following the usual database API split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    Interface,
    Database,
    Operational,
    Programming,
    Integrity,
    Data,
    NotSupported,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverErrorKind::Interface => "InterfaceError",
            DriverErrorKind::Database => "DatabaseError",
            DriverErrorKind::Operational => "OperationalError",
            DriverErrorKind::Programming => "ProgrammingError",
            DriverErrorKind::Integrity => "IntegrityError",
            DriverErrorKind::Data => "DataError",
            DriverErrorKind::NotSupported => "NotSupportedError",
        };
        f.write_str(name)
    }
}

/// Error raised by a driver implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Programming, message)
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Operational, message)
    }

    pub fn interface(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Interface, message)
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Data, message)
    }
}

impl From<neo4rs::Error> for DriverError {
    fn from(err: neo4rs::Error) -> Self {
        DriverError::new(DriverErrorKind::Database, err.to_string())
    }
}

/// Result type alias for dialect operations
pub type DialectResult<T> = Result<T, DialectError>;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display_names_category() {
        let err = DriverError::programming("cursor is closed");
        assert_eq!(err.to_string(), "ProgrammingError: cursor is closed");
    }

    #[test]
    fn test_missing_option_names_field() {
        let err = DialectError::MissingOption {
            field: "PWD".to_string(),
        };
        assert!(err.to_string().contains("`PWD`"));
    }

    #[test]
    fn test_driver_error_converts_unchanged() {
        let original = DriverError::operational("connection refused");
        let err: DialectError = original.clone().into();
        match err {
            DialectError::Driver(inner) => assert_eq!(inner, original),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
