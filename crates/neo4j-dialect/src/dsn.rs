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

//! Connection URL translation
//!
//! Turns `neo4j+jdbc://host:port/database?PWD=...&UID=...` into the driver's
//! native DSN plus its option map. Query parameters are handed to the driver
//! as a map instead of being written back into the DSN so values containing
//! `#`, `&` or `%` reach it exactly as the caller wrote them.

use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::config::DEFAULT_DRIVER_ARGS;
use crate::errors::{DialectError, DialectResult};

/// Scheme of the native DSN
pub const DSN_SCHEME: &str = "jdbc:neo4j";

/// Bolt port used when the URL carries none
pub const DEFAULT_PORT: u16 = 7687;

/// Option carrying the password
pub const PASSWORD_OPTION: &str = "PWD";

/// Option carrying the user name
pub const USER_OPTION: &str = "UID";

/// Arguments for a single connection attempt
#[derive(Clone, PartialEq)]
pub struct ConnectArgs {
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: String,
    pub dsn: String,
    pub options: HashMap<String, String>,
}

impl ConnectArgs {
    /// Fill in the documented driver defaults for keys the URL does not set
    pub fn with_default_driver_args(mut self) -> Self {
        for (key, value) in DEFAULT_DRIVER_ARGS {
            self.options
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        self
    }
}

impl fmt::Debug for ConnectArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options: HashMap<&str, &str> = self
            .options
            .iter()
            .map(|(k, v)| {
                let v = if k == PASSWORD_OPTION { "***" } else { v.as_str() };
                (k.as_str(), v)
            })
            .collect();
        f.debug_struct("ConnectArgs")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dsn", &self.dsn)
            .field("options", &options)
            .finish()
    }
}

/// Build the native DSN; the database segment is left out when absent
pub fn native_dsn(host: &str, port: u16, database: Option<&str>) -> String {
    match database {
        Some(db) => format!("{}://{}:{}/{}", DSN_SCHEME, host, port, db),
        None => format!("{}://{}:{}", DSN_SCHEME, host, port),
    }
}

/// Parse and translate a connection URL
pub fn translate(url: &str) -> DialectResult<ConnectArgs> {
    let parsed = Url::parse(url)?;
    translate_url(&parsed)
}

/// Translate an already parsed connection URL
pub fn translate_url(url: &Url) -> DialectResult<ConnectArgs> {
    // Duplicate keys keep the last value
    let options: HashMap<String, String> = url.query_pairs().into_owned().collect();

    let password = options
        .get(PASSWORD_OPTION)
        .cloned()
        .ok_or_else(|| DialectError::MissingOption {
            field: PASSWORD_OPTION.to_string(),
        })?;

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DialectError::config("connection URL has no host"))?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);

    let database = decode(url.path().trim_start_matches('/'))?;
    let database = if database.is_empty() { None } else { Some(database) };

    let user = match options.get(USER_OPTION) {
        Some(uid) => Some(uid.clone()),
        None if !url.username().is_empty() => Some(decode(url.username())?),
        None => None,
    };

    let dsn = native_dsn(&host, port, database.as_deref());

    Ok(ConnectArgs {
        host,
        port,
        database,
        user,
        password,
        dsn,
        options,
    })
}

fn decode(value: &str) -> DialectResult<String> {
    urlencoding::decode(value)
        .map(|s| s.into_owned())
        .map_err(|e| DialectError::config(format!("invalid percent-encoding in `{}`: {}", value, e)))
}
