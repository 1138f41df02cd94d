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

//! Dialect configuration types

use std::env;

use serde::{Deserialize, Serialize};

/// Environment variable enabling automatic runtime start
pub const WARMUP_ENV: &str = "NEOJDBC_WARMUP";

/// Environment variable supplying the default driver search path
pub const SEARCH_PATH_ENV: &str = "CLASSPATH";

/// Driver class the Neo4j dialect resolves from the runtime
pub const NEO4J_DRIVER_CLASS: &str = "com.simba.neo4j.jdbc.Driver";

/// Documented defaults of the native driver options.
///
/// These are never merged into a connection implicitly; see
/// [`ConnectArgs::with_default_driver_args`](crate::dsn::ConnectArgs::with_default_driver_args).
pub const DEFAULT_DRIVER_ARGS: &[(&str, &str)] = &[
    ("AssumeUTC", "false"),
    ("Auth_Type", "Basic"),
    ("ConnectionTimeoutMS", "5000"),
    ("DefaultBinaryColumnLength", "32767"),
    ("DefaultStringColumnLength", "255"),
    ("EnableJavaDriverLogging", "false"),
    ("FetchSize", "1000"),
    ("LabelSeparator", "__"),
    ("LogLevel", "0"),
    // One node sampled for every N nodes when scanning the store
    ("LabelsSampleSize", "100"),
    ("MaxIdentifierLen", "4096"),
    ("RelNodeSeparator", "_"),
    ("RelsSampleSize", "100"),
    ("SSL", "false"),
    ("sslTrustStrategy", "TRUST_SYSTEM_CA_SIGNED_CERTIFICATES"),
    ("sslVerifyHostname", "true"),
    ("StrictlyUseBoltScheme", "false"),
];

/// Dialect configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialectConfig {
    /// Driver class looked up in the runtime at dialect construction
    pub driver_class: String,
    /// Start the runtime automatically when it is not running yet
    pub auto_warmup: bool,
    /// Driver search path used when the runtime has to be started
    pub search_path: Option<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            driver_class: NEO4J_DRIVER_CLASS.to_string(),
            auto_warmup: false,
            search_path: None,
        }
    }
}

impl DialectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment, reading a `.env` file if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Any non-empty value enables warm-up, including "0" and "false"
        let auto_warmup = lookup(WARMUP_ENV).map(|v| !v.is_empty()).unwrap_or(false);
        let search_path = lookup(SEARCH_PATH_ENV).filter(|v| !v.is_empty());

        Self {
            auto_warmup,
            search_path,
            ..Self::default()
        }
    }

    pub fn with_driver_class(mut self, driver_class: impl Into<String>) -> Self {
        self.driver_class = driver_class.into();
        self
    }

    pub fn with_auto_warmup(mut self, auto_warmup: bool) -> Self {
        self.auto_warmup = auto_warmup;
        self
    }

    pub fn with_search_path(mut self, search_path: impl Into<String>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }
}
