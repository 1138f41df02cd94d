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

//! Driver runtime bridge
//!
//! Drivers are resolved by class identifier from a runtime that has to be
//! started once per process. Starting is a one-way transition: there is no
//! stop and no restart with a different search path.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::config::{DialectConfig, NEO4J_DRIVER_CLASS};
use crate::driver::{Driver, Neo4jDriver};
use crate::errors::{DialectError, DialectResult};

/// Separator between search path entries
pub const SEARCH_PATH_SEPARATOR: char = ':';

/// Environment drivers are resolved from
pub trait DriverRuntime: Send + Sync {
    fn is_running(&self) -> bool;

    /// Start the runtime. A no-op when it is already running.
    fn start(&self, search_path: Option<&str>) -> DialectResult<()>;

    /// Resolve a driver by class identifier
    fn load_driver(&self, class_name: &str) -> DialectResult<Arc<dyn Driver>>;
}

/// Start the runtime when needed and allowed to.
///
/// Safe to call on every dialect construction.
pub fn ensure_runtime_started(
    runtime: &dyn DriverRuntime,
    config: &DialectConfig,
) -> DialectResult<()> {
    if runtime.is_running() {
        return Ok(());
    }
    if !config.auto_warmup {
        return Err(DialectError::RuntimeNotStarted);
    }
    info!("Starting driver runtime automatically");
    runtime.start(config.search_path.as_deref())
}

/// In-process runtime holding a fixed set of drivers
pub struct NativeRuntime {
    drivers: HashMap<String, Arc<dyn Driver>>,
    search_path: OnceLock<Vec<String>>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
            search_path: OnceLock::new(),
        }
    }

    /// Register a driver under a class identifier
    pub fn with_driver(mut self, class_name: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(class_name.into(), driver);
        self
    }

    /// Process-wide runtime with the native Neo4j driver registered
    pub fn global() -> Arc<NativeRuntime> {
        static GLOBAL: OnceLock<Arc<NativeRuntime>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                Arc::new(
                    NativeRuntime::new()
                        .with_driver(NEO4J_DRIVER_CLASS, Arc::new(Neo4jDriver::new())),
                )
            })
            .clone()
    }

    /// Search path the runtime was started with
    pub fn search_path(&self) -> Option<&[String]> {
        self.search_path.get().map(Vec::as_slice)
    }

    /// Package-prefix entries restrict visibility; file and archive entries are ignored
    fn is_visible(&self, class_name: &str, search_path: &[String]) -> bool {
        let mut prefixes = search_path
            .iter()
            .filter(|entry| !is_filesystem_entry(entry))
            .peekable();
        if prefixes.peek().is_none() {
            return true;
        }
        prefixes.any(|entry| {
            let entry = entry.trim_end_matches(".*").trim_end_matches('.');
            class_name == entry
                || class_name
                    .strip_prefix(entry)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Whether a search path entry names a file or directory rather than a package
fn is_filesystem_entry(entry: &str) -> bool {
    entry.contains('/')
        || entry.contains('\\')
        || entry.ends_with(".jar")
        || entry.ends_with(".zip")
        || entry == "."
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRuntime for NativeRuntime {
    fn is_running(&self) -> bool {
        self.search_path.get().is_some()
    }

    fn start(&self, search_path: Option<&str>) -> DialectResult<()> {
        if self.is_running() {
            debug!("Driver runtime already running");
            return Ok(());
        }
        let entries = self.search_path.get_or_init(|| {
            search_path
                .unwrap_or_default()
                .split(SEARCH_PATH_SEPARATOR)
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect()
        });
        info!("Driver runtime started with search path {:?}", entries);
        Ok(())
    }

    fn load_driver(&self, class_name: &str) -> DialectResult<Arc<dyn Driver>> {
        let search_path = self
            .search_path
            .get()
            .ok_or(DialectError::RuntimeNotStarted)?;

        match self.drivers.get(class_name) {
            Some(driver) if self.is_visible(class_name, search_path) => Ok(driver.clone()),
            _ => Err(DialectError::DriverNotFound {
                class: class_name.to_string(),
            }),
        }
    }
}
