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

//! Connection lifecycle
//!
//! Hosts hand connections back wrapped in any number of pooling layers. The
//! dialect only ever works on the driver connection at the bottom of that
//! chain.

use std::sync::Arc;

use tracing::debug;

use crate::driver::{Driver, DriverConnection, ResultCursor};
use crate::dsn::ConnectArgs;
use crate::errors::{DialectError, DialectResult, DriverError, DriverErrorKind};

/// Upper bound on wrapper layers walked by [`unwrap_connection`]
pub const MAX_UNWRAP_DEPTH: usize = 32;

/// Messages the driver uses when a connection or cursor went away.
/// The driver has no dedicated error category for this.
pub const DISCONNECT_MESSAGES: &[&str] = &["connection is closed", "cursor is closed"];

/// A connection as the host sees it
#[derive(Debug, Clone)]
pub enum ConnectionLayer {
    /// Pool or proxy layer around an inner connection, if it still has one
    Proxy(Option<Box<ConnectionLayer>>),
    Raw(Arc<dyn DriverConnection>),
}

impl ConnectionLayer {
    pub fn raw(handle: Arc<dyn DriverConnection>) -> Self {
        ConnectionLayer::Raw(handle)
    }

    /// Put one more proxy layer around this connection
    pub fn wrap(self) -> Self {
        ConnectionLayer::Proxy(Some(Box::new(self)))
    }

    /// Close the driver connection under all layers
    pub async fn close(&self) -> DialectResult<()> {
        let unwrapped = unwrap_connection(self)?;
        unwrapped.handle.close().await?;
        debug!("Closed connection ({} wrapper layers)", unwrapped.layers);
        Ok(())
    }
}

/// Driver connection found under a layered connection
#[derive(Debug)]
pub struct Unwrapped<'a> {
    pub handle: &'a Arc<dyn DriverConnection>,
    /// Number of proxy layers walked to reach it
    pub layers: usize,
}

/// Walk proxy layers down to the driver connection
pub fn unwrap_connection(connection: &ConnectionLayer) -> DialectResult<Unwrapped<'_>> {
    let mut current = connection;
    let mut layers = 0;
    loop {
        match current {
            ConnectionLayer::Raw(handle) => return Ok(Unwrapped { handle, layers }),
            ConnectionLayer::Proxy(None) => return Err(DialectError::ConnectionUnavailable),
            ConnectionLayer::Proxy(Some(inner)) => {
                if layers == MAX_UNWRAP_DEPTH {
                    return Err(DialectError::UnwrapDepthExceeded {
                        max: MAX_UNWRAP_DEPTH,
                    });
                }
                layers += 1;
                current = &**inner;
            }
        }
    }
}

/// Whether a driver error means the connection is gone
pub fn is_disconnect_error(error: &DriverError) -> bool {
    if error.kind != DriverErrorKind::Programming {
        return false;
    }
    DISCONNECT_MESSAGES
        .iter()
        .any(|needle| error.message.contains(needle))
}

/// Open a connection through the driver
pub async fn open_connection(driver: &dyn Driver, args: &ConnectArgs) -> DialectResult<ConnectionLayer> {
    debug!("Connecting to {}", args.dsn);
    let handle = driver.connect(&args.dsn, &args.options).await?;
    Ok(ConnectionLayer::raw(handle))
}

/// Run a statement verbatim on the driver connection
pub async fn execute(connection: &ConnectionLayer, statement: &str) -> DialectResult<Box<dyn ResultCursor>> {
    let unwrapped = unwrap_connection(connection)?;
    Ok(unwrapped.handle.execute(statement).await?)
}

/// Rollback is not supported by the store; this does nothing
pub async fn rollback(_connection: &ConnectionLayer) -> DialectResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, MemoryStore};
    use crate::dsn::translate;
    use async_trait::async_trait;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Bolt {}

        #[async_trait]
        impl Driver for Bolt {
            async fn connect(
                &self,
                dsn: &str,
                options: &HashMap<String, String>,
            ) -> crate::errors::DriverResult<Arc<dyn DriverConnection>>;
        }
    }

    async fn raw_connection() -> (MemoryDriver, ConnectionLayer) {
        let driver = MemoryDriver::new(MemoryStore::new("5.12.0").with_schema("neo4j"));
        let handle = driver.connect("", &HashMap::new()).await.unwrap();
        (driver, ConnectionLayer::raw(handle))
    }

    fn wrapped(mut layer: ConnectionLayer, depth: usize) -> ConnectionLayer {
        for _ in 0..depth {
            layer = layer.wrap();
        }
        layer
    }

    #[tokio::test]
    async fn test_unwrap_counts_layers() {
        let (_driver, raw) = raw_connection().await;
        let ConnectionLayer::Raw(expected) = &raw else {
            unreachable!()
        };
        let expected = expected.clone();

        for depth in [0, 1, 5, MAX_UNWRAP_DEPTH] {
            let layer = wrapped(raw.clone(), depth);
            let unwrapped = unwrap_connection(&layer).unwrap();
            assert_eq!(unwrapped.layers, depth);
            assert!(Arc::ptr_eq(unwrapped.handle, &expected));
        }
    }

    #[tokio::test]
    async fn test_unwrap_depth_guard() {
        let (_driver, raw) = raw_connection().await;
        let layer = wrapped(raw, MAX_UNWRAP_DEPTH + 1);
        let err = unwrap_connection(&layer).unwrap_err();
        assert!(matches!(err, DialectError::UnwrapDepthExceeded { max } if max == MAX_UNWRAP_DEPTH));
    }

    #[test]
    fn test_unwrap_detached_chain() {
        let layer = ConnectionLayer::Proxy(None).wrap();
        let err = unwrap_connection(&layer).unwrap_err();
        assert!(matches!(err, DialectError::ConnectionUnavailable));
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(is_disconnect_error(&DriverError::programming("cursor is closed: timeout")));
        assert!(is_disconnect_error(&DriverError::programming("the connection is closed")));
        assert!(!is_disconnect_error(&DriverError::programming("syntax error")));
        assert!(!is_disconnect_error(&DriverError::operational("connection is closed")));
        assert!(!is_disconnect_error(&DriverError::interface("cursor is closed")));
    }

    #[tokio::test]
    async fn test_open_passes_dsn_and_options() {
        let args = translate("neo4j+jdbc://db.local:7687/neo4j?PWD=a%26b&LogLevel=6").unwrap();
        let expected_options = args.options.clone();

        let mut mock = MockBolt::new();
        mock.expect_connect()
            .withf(move |dsn, options| dsn == "jdbc:neo4j://db.local:7687/neo4j" && *options == expected_options)
            .times(1)
            .returning(|_, _| Err(DriverError::operational("refused")));

        let err = open_connection(&mock, &args).await.unwrap_err();
        assert!(matches!(err, DialectError::Driver(e) if e.message == "refused"));
    }

    #[tokio::test]
    async fn test_close_reaches_raw_handle() {
        let (driver, raw) = raw_connection().await;
        let layer = wrapped(raw, 3);
        layer.close().await.unwrap();
        assert_eq!(driver.stats().open_connections(), 0);
    }

    #[tokio::test]
    async fn test_execute_through_wrapped_layer() {
        let statement = "MATCH (n:Person) RETURN n.name AS name";
        let store = MemoryStore::new("5.12.0").with_statement(
            statement,
            vec![crate::driver::row([("name", "Keanu")])],
        );
        let driver = MemoryDriver::new(store);
        let handle = driver.connect("", &HashMap::new()).await.unwrap();
        let layer = wrapped(ConnectionLayer::raw(handle), 4);

        let mut cursor = execute(&layer, statement).await.unwrap();
        assert!(cursor.next().await.unwrap());
        assert_eq!(cursor.get_string("name").unwrap().as_deref(), Some("Keanu"));
        assert!(!cursor.next().await.unwrap());

        let err = execute(&layer, "RETURN").await.err().unwrap();
        assert!(matches!(&err, DialectError::Driver(e) if !is_disconnect_error(e)));

        layer.close().await.unwrap();
        let err = execute(&layer, statement).await.err().unwrap();
        assert!(matches!(&err, DialectError::Driver(e) if is_disconnect_error(e)));
    }

    #[tokio::test]
    async fn test_execute_on_detached_chain() {
        let layer = ConnectionLayer::Proxy(None);
        let err = execute(&layer, "RETURN 1").await.err().unwrap();
        assert!(matches!(err, DialectError::ConnectionUnavailable));
    }

    #[tokio::test]
    async fn test_rollback_is_noop() {
        let (driver, raw) = raw_connection().await;
        rollback(&raw).await.unwrap();
        assert_eq!(driver.stats().metadata_calls(), 0);
        assert_eq!(driver.stats().open_connections(), 1);
    }
}
