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

//! Engines and scoped connection acquisition

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::connection::{unwrap_connection, ConnectionLayer};
use crate::dialect::Dialect;
use crate::driver::DriverConnection;
use crate::dsn::ConnectArgs;
use crate::errors::DialectResult;

/// Source of fresh connections
#[async_trait]
pub trait Engine: Send + Sync {
    async fn connect(&self) -> DialectResult<ConnectionLayer>;
}

/// Where a metadata call gets its connection from
#[derive(Clone, Copy)]
pub enum Connectable<'a> {
    /// Open a short-lived connection and close it afterwards
    Engine(&'a dyn Engine),
    /// Use the caller's connection and leave it open
    Connection(&'a ConnectionLayer),
}

/// Connection held for the duration of one call
pub(crate) enum ScopedConnection<'a> {
    Borrowed(&'a ConnectionLayer),
    Owned(ConnectionLayer),
}

impl<'a> ScopedConnection<'a> {
    pub(crate) async fn acquire(target: Connectable<'a>) -> DialectResult<Self> {
        match target {
            Connectable::Engine(engine) => Ok(ScopedConnection::Owned(engine.connect().await?)),
            Connectable::Connection(layer) => Ok(ScopedConnection::Borrowed(layer)),
        }
    }

    pub(crate) fn layer(&self) -> &ConnectionLayer {
        match self {
            ScopedConnection::Borrowed(layer) => layer,
            ScopedConnection::Owned(layer) => layer,
        }
    }

    pub(crate) fn handle(&self) -> DialectResult<Arc<dyn DriverConnection>> {
        Ok(unwrap_connection(self.layer())?.handle.clone())
    }

    /// Release the connection and hand back `result`.
    ///
    /// An error from the call wins over an error from closing.
    pub(crate) async fn finish<T>(self, result: DialectResult<T>) -> DialectResult<T> {
        let ScopedConnection::Owned(layer) = self else {
            return result;
        };
        let closed = layer.close().await;
        match (result, closed) {
            (Err(err), Err(close_err)) => {
                warn!("Failed to close connection after error: {}", close_err);
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Ok(value), Ok(())) => Ok(value),
        }
    }
}

/// A dialect bound to the arguments of one connection URL
pub struct DialectEngine {
    dialect: Arc<dyn Dialect>,
    args: ConnectArgs,
}

impl DialectEngine {
    pub fn new(dialect: Arc<dyn Dialect>, url: &str) -> DialectResult<Self> {
        let args = dialect.create_connect_args(url)?;
        Ok(Self { dialect, args })
    }

    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    pub fn connect_args(&self) -> &ConnectArgs {
        &self.args
    }

    /// Borrow this engine as a connection source
    pub fn connectable(&self) -> Connectable<'_> {
        Connectable::Engine(self)
    }
}

#[async_trait]
impl Engine for DialectEngine {
    /// Open a connection and let the dialect initialize itself on first use
    async fn connect(&self) -> DialectResult<ConnectionLayer> {
        let layer = self.dialect.connect(&self.args).await?;
        if let Err(err) = self.dialect.initialize(&layer).await {
            if let Err(close_err) = layer.close().await {
                warn!("Failed to close connection after error: {}", close_err);
            }
            return Err(err);
        }
        Ok(layer)
    }
}
