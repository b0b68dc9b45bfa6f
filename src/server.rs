//! TCP listener and connection dispatch.
//!
//! Accepts incoming connections and spawns one independent task per
//! connection. Tasks are never joined; a failing connection is logged with
//! its peer address and affects nothing else.

use crate::catalog::Catalog;
use crate::codec::WireError;
use crate::config::Config;
use crate::connection::Connection;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{AcquireError, Semaphore};
use tracing::{debug, error, info, warn};

/// Listen backlog
const LISTEN_BACKLOG: i32 = 1024;

/// Startup and listener errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot resolve listen address {0:?}")]
    Resolve(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("connection limiter closed")]
    LimiterClosed(#[from] AcquireError),
}

/// Server instance
pub struct Server {
    config: Config,
    catalog: Arc<Catalog>,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Create a new server over an already loaded catalog
    pub fn new(config: Config, catalog: Arc<Catalog>) -> Self {
        let connection_limit = config.max_connections.map(|n| Arc::new(Semaphore::new(n)));

        Server {
            config,
            catalog,
            connection_limit,
        }
    }

    /// Resolve and bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = tokio::net::lookup_host(self.config.listen.as_str())
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ServerError::Resolve(self.config.listen.clone()))?;

        create_listener(addr).map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accept connections on `listener` forever.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.config.listen.clone());

        info!(
            address = %local,
            messages = self.catalog.len(),
            max_connections = ?self.config.max_connections,
            "Server listening"
        );

        loop {
            // Wait for a connection slot
            let permit = match &self.connection_limit {
                Some(limit) => Some(Arc::clone(limit).acquire_owned().await?),
                None => None,
            };

            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "New connection");

                    let catalog = Arc::clone(&self.catalog);

                    tokio::spawn(async move {
                        match Connection::new(stream, peer, catalog).run().await {
                            Ok(()) => debug!(peer = %peer, "Connection closed"),
                            Err(WireError::Protocol(e)) => {
                                warn!(peer = %peer, error = %e, "Protocol error, connection closed")
                            }
                            Err(WireError::Transport(e)) => {
                                error!(peer = %peer, error = %e, "Transport error, connection closed")
                            }
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    TcpListener::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(listen: &str) -> Config {
        Config {
            listen: listen.to_string(),
            catalog_path: PathBuf::from("messages.txt"),
            max_connections: None,
            log_level: "info".to_string(),
        }
    }

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from_messages(vec!["hello".to_string()]).unwrap())
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::new(config("127.0.0.1:0"), catalog());
        let listener = server.bind().await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let first = Server::new(config("127.0.0.1:0"), catalog());
        let listener = first.bind().await.unwrap();
        let taken = listener.local_addr().unwrap().to_string();

        let second = Server::new(config(&taken), catalog());
        assert!(matches!(second.bind().await, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_bind_unresolvable() {
        let server = Server::new(config("not an address"), catalog());
        assert!(matches!(server.bind().await, Err(ServerError::Resolve(_))));
    }

    #[test]
    fn test_connection_limit() {
        let mut limited = config("127.0.0.1:0");
        limited.max_connections = Some(2);

        let server = Server::new(limited, catalog());
        let limit = server.connection_limit.as_ref().unwrap();
        assert_eq!(limit.available_permits(), 2);

        let server = Server::new(config("127.0.0.1:0"), catalog());
        assert!(server.connection_limit.is_none());
    }
}
