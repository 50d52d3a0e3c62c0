//! Active connection registry
//!
//! Owns the map of live remote connections keyed by session id. Each entry
//! bundles the caller-facing session, the factory the pool uses for
//! top-up, and the sanitized [`ConnectionInfo`] the API reports. Idle
//! connections are swept after the configured expiry, along with any
//! pooled sessions cached under them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::ConnectionInfo;
use crate::services::session_pool::{self, PoolKey};
use crate::transport::{
    ConnectParams, RemoteSession, SessionFactory, TransportError, TransportRegistry,
};

/// One live connection: shared session handle, factory, and metadata.
#[derive(Clone)]
pub struct ActiveConnection {
    pub info: ConnectionInfo,
    pub session: Arc<dyn RemoteSession>,
    pub factory: Arc<dyn SessionFactory>,
}

impl ActiveConnection {
    /// Cache key scoping pooled sessions to this connection and target.
    pub fn pool_key(&self) -> PoolKey {
        PoolKey {
            session_id: self.info.session_id.clone(),
            host: self.info.host.clone(),
            port: self.info.port,
            username: self.info.username.clone(),
        }
    }
}

pub struct ConnectionService {
    registry: TransportRegistry,
    expiry: Duration,
    connections: RwLock<HashMap<String, ActiveConnection>>,
}

impl ConnectionService {
    pub fn new(registry: TransportRegistry, expiry: Duration) -> Self {
        Self {
            registry,
            expiry,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Establish a connection through the registered transport driver and
    /// register it under a fresh session id.
    pub async fn connect(&self, params: &ConnectParams) -> Result<ConnectionInfo, TransportError> {
        let (session, factory) = self.registry.connect(params).await?;

        let session_id = Uuid::new_v4().to_string();
        let info = ConnectionInfo::new(
            session_id.clone(),
            params.protocol,
            params.host.clone(),
            params.port,
            params.username.clone(),
        );
        tracing::info!(
            "Connected {} to {}@{}:{} (session {})",
            params.protocol,
            params.username,
            params.host,
            params.port,
            session_id
        );

        let connection = ActiveConnection {
            info: info.clone(),
            session,
            factory,
        };
        self.connections
            .write()
            .await
            .insert(session_id, connection);
        Ok(info)
    }

    /// Look up a connection for use, refreshing its activity timestamp.
    pub async fn checkout(&self, session_id: &str) -> Option<ActiveConnection> {
        let mut connections = self.connections.write().await;
        let connection = connections.get_mut(session_id)?;
        connection.info.touch();
        Some(connection.clone())
    }

    /// Drop a connection and any pooled sessions cached under it.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        let removed = self.connections.write().await.remove(session_id);
        match removed {
            Some(connection) => {
                session_pool::cleanup_for_session(session_id);
                tracing::info!(
                    "Disconnected session {} ({}@{})",
                    session_id,
                    connection.info.username,
                    connection.info.host
                );
                true
            }
            None => false,
        }
    }

    /// Sanitized view of every active connection.
    pub async fn list(&self) -> Vec<ConnectionInfo> {
        self.connections
            .read()
            .await
            .values()
            .map(|c| c.info.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sweep connections idle past the expiry. Returns how many were
    /// removed.
    pub async fn cleanup_expired(&self) -> usize {
        let expired: Vec<String> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|c| c.info.is_expired(self.expiry))
                .map(|c| c.info.session_id.clone())
                .collect()
        };
        for session_id in &expired {
            tracing::info!("Expiring idle session {}", session_id);
            self.disconnect(session_id).await;
        }
        expired.len()
    }
}
