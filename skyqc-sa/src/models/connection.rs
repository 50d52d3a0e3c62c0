//! Active connection model

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported connection protocols.
///
/// `Sftp`/`Ftp`/`Ftps` are served by external transport drivers; `Local`
/// is the built-in directory-tree transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Sftp,
    Ftp,
    Ftps,
    Local,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionType::Sftp => "sftp",
            ConnectionType::Ftp => "ftp",
            ConnectionType::Ftps => "ftps",
            ConnectionType::Local => "local",
        };
        f.write_str(name)
    }
}

/// Sanitized description of an active connection. Never carries credentials.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub session_id: String,
    pub connection_type: ConnectionType,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConnectionInfo {
    pub fn new(
        session_id: String,
        connection_type: ConnectionType,
        host: String,
        port: u16,
        username: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            connection_type,
            host,
            port,
            username,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }

    pub fn idle_seconds(&self) -> i64 {
        (Utc::now() - self.last_activity).num_seconds()
    }

    pub fn is_expired(&self, expiry: Duration) -> bool {
        self.idle_seconds() >= 0 && self.idle_seconds() as u64 > expiry.as_secs()
    }
}
