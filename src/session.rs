//! Sessions — one logical connection between the server and a client.
//!
//! The stdio binding has exactly one session for the process's lifetime;
//! the SSE binding creates one per accepted connection and destroys it when
//! the connection closes. Sessions share the read-only registry and own no
//! registry state, so nothing one session does can leak into another.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::transport::TransportKind;

/// One client connection's identity.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub transport: TransportKind,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(transport: TransportKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            created_at: Utc::now(),
        }
    }
}
